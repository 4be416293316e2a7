use serde::{Deserialize, Serialize};

/// The operating system release a tree installs.
///
/// Labels follow the seeded `kickstart_install_types` table, e.g. `rhel_5`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallType {
    pub id: i64,
    pub label: String,
    pub name: String,
}

impl InstallType {
    pub const RHEL_21: &'static str = "rhel_2.1";
    pub const RHEL_3: &'static str = "rhel_3";
    pub const RHEL_4: &'static str = "rhel_4";
    pub const RHEL_5: &'static str = "rhel_5";
    pub const FEDORA: &'static str = "fedora_9";
    pub const GENERIC: &'static str = "generic_rpm";

    pub fn is_rhel2(&self) -> bool {
        self.label == Self::RHEL_21
    }

    pub fn is_rhel3(&self) -> bool {
        self.label == Self::RHEL_3
    }

    pub fn is_rhel4(&self) -> bool {
        self.label == Self::RHEL_4
    }

    pub fn is_rhel5(&self) -> bool {
        self.label == Self::RHEL_5
    }

    /// Releases that predate SELinux support in kickstart.
    pub fn is_legacy(&self) -> bool {
        self.is_rhel2() || self.is_rhel3()
    }

    /// Releases whose anaconda still understands `lilocheck`.
    pub fn is_pre_rhel5(&self) -> bool {
        self.is_rhel2() || self.is_rhel3() || self.is_rhel4()
    }
}

/// Release version carried by a channel, used to match channels to install types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChannelVersion {
    #[serde(rename = "2.1")]
    Rhel21,
    #[serde(rename = "3")]
    Rhel3,
    #[serde(rename = "4")]
    Rhel4,
    #[serde(rename = "5")]
    Rhel5,
}

impl ChannelVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rhel21 => "2.1",
            Self::Rhel3 => "3",
            Self::Rhel4 => "4",
            Self::Rhel5 => "5",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "2.1" => Some(Self::Rhel21),
            "3" => Some(Self::Rhel3),
            "4" => Some(Self::Rhel4),
            "5" => Some(Self::Rhel5),
            _ => None,
        }
    }

    /// The channel version an install type needs, if it maps onto one.
    pub fn for_install_type(install_type: &InstallType) -> Option<Self> {
        match install_type.label.as_str() {
            InstallType::RHEL_21 => Some(Self::Rhel21),
            InstallType::RHEL_3 => Some(Self::Rhel3),
            InstallType::RHEL_4 => Some(Self::Rhel4),
            InstallType::RHEL_5 => Some(Self::Rhel5),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualizationType {
    pub id: i64,
    pub label: String,
    pub name: String,
}

/// Whether a tree is managed by this server or by an external tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeType {
    pub id: i64,
    pub label: String,
    pub name: String,
}

impl TreeType {
    pub const MANAGED: &'static str = "rhn-managed";
    pub const EXTERNAL: &'static str = "externally-managed";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CryptoKeyType {
    pub id: i64,
    pub label: String,
    pub description: String,
}

impl CryptoKeyType {
    pub const GPG: &'static str = "GPG";
    pub const SSL: &'static str = "SSL";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install_type(label: &str) -> InstallType {
        InstallType {
            id: 1,
            label: label.to_string(),
            name: label.to_string(),
        }
    }

    #[test]
    fn legacy_covers_only_releases_without_selinux() {
        assert!(install_type(InstallType::RHEL_21).is_legacy());
        assert!(install_type(InstallType::RHEL_3).is_legacy());
        assert!(!install_type(InstallType::RHEL_4).is_legacy());
        assert!(!install_type(InstallType::RHEL_5).is_legacy());
    }

    #[test]
    fn pre_rhel5_includes_rhel4() {
        assert!(install_type(InstallType::RHEL_4).is_pre_rhel5());
        assert!(!install_type(InstallType::RHEL_5).is_pre_rhel5());
        assert!(!install_type(InstallType::FEDORA).is_pre_rhel5());
    }

    #[test]
    fn channel_version_maps_rhel_install_types() {
        assert_eq!(
            ChannelVersion::for_install_type(&install_type(InstallType::RHEL_4)),
            Some(ChannelVersion::Rhel4)
        );
        assert_eq!(
            ChannelVersion::for_install_type(&install_type(InstallType::GENERIC)),
            None
        );
    }
}
