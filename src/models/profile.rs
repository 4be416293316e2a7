use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::command::Command;
use super::reference::InstallType;
use super::script::Script;
use super::tree::Tree;

/// Prefix of the package naming scheme used before kickstart helpers were
/// published under their own names.
pub const LEGACY_KICKSTART_PACKAGE_NAME: &str = "auto-kickstart-";

/// A kickstart profile: a named provisioning configuration.
///
/// Commands and scripts are owned by the profile. Saving a profile saves them;
/// removing it removes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Option<i64>,
    pub org_id: i64,
    pub label: String,
    pub comments: Option<String>,
    pub active: bool,
    /// At most one profile per org carries this flag.
    pub is_org_default: bool,
    pub tree_id: Option<i64>,
    /// Install type of the referenced tree, resolved when the profile is loaded.
    pub install_type: Option<InstallType>,
    pub commands: Vec<Command>,
    pub scripts: Vec<Script>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Profile {
    pub fn new(org_id: i64, label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            org_id,
            label: label.into(),
            comments: None,
            active: true,
            is_org_default: false,
            tree_id: None,
            install_type: None,
            commands: Vec::new(),
            scripts: Vec::new(),
            created: now,
            modified: now,
        }
    }

    pub fn set_tree(&mut self, tree: &Tree) {
        self.tree_id = tree.id;
        self.install_type = Some(tree.install_type.clone());
    }

    pub fn add_script(&mut self, mut script: Script) {
        script.profile_id = self.id;
        self.scripts.push(script);
    }

    /// Targets a release old enough that SELinux directives are rejected.
    pub fn is_legacy_kickstart(&self) -> bool {
        self.install_type.as_ref().is_some_and(InstallType::is_legacy)
    }

    pub fn is_pre_rhel5_kickstart(&self) -> bool {
        self.install_type
            .as_ref()
            .is_some_and(InstallType::is_pre_rhel5)
    }
}

/// An IPv4 range whose machines are steered to a profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpRange {
    pub id: Option<i64>,
    pub profile_id: i64,
    pub org_id: i64,
    pub min: Ipv4Addr,
    pub max: Ipv4Addr,
}

impl IpRange {
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.min <= addr && addr <= self.max
    }
}
