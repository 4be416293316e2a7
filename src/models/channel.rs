use serde::{Deserialize, Serialize};

use super::reference::ChannelVersion;

/// A software channel, reduced to what kickstart needs to know about it.
///
/// Base channels have no parent. A child channel flagged `is_tools` is the
/// tools channel of its parent and carries the kickstart helper packages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: i64,
    pub label: String,
    pub name: String,
    /// `None` for vendor channels visible to every org.
    pub org_id: Option<i64>,
    pub parent_channel_id: Option<i64>,
    pub is_tools: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelInput {
    pub label: String,
    pub name: String,
    pub org_id: Option<i64>,
    pub parent_channel_id: Option<i64>,
    #[serde(default)]
    pub is_tools: bool,
    #[serde(default)]
    pub versions: Vec<ChannelVersion>,
}

/// A package name as listed to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageListItem {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePackageInput {
    pub name: String,
    pub capabilities: Vec<String>,
    pub channel_ids: Vec<i64>,
}
