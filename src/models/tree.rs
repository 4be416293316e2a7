use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reference::{InstallType, TreeType};

/// Boot image used by trees that do not name one explicitly.
pub const DEFAULT_BOOT_IMAGE: &str = "spacewalk-koan";

/// An installable file tree (a "distribution") that profiles install from.
///
/// A tree belongs to one channel. Trees with no org are shipped by the vendor
/// and are visible to every org; a tree label is unique within its owning org.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// `None` until the tree is first saved.
    pub id: Option<i64>,
    pub label: String,
    /// URL or path the installer fetches the tree from.
    pub base_path: String,
    pub boot_image: String,
    pub org_id: Option<i64>,
    pub channel_id: i64,
    pub install_type: InstallType,
    pub tree_type: TreeType,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Tree {
    pub fn new(
        label: impl Into<String>,
        base_path: impl Into<String>,
        channel_id: i64,
        install_type: InstallType,
        tree_type: TreeType,
        org_id: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            label: label.into(),
            base_path: base_path.into(),
            boot_image: DEFAULT_BOOT_IMAGE.to_string(),
            org_id,
            channel_id,
            install_type,
            tree_type,
            created: now,
            modified: now,
        }
    }

    pub fn is_system_owned(&self) -> bool {
        self.org_id.is_none()
    }
}
