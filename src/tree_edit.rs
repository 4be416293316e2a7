//! Create and edit kickstart trees on behalf of a user.
//!
//! A [`TreeEditOperation`] owns one tree for the length of an edit. Setters
//! change it in memory only; [`TreeEditOperation::store`] validates the label,
//! writes the tree and hands it to the provisioning sync.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{KickstartError, Result};
use crate::models::*;
use crate::sync::TreeSync;

/// Capability provided by the packages that carry kickstart boot images.
pub const KICKSTART_CAPABILITY: &str = "rhn.kickstart.boot_image";

/// Message key reported when a tree label is rejected.
pub const INVALID_LABEL_KEY: &str = "kickstart.tree.invalidlabel";

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-_0-9A-Za-z@.]{1,255}$").unwrap());

/// A rejected edit, identified by a message key the caller localizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorError {
    pub key: String,
}

impl ValidatorError {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

pub fn is_valid_label(label: &str) -> bool {
    LABEL_RE.is_match(label)
}

pub struct TreeEditOperation<'a> {
    db: &'a Database,
    user: User,
    tree: Option<Tree>,
    /// State of the tree as last persisted, restored when a store is rejected.
    snapshot: Option<Tree>,
    sync: &'a dyn TreeSync,
}

impl<'a> TreeEditOperation<'a> {
    /// Edit an explicit tree, typically a new one that has not been saved yet.
    pub fn new(db: &'a Database, user: User, tree: Tree, sync: &'a dyn TreeSync) -> Self {
        Self {
            db,
            user,
            snapshot: Some(tree.clone()),
            tree: Some(tree),
            sync,
        }
    }

    /// Edit the tree the user's org sees under `label`.
    ///
    /// The operation has no tree when none matches; check [`Self::tree`].
    pub fn for_label(
        db: &'a Database,
        label: &str,
        user: User,
        sync: &'a dyn TreeSync,
    ) -> Result<Self> {
        let tree = db.lookup_tree_by_label(label, user.org_id)?;
        if tree.is_none() {
            tracing::debug!(label, org = user.org_id, "no kickstart tree for label");
        }
        Ok(Self {
            db,
            user,
            snapshot: tree.clone(),
            tree,
            sync,
        })
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn into_tree(self) -> Option<Tree> {
        self.tree
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    fn tree_mut(&mut self) -> Result<&mut Tree> {
        self.tree
            .as_mut()
            .ok_or_else(|| KickstartError::not_found("kickstart tree"))
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<()> {
        self.tree_mut()?.label = label.into();
        Ok(())
    }

    pub fn set_base_path(&mut self, base_path: impl Into<String>) -> Result<()> {
        self.tree_mut()?.base_path = base_path.into();
        Ok(())
    }

    pub fn set_boot_image(&mut self, boot_image: impl Into<String>) -> Result<()> {
        self.tree_mut()?.boot_image = boot_image.into();
        Ok(())
    }

    pub fn set_install_type(&mut self, install_type: InstallType) -> Result<()> {
        self.tree_mut()?.install_type = install_type;
        Ok(())
    }

    pub fn set_channel(&mut self, channel: &Channel) -> Result<()> {
        self.tree_mut()?.channel_id = channel.id;
        Ok(())
    }

    /// Whether the current label is acceptable. A missing tree never is.
    pub fn validate_label(&self) -> bool {
        self.tree
            .as_ref()
            .is_some_and(|tree| is_valid_label(&tree.label))
    }

    /// Persist the tree and push it to the provisioning server.
    ///
    /// A bad label discards the pending edits and is reported as a
    /// [`ValidatorError`]; nothing is written or synced in that case.
    pub fn store(&mut self) -> Result<Option<ValidatorError>> {
        let Some(tree) = self.tree.as_mut() else {
            return Err(KickstartError::not_found("kickstart tree"));
        };

        if !is_valid_label(&tree.label) {
            tracing::debug!(label = %tree.label, "rejecting kickstart tree label");
            self.tree = self.snapshot.clone();
            return Ok(Some(ValidatorError::new(INVALID_LABEL_KEY)));
        }

        self.db.save_tree(tree)?;
        let saved = tree.clone();
        self.sync.store(&saved)?;
        self.snapshot = Some(saved);
        Ok(None)
    }

    /// Kickstart packages visible to the user's org, legacy prefix stripped.
    pub fn auto_kickstart_package_names(&self) -> Result<Vec<PackageListItem>> {
        let packages = self
            .db
            .package_names_by_capability(self.user.org_id, KICKSTART_CAPABILITY)?;
        Ok(strip_legacy_names(packages))
    }

    /// Kickstart packages in the tools channel of `base_channel`.
    ///
    /// Empty when the base channel has no tools channel.
    pub fn kickstart_package_names_for_channel(
        &self,
        base_channel: &Channel,
    ) -> Result<Vec<PackageListItem>> {
        let Some(tools) = self
            .db
            .lookup_tools_channel(base_channel.id, self.user.org_id)?
        else {
            return Ok(Vec::new());
        };

        let packages = self.db.package_names_by_capability_and_channel(
            self.user.org_id,
            KICKSTART_CAPABILITY,
            tools.id,
        )?;
        Ok(strip_legacy_names(packages))
    }

    /// Install types whose release the channel provides.
    pub fn kickstart_install_types_for_channel(
        &self,
        channel: &Channel,
    ) -> Result<Vec<InstallType>> {
        let versions = self.db.lookup_channel_versions(channel.id)?;
        Ok(self
            .db
            .lookup_install_types()?
            .into_iter()
            .filter(|install_type| {
                ChannelVersion::for_install_type(install_type)
                    .is_some_and(|version| versions.contains(&version))
            })
            .collect())
    }

    pub fn kickstartable_channels(&self) -> Result<Vec<Channel>> {
        self.db.lookup_kickstartable_channels(self.user.org_id)
    }
}

fn strip_legacy_names(packages: Vec<PackageListItem>) -> Vec<PackageListItem> {
    packages
        .into_iter()
        .map(|mut package| {
            package.name = package.name.replacen(LEGACY_KICKSTART_PACKAGE_NAME, "", 1);
            package
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_labels_made_of_allowed_characters() {
        assert!(is_valid_label("rhel-5_server"));
        assert!(is_valid_label("ks@example.com"));
        assert!(is_valid_label("a"));
        assert!(is_valid_label(&"x".repeat(255)));
    }

    #[test]
    fn rejects_empty_long_and_spaced_labels() {
        assert!(!is_valid_label(""));
        assert!(!is_valid_label(&"x".repeat(256)));
        assert!(!is_valid_label("has space"));
        assert!(!is_valid_label("slash/label"));
        assert!(!is_valid_label("tab\tlabel"));
    }

    #[test]
    fn strips_only_first_legacy_prefix() {
        let packages = vec![
            PackageListItem {
                id: 1,
                name: "auto-kickstart-ks-rhel-i386-as-4".into(),
            },
            PackageListItem {
                id: 2,
                name: "spacewalk-koan".into(),
            },
            PackageListItem {
                id: 3,
                name: "auto-kickstart-auto-kickstart-x".into(),
            },
        ];

        let names: Vec<_> = strip_legacy_names(packages)
            .into_iter()
            .map(|p| p.name)
            .collect();

        assert_eq!(names, ["ks-rhel-i386-as-4", "spacewalk-koan", "auto-kickstart-x"]);
    }
}
