//! Hand-off of edited trees to the provisioning server.

use crate::error::Result;
use crate::models::Tree;

/// Pushes a saved tree to the external provisioning component.
///
/// Called once per successful tree edit, after the tree has been written to
/// the store. An error here surfaces to the caller of the edit; the store
/// write is not undone.
pub trait TreeSync: Send + Sync {
    fn store(&self, tree: &Tree) -> Result<()>;
}

/// Records sync requests in the log instead of contacting a provisioning server.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSync;

impl TreeSync for TracingSync {
    fn store(&self, tree: &Tree) -> Result<()> {
        tracing::info!(
            tree = %tree.label,
            id = ?tree.id,
            base_path = %tree.base_path,
            "syncing kickstart tree to provisioning server"
        );
        Ok(())
    }
}
