use rusqlite::OptionalExtension;

use super::Database;
use crate::error::{KickstartError, Result};
use crate::models::*;

/// Reference rows every component needs, resolved once at startup.
///
/// Build it with [`Database::reference_data`] after migrating and hand it to
/// the code that creates keys and trees.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub key_type_gpg: CryptoKeyType,
    pub key_type_ssl: CryptoKeyType,
    pub tree_type_managed: TreeType,
    pub tree_type_external: TreeType,
}

impl Database {
    /// Resolve the reference registry, failing if the seed data is incomplete.
    pub fn reference_data(&self) -> Result<ReferenceData> {
        for state in SessionState::ALL {
            if self.lookup_session_state_by_label(state.as_str())?.is_none() {
                return Err(KickstartError::not_found(format!(
                    "session state '{}'",
                    state.as_str()
                )));
            }
        }

        let key_type = |label: &str| -> Result<CryptoKeyType> {
            self.lookup_key_type(label)?
                .ok_or_else(|| KickstartError::not_found(format!("crypto key type '{label}'")))
        };
        let tree_type = |label: &str| -> Result<TreeType> {
            self.lookup_tree_type_by_label(label)?
                .ok_or_else(|| KickstartError::not_found(format!("tree type '{label}'")))
        };

        Ok(ReferenceData {
            key_type_gpg: key_type(CryptoKeyType::GPG)?,
            key_type_ssl: key_type(CryptoKeyType::SSL)?,
            tree_type_managed: tree_type(TreeType::MANAGED)?,
            tree_type_external: tree_type(TreeType::EXTERNAL)?,
        })
    }

    pub fn lookup_key_type(&self, label: &str) -> Result<Option<CryptoKeyType>> {
        self.with_conn("lookup_key_type", |conn| {
            conn.query_row(
                "SELECT id, label, description FROM crypto_key_types WHERE label = ?",
                [label],
                |row| {
                    Ok(CryptoKeyType {
                        id: row.get(0)?,
                        label: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn lookup_tree_type_by_label(&self, label: &str) -> Result<Option<TreeType>> {
        self.with_conn("lookup_tree_type_by_label", |conn| {
            conn.query_row(
                "SELECT id, label, name FROM kickstart_tree_types WHERE label = ?",
                [label],
                |row| {
                    Ok(TreeType {
                        id: row.get(0)?,
                        label: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn lookup_session_state_by_label(&self, label: &str) -> Result<Option<SessionState>> {
        let found = self.with_conn("lookup_session_state_by_label", |conn| {
            conn.query_row(
                "SELECT label FROM kickstart_session_states WHERE label = ?",
                [label],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })?;
        Ok(found.as_deref().and_then(SessionState::from_str))
    }

    pub fn lookup_install_type_by_label(&self, label: &str) -> Result<Option<InstallType>> {
        Ok(self
            .lookup_install_types()?
            .into_iter()
            .find(|t| t.label == label))
    }

    /// All install types, ordered by label. Served from the reference cache.
    pub fn lookup_install_types(&self) -> Result<Vec<InstallType>> {
        if let Some(types) = &self.cache.lock().expect("cache lock poisoned").install_types {
            return Ok(types.clone());
        }

        let types = self.with_conn("lookup_install_types", |conn| {
            let mut stmt =
                conn.prepare("SELECT id, label, name FROM kickstart_install_types ORDER BY label")?;
            let rows = stmt.query_map([], |row| {
                Ok(InstallType {
                    id: row.get(0)?,
                    label: row.get(1)?,
                    name: row.get(2)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        self.cache.lock().expect("cache lock poisoned").install_types = Some(types.clone());
        Ok(types)
    }

    /// All virtualization types, ordered by label. Served from the reference cache.
    pub fn lookup_virtualization_types(&self) -> Result<Vec<VirtualizationType>> {
        if let Some(types) = &self
            .cache
            .lock()
            .expect("cache lock poisoned")
            .virtualization_types
        {
            return Ok(types.clone());
        }

        let types = self.with_conn("lookup_virtualization_types", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, label, name FROM kickstart_virtualization_types ORDER BY label",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(VirtualizationType {
                    id: row.get(0)?,
                    label: row.get(1)?,
                    name: row.get(2)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        self.cache
            .lock()
            .expect("cache lock poisoned")
            .virtualization_types = Some(types.clone());
        Ok(types)
    }

    pub fn lookup_virtualization_type_by_label(
        &self,
        label: &str,
    ) -> Result<Option<VirtualizationType>> {
        Ok(self
            .lookup_virtualization_types()?
            .into_iter()
            .find(|t| t.label == label))
    }
}
