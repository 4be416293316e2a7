use std::collections::HashSet;

use rusqlite::{OptionalExtension, Row};

use super::Database;
use crate::error::Result;
use crate::models::*;

const CHANNEL_COLUMNS: &str = "id, label, name, org_id, parent_channel_id, is_tools";

fn channel_from_row(row: &Row) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get(0)?,
        label: row.get(1)?,
        name: row.get(2)?,
        org_id: row.get(3)?,
        parent_channel_id: row.get(4)?,
        is_tools: row.get::<_, i32>(5)? != 0,
    })
}

impl Database {
    // ============================================================
    // Org operations
    // ============================================================

    pub fn create_org(&self, name: &str) -> Result<Org> {
        self.with_conn("create_org", |conn| {
            conn.execute("INSERT INTO orgs (name) VALUES (?)", [name])?;
            Ok(Org {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
            })
        })
    }

    pub fn lookup_org(&self, id: i64) -> Result<Option<Org>> {
        self.with_conn("lookup_org", |conn| {
            conn.query_row("SELECT id, name FROM orgs WHERE id = ?", [id], |row| {
                Ok(Org {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()
        })
    }

    // ============================================================
    // Channel operations
    // ============================================================

    pub fn create_channel(&self, input: CreateChannelInput) -> Result<Channel> {
        self.with_tx("create_channel", |conn| {
            conn.execute(
                "INSERT INTO channels (label, name, org_id, parent_channel_id, is_tools)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    &input.label,
                    &input.name,
                    input.org_id,
                    input.parent_channel_id,
                    if input.is_tools { 1 } else { 0 },
                ),
            )?;
            let id = conn.last_insert_rowid();

            for version in &input.versions {
                conn.execute(
                    "INSERT OR IGNORE INTO channel_versions (channel_id, version) VALUES (?, ?)",
                    (id, version.as_str()),
                )?;
            }

            Ok(Channel {
                id,
                label: input.label,
                name: input.name,
                org_id: input.org_id,
                parent_channel_id: input.parent_channel_id,
                is_tools: input.is_tools,
            })
        })
    }

    pub fn lookup_channel(&self, id: i64) -> Result<Option<Channel>> {
        self.with_conn("lookup_channel", |conn| {
            conn.query_row(
                &format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?"),
                [id],
                channel_from_row,
            )
            .optional()
        })
    }

    /// Release versions shipped in a channel.
    pub fn lookup_channel_versions(&self, channel_id: i64) -> Result<HashSet<ChannelVersion>> {
        let labels = self.with_conn("lookup_channel_versions", |conn| {
            let mut stmt =
                conn.prepare("SELECT version FROM channel_versions WHERE channel_id = ?")?;
            let rows = stmt.query_map([channel_id], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        Ok(labels
            .iter()
            .filter_map(|label| ChannelVersion::from_str(label))
            .collect())
    }

    /// The tools child channel of a base channel, as visible to `org_id`.
    pub fn lookup_tools_channel(
        &self,
        base_channel_id: i64,
        org_id: i64,
    ) -> Result<Option<Channel>> {
        self.with_conn("lookup_tools_channel", |conn| {
            conn.query_row(
                &format!(
                    "SELECT {CHANNEL_COLUMNS} FROM channels
                     WHERE parent_channel_id = ? AND is_tools = 1
                       AND (org_id = ? OR org_id IS NULL)
                     ORDER BY org_id IS NULL, label
                     LIMIT 1"
                ),
                (base_channel_id, org_id),
                channel_from_row,
            )
            .optional()
        })
    }

    /// Base channels an org can attach kickstart trees to.
    pub fn lookup_kickstartable_channels(&self, org_id: i64) -> Result<Vec<Channel>> {
        self.with_conn("lookup_kickstartable_channels", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHANNEL_COLUMNS} FROM channels
                 WHERE parent_channel_id IS NULL AND is_tools = 0
                   AND (org_id = ? OR org_id IS NULL)
                 ORDER BY label"
            ))?;
            let rows = stmt.query_map([org_id], channel_from_row)?;
            rows.collect()
        })
    }

    // ============================================================
    // Package operations
    // ============================================================

    pub fn create_package(&self, input: CreatePackageInput) -> Result<PackageListItem> {
        self.with_tx("create_package", |conn| {
            conn.execute("INSERT INTO packages (name) VALUES (?)", [&input.name])?;
            let id = conn.last_insert_rowid();

            for capability in &input.capabilities {
                conn.execute(
                    "INSERT OR IGNORE INTO package_capabilities (package_id, capability) VALUES (?, ?)",
                    (id, capability),
                )?;
            }
            for channel_id in &input.channel_ids {
                conn.execute(
                    "INSERT OR IGNORE INTO channel_packages (channel_id, package_id) VALUES (?, ?)",
                    (channel_id, id),
                )?;
            }

            Ok(PackageListItem {
                id,
                name: input.name,
            })
        })
    }

    /// Packages providing `capability` in any channel the org can see.
    pub fn package_names_by_capability(
        &self,
        org_id: i64,
        capability: &str,
    ) -> Result<Vec<PackageListItem>> {
        self.with_conn("package_names_by_capability", |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT p.id, p.name FROM packages p
                 JOIN package_capabilities pc ON pc.package_id = p.id
                 JOIN channel_packages cp ON cp.package_id = p.id
                 JOIN channels c ON c.id = cp.channel_id
                 WHERE pc.capability = ? AND (c.org_id = ? OR c.org_id IS NULL)
                 ORDER BY p.name",
            )?;
            let rows = stmt.query_map((capability, org_id), |row| {
                Ok(PackageListItem {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;
            rows.collect()
        })
    }

    /// Packages providing `capability` within one channel the org can see.
    pub fn package_names_by_capability_and_channel(
        &self,
        org_id: i64,
        capability: &str,
        channel_id: i64,
    ) -> Result<Vec<PackageListItem>> {
        self.with_conn("package_names_by_capability_and_channel", |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT p.id, p.name FROM packages p
                 JOIN package_capabilities pc ON pc.package_id = p.id
                 JOIN channel_packages cp ON cp.package_id = p.id
                 JOIN channels c ON c.id = cp.channel_id
                 WHERE pc.capability = ? AND c.id = ? AND (c.org_id = ? OR c.org_id IS NULL)
                 ORDER BY p.name",
            )?;
            let rows = stmt.query_map((capability, channel_id, org_id), |row| {
                Ok(PackageListItem {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;
            rows.collect()
        })
    }
}
