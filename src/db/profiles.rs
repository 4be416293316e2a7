use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};

use super::commands::{load_commands, save_command_row};
use super::{ipv4_column, label_column, parse_datetime, placeholders, Database};
use crate::error::Result;
use crate::models::*;

const PROFILE_SELECT: &str = "SELECT k.id, k.org_id, k.label, k.comments, k.active,
        k.is_org_default, k.kstree_id, k.created, k.modified, it.id, it.label, it.name
     FROM kickstart_data k
     LEFT JOIN kickstart_trees t ON t.id = k.kstree_id
     LEFT JOIN kickstart_install_types it ON it.id = t.install_type_id";

const SCRIPT_COLUMNS: &str =
    "id, kickstart_id, script_type, interpreter, chroot, data, position, created, modified";

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    let install_type = match row.get::<_, Option<i64>>(9)? {
        Some(id) => Some(InstallType {
            id,
            label: row.get(10)?,
            name: row.get(11)?,
        }),
        None => None,
    };

    Ok(Profile {
        id: Some(row.get(0)?),
        org_id: row.get(1)?,
        label: row.get(2)?,
        comments: row.get(3)?,
        active: row.get::<_, i32>(4)? != 0,
        is_org_default: row.get::<_, i32>(5)? != 0,
        tree_id: row.get(6)?,
        install_type,
        commands: Vec::new(),
        scripts: Vec::new(),
        created: parse_datetime(row.get::<_, String>(7)?),
        modified: parse_datetime(row.get::<_, String>(8)?),
    })
}

fn script_from_row(row: &Row) -> rusqlite::Result<Script> {
    Ok(Script {
        id: Some(row.get(0)?),
        profile_id: row.get(1)?,
        script_type: label_column(row, 2, ScriptType::from_str)?,
        interpreter: row.get(3)?,
        chroot: row.get::<_, i32>(4)? != 0,
        data: row.get(5)?,
        position: row.get(6)?,
        created: parse_datetime(row.get::<_, String>(7)?),
        modified: parse_datetime(row.get::<_, String>(8)?),
    })
}

fn load_scripts(conn: &Connection, profile_id: i64) -> rusqlite::Result<Vec<Script>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCRIPT_COLUMNS} FROM kickstart_scripts
         WHERE kickstart_id = ? ORDER BY script_type, position, id"
    ))?;
    let rows = stmt.query_map([profile_id], script_from_row)?;
    rows.collect()
}

/// Run a profile query and attach each profile's commands and scripts.
fn query_profiles(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Profile>> {
    let mut stmt = conn.prepare(&format!("{PROFILE_SELECT} WHERE {filter} ORDER BY k.label"))?;
    let mut profiles = stmt
        .query_map(params, profile_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for profile in &mut profiles {
        if let Some(id) = profile.id {
            profile.commands = load_commands(conn, id)?;
            profile.scripts = load_scripts(conn, id)?;
        }
    }
    Ok(profiles)
}

fn save_script_row(conn: &Connection, script: &mut Script, profile_id: i64) -> rusqlite::Result<()> {
    script.profile_id = Some(profile_id);
    script.modified = Utc::now();
    match script.id {
        Some(id) => {
            conn.execute(
                "UPDATE kickstart_scripts SET kickstart_id = ?, script_type = ?, interpreter = ?,
                    chroot = ?, data = ?, position = ?, modified = ?
                 WHERE id = ?",
                (
                    profile_id,
                    script.script_type.as_str(),
                    &script.interpreter,
                    if script.chroot { 1 } else { 0 },
                    &script.data,
                    script.position,
                    script.modified.to_rfc3339(),
                    id,
                ),
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO kickstart_scripts (kickstart_id, script_type, interpreter, chroot,
                    data, position, created, modified)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    profile_id,
                    script.script_type.as_str(),
                    &script.interpreter,
                    if script.chroot { 1 } else { 0 },
                    &script.data,
                    script.position,
                    script.created.to_rfc3339(),
                    script.modified.to_rfc3339(),
                ),
            )?;
            script.id = Some(conn.last_insert_rowid());
        }
    }
    Ok(())
}

/// Delete child rows of a profile that are no longer in `keep`.
fn delete_orphans(
    conn: &Connection,
    table: &str,
    profile_id: i64,
    keep: &[i64],
) -> rusqlite::Result<usize> {
    if keep.is_empty() {
        return conn.execute(
            &format!("DELETE FROM {table} WHERE kickstart_id = ?"),
            [profile_id],
        );
    }

    let sql = format!(
        "DELETE FROM {table} WHERE kickstart_id = ? AND id NOT IN ({})",
        placeholders(keep.len())
    );
    let mut params: Vec<&dyn rusqlite::ToSql> = vec![&profile_id];
    params.extend(keep.iter().map(|id| id as &dyn rusqlite::ToSql));
    conn.execute(&sql, params.as_slice())
}

impl Database {
    // ============================================================
    // Profile operations
    // ============================================================

    pub fn lookup_profile_by_id_and_org(&self, org_id: i64, id: i64) -> Result<Option<Profile>> {
        self.with_conn("lookup_profile_by_id_and_org", |conn| {
            Ok(query_profiles(conn, "k.id = ? AND k.org_id = ?", (id, org_id))?
                .into_iter()
                .next())
        })
    }

    pub fn lookup_profile_by_label_and_org(
        &self,
        label: &str,
        org_id: i64,
    ) -> Result<Option<Profile>> {
        self.with_conn("lookup_profile_by_label_and_org", |conn| {
            Ok(
                query_profiles(conn, "k.label = ? AND k.org_id = ?", (label, org_id))?
                    .into_iter()
                    .next(),
            )
        })
    }

    /// Profiles installing from a tree.
    pub fn lookup_profiles_by_tree(&self, tree_id: i64) -> Result<Vec<Profile>> {
        self.with_conn("lookup_profiles_by_tree", |conn| {
            query_profiles(conn, "k.kstree_id = ?", [tree_id])
        })
    }

    pub fn lookup_org_default(&self, org_id: i64) -> Result<Option<Profile>> {
        self.with_conn("lookup_org_default", |conn| {
            Ok(
                query_profiles(conn, "k.org_id = ? AND k.is_org_default = 1", [org_id])?
                    .into_iter()
                    .next(),
            )
        })
    }

    /// Insert or update a profile together with its commands and scripts.
    ///
    /// Commands and scripts dropped from the profile are deleted. Marking the
    /// profile as org default clears the flag on every other profile of the org.
    pub fn save_profile(&self, profile: &mut Profile) -> Result<()> {
        profile.modified = Utc::now();
        self.with_tx("save_profile", |conn| {
            if profile.is_org_default {
                conn.execute(
                    "UPDATE kickstart_data SET is_org_default = 0
                     WHERE org_id = ? AND id IS NOT ?",
                    (profile.org_id, profile.id),
                )?;
            }

            let id = match profile.id {
                Some(id) => {
                    conn.execute(
                        "UPDATE kickstart_data SET org_id = ?, label = ?, comments = ?, active = ?,
                            is_org_default = ?, kstree_id = ?, modified = ?
                         WHERE id = ?",
                        (
                            profile.org_id,
                            &profile.label,
                            &profile.comments,
                            if profile.active { 1 } else { 0 },
                            if profile.is_org_default { 1 } else { 0 },
                            profile.tree_id,
                            profile.modified.to_rfc3339(),
                            id,
                        ),
                    )?;
                    id
                }
                None => {
                    conn.execute(
                        "INSERT INTO kickstart_data (org_id, label, comments, active,
                            is_org_default, kstree_id, created, modified)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                        (
                            profile.org_id,
                            &profile.label,
                            &profile.comments,
                            if profile.active { 1 } else { 0 },
                            if profile.is_org_default { 1 } else { 0 },
                            profile.tree_id,
                            profile.created.to_rfc3339(),
                            profile.modified.to_rfc3339(),
                        ),
                    )?;
                    let id = conn.last_insert_rowid();
                    profile.id = Some(id);
                    id
                }
            };

            for command in &mut profile.commands {
                save_command_row(conn, command, id)?;
            }
            let command_ids: Vec<i64> = profile.commands.iter().filter_map(|c| c.id).collect();
            delete_orphans(conn, "kickstart_commands", id, &command_ids)?;

            for script in &mut profile.scripts {
                save_script_row(conn, script, id)?;
            }
            let script_ids: Vec<i64> = profile.scripts.iter().filter_map(|s| s.id).collect();
            delete_orphans(conn, "kickstart_scripts", id, &script_ids)?;

            Ok(())
        })
    }

    /// Delete a profile and everything it owns. Returns the number of profiles removed.
    pub fn remove_profile(&self, profile: &Profile) -> Result<usize> {
        let Some(id) = profile.id else {
            return Ok(0);
        };
        self.with_conn("remove_profile", |conn| {
            conn.execute("DELETE FROM kickstart_data WHERE id = ?", [id])
        })
    }

    // ============================================================
    // Script operations
    // ============================================================

    /// Load a script, hiding it when its profile belongs to another org.
    pub fn lookup_script(&self, org_id: i64, id: i64) -> Result<Option<Script>> {
        self.with_conn("lookup_script", |conn| {
            conn.query_row(
                "SELECT s.id, s.kickstart_id, s.script_type, s.interpreter, s.chroot, s.data,
                        s.position, s.created, s.modified
                 FROM kickstart_scripts s
                 JOIN kickstart_data k ON k.id = s.kickstart_id
                 WHERE s.id = ? AND k.org_id = ?",
                (id, org_id),
                script_from_row,
            )
            .optional()
        })
    }

    pub fn save_script(&self, script: &mut Script) -> Result<()> {
        let profile_id = script
            .profile_id
            .ok_or(crate::KickstartError::Transient("profile"))?;
        self.with_conn("save_script", |conn| {
            save_script_row(conn, script, profile_id)
        })
    }

    pub fn remove_script(&self, script: &Script) -> Result<usize> {
        let Some(id) = script.id else {
            return Ok(0);
        };
        self.with_conn("remove_script", |conn| {
            conn.execute("DELETE FROM kickstart_scripts WHERE id = ?", [id])
        })
    }

    // ============================================================
    // IP range operations
    // ============================================================

    pub fn lookup_ranges_by_org(&self, org_id: i64) -> Result<Vec<IpRange>> {
        self.with_conn("lookup_ranges_by_org", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kickstart_id, org_id, min, max FROM kickstart_ip_ranges
                 WHERE org_id = ? ORDER BY min, max",
            )?;
            let rows = stmt.query_map([org_id], |row| {
                Ok(IpRange {
                    id: Some(row.get(0)?),
                    profile_id: row.get(1)?,
                    org_id: row.get(2)?,
                    min: ipv4_column(row, 3)?,
                    max: ipv4_column(row, 4)?,
                })
            })?;
            rows.collect()
        })
    }

    pub fn save_ip_range(&self, range: &mut IpRange) -> Result<()> {
        let min = i64::from(u32::from(range.min));
        let max = i64::from(u32::from(range.max));
        self.with_conn("save_ip_range", |conn| {
            match range.id {
                Some(id) => {
                    conn.execute(
                        "UPDATE kickstart_ip_ranges SET kickstart_id = ?, org_id = ?, min = ?, max = ?
                         WHERE id = ?",
                        (range.profile_id, range.org_id, min, max, id),
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO kickstart_ip_ranges (kickstart_id, org_id, min, max)
                         VALUES (?, ?, ?, ?)",
                        (range.profile_id, range.org_id, min, max),
                    )?;
                    range.id = Some(conn.last_insert_rowid());
                }
            }
            Ok(())
        })
    }
}
