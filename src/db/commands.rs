use chrono::Utc;
use rusqlite::{Connection, Row};

use super::{parse_datetime, Database};
use crate::error::{KickstartError, Result};
use crate::models::*;

const COMMAND_SELECT: &str = "SELECT c.id, c.kickstart_id, c.arguments, c.created, c.modified,
        n.id, n.name, n.uses_arguments, n.required, n.advanced, n.sort_order
     FROM kickstart_commands c
     JOIN kickstart_command_names n ON n.id = c.command_name_id";

fn command_from_row(row: &Row) -> rusqlite::Result<Command> {
    Ok(Command {
        id: Some(row.get(0)?),
        profile_id: row.get(1)?,
        arguments: row.get(2)?,
        created: parse_datetime(row.get::<_, String>(3)?),
        modified: parse_datetime(row.get::<_, String>(4)?),
        command_name: CommandName {
            id: row.get(5)?,
            name: row.get(6)?,
            uses_arguments: row.get::<_, i32>(7)? != 0,
            required: row.get::<_, i32>(8)? != 0,
            advanced: row.get::<_, i32>(9)? != 0,
            sort_order: row.get(10)?,
        },
    })
}

pub(super) fn load_commands(conn: &Connection, profile_id: i64) -> rusqlite::Result<Vec<Command>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMAND_SELECT} WHERE c.kickstart_id = ? ORDER BY n.sort_order, c.id"
    ))?;
    let rows = stmt.query_map([profile_id], command_from_row)?;
    rows.collect()
}

pub(super) fn save_command_row(
    conn: &Connection,
    command: &mut Command,
    profile_id: i64,
) -> rusqlite::Result<()> {
    command.profile_id = Some(profile_id);
    command.modified = Utc::now();
    match command.id {
        Some(id) => {
            conn.execute(
                "UPDATE kickstart_commands SET kickstart_id = ?, command_name_id = ?,
                    arguments = ?, modified = ?
                 WHERE id = ?",
                (
                    profile_id,
                    command.command_name.id,
                    &command.arguments,
                    command.modified.to_rfc3339(),
                    id,
                ),
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO kickstart_commands (kickstart_id, command_name_id, arguments,
                    created, modified)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    profile_id,
                    command.command_name.id,
                    &command.arguments,
                    command.created.to_rfc3339(),
                    command.modified.to_rfc3339(),
                ),
            )?;
            command.id = Some(conn.last_insert_rowid());
        }
    }
    Ok(())
}

/// Drop directives the profile's release cannot handle.
fn supported_by(profile: &Profile, name: &CommandName) -> bool {
    match name.name.as_str() {
        CommandName::SELINUX => !profile.is_legacy_kickstart(),
        CommandName::LILOCHECK => profile.is_pre_rhel5_kickstart(),
        _ => true,
    }
}

impl Database {
    /// Every command name, ordered by sort order. Served from the reference cache.
    fn cached_command_names(&self) -> Result<Vec<CommandName>> {
        if let Some(names) = &self.cache.lock().expect("cache lock poisoned").command_names {
            return Ok(names.clone());
        }

        let names = self.with_conn("lookup_command_names", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, uses_arguments, required, advanced, sort_order
                 FROM kickstart_command_names ORDER BY sort_order, name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(CommandName {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    uses_arguments: row.get::<_, i32>(2)? != 0,
                    required: row.get::<_, i32>(3)? != 0,
                    advanced: row.get::<_, i32>(4)? != 0,
                    sort_order: row.get(5)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        self.cache.lock().expect("cache lock poisoned").command_names = Some(names.clone());
        Ok(names)
    }

    /// Advanced-option command names usable by a profile.
    pub fn lookup_command_names(&self, profile: &Profile) -> Result<Vec<CommandName>> {
        Ok(self
            .cached_command_names()?
            .into_iter()
            .filter(|name| name.advanced && supported_by(profile, name))
            .collect())
    }

    /// All command names usable by a profile.
    pub fn lookup_all_command_names(&self, profile: &Profile) -> Result<Vec<CommandName>> {
        Ok(self
            .cached_command_names()?
            .into_iter()
            .filter(|name| supported_by(profile, name))
            .collect())
    }

    pub fn lookup_command_name(&self, name: &str) -> Result<Option<CommandName>> {
        Ok(self
            .cached_command_names()?
            .into_iter()
            .find(|candidate| candidate.name == name))
    }

    /// Command names every profile must define.
    pub fn lookup_required_command_names(&self) -> Result<Vec<CommandName>> {
        Ok(self
            .cached_command_names()?
            .into_iter()
            .filter(|name| name.required)
            .collect())
    }

    /// Attach a new, unsaved command to a profile.
    ///
    /// Returns `None` if no command is registered under `name`. The command is
    /// written when the profile (or the command itself) is saved.
    pub fn create_command<'p>(
        &self,
        profile: &'p mut Profile,
        name: &str,
    ) -> Result<Option<&'p mut Command>> {
        let Some(command_name) = self.lookup_command_name(name)? else {
            return Ok(None);
        };

        let now = Utc::now();
        profile.commands.push(Command {
            id: None,
            profile_id: profile.id,
            command_name,
            arguments: None,
            created: now,
            modified: now,
        });
        Ok(profile.commands.last_mut())
    }

    pub fn save_command(&self, command: &mut Command) -> Result<()> {
        let profile_id = command
            .profile_id
            .ok_or(KickstartError::Transient("profile"))?;
        self.with_conn("save_command", |conn| {
            save_command_row(conn, command, profile_id)
        })
    }

    pub fn lookup_commands_by_profile(&self, profile_id: i64) -> Result<Vec<Command>> {
        self.with_conn("lookup_commands_by_profile", |conn| {
            load_commands(conn, profile_id)
        })
    }
}
