use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};

use super::{label_column, parse_datetime, placeholders, Database};
use crate::error::Result;
use crate::models::*;

const SESSION_COLUMNS: &str =
    "id, org_id, kickstart_id, action_id, server_id, state, created, modified";

fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: Some(row.get(0)?),
        org_id: row.get(1)?,
        profile_id: row.get(2)?,
        action_id: row.get(3)?,
        server_id: row.get(4)?,
        state: label_column(row, 5, SessionState::from_str)?,
        created: parse_datetime(row.get::<_, String>(6)?),
        modified: parse_datetime(row.get::<_, String>(7)?),
        history: Vec::new(),
    })
}

fn load_history(conn: &Connection, session_id: i64) -> rusqlite::Result<Vec<SessionHistory>> {
    let mut stmt = conn.prepare(
        "SELECT id, state, message, time FROM kickstart_session_history
         WHERE session_id = ? ORDER BY id",
    )?;
    let rows = stmt.query_map([session_id], |row| {
        Ok(SessionHistory {
            id: Some(row.get(0)?),
            state: label_column(row, 1, SessionState::from_str)?,
            message: row.get(2)?,
            time: parse_datetime(row.get::<_, String>(3)?),
        })
    })?;
    rows.collect()
}

fn query_sessions(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Session>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM kickstart_sessions WHERE {filter}
         ORDER BY created DESC, id DESC"
    ))?;
    let mut sessions = stmt
        .query_map(params, session_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for session in &mut sessions {
        if let Some(id) = session.id {
            session.history = load_history(conn, id)?;
        }
    }
    Ok(sessions)
}

fn append_history(
    conn: &Connection,
    session_id: i64,
    state: SessionState,
    message: Option<&str>,
    time: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO kickstart_session_history (session_id, state, message, time)
         VALUES (?, ?, ?, ?)",
        (session_id, state.as_str(), message, time),
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    // ============================================================
    // Session operations
    // ============================================================

    /// The most recent session for a server.
    pub fn lookup_session_by_server(&self, server_id: i64) -> Result<Option<Session>> {
        Ok(self
            .lookup_all_sessions_by_server(server_id)?
            .into_iter()
            .next())
    }

    /// Every session for a server, newest first.
    pub fn lookup_all_sessions_by_server(&self, server_id: i64) -> Result<Vec<Session>> {
        self.with_conn("lookup_all_sessions_by_server", |conn| {
            query_sessions(conn, "server_id = ?", [server_id])
        })
    }

    pub fn lookup_session_by_id(&self, id: i64) -> Result<Option<Session>> {
        self.with_conn("lookup_session_by_id", |conn| {
            Ok(query_sessions(conn, "id = ?", [id])?.into_iter().next())
        })
    }

    /// Insert or update a session and write any history entries queued on it.
    pub fn save_session(&self, session: &mut Session) -> Result<()> {
        session.modified = Utc::now();
        self.with_tx("save_session", |conn| {
            let id = match session.id {
                Some(id) => {
                    conn.execute(
                        "UPDATE kickstart_sessions SET org_id = ?, kickstart_id = ?, action_id = ?,
                            server_id = ?, state = ?, modified = ?
                         WHERE id = ?",
                        (
                            session.org_id,
                            session.profile_id,
                            session.action_id,
                            session.server_id,
                            session.state.as_str(),
                            session.modified.to_rfc3339(),
                            id,
                        ),
                    )?;
                    id
                }
                None => {
                    conn.execute(
                        "INSERT INTO kickstart_sessions (org_id, kickstart_id, action_id,
                            server_id, state, created, modified)
                         VALUES (?, ?, ?, ?, ?, ?, ?)",
                        (
                            session.org_id,
                            session.profile_id,
                            session.action_id,
                            session.server_id,
                            session.state.as_str(),
                            session.created.to_rfc3339(),
                            session.modified.to_rfc3339(),
                        ),
                    )?;
                    let id = conn.last_insert_rowid();
                    session.id = Some(id);
                    id
                }
            };

            for entry in &mut session.history {
                match entry.id {
                    Some(entry_id) => {
                        conn.execute(
                            "UPDATE kickstart_session_history SET state = ?, message = ?
                             WHERE id = ? AND session_id = ?",
                            (entry.state.as_str(), &entry.message, entry_id, id),
                        )?;
                    }
                    None => {
                        entry.id = Some(append_history(
                            conn,
                            id,
                            entry.state,
                            entry.message.as_deref(),
                            &entry.time.to_rfc3339(),
                        )?);
                    }
                }
            }
            Ok(())
        })
    }

    /// Fail every pending session tied to one of `action_ids` on one of `server_ids`.
    ///
    /// Each matching session moves to `failed` and loses its action. Existing
    /// `failed` history entries of the session are rewritten to the
    /// cancellation message, then a new `failed` entry with that message is
    /// appended. Returns the number of sessions failed.
    pub fn fail_kickstart_sessions(
        &self,
        action_ids: &HashSet<i64>,
        server_ids: &HashSet<i64>,
    ) -> Result<usize> {
        if action_ids.is_empty() || server_ids.is_empty() {
            return Ok(0);
        }

        self.with_tx("fail_kickstart_sessions", |conn| {
            let sql = format!(
                "SELECT id FROM kickstart_sessions
                 WHERE server_id IN ({}) AND action_id IN ({})
                   AND state NOT IN ('complete', 'failed')
                 ORDER BY id",
                placeholders(server_ids.len()),
                placeholders(action_ids.len()),
            );
            let params: Vec<&dyn rusqlite::ToSql> = server_ids
                .iter()
                .chain(action_ids.iter())
                .map(|id| id as &dyn rusqlite::ToSql)
                .collect();

            let pending = {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params.as_slice(), |row| row.get::<_, i64>(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            let failed = SessionState::Failed;
            let now = Utc::now().to_rfc3339();
            for session_id in &pending {
                tracing::debug!(
                    session = session_id,
                    "Failing kickstart associated with removed action"
                );
                conn.execute(
                    "UPDATE kickstart_sessions SET state = ?, action_id = NULL, modified = ?
                     WHERE id = ?",
                    (failed.as_str(), &now, session_id),
                )?;
                conn.execute(
                    "UPDATE kickstart_session_history SET message = ?
                     WHERE session_id = ? AND state = ?",
                    (KICKSTART_CANCELLED_MESSAGE, session_id, failed.as_str()),
                )?;
                append_history(
                    conn,
                    *session_id,
                    failed,
                    Some(KICKSTART_CANCELLED_MESSAGE),
                    &now,
                )?;
            }

            Ok(pending.len())
        })
    }

    // ============================================================
    // Guest install log operations
    // ============================================================

    pub fn add_guest_install_log(&self, session_id: i64, message: &str) -> Result<GuestInstallLog> {
        let now = Utc::now();
        self.with_conn("add_guest_install_log", |conn| {
            conn.execute(
                "INSERT INTO kickstart_guest_install_log (session_id, message, created)
                 VALUES (?, ?, ?)",
                (session_id, message, now.to_rfc3339()),
            )?;
            Ok(GuestInstallLog {
                id: conn.last_insert_rowid(),
                session_id,
                message: message.to_string(),
                created: now,
            })
        })
    }

    /// Log lines reported by a guest, oldest first.
    pub fn lookup_guest_install_log(&self, session_id: i64) -> Result<Vec<GuestInstallLog>> {
        self.with_conn("lookup_guest_install_log", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, message, created FROM kickstart_guest_install_log
                 WHERE session_id = ? ORDER BY id",
            )?;
            let rows = stmt.query_map([session_id], guest_log_from_row)?;
            rows.collect()
        })
    }

    pub fn lookup_latest_guest_install_log(
        &self,
        session_id: i64,
    ) -> Result<Option<GuestInstallLog>> {
        self.with_conn("lookup_latest_guest_install_log", |conn| {
            conn.query_row(
                "SELECT id, session_id, message, created FROM kickstart_guest_install_log
                 WHERE session_id = ? ORDER BY id DESC LIMIT 1",
                [session_id],
                guest_log_from_row,
            )
            .optional()
        })
    }
}

fn guest_log_from_row(row: &Row) -> rusqlite::Result<GuestInstallLog> {
    Ok(GuestInstallLog {
        id: row.get(0)?,
        session_id: row.get(1)?,
        message: row.get(2)?,
        created: parse_datetime(row.get::<_, String>(3)?),
    })
}
