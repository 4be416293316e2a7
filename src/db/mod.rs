//! Kickstart repository backed by SQLite.
//!
//! [`Database`] is built once at startup, migrated, and then cloned into
//! whoever needs it. Operations are grouped by entity in the submodules; each
//! one takes the connection lock for its whole duration, and operations that
//! touch several rows run inside a transaction.

mod channels;
mod commands;
mod crypto;
mod profiles;
mod reference;
mod schema;
mod sessions;
mod trees;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::error::{KickstartError, Result};
use crate::models::{CommandName, InstallType, VirtualizationType};

pub use reference::ReferenceData;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
    cache: Arc<Mutex<ReferenceCache>>,
}

/// Query results for tables that only change through migrations.
#[derive(Default)]
struct ReferenceCache {
    command_names: Option<Vec<CommandName>>,
    install_types: Option<Vec<InstallType>>,
    virtualization_types: Option<Vec<VirtualizationType>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| KickstartError::not_found("database parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path).map_err(|e| KickstartError::data_access("open", e))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| KickstartError::data_access("open", e))?;
        Self::from_connection(conn)
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| KickstartError::data_access("open", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| KickstartError::data_access("open", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cache: Arc::new(Mutex::new(ReferenceCache::default())),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn).map_err(|e| KickstartError::Migration(format!("{e:#}")))
    }

    /// Run `f` against the connection, translating store failures.
    fn with_conn<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let conn = self.conn.lock().expect("database lock poisoned");
        f(&conn).map_err(|e| KickstartError::data_access(op, e))
    }

    /// Like [`Database::with_conn`], but commits only if `f` succeeds.
    fn with_tx<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn
            .transaction()
            .map_err(|e| KickstartError::data_access(op, e))?;
        let out = f(&tx).map_err(|e| KickstartError::data_access(op, e))?;
        tx.commit()
            .map_err(|e| KickstartError::data_access(op, e))?;
        Ok(out)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            cache: self.cache.clone(),
        }
    }
}

/// Location of the database when none is configured.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "kickstart-store")
        .ok_or_else(|| KickstartError::not_found("data directory"))?;
    Ok(dirs.data_dir().join("kickstart.db"))
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Decode a text label column, failing the row when `parse` does not know it.
fn label_column<T>(
    row: &Row,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let label: String = row.get(idx)?;
    parse(&label).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown label {label:?}").into(),
        )
    })
}

/// Decode an IPv4 address stored as its integer value.
fn ipv4_column(row: &Row, idx: usize) -> rusqlite::Result<Ipv4Addr> {
    let value: i64 = row.get(idx)?;
    u32::try_from(value)
        .map(Ipv4Addr::from)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

/// `?, ?, ?` for an `IN (...)` list of `n` parameters.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_match_parameter_count() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn unknown_labels_fail_the_row() {
        let conn = Connection::open_in_memory().unwrap();

        let known = conn.query_row("SELECT 'failed'", [], |row| {
            label_column(row, 0, crate::models::SessionState::from_str)
        });
        let unknown = conn.query_row("SELECT 'exploded'", [], |row| {
            label_column(row, 0, crate::models::SessionState::from_str)
        });

        assert_eq!(known.unwrap(), crate::models::SessionState::Failed);
        assert!(matches!(
            unknown,
            Err(rusqlite::Error::FromSqlConversionFailure(0, Type::Text, _))
        ));
    }

    #[test]
    fn ipv4_columns_reject_out_of_range_values() {
        let conn = Connection::open_in_memory().unwrap();

        let addr = conn.query_row("SELECT 3232235521", [], |row| ipv4_column(row, 0));
        let too_big = conn.query_row("SELECT 4294967296", [], |row| ipv4_column(row, 0));
        let negative = conn.query_row("SELECT -1", [], |row| ipv4_column(row, 0));

        assert_eq!(addr.unwrap(), Ipv4Addr::new(192, 168, 0, 1));
        assert!(matches!(
            too_big,
            Err(rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, _))
        ));
        assert!(negative.is_err());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kickstart.db");

        let db = Database::open(path.clone()).unwrap();
        db.migrate().unwrap();

        assert!(path.exists());
    }
}
