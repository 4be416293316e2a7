use rusqlite::{OptionalExtension, Row};

use super::Database;
use crate::error::Result;
use crate::models::*;

const KEY_SELECT: &str = "SELECT k.id, k.org_id, k.description, k.key, t.id, t.label, t.description
     FROM crypto_keys k
     JOIN crypto_key_types t ON t.id = k.key_type_id";

fn key_from_row(row: &Row) -> rusqlite::Result<CryptoKey> {
    Ok(CryptoKey {
        id: Some(row.get(0)?),
        org_id: row.get(1)?,
        description: row.get(2)?,
        key: row.get(3)?,
        key_type: CryptoKeyType {
            id: row.get(4)?,
            label: row.get(5)?,
            description: row.get(6)?,
        },
    })
}

impl Database {
    pub fn lookup_crypto_key(&self, description: &str, org_id: i64) -> Result<Option<CryptoKey>> {
        self.with_conn("lookup_crypto_key", |conn| {
            conn.query_row(
                &format!("{KEY_SELECT} WHERE k.description = ? AND k.org_id = ?"),
                (description, org_id),
                key_from_row,
            )
            .optional()
        })
    }

    pub fn lookup_crypto_keys(&self, org_id: i64) -> Result<Vec<CryptoKey>> {
        self.with_conn("lookup_crypto_keys", |conn| {
            let mut stmt = conn.prepare(&format!(
                "{KEY_SELECT} WHERE k.org_id = ? ORDER BY k.description"
            ))?;
            let rows = stmt.query_map([org_id], key_from_row)?;
            rows.collect()
        })
    }

    pub fn lookup_crypto_key_by_id(&self, id: i64, org_id: i64) -> Result<Option<CryptoKey>> {
        self.with_conn("lookup_crypto_key_by_id", |conn| {
            conn.query_row(
                &format!("{KEY_SELECT} WHERE k.id = ? AND k.org_id = ?"),
                (id, org_id),
                key_from_row,
            )
            .optional()
        })
    }

    pub fn save_crypto_key(&self, key: &mut CryptoKey) -> Result<()> {
        self.with_conn("save_crypto_key", |conn| {
            match key.id {
                Some(id) => {
                    conn.execute(
                        "UPDATE crypto_keys SET org_id = ?, key_type_id = ?, description = ?, key = ?
                         WHERE id = ?",
                        (key.org_id, key.key_type.id, &key.description, &key.key, id),
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO crypto_keys (org_id, key_type_id, description, key)
                         VALUES (?, ?, ?, ?)",
                        (key.org_id, key.key_type.id, &key.description, &key.key),
                    )?;
                    key.id = Some(conn.last_insert_rowid());
                }
            }
            Ok(())
        })
    }

    pub fn remove_crypto_key(&self, key: &CryptoKey) -> Result<usize> {
        let Some(id) = key.id else {
            return Ok(0);
        };
        self.with_conn("remove_crypto_key", |conn| {
            conn.execute("DELETE FROM crypto_keys WHERE id = ?", [id])
        })
    }
}
