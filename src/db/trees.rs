use rusqlite::{Connection, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::*;

const TREE_SELECT: &str = "SELECT t.id, t.label, t.base_path, t.boot_image, t.org_id, t.channel_id,
        t.created, t.modified, it.id, it.label, it.name, tt.id, tt.label, tt.name
     FROM kickstart_trees t
     JOIN kickstart_install_types it ON it.id = t.install_type_id
     JOIN kickstart_tree_types tt ON tt.id = t.tree_type_id";

fn tree_from_row(row: &Row) -> rusqlite::Result<Tree> {
    Ok(Tree {
        id: Some(row.get(0)?),
        label: row.get(1)?,
        base_path: row.get(2)?,
        boot_image: row.get(3)?,
        org_id: row.get(4)?,
        channel_id: row.get(5)?,
        created: parse_datetime(row.get::<_, String>(6)?),
        modified: parse_datetime(row.get::<_, String>(7)?),
        install_type: InstallType {
            id: row.get(8)?,
            label: row.get(9)?,
            name: row.get(10)?,
        },
        tree_type: TreeType {
            id: row.get(11)?,
            label: row.get(12)?,
            name: row.get(13)?,
        },
    })
}

fn query_trees(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Tree>> {
    let mut stmt = conn.prepare(&format!("{TREE_SELECT} WHERE {filter} ORDER BY t.label"))?;
    let rows = stmt.query_map(params, tree_from_row)?;
    rows.collect()
}

fn query_tree(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Option<Tree>> {
    conn.query_row(&format!("{TREE_SELECT} WHERE {filter}"), params, tree_from_row)
        .optional()
}

impl Database {
    /// Find a tree by label for an org.
    ///
    /// An org-owned tree wins; otherwise a system-owned tree with the same
    /// label is returned.
    pub fn lookup_tree_by_label(&self, label: &str, org_id: i64) -> Result<Option<Tree>> {
        self.with_conn("lookup_tree_by_label", |conn| {
            if let Some(tree) = query_tree(conn, "t.label = ? AND t.org_id = ?", (label, org_id))? {
                return Ok(Some(tree));
            }
            query_tree(conn, "t.label = ? AND t.org_id IS NULL", [label])
        })
    }

    /// Trees of a channel owned by the org itself.
    pub fn lookup_trees_by_channel_and_org(
        &self,
        channel_id: i64,
        org_id: i64,
    ) -> Result<Vec<Tree>> {
        self.with_conn("lookup_trees_by_channel_and_org", |conn| {
            query_trees(
                conn,
                "t.channel_id = ? AND t.org_id = ?",
                (channel_id, org_id),
            )
        })
    }

    /// Trees of a channel usable by the org: its own plus system-owned ones.
    pub fn lookup_kickstartable_trees(&self, channel_id: i64, org_id: i64) -> Result<Vec<Tree>> {
        self.with_conn("lookup_kickstartable_trees", |conn| {
            query_trees(
                conn,
                "t.channel_id = ? AND (t.org_id = ? OR t.org_id IS NULL)",
                (channel_id, org_id),
            )
        })
    }

    pub fn lookup_trees_by_org(&self, org_id: i64) -> Result<Vec<Tree>> {
        self.with_conn("lookup_trees_by_org", |conn| {
            query_trees(conn, "t.org_id = ? OR t.org_id IS NULL", [org_id])
        })
    }

    pub fn lookup_tree_by_id_and_org(&self, tree_id: i64, org_id: i64) -> Result<Option<Tree>> {
        self.with_conn("lookup_tree_by_id_and_org", |conn| {
            query_tree(
                conn,
                "t.id = ? AND (t.org_id = ? OR t.org_id IS NULL)",
                (tree_id, org_id),
            )
        })
    }

    /// Whether `tree_id` is a tree of `channel_id` usable by the org.
    pub fn verify_tree_assignment(
        &self,
        channel_id: i64,
        org_id: i64,
        tree_id: i64,
    ) -> Result<bool> {
        self.with_conn("verify_tree_assignment", |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM kickstart_trees
                 WHERE id = ? AND channel_id = ? AND (org_id = ? OR org_id IS NULL)",
                (tree_id, channel_id, org_id),
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Load a tree by id, hiding it when its channel belongs to another org.
    pub fn find_tree_by_id(&self, tree_id: i64, org_id: i64) -> Result<Option<Tree>> {
        self.with_conn("find_tree_by_id", |conn| {
            query_tree(
                conn,
                "t.id = ? AND EXISTS (
                    SELECT 1 FROM channels c
                    WHERE c.id = t.channel_id AND (c.org_id IS NULL OR c.org_id = ?))",
                (tree_id, org_id),
            )
        })
    }

    /// Insert a transient tree or update a persisted one.
    pub fn save_tree(&self, tree: &mut Tree) -> Result<()> {
        tree.modified = chrono::Utc::now();
        self.with_conn("save_tree", |conn| {
            match tree.id {
                Some(id) => {
                    conn.execute(
                        "UPDATE kickstart_trees SET label = ?, base_path = ?, boot_image = ?,
                            org_id = ?, channel_id = ?, install_type_id = ?, tree_type_id = ?,
                            modified = ?
                         WHERE id = ?",
                        (
                            &tree.label,
                            &tree.base_path,
                            &tree.boot_image,
                            tree.org_id,
                            tree.channel_id,
                            tree.install_type.id,
                            tree.tree_type.id,
                            tree.modified.to_rfc3339(),
                            id,
                        ),
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO kickstart_trees (label, base_path, boot_image, org_id,
                            channel_id, install_type_id, tree_type_id, created, modified)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                        (
                            &tree.label,
                            &tree.base_path,
                            &tree.boot_image,
                            tree.org_id,
                            tree.channel_id,
                            tree.install_type.id,
                            tree.tree_type.id,
                            tree.created.to_rfc3339(),
                            tree.modified.to_rfc3339(),
                        ),
                    )?;
                    tree.id = Some(conn.last_insert_rowid());
                }
            }
            Ok(())
        })?;
        tracing::debug!(tree = %tree.label, id = ?tree.id, "saved kickstart tree");
        Ok(())
    }

    /// Delete a tree, returning the number of rows removed.
    ///
    /// Fails while profiles still reference the tree.
    pub fn remove_tree(&self, tree: &Tree) -> Result<usize> {
        let Some(id) = tree.id else {
            return Ok(0);
        };
        self.with_conn("remove_tree", |conn| {
            conn.execute("DELETE FROM kickstart_trees WHERE id = ?", [id])
        })
    }
}
