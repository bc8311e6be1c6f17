//! Legacy detector hierarchy database.
//!
//! Only structure is stored here: `detector_hierarchy(id, parent_id, name,
//! type, chanid, mtime)`. Attributes are derived after the tree is built.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Row};
use tracing::{debug, instrument};

use super::{loose_text, open_read_only, query_rows};
use crate::domain::{DomainResult, RowSource, StructureRow};
use crate::infrastructure::{InfraError, InfraResult};

const COLUMNS: &str = "id, parent_id, name, type, chanid, mtime";

/// Row source over a legacy `detector_hierarchy` table.
pub struct HierarchyDb {
    conn: Connection,
    path: PathBuf,
}

impl HierarchyDb {
    /// Open an existing hierarchy file.
    #[instrument(level = "debug")]
    pub fn open(path: &Path) -> InfraResult<Self> {
        let conn = open_read_only(path)?;
        debug!("opened hierarchy {}", path.display());
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Wrap an already open connection (e.g. an in-memory database).
    pub fn from_connection(conn: Connection, path: impl Into<PathBuf>) -> Self {
        Self {
            conn,
            path: path.into(),
        }
    }

    /// Create the `detector_hierarchy` table if it does not exist.
    pub fn create_schema(&self) -> InfraResult<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS detector_hierarchy (
                    id INTEGER PRIMARY KEY,
                    parent_id INTEGER,
                    name TEXT NOT NULL,
                    type TEXT,
                    chanid INTEGER,
                    mtime TEXT
                );",
            )
            .map_err(|e| InfraError::sqlite("create detector_hierarchy", e))
    }

    /// Insert one hierarchy row.
    pub fn insert_row(&self, row: &StructureRow) -> InfraResult<()> {
        self.conn
            .execute(
                "INSERT INTO detector_hierarchy (id, parent_id, name, type, chanid, mtime)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    row.id,
                    row.parent_id,
                    row.name,
                    row.kind,
                    row.channel_id,
                    row.config_time
                ],
            )
            .map_err(|e| InfraError::sqlite(format!("insert hierarchy row {}", row.id), e))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn select(&self, filter: &str, params: impl rusqlite::Params) -> DomainResult<Vec<StructureRow>> {
        let sql = format!(
            "SELECT {} FROM detector_hierarchy WHERE {} ORDER BY id",
            COLUMNS, filter
        );
        query_rows(&self.conn, &sql, params, structure_row)
    }
}

fn structure_row(row: &Row<'_>) -> rusqlite::Result<StructureRow> {
    Ok(StructureRow {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        channel_id: row.get(4)?,
        config_time: loose_text(row.get(5)?),
    })
}

impl RowSource for HierarchyDb {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn roots(&self) -> DomainResult<Vec<StructureRow>> {
        self.select("parent_id IS NULL", [])
    }

    fn component(&self, id: i64) -> DomainResult<Vec<StructureRow>> {
        self.select("id = ?1", [id])
    }

    fn children(&self, parent_id: i64) -> DomainResult<Vec<StructureRow>> {
        self.select("parent_id = ?1", [parent_id])
    }
}
