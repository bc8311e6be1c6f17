//! Alarm configuration database (BEAST-style RDB layout in SQLite).

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, instrument};

use super::{loose_flag, loose_text, open_read_only, query_rows};
use crate::application::{ApplicationResult, ResultExt};
use crate::domain::{
    AlarmItem, Attributes, AutomatedAction, DomainError, DomainResult, PvRecord, RowSource,
    StructureRow,
};
use crate::infrastructure::traits::AlarmEntrySink;
use crate::infrastructure::{InfraError, InfraResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ALARM_TREE (
    COMPONENT_ID INTEGER PRIMARY KEY AUTOINCREMENT,
    PARENT_CMPNT_ID INTEGER REFERENCES ALARM_TREE(COMPONENT_ID),
    NAME TEXT NOT NULL,
    CONFIG_TIME TEXT
);
CREATE TABLE IF NOT EXISTS GUIDANCE (
    COMPONENT_ID INTEGER NOT NULL REFERENCES ALARM_TREE(COMPONENT_ID),
    GUIDANCE_ORDER INTEGER NOT NULL,
    TITLE TEXT NOT NULL,
    DETAIL TEXT
);
CREATE TABLE IF NOT EXISTS COMMAND (
    COMPONENT_ID INTEGER NOT NULL REFERENCES ALARM_TREE(COMPONENT_ID),
    COMMAND_ORDER INTEGER NOT NULL,
    TITLE TEXT NOT NULL,
    DETAIL TEXT
);
CREATE TABLE IF NOT EXISTS DISPLAY (
    COMPONENT_ID INTEGER NOT NULL REFERENCES ALARM_TREE(COMPONENT_ID),
    DISPLAY_ORDER INTEGER NOT NULL,
    TITLE TEXT NOT NULL,
    DETAIL TEXT
);
CREATE TABLE IF NOT EXISTS AUTOMATED_ACTION (
    COMPONENT_ID INTEGER NOT NULL REFERENCES ALARM_TREE(COMPONENT_ID),
    AUTO_ACTION_ORDER INTEGER NOT NULL,
    TITLE TEXT NOT NULL,
    DETAIL TEXT,
    DELAY INTEGER
);
CREATE TABLE IF NOT EXISTS PV (
    COMPONENT_ID INTEGER PRIMARY KEY REFERENCES ALARM_TREE(COMPONENT_ID),
    DESCR TEXT,
    ENABLED_IND INTEGER,
    ANNUNCIATE_IND INTEGER,
    LATCH_IND INTEGER,
    DELAY INTEGER,
    FILTER TEXT,
    DELAY_COUNT INTEGER,
    ACT_GLOBAL_ALARM_IND INTEGER
);
";

/// Alarm configuration store: readable as a [`RowSource`], writable
/// through [`AlarmDbWriter`].
pub struct AlarmDb {
    conn: Connection,
    path: PathBuf,
}

impl AlarmDb {
    /// Open an existing alarm database read-only.
    #[instrument(level = "debug")]
    pub fn open(path: &Path) -> InfraResult<Self> {
        let conn = open_read_only(path)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open (creating if needed) an alarm database for writing and make
    /// sure its tables exist.
    #[instrument(level = "debug")]
    pub fn create(path: &Path) -> InfraResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| InfraError::sqlite(format!("open {}", path.display()), e))?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.create_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> InfraResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| InfraError::sqlite("open in-memory database", e))?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.create_schema()?;
        Ok(db)
    }

    /// Create all alarm tables if they do not exist.
    pub fn create_schema(&self) -> InfraResult<()> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(|e| InfraError::sqlite("create alarm schema", e))?;
        debug!("schema ready in {}", self.path.display());
        Ok(())
    }

    /// Start a write transaction. Nothing is stored until
    /// [`AlarmDbWriter::commit`].
    pub fn writer(&mut self) -> InfraResult<AlarmDbWriter<'_>> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| InfraError::sqlite("begin transaction", e))?;
        Ok(AlarmDbWriter { tx })
    }

    /// Number of rows in `ALARM_TREE`.
    pub fn component_count(&self) -> InfraResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM ALARM_TREE", [], |row| row.get(0))
            .map_err(|e| InfraError::sqlite("count components", e))
    }

    fn structure(&self, filter: &str, params: impl rusqlite::Params) -> DomainResult<Vec<StructureRow>> {
        let sql = format!(
            "SELECT COMPONENT_ID, PARENT_CMPNT_ID, NAME, CONFIG_TIME FROM ALARM_TREE \
             WHERE {} ORDER BY COMPONENT_ID",
            filter
        );
        query_rows(&self.conn, &sql, params, structure_row)
    }

    fn items(&self, table: &str, order_column: &str, id: i64) -> DomainResult<Vec<AlarmItem>> {
        let sql = format!(
            "SELECT TITLE, {order}, DETAIL FROM {table} WHERE COMPONENT_ID = ?1 ORDER BY {order}",
            order = order_column,
            table = table
        );
        query_rows(&self.conn, &sql, [id], |row| {
            Ok(AlarmItem {
                title: row.get(0)?,
                order: row.get(1)?,
                detail: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })
    }
}

fn structure_row(row: &Row<'_>) -> rusqlite::Result<StructureRow> {
    Ok(StructureRow {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
        kind: None,
        config_time: loose_text(row.get(3)?),
        channel_id: None,
    })
}

fn pv_record(row: &Row<'_>) -> rusqlite::Result<PvRecord> {
    let flag = |i: usize| -> rusqlite::Result<bool> { Ok(loose_flag(row.get(i)?)) };
    Ok(PvRecord {
        description: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
        enabled: flag(1)?,
        annunciating: flag(2)?,
        latching: flag(3)?,
        delay: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        filter: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        delay_count: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
        global_alarm: flag(7)?,
    })
}

impl RowSource for AlarmDb {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn roots(&self) -> DomainResult<Vec<StructureRow>> {
        self.structure("PARENT_CMPNT_ID IS NULL", [])
    }

    fn component(&self, id: i64) -> DomainResult<Vec<StructureRow>> {
        self.structure("COMPONENT_ID = ?1", [id])
    }

    fn children(&self, parent_id: i64) -> DomainResult<Vec<StructureRow>> {
        self.structure("PARENT_CMPNT_ID = ?1", [parent_id])
    }

    fn guidance(&self, id: i64) -> DomainResult<Vec<AlarmItem>> {
        self.items("GUIDANCE", "GUIDANCE_ORDER", id)
    }

    fn commands(&self, id: i64) -> DomainResult<Vec<AlarmItem>> {
        self.items("COMMAND", "COMMAND_ORDER", id)
    }

    fn displays(&self, id: i64) -> DomainResult<Vec<AlarmItem>> {
        self.items("DISPLAY", "DISPLAY_ORDER", id)
    }

    fn automated_actions(&self, id: i64) -> DomainResult<Vec<AutomatedAction>> {
        query_rows(
            &self.conn,
            "SELECT TITLE, AUTO_ACTION_ORDER, DETAIL, DELAY FROM AUTOMATED_ACTION \
             WHERE COMPONENT_ID = ?1 ORDER BY AUTO_ACTION_ORDER",
            [id],
            |row| {
                Ok(AutomatedAction {
                    title: row.get(0)?,
                    order: row.get(1)?,
                    detail: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    delay: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                })
            },
        )
    }

    fn pv(&self, id: i64) -> DomainResult<Option<PvRecord>> {
        self.conn
            .query_row(
                "SELECT DESCR, ENABLED_IND, ANNUNCIATE_IND, LATCH_IND, DELAY, FILTER, \
                 DELAY_COUNT, ACT_GLOBAL_ALARM_IND FROM PV WHERE COMPONENT_ID = ?1",
                [id],
                pv_record,
            )
            .optional()
            .map_err(|e| DomainError::source(format!("read PV of component {}", id), e))
    }
}

/// Open write transaction on an [`AlarmDb`].
pub struct AlarmDbWriter<'c> {
    tx: Transaction<'c>,
}

impl AlarmDbWriter<'_> {
    pub fn commit(self) -> InfraResult<()> {
        self.tx
            .commit()
            .map_err(|e| InfraError::sqlite("commit transaction", e))
    }

    fn insert_items(&self, table: &str, order_column: &str, id: i64, items: &[AlarmItem]) -> ApplicationResult<()> {
        let sql = format!(
            "INSERT INTO {} (COMPONENT_ID, {}, TITLE, DETAIL) VALUES (?1, ?2, ?3, ?4)",
            table, order_column
        );
        for item in items {
            self.tx
                .execute(&sql, params![id, item.order, item.title, item.detail])
                .with_context(|| format!("insert {} for component {}", table, id))?;
        }
        Ok(())
    }
}

impl AlarmEntrySink for AlarmDbWriter<'_> {
    fn create_entry(
        &mut self,
        parent_id: Option<i64>,
        name: &str,
        config_time: Option<&str>,
    ) -> ApplicationResult<i64> {
        let config_time = config_time
            .map(str::to_string)
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());
        self.tx
            .execute(
                "INSERT INTO ALARM_TREE (PARENT_CMPNT_ID, NAME, CONFIG_TIME) VALUES (?1, ?2, ?3)",
                params![parent_id, name, config_time],
            )
            .with_context(|| format!("insert component {}", name))?;
        Ok(self.tx.last_insert_rowid())
    }

    fn write_attributes(&mut self, id: i64, attributes: &Attributes) -> ApplicationResult<()> {
        self.insert_items("GUIDANCE", "GUIDANCE_ORDER", id, &attributes.guidance)?;
        self.insert_items("COMMAND", "COMMAND_ORDER", id, &attributes.commands)?;
        self.insert_items("DISPLAY", "DISPLAY_ORDER", id, &attributes.displays)?;

        for action in &attributes.automated_actions {
            self.tx
                .execute(
                    "INSERT INTO AUTOMATED_ACTION (COMPONENT_ID, AUTO_ACTION_ORDER, TITLE, DETAIL, DELAY) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, action.order, action.title, action.detail, action.delay],
                )
                .with_context(|| format!("insert AUTOMATED_ACTION for component {}", id))?;
        }

        if let Some(pv) = &attributes.pv {
            self.tx
                .execute(
                    "INSERT INTO PV (COMPONENT_ID, DESCR, ENABLED_IND, ANNUNCIATE_IND, LATCH_IND, \
                     DELAY, FILTER, DELAY_COUNT, ACT_GLOBAL_ALARM_IND) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        id,
                        pv.description,
                        pv.enabled,
                        pv.annunciating,
                        pv.latching,
                        pv.delay,
                        pv.filter,
                        pv.delay_count,
                        pv.global_alarm
                    ],
                )
                .with_context(|| format!("insert PV for component {}", id))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_assigns_ids_and_keeps_details() {
        let mut db = AlarmDb::open_in_memory().unwrap();
        let mut writer = db.writer().unwrap();

        let root = writer.create_entry(None, "BCAL", None).unwrap();
        let leaf = writer.create_entry(Some(root), "BCAL:hv:ch1:alarm", Some("2014-08-10")).unwrap();
        assert_ne!(root, leaf);
        assert!(root > 0);

        let attributes = Attributes {
            guidance: vec![AlarmItem::new("Guidance", 0, "call the expert")],
            automated_actions: vec![AutomatedAction {
                title: "mail".into(),
                order: 1,
                detail: "mailto:shift".into(),
                delay: 30,
            }],
            pv: Some(PvRecord {
                description: "Voltage alarm".into(),
                enabled: true,
                latching: true,
                delay: 2,
                ..Default::default()
            }),
            ..Default::default()
        };
        writer.write_attributes(leaf, &attributes).unwrap();
        writer.commit().unwrap();

        assert_eq!(db.component_count().unwrap(), 2);
        assert_eq!(db.roots().unwrap()[0].name, "BCAL");
        assert_eq!(db.guidance(leaf).unwrap(), attributes.guidance);
        assert_eq!(db.automated_actions(leaf).unwrap(), attributes.automated_actions);
        assert_eq!(db.pv(leaf).unwrap(), attributes.pv);
        assert_eq!(db.pv(root).unwrap(), None);
        assert_eq!(
            db.component(leaf).unwrap()[0].config_time.as_deref(),
            Some("2014-08-10")
        );
    }

    #[test]
    fn test_pv_flags_written_as_text_are_read() {
        let mut db = AlarmDb::open_in_memory().unwrap();
        let mut writer = db.writer().unwrap();
        let id = writer.create_entry(None, "BCAL:hv:ch1:alarm", None).unwrap();
        writer.commit().unwrap();
        db.conn
            .execute(
                "INSERT INTO PV VALUES (?1, 'Voltage alarm', 1, 'true', 'true', 2, '', 0, 'false')",
                [id],
            )
            .unwrap();

        let pv = db.pv(id).unwrap().unwrap();

        assert_eq!(
            pv,
            PvRecord {
                description: "Voltage alarm".into(),
                enabled: true,
                annunciating: true,
                latching: true,
                delay: 2,
                delay_count: 0,
                filter: String::new(),
                global_alarm: false,
            }
        );
    }

    #[test]
    fn test_dropped_writer_rolls_back() {
        let mut db = AlarmDb::open_in_memory().unwrap();
        {
            let mut writer = db.writer().unwrap();
            writer.create_entry(None, "BCAL", None).unwrap();
        }
        assert_eq!(db.component_count().unwrap(), 0);
    }
}
