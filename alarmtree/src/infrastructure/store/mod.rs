//! SQLite-backed stores: the legacy detector hierarchy and the alarm
//! configuration database.

mod alarm_db;
mod hierarchy;

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Params, Row};
use tracing::trace;

use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::{InfraError, InfraResult};

pub use alarm_db::{AlarmDb, AlarmDbWriter};
pub use hierarchy::HierarchyDb;

/// Open an existing database file read-only.
fn open_read_only(path: &Path) -> InfraResult<Connection> {
    if !path.is_file() {
        return Err(InfraError::io(
            format!("open {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, "database file does not exist"),
        ));
    }
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| InfraError::sqlite(format!("open {}", path.display()), e))
}

/// Run `sql` and map every row, wrapping failures as row-source errors.
fn query_rows<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> DomainResult<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    trace!("query: {}", sql);
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|e| DomainError::source(format!("prepare {}", sql), e))?;
    let rows = stmt
        .query_map(params, map)
        .map_err(|e| DomainError::source(format!("query {}", sql), e))?;
    rows.collect::<rusqlite::Result<Vec<T>>>()
        .map_err(|e| DomainError::source(format!("read rows of {}", sql), e))
}

/// Render a loosely typed column (text or number) as text.
fn loose_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Read a flag column written either as an integer or as text
/// (`true`/`false`/`1`/`0`, any case). NULL and anything else is false.
fn loose_flag(value: Value) -> bool {
    match value {
        Value::Integer(i) => i != 0,
        Value::Real(r) => r != 0.0,
        Value::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        Value::Null | Value::Blob(_) => false,
    }
}
