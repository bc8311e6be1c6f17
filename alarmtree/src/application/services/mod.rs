//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (RowSource, AlarmEntrySink)
//! but are themselves concrete structs, not traits.

mod tree_service;

pub use tree_service::{violation_count, AlarmTreeService, ChangeKind, DiffEntry, DiffReport};
