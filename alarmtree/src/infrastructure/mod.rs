//! Infrastructure layer: SQLite stores, XML output and DI container
//!
//! This layer implements I/O boundary traits and wires up services.

pub mod di;
pub mod error;
pub mod store;
pub mod traits;
pub mod xml;

pub use error::{InfraError, InfraResult};
