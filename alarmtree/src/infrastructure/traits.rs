//! I/O boundary traits for testability
//!
//! Reading goes through [`crate::domain::RowSource`]; writing goes through
//! the sink defined here, so services can be tested with in-memory stores.

use crate::application::ApplicationResult;
use crate::domain::Attributes;

/// Write interface of an alarm configuration store.
///
/// The store assigns ids; callers only pass back what they were given.
pub trait AlarmEntrySink {
    /// Create a structure row and return its store-assigned id.
    fn create_entry(
        &mut self,
        parent_id: Option<i64>,
        name: &str,
        config_time: Option<&str>,
    ) -> ApplicationResult<i64>;

    /// Store guidance, commands, displays, automated actions and the PV
    /// record of an entry created by [`create_entry`](Self::create_entry).
    fn write_attributes(&mut self, id: i64, attributes: &Attributes) -> ApplicationResult<()>;
}
