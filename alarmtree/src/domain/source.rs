//! Read interface the tree builder needs from a backing store.

use crate::domain::entities::{AlarmItem, AutomatedAction, PvRecord, StructureRow};
use crate::domain::error::DomainResult;

/// Store-agnostic access to component rows.
///
/// Each backing store supplies its own adapter. Detail lookups default to
/// "nothing stored", which is what a store without detail tables returns.
pub trait RowSource {
    /// Short label for log and error messages.
    fn describe(&self) -> String;

    /// Structure rows that have no parent.
    fn roots(&self) -> DomainResult<Vec<StructureRow>>;

    /// Every structure row carrying `id`; callers expect exactly one.
    fn component(&self, id: i64) -> DomainResult<Vec<StructureRow>>;

    /// Structure rows whose parent is `parent_id`.
    fn children(&self, parent_id: i64) -> DomainResult<Vec<StructureRow>>;

    fn guidance(&self, _id: i64) -> DomainResult<Vec<AlarmItem>> {
        Ok(Vec::new())
    }

    fn commands(&self, _id: i64) -> DomainResult<Vec<AlarmItem>> {
        Ok(Vec::new())
    }

    fn displays(&self, _id: i64) -> DomainResult<Vec<AlarmItem>> {
        Ok(Vec::new())
    }

    fn automated_actions(&self, _id: i64) -> DomainResult<Vec<AutomatedAction>> {
        Ok(Vec::new())
    }

    fn pv(&self, _id: i64) -> DomainResult<Option<PvRecord>> {
        Ok(None)
    }
}
