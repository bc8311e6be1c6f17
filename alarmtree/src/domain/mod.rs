//! Domain layer: component tree, differ, mutator and builder
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod diff;
pub mod entities;
pub mod error;
pub mod source;

pub use arena::{
    AlarmTree, ComponentNode, ComponentRef, Subtree, TreeIterator, DEFAULT_NAME_SEPARATOR,
    DEFAULT_PATH_SEPARATOR,
};
pub use builder::{pv_invariant_violations, TreeBuilder};
pub use diff::{find_missing, find_new, ComponentMap, DiffMode, TreeDiff, TreeDiffer};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use source::RowSource;
