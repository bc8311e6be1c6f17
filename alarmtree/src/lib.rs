//! Alarm trees for the BEAST alarm system.
//!
//! Trees are built from a legacy detector hierarchy or an alarm configuration
//! database, compared with a coarse-grained differ, edited by deep-copy insert
//! and subtree removal, and written back as database rows or XML.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;
