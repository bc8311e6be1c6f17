//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod derive;
pub mod error;
pub mod error_ext;
pub mod services;

pub use derive::{derive_legacy_attributes, nearest_of_kind, DETECTOR_KIND, SYSTEM_KIND};
pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::ResultExt;
