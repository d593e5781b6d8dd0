//! Core building blocks shared by every GovWatch crate: the error type,
//! configuration, domain types and the lifecycle observer seam.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod types;

pub use error::{GovWatchError, Result};
