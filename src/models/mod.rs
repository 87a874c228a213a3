//! Core data models for drawprobe.
//!
//! - Configuration (fixed at run start)
//! - Pool catalogs (read-only, shared)
//! - Run accumulator and distribution
//! - Error taxonomy

mod catalog;
mod config;
mod error;
mod sample;

pub use catalog::*;
pub use config::*;
pub use error::*;
pub use sample::*;
