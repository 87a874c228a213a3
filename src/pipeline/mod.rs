//! Sampling pipeline: collect → aggregate → report.

mod aggregate;
mod collector;
mod report;

pub use aggregate::*;
pub use collector::*;
pub use report::*;
