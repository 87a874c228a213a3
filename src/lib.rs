//! drawprobe - empirical distribution sampling for remote draw services.
//!
//! ## Architecture
//!
//! - **Client**: issues one draw call per batch and parses the
//!   whitespace-token response against a versioned contract
//! - **Collector**: drives batches sequentially, skipping failed ones, until
//!   the target is reached, the failure budget runs out, or the caller cancels
//! - **Aggregator**: resolves raw outcome ids through a pool catalog and
//!   counts them per label
//! - **Report**: compares observed shares with the catalog's designed weights
//!
//! ## Failure model
//!
//! A single bad call never aborts a run. Transport failures, service
//! rejections and malformed responses are counted separately on the
//! `SampleRun`; unknown ids show up as `unknown(<id>)` labels.

pub mod client;
pub mod models;
pub mod pipeline;

// Re-exports for convenience
pub use client::{HttpRequester, ResponseParser, SampleRequester};
pub use models::{
    Config, Distribution, PoolCatalog, PoolDefinition, ProbeError, RawOutcome, Result, RunStatus,
    SampleRequestSpec, SampleRun,
};
pub use pipeline::{CancelFlag, CollectorOptions, FrequencyAggregator, SampleCollector, SampleReport};
