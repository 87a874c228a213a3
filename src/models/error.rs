//! Error types for drawprobe.
//!
//! Taxonomy:
//! - Run-fatal: configuration, catalog, IO (abort before or after sampling)
//! - Batch-local: transport and response failures (counted, logged, skipped)

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for drawprobe.
///
/// Only run-fatal conditions end up here. Batch failures are recorded on the
/// `SampleRun` and never abort a run.
#[derive(Debug, Error)]
pub enum ProbeError {
    // ═══════════════════════════════════════════════════════════════════
    // SETUP — rejected before the first request is issued
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] super::CatalogError),

    #[error("Unknown pool '{0}': not present in catalog")]
    UnknownPool(String),

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(#[source] reqwest::Error),

    // ═══════════════════════════════════════════════════════════════════
    // OUTPUT — failures writing the report
    // ═══════════════════════════════════════════════════════════════════

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ProbeError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A single draw call did not complete successfully at the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// A response arrived but does not satisfy the response contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("Service rejected draw: {reason}")]
    Rejected { reason: String },

    #[error("Response truncated: expected {expected_header} header tokens, found {found}")]
    Truncated { expected_header: usize, found: usize },

    #[error("Outcome count mismatch: expected {expected}, found {found}")]
    CountMismatch { expected: usize, found: usize },

    #[error("Header echoes count '{echoed}' but {expected} were requested")]
    EchoMismatch { echoed: String, expected: u32 },
}

/// Why a batch was skipped.
#[derive(Debug, Error)]
pub enum BatchFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

impl BatchFailure {
    /// Classify for accounting and logging.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Response(ResponseError::Rejected { .. }) => FailureKind::Rejected,
            Self::Response(_) => FailureKind::Malformed,
        }
    }
}

/// Failure classes kept apart in run accounting.
///
/// `Malformed` points at contract drift, `Transport` at unavailability,
/// `Rejected` at the service refusing the draw (bad pool, throttling, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transport,
    Rejected,
    Malformed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Rejected => write!(f, "rejected"),
            FailureKind::Malformed => write!(f, "malformed"),
        }
    }
}

/// Result type alias for drawprobe.
pub type Result<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_classification() {
        let timeout: BatchFailure = TransportError::Timeout(Duration::from_secs(1)).into();
        assert_eq!(timeout.kind(), FailureKind::Transport);

        let rejected: BatchFailure = ResponseError::Rejected {
            reason: "operation_frequent".to_string(),
        }
        .into();
        assert_eq!(rejected.kind(), FailureKind::Rejected);

        let short: BatchFailure = ResponseError::CountMismatch {
            expected: 10,
            found: 9,
        }
        .into();
        assert_eq!(short.kind(), FailureKind::Malformed);
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        let e = ResponseError::EchoMismatch {
            echoed: "1".to_string(),
            expected: 10,
        };
        assert_eq!(e.to_string(), "Header echoes count '1' but 10 were requested");
        assert_eq!(FailureKind::Malformed.to_string(), "malformed");
    }
}
