//! Configuration models for drawprobe.
//!
//! Every run parameter is fixed here at start-up; nothing is reconfigured
//! while a run is in progress.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for drawprobe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Draw endpoint and identity
    pub service: ServiceConfig,

    /// What to sample and how much
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Wire format of a draw response
    #[serde(default)]
    pub contract: ResponseContract,

    /// Where pool catalogs come from
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Report output
    #[serde(default)]
    pub output: OutputConfig,
}

/// Draw service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Endpoint address, e.g. "http://localhost:8080/wish/"
    pub base_url: String,

    /// Requesting user/session identifier. Supports ${ENV_VAR} expansion.
    pub user: String,

    /// Value of the `action` query parameter
    #[serde(default = "default_action")]
    pub action: String,

    /// Name of the query parameter carrying the batch size
    #[serde(default = "default_count_param")]
    pub count_param: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_action() -> String {
    "wish".to_string()
}

fn default_count_param() -> String {
    "value".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Sampling run parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Pool identifier (`type` query parameter, selects the catalog)
    #[serde(default = "default_pool")]
    pub pool: String,

    /// Target total number of outcomes
    #[serde(default = "default_total")]
    pub total: u64,

    /// Outcomes requested per call
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Back-to-back failed batches tolerated before the run gives up
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Pause between calls in milliseconds (0 = none)
    #[serde(default)]
    pub request_interval_ms: u64,
}

fn default_pool() -> String {
    "Starpath".to_string()
}

fn default_total() -> u64 {
    10_000
}

fn default_batch_size() -> u32 {
    10
}

fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            pool: default_pool(),
            total: default_total(),
            batch_size: default_batch_size(),
            max_consecutive_failures: default_max_consecutive_failures(),
            request_interval_ms: 0,
        }
    }
}

/// Layout of a successful draw response body.
///
/// A body is whitespace-separated tokens: `header_tokens` leading tokens,
/// then exactly one token per drawn outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseContract {
    /// Number of leading tokens to discard
    #[serde(default = "default_header_tokens")]
    pub header_tokens: usize,

    /// Index of the header token echoing the batch count, if the service echoes it
    #[serde(default = "default_count_field")]
    pub count_field: Option<usize>,

    /// First-token markers of an error body
    #[serde(default = "default_error_prefixes")]
    pub error_prefixes: Vec<String>,
}

fn default_header_tokens() -> usize {
    3
}

fn default_count_field() -> Option<usize> {
    Some(2)
}

fn default_error_prefixes() -> Vec<String> {
    vec!["/wish_error_text".to_string(), "/err_text_wish".to_string()]
}

impl Default for ResponseContract {
    fn default() -> Self {
        Self {
            header_tokens: default_header_tokens(),
            count_field: default_count_field(),
            error_prefixes: default_error_prefixes(),
        }
    }
}

/// Catalog source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog TOML file; the built-in catalog is used when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report path
    #[serde(default)]
    pub report: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Inline(source) => ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Inline)
    }

    /// Resolve the requesting user, expanding environment variables.
    pub fn resolve_user(&self) -> Result<String, ConfigError> {
        let raw = &self.service.user;
        let user = expand_env_vars(raw);
        if user.trim().is_empty() || has_unset_placeholder(raw) {
            return Err(ConfigError::MissingUser(raw.clone()));
        }
        Ok(user)
    }

    /// Check the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.service.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.service.base_url.clone(),
            reason: e.to_string(),
        })?;

        if self.service.timeout_secs == 0 {
            return Err(ConfigError::invalid("service.timeout_secs", "must be positive"));
        }
        if self.sampling.pool.trim().is_empty() {
            return Err(ConfigError::invalid("sampling.pool", "must not be empty"));
        }
        if self.sampling.total == 0 {
            return Err(ConfigError::invalid("sampling.total", "must be positive"));
        }
        if self.sampling.batch_size == 0 {
            return Err(ConfigError::invalid("sampling.batch_size", "must be positive"));
        }
        if self.sampling.max_consecutive_failures == 0 {
            return Err(ConfigError::invalid(
                "sampling.max_consecutive_failures",
                "must be positive",
            ));
        }
        if let Some(field) = self.contract.count_field
            && field >= self.contract.header_tokens
        {
            return Err(ConfigError::invalid(
                "contract.count_field",
                format!(
                    "index {field} is outside the {}-token header",
                    self.contract.header_tokens
                ),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let Some(re) = placeholder_regex() else {
        return s.to_string();
    };

    re.replace_all(s, |cap: &regex::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_else(|_| cap[0].to_string())
    })
    .into_owned()
}

/// True if `s` names a `${VAR}` whose variable is not set.
fn has_unset_placeholder(s: &str) -> bool {
    placeholder_regex().is_some_and(|re| {
        re.captures_iter(s)
            .any(|cap| std::env::var(&cap[1]).is_err())
    })
}

fn placeholder_regex() -> Option<regex::Regex> {
    regex::Regex::new(r"\$\{([^}]+)\}").ok()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse config: {0}")]
    Inline(toml::de::Error),

    #[error("Missing user: '{0}' resolved to nothing (set service.user or the referenced env var)")]
    MissingUser(String),

    #[error("Invalid base_url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[service]
base_url = "http://localhost:8080/wish/"
user = "test_user"
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.service.action, "wish");
        assert_eq!(config.service.count_param, "value");
        assert_eq!(config.service.timeout_secs, 30);
        assert_eq!(config.sampling.pool, "Starpath");
        assert_eq!(config.sampling.total, 10_000);
        assert_eq!(config.sampling.batch_size, 10);
        assert_eq!(config.sampling.max_consecutive_failures, 5);
        assert_eq!(config.contract, ResponseContract::default());
        assert!(config.catalog.path.is_none());
        assert!(config.output.report.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file_reports_path_on_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[service\nbase_url = 1").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_file_roundtrips_sections() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{MINIMAL}
[sampling]
pool = "valentine"
total = 500
batch_size = 1
request_interval_ms = 50

[contract]
header_tokens = 2
count_field = 1
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.sampling.pool, "valentine");
        assert_eq!(config.sampling.total, 500);
        assert_eq!(config.sampling.batch_size, 1);
        assert_eq!(config.sampling.request_interval_ms, 50);
        assert_eq!(config.contract.header_tokens, 2);
        assert_eq!(config.contract.count_field, Some(1));
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_batch_and_budget() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.sampling.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "sampling.batch_size",
                ..
            })
        ));

        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.sampling.max_consecutive_failures = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_count_field_outside_header() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.contract.header_tokens = 2;
        config.contract.count_field = Some(2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.service.base_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_resolve_user_expands_env() {
        // SAFETY: test-local variable name, not read concurrently elsewhere
        unsafe { std::env::set_var("DRAWPROBE_TEST_USER", "alice") };
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.service.user = "${DRAWPROBE_TEST_USER}".to_string();
        assert_eq!(config.resolve_user().unwrap(), "alice");

        config.service.user = "${DRAWPROBE_TEST_UNSET_VAR}".to_string();
        assert!(matches!(
            config.resolve_user(),
            Err(ConfigError::MissingUser(_))
        ));
    }

    #[test]
    fn test_resolve_user_keeps_literal_dollar_brace_from_env() {
        // SAFETY: test-local variable name, not read concurrently elsewhere
        unsafe { std::env::set_var("DRAWPROBE_TEST_TOKEN", "sess${abc}9") };
        let mut config = Config::from_toml(MINIMAL).unwrap();

        config.service.user = "${DRAWPROBE_TEST_TOKEN}".to_string();
        assert_eq!(config.resolve_user().unwrap(), "sess${abc}9");

        config.service.user = "tok${".to_string();
        assert_eq!(config.resolve_user().unwrap(), "tok${");

        config.service.user = "${DRAWPROBE_TEST_TOKEN}-${DRAWPROBE_TEST_TOKEN_UNSET}".to_string();
        assert!(matches!(
            config.resolve_user(),
            Err(ConfigError::MissingUser(_))
        ));
    }

    #[test]
    fn test_expand_env_vars_leaves_unknown_placeholders() {
        assert_eq!(
            expand_env_vars("user-${DRAWPROBE_TEST_NOT_SET}"),
            "user-${DRAWPROBE_TEST_NOT_SET}"
        );
        assert_eq!(expand_env_vars("plain"), "plain");
    }
}
