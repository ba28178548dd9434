//! Environment variable and config file support for [`EngineBuilder`](super::builder::EngineBuilder).
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods after loading
//! 2. **Environment variables**: values from `PLEDGE_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`EngineConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `PLEDGE_MAX_DRAIN_BATCH` | `usize` | `max_drain_batch` |
//! | `PLEDGE_REPORT_UNHANDLED` | `bool` | `report_unhandled` |
//! | `PLEDGE_REPORT_CANCELLATIONS` | `bool` | `report_cancellations` |
//! | `PLEDGE_CATCH_PANICS` | `bool` | `catch_panics` |

use crate::error::ConfigError;
use crate::runtime::config::EngineConfig;

/// Environment variable name for the drain batch limit.
pub const ENV_MAX_DRAIN_BATCH: &str = "PLEDGE_MAX_DRAIN_BATCH";
/// Environment variable name for unhandled-rejection tracking.
pub const ENV_REPORT_UNHANDLED: &str = "PLEDGE_REPORT_UNHANDLED";
/// Environment variable name for reporting unhandled cancellations.
pub const ENV_REPORT_CANCELLATIONS: &str = "PLEDGE_REPORT_CANCELLATIONS";
/// Environment variable name for panic conversion.
pub const ENV_CATCH_PANICS: &str = "PLEDGE_CATCH_PANICS";

/// Apply environment variable overrides to an [`EngineConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut EngineConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_MAX_DRAIN_BATCH) {
        config.max_drain_batch = parse_usize(ENV_MAX_DRAIN_BATCH, &val)?;
    }
    if let Some(val) = read_env(ENV_REPORT_UNHANDLED) {
        config.report_unhandled = parse_bool(ENV_REPORT_UNHANDLED, &val)?;
    }
    if let Some(val) = read_env(ENV_REPORT_CANCELLATIONS) {
        config.report_cancellations = parse_bool(ENV_REPORT_CANCELLATIONS, &val)?;
    }
    if let Some(val) = read_env(ENV_CATCH_PANICS) {
        config.catch_panics = parse_bool(ENV_CATCH_PANICS, &val)?;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var_name: &str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnv {
            var: var_name.to_string(),
            expected: "unsigned integer",
            value: val.to_string(),
        })
}

fn parse_bool(var_name: &str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var_name.to_string(),
            expected: "bool (true/false/1/0/yes/no/on/off)",
            value: val.to_string(),
        }),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable engine configuration.
///
/// ```toml
/// [scheduler]
/// max_drain_batch = 1024
/// catch_panics = true
///
/// [reporting]
/// unhandled = true
/// cancellations = false
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct EngineTomlConfig {
    /// Drain settings.
    #[serde(default)]
    pub scheduler: SchedulerToml,
    /// Unhandled-rejection settings.
    #[serde(default)]
    pub reporting: ReportingToml,
}

/// Scheduler section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct SchedulerToml {
    /// Jobs per drain call (0 = unbounded).
    pub max_drain_batch: Option<usize>,
    /// Convert handler panics into rejections.
    pub catch_panics: Option<bool>,
}

/// Reporting section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct ReportingToml {
    /// Track and report unhandled rejections.
    pub unhandled: Option<bool>,
    /// Report unhandled cancellations too.
    pub cancellations: Option<bool>,
}

/// Apply a parsed TOML config to an [`EngineConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut EngineConfig, toml: &EngineTomlConfig) {
    if let Some(v) = toml.scheduler.max_drain_batch {
        config.max_drain_batch = v;
    }
    if let Some(v) = toml.scheduler.catch_panics {
        config.catch_panics = v;
    }
    if let Some(v) = toml.reporting.unhandled {
        config.report_unhandled = v;
    }
    if let Some(v) = toml.reporting.cancellations {
        config.report_cancellations = v;
    }
}

/// Parse a TOML string into an [`EngineTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<EngineTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Read and parse a TOML file into an [`EngineTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<EngineTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================
