//! Engine builder.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::runtime::config::EngineConfig;
use crate::runtime::env_config;
use crate::runtime::unhandled::RejectionSink;
use crate::runtime::Engine;

/// Builder for constructing an [`Engine`] with custom configuration.
#[derive(Clone, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    sink: Option<Arc<dyn RejectionSink>>,
}

impl EngineBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config, sink: None }
    }

    /// Start from defaults with `PLEDGE_*` environment overrides applied.
    ///
    /// Builder methods called afterwards take precedence over the
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = EngineConfig::default();
        env_config::apply_env_overrides(&mut config)?;
        Ok(Self::with_config(config))
    }

    /// Start from a TOML file, then apply `PLEDGE_*` environment overrides.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let parsed = env_config::parse_toml_file(path.as_ref())?;
        let mut config = EngineConfig::default();
        env_config::apply_toml_config(&mut config, &parsed);
        env_config::apply_env_overrides(&mut config)?;
        Ok(Self::with_config(config))
    }

    /// Set the number of jobs run per drain call (0 = unbounded).
    #[must_use]
    pub fn max_drain_batch(mut self, jobs: usize) -> Self {
        self.config.max_drain_batch = jobs;
        self
    }

    /// Enable or disable unhandled-rejection tracking.
    #[must_use]
    pub fn report_unhandled(mut self, enable: bool) -> Self {
        self.config.report_unhandled = enable;
        self
    }

    /// Enable or disable reporting of unhandled cancellations.
    #[must_use]
    pub fn report_cancellations(mut self, enable: bool) -> Self {
        self.config.report_cancellations = enable;
        self
    }

    /// Enable or disable panic-to-rejection conversion.
    #[must_use]
    pub fn catch_panics(mut self, enable: bool) -> Self {
        self.config.catch_panics = enable;
        self
    }

    /// Install an unhandled-rejection sink at construction.
    #[must_use]
    pub fn rejection_sink(mut self, sink: Arc<dyn RejectionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Preset with unhandled-rejection reporting switched off.
    #[must_use]
    pub fn quiet() -> Self {
        Self::new().report_unhandled(false)
    }

    /// Preset for test suites: panics unwind instead of becoming rejections,
    /// and cancellations are not reported as unhandled.
    #[must_use]
    pub fn strict() -> Self {
        Self::new().catch_panics(false).report_cancellations(false)
    }

    /// Returns the configuration built so far.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the engine.
    #[must_use]
    pub fn build(self) -> Engine {
        let mut config = self.config;
        config.normalize();
        let engine = Engine::with_config(config);
        if let Some(sink) = self.sink {
            engine.set_rejection_sink(sink);
        }
        engine
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
