//! Engine configuration types.
//!
//! These values drive drain and reporting behavior. In most cases use
//! [`EngineBuilder`](super::builder::EngineBuilder) rather than creating an
//! [`EngineConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `max_drain_batch` | 0 (unbounded) |
//! | `report_unhandled` | true |
//! | `report_cancellations` | true |
//! | `catch_panics` | true |

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Jobs executed per `run_until_idle` call before returning to the host
    /// (0 = drain until the queue is empty).
    pub max_drain_batch: usize,
    /// Track rejections that reach a cell with no registered reaction and
    /// report them after the queue drains.
    pub report_unhandled: bool,
    /// Report cancellation rejections as unhandled, too.
    pub report_cancellations: bool,
    /// Convert panics in handlers, executors, mappers and thenables into
    /// `ErrorKind::Panicked` rejections instead of unwinding into the host.
    pub catch_panics: bool,
}

impl EngineConfig {
    /// Normalize dependent settings.
    ///
    /// Cancellation reporting is a refinement of unhandled reporting and is
    /// switched off with it.
    pub fn normalize(&mut self) {
        if !self.report_unhandled {
            self.report_cancellations = false;
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_drain_batch: 0,
            report_unhandled: true,
            report_cancellations: true,
            catch_panics: true,
        }
    }
}
