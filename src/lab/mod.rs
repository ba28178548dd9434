//! Deterministic lab runtime for testing.
//!
//! The lab runtime provides:
//!
//! - Virtual time (no wall-clock dependencies)
//! - Timers with deterministic firing order
//! - `delay` and `timeout` producers built on those timers

pub mod runtime;
pub mod virtual_time_wheel;

pub use runtime::LabRuntime;
pub use virtual_time_wheel::{ExpiredTimer, TimerCallback, TimerHandle, VirtualTimerWheel};
