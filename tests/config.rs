//! Engine configuration: builder, environment and TOML files.

#[macro_use]
mod common;

use common::*;
use parking_lot::Mutex;
use pledge::runtime::env_config::{
    ENV_CATCH_PANICS, ENV_MAX_DRAIN_BATCH, ENV_REPORT_CANCELLATIONS, ENV_REPORT_UNHANDLED,
};
use pledge::{ConfigError, EngineBuilder, EngineConfig, Value};

static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

fn clear_env() {
    for var in [
        ENV_MAX_DRAIN_BATCH,
        ENV_REPORT_UNHANDLED,
        ENV_REPORT_CANCELLATIONS,
        ENV_CATCH_PANICS,
    ] {
        std::env::remove_var(var);
    }
}

#[test]
fn env_overrides_defaults() {
    init_test_logging();
    test_phase!("env_overrides_defaults");
    let _guard = ENV_LOCK.lock();
    clear_env();
    std::env::set_var(ENV_MAX_DRAIN_BATCH, "2");
    std::env::set_var(ENV_CATCH_PANICS, "off");
    let builder = EngineBuilder::from_env().expect("valid env");
    clear_env();
    assert_eq!(builder.config().max_drain_batch, 2);
    assert!(!builder.config().catch_panics);
    assert!(builder.config().report_unhandled);
    test_complete!("env_overrides_defaults");
}

#[test]
fn invalid_env_value_is_reported() {
    init_test_logging();
    test_phase!("invalid_env_value_is_reported");
    let _guard = ENV_LOCK.lock();
    clear_env();
    std::env::set_var(ENV_REPORT_UNHANDLED, "sometimes");
    let err = EngineBuilder::from_env().expect_err("invalid bool");
    clear_env();
    assert!(matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == ENV_REPORT_UNHANDLED));
    test_complete!("invalid_env_value_is_reported");
}

#[test]
fn builder_methods_override_env() {
    init_test_logging();
    test_phase!("builder_methods_override_env");
    let _guard = ENV_LOCK.lock();
    clear_env();
    std::env::set_var(ENV_REPORT_CANCELLATIONS, "false");
    let builder = EngineBuilder::from_env()
        .expect("valid env")
        .report_cancellations(true);
    clear_env();
    assert!(builder.config().report_cancellations);
    test_complete!("builder_methods_override_env");
}

#[test]
fn drain_batch_limits_each_call() {
    init_test_logging();
    test_phase!("drain_batch_limits_each_call");
    let engine = EngineBuilder::with_config(EngineConfig {
        max_drain_batch: 1,
        ..EngineConfig::default()
    })
    .build();
    let p = engine.resolve(1).then(|_, v| Ok(v)).then(|_, v| Ok(v));
    assert_eq!(engine.run_until_idle(), 1);
    assert_pending!(p);
    assert_eq!(engine.run_until_idle(), 1);
    assert_fulfilled!(p, 1);
    assert_eq!(engine.run_until_idle(), 0);
    test_complete!("drain_batch_limits_each_call");
}

#[test]
fn presets() {
    init_test_logging();
    test_phase!("presets");
    let quiet = EngineBuilder::quiet();
    assert!(!quiet.config().report_unhandled);
    let strict = EngineBuilder::strict();
    assert!(!strict.config().catch_panics);
    assert!(!strict.config().report_cancellations);
    let engine = strict.build();
    let p = engine.resolve(Value::from("ok"));
    engine.run_until_idle();
    assert_fulfilled!(p, "ok");
    test_complete!("presets");
}

#[cfg(feature = "config-file")]
#[test]
fn toml_file_then_env() {
    use std::io::Write;

    init_test_logging();
    test_phase!("toml_file_then_env");
    let _guard = ENV_LOCK.lock();
    clear_env();
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[scheduler]\nmax_drain_batch = 64\n\n[reporting]\ncancellations = false"
    )
    .expect("write config");
    std::env::set_var(ENV_MAX_DRAIN_BATCH, "8");
    let builder = EngineBuilder::from_toml_file(file.path()).expect("valid config");
    clear_env();
    assert_eq!(builder.config().max_drain_batch, 8);
    assert!(!builder.config().report_cancellations);
    assert!(builder.config().report_unhandled);
    test_complete!("toml_file_then_env");
}

#[cfg(feature = "config-file")]
#[test]
fn toml_unknown_field_rejected() {
    init_test_logging();
    let _guard = ENV_LOCK.lock();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("pledge.toml");
    std::fs::write(&path, "[scheduler]\nworkers = 4\n").expect("write config");
    let err = EngineBuilder::from_toml_file(&path).expect_err("unknown field");
    assert!(matches!(err, ConfigError::Parse(_)));
}
