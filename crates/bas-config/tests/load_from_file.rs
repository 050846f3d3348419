// SPDX-License-Identifier: MIT OR Apache-2.0
use bas_config::{ConfigError, RetentionPolicy, load_config, parse_toml, validate_config};
use std::io::Write;

#[test]
fn load_from_file_on_disk() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        f,
        r#"
[engine]
step_pacing_ms = 10
retention = {{ max_terminal_jobs = 3 }}

[mock]
success_rate = 1.0
max_latency_ms = 0
"#
    )
    .unwrap();
    let cfg = load_config(Some(f.path())).unwrap();
    assert_eq!(cfg.engine.retention, RetentionPolicy::MaxTerminalJobs(3));
    assert_eq!(cfg.mock.max_latency_ms, 0);
    assert!(validate_config(&cfg).is_ok());
}

#[test]
fn missing_file_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    match load_config(Some(&path)).unwrap_err() {
        ConfigError::FileNotFound { path: p } => assert!(p.ends_with("absent.toml")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn wrong_types_are_parse_errors() {
    let err = parse_toml("[mock]\nsuccess_rate = \"high\"").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn serialized_defaults_parse_back() {
    let cfg = bas_config::EngineConfig::default();
    let text = toml::to_string(&cfg).unwrap();
    assert_eq!(parse_toml(&text).unwrap(), cfg);
}
