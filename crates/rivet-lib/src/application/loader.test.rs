use super::*;
use crate::primitives::{LogFormat, LogLevel};
use tempfile::TempDir;

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_load_without_files_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = RivetConfig::load_from(dir.path(), Vec::new()).unwrap();
    assert_eq!(config, RivetConfig::default());
}

#[test]
fn test_layer_precedence() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("rivet.toml"),
        "jobs = 2\nlog_level = \"info\"\nlog_format = \"pretty\"\nlockfile_strict = true\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join(".env"),
        "RIVET_LOG_LEVEL=debug\nRIVET_JOBS=6\n",
    )
    .unwrap();

    let config =
        RivetConfig::load_from(dir.path(), vars(&[("RIVET_JOBS", "12")])).unwrap();

    // file value survives where nothing overrides it
    assert!(config.lockfile_strict);
    assert_eq!(config.log_format, LogFormat::Pretty);
    // .env beats the file
    assert_eq!(config.log_level, LogLevel::Debug);
    // process environment beats .env
    assert_eq!(config.jobs, Some(12));
}

#[test]
fn test_invalid_file_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("rivet.toml"), "jobs = \"lots\"").unwrap();
    let result = RivetConfig::load_from(dir.path(), Vec::new());
    assert!(matches!(result, Err(ConfigError::FileParseError { .. })));
}

#[test]
fn test_loaded_config_is_validated() {
    let dir = TempDir::new().unwrap();
    let result = RivetConfig::load_from(dir.path(), vars(&[("RIVET_JOBS", "0")]));
    assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
}
