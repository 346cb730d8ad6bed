use super::*;
use crate::binary::PolicyDirective;

#[test]
fn test_defaults() {
    let config = RivetConfig::default();
    assert!(!config.update);
    assert!(!config.lockfile_strict);
    assert_eq!(config.default_package_id_mode, PackageIdMode::Semver);
    assert_eq!(config.log_level, LogLevel::Warning);
    assert!(config.build_policy().unwrap().directives().is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_overlay_only_touches_set_fields() {
    let base = RivetConfig {
        jobs: Some(8),
        ..RivetConfig::default()
    };
    let overlay = ConfigOverlay {
        lockfile_strict: Some(true),
        log_format: Some(LogFormat::Json),
        ..ConfigOverlay::default()
    };

    let merged = base.merge_with(overlay);
    assert!(merged.lockfile_strict);
    assert_eq!(merged.log_format, LogFormat::Json);
    assert_eq!(merged.jobs, Some(8));
    assert_eq!(merged.log_output, LogOutput::Stderr);
}

#[test]
fn test_overlay_from_toml() {
    let overlay = ConfigOverlay::from_toml_str(
        r#"
update = true
build_policy = ["missing", "cascade"]
default_package_id_mode = "minor"
log_level = "debug"
log_output = "stdout"
"#,
        "rivet.toml",
    )
    .unwrap();

    let config = RivetConfig::default().merge_with(overlay);
    assert!(config.update);
    assert_eq!(config.default_package_id_mode, PackageIdMode::Minor);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.log_output, LogOutput::Stdout);
    assert_eq!(
        config.build_policy().unwrap().directives(),
        &[PolicyDirective::Missing(None), PolicyDirective::Cascade]
    );
}

#[test]
fn test_overlay_rejects_bad_values() {
    let result = ConfigOverlay::from_toml_str("log_level = \"loud\"", "rivet.toml");
    assert!(matches!(result, Err(ConfigError::FileParseError { .. })));
}

#[test]
fn test_validation() {
    let zero_jobs = RivetConfig {
        jobs: Some(0),
        ..RivetConfig::default()
    };
    assert!(matches!(
        zero_jobs.validate(),
        Err(ConfigError::ValidationFailed { .. })
    ));

    let bad_policy = RivetConfig {
        build_policy: vec!["zlib/[*".to_string()],
        ..RivetConfig::default()
    };
    assert!(bad_policy.validate().is_err());
}

#[test]
fn test_logger_config_conversion() {
    let config = RivetConfig {
        log_level: LogLevel::Trace,
        log_format: LogFormat::Pretty,
        color: true,
        ..RivetConfig::default()
    };
    let logger = config.to_logger_config();
    assert_eq!(logger.level, LogLevel::Trace);
    assert_eq!(logger.format, LogFormat::Pretty);
    assert_eq!(logger.output, LogOutput::Stderr);
    assert!(logger.ansi);
}

#[test]
fn test_package_identifier_uses_configured_mode() {
    let config = RivetConfig {
        default_package_id_mode: PackageIdMode::Full,
        ..RivetConfig::default()
    };
    assert_eq!(config.package_identifier().default_mode(), PackageIdMode::Full);
}

#[test]
fn test_locked_resolution_follows_strict_flag() {
    let lockfile = Lockfile::new();
    assert!(!RivetConfig::default().locked_resolution(&lockfile).strict);

    let strict = RivetConfig {
        lockfile_strict: true,
        ..RivetConfig::default()
    };
    assert!(strict.locked_resolution(&lockfile).strict);
}

#[test]
fn test_build_executor_uses_configured_jobs() {
    let config = RivetConfig {
        jobs: Some(3),
        ..RivetConfig::default()
    };
    assert_eq!(config.build_executor().unwrap().jobs(), 3);
    assert!(RivetConfig::default().build_executor().unwrap().jobs() > 0);

    let zero = RivetConfig {
        jobs: Some(0),
        ..RivetConfig::default()
    };
    assert!(matches!(
        zero.build_executor(),
        Err(OrchestrationError::InvalidJobCount { count: 0 })
    ));
}
