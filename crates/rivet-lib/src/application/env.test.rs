use super::*;
use crate::primitives::{LogFormat, LogLevel};
use crate::recipe::PackageIdMode;

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_prefixed_variables_fill_overlay() {
    let env = EnvironmentConfig::from_vars(vars(&[
        ("RIVET_UPDATE", "true"),
        ("RIVET_JOBS", "4"),
        ("RIVET_BUILD_POLICY", "missing:zlib/*,cascade"),
        ("RIVET_DEFAULT_PACKAGE_ID_MODE", "patch"),
        ("RIVET_LOG_LEVEL", "trace"),
        ("RIVET_LOG_FORMAT", "json"),
        ("PATH", "/usr/bin"),
    ]))
    .unwrap();

    let overlay = env.overlay;
    assert_eq!(overlay.update, Some(true));
    assert_eq!(overlay.jobs, Some(4));
    assert_eq!(
        overlay.build_policy,
        Some(vec!["missing:zlib/*".to_string(), "cascade".to_string()])
    );
    assert_eq!(overlay.default_package_id_mode, Some(PackageIdMode::Patch));
    assert_eq!(overlay.log_level, Some(LogLevel::Trace));
    assert_eq!(overlay.log_format, Some(LogFormat::Json));
    assert_eq!(overlay.lockfile_strict, None);
}

#[test]
fn test_unparseable_variable_is_an_error() {
    let result = EnvironmentConfig::from_vars(vars(&[("RIVET_JOBS", "many")]));
    assert!(matches!(
        result,
        Err(ConfigError::EnvironmentParsingFailed { .. })
    ));
}

#[test]
fn test_no_color_disables_color_unless_explicit() {
    let env = EnvironmentConfig::from_vars(vars(&[("NO_COLOR", "1")])).unwrap();
    assert!(env.no_color);
    assert_eq!(env.into_overlay().color, Some(false));

    let explicit =
        EnvironmentConfig::from_vars(vars(&[("NO_COLOR", "1"), ("RIVET_COLOR", "true")])).unwrap();
    assert_eq!(explicit.into_overlay().color, Some(true));

    let empty = EnvironmentConfig::from_vars(vars(&[("NO_COLOR", "")])).unwrap();
    assert_eq!(empty.into_overlay().color, None);
}
