use super::*;

#[test]
fn test_default_filter_targets_rivet() {
    assert_eq!(default_filter(LogLevel::Debug), "warn,rivet=debug");
    assert_eq!(default_filter(LogLevel::Trace), "warn,rivet=trace");
}

#[test]
fn test_default_filter_quiet_levels_apply_everywhere() {
    assert_eq!(default_filter(LogLevel::Error), "error,rivet=error");
    assert_eq!(default_filter(LogLevel::Warning), "warn,rivet=warn");
}

#[test]
fn test_default_filter_is_valid_directive() {
    for level in [LogLevel::Error, LogLevel::Info, LogLevel::Trace] {
        assert!(EnvFilter::try_new(default_filter(level)).is_ok());
    }
}

#[test]
fn test_global_matches_initialized_state() {
    assert_eq!(Logger::is_initialized(), Logger::global().is_some());
}
