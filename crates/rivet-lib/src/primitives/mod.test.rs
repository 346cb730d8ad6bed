use super::*;

#[test]
fn test_log_level_from_verbosity() {
    assert_eq!(LogLevel::from_verbosity(0), LogLevel::Error);
    assert_eq!(LogLevel::from_verbosity(2), LogLevel::Info);
    assert_eq!(LogLevel::from_verbosity(9), LogLevel::Trace);
}

#[test]
fn test_log_level_should_log() {
    assert!(LogLevel::Error.should_log(LogLevel::Info));
    assert!(!LogLevel::Trace.should_log(LogLevel::Info));
}

#[test]
fn test_fromstr_accepts_aliases() {
    assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
    assert_eq!("VERBOSE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
    assert_eq!("yml".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    assert_eq!("stdout".parse::<LogOutput>().unwrap(), LogOutput::Stdout);
    assert_eq!("build".parse::<Context>().unwrap(), Context::Build);
}

#[test]
fn test_fromstr_rejects_unknown_values() {
    let err = "loud".parse::<LogLevel>().unwrap_err();
    match err {
        ConfigError::ParseError { value, reason } => {
            assert_eq!(value, "loud");
            assert_eq!(reason, "invalid log level");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_context_display() {
    assert_eq!(Context::Host.to_string(), "host");
    assert_eq!(Context::Build.to_string(), "build");
}

#[test]
fn test_log_level_try_from_string() {
    assert_eq!(LogLevel::try_from("debug".to_string()).unwrap(), LogLevel::Debug);
    assert!(matches!(
        LogLevel::try_from("loud".to_string()),
        Err(ConfigError::ParseError { .. })
    ));

    let level: LogLevel = serde_json::from_str("\"error\"").unwrap();
    assert_eq!(level, LogLevel::Error);
}
