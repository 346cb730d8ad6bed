use super::*;

fn v(text: &str) -> Version {
    Version::parse(text).unwrap()
}

fn range(text: &str) -> VersionRange {
    VersionRange::parse(text).unwrap()
}

// ============================================================================
// Version parsing and ordering
// ============================================================================

#[test]
fn test_parse_simple_version() {
    let version = v("1.2.3");
    assert_eq!(version.as_str(), "1.2.3");
    assert_eq!(version.major(), Some(1));
    assert_eq!(version.numeric(1), Some(2));
    assert!(!version.is_prerelease());
}

#[test]
fn test_parse_rejects_garbage() {
    assert!(Version::parse("").is_err());
    assert!(Version::parse("1..2").is_err());
    assert!(Version::parse("1.2 3").is_err());
    assert!(Version::parse("1.0-").is_err());
}

#[test]
fn test_trailing_zeros_compare_equal() {
    assert_eq!(v("1.2"), v("1.2.0"));
    assert_eq!(v("1"), v("1.0.0.0"));
    assert!(v("1.2.1") > v("1.2"));
}

#[test]
fn test_numeric_components_compare_numerically() {
    assert!(v("1.10") > v("1.9"));
    assert!(v("2.0") > v("1.99.99"));
    assert!(v("1.2.3.4") > v("1.2.3"));
}

#[test]
fn test_prerelease_sorts_before_release() {
    assert!(v("1.0-alpha") < v("1.0"));
    assert!(v("1.0-alpha") < v("1.0-beta"));
    assert!(v("1.0-rc.2") < v("1.0-rc.10"));
}

#[test]
fn test_bump_and_masked() {
    assert_eq!(v("1.2.3").bump(1), Some(v("1.3")));
    assert_eq!(v("1.2.3").bump(0), Some(v("2")));
    assert_eq!(v("1").bump(2), Some(v("1.0.1")));
    assert_eq!(v("18446744073709551615").bump(0), None);
    assert_eq!(v("1.2.3").masked(2, 3), "1.2.Z");
    assert_eq!(v("1.2.3").masked(1, 3), "1.Y.Z");
    assert_eq!(v("1.2").masked(3, 3), "1.2.0");
}

// ============================================================================
// Range matching
// ============================================================================

#[test]
fn test_range_bounds() {
    let r = range(">=1.0 <2.0");
    assert!(r.contains(&v("1.0")));
    assert!(r.contains(&v("1.5")));
    assert!(!r.contains(&v("2.0")));
    assert!(!r.contains(&v("0.9")));
}

#[test]
fn test_range_alternatives() {
    let r = range("<1.0 || >=3.0");
    assert!(r.contains(&v("0.5")));
    assert!(r.contains(&v("3.1")));
    assert!(!r.contains(&v("2.0")));
}

#[test]
fn test_tilde_and_caret() {
    let tilde = range("~1.2.3");
    assert!(tilde.contains(&v("1.2.9")));
    assert!(!tilde.contains(&v("1.3.0")));

    let caret = range("^1.2");
    assert!(caret.contains(&v("1.9")));
    assert!(!caret.contains(&v("2.0")));

    let zero_caret = range("^0.2.1");
    assert!(zero_caret.contains(&v("0.2.5")));
    assert!(!zero_caret.contains(&v("0.3.0")));
}

#[test]
fn test_tilde_and_caret_reject_overflowing_bounds() {
    for text in ["~18446744073709551615", "^18446744073709551615", "~1.18446744073709551615.0"] {
        assert!(
            matches!(
                VersionRange::parse(text),
                Err(ReferenceError::InvalidRange { .. })
            ),
            "{} should be rejected",
            text
        );
    }
    assert!(VersionRange::parse("~18446744073709551614").is_ok());
}

#[test]
fn test_exact_and_wildcard() {
    assert!(range("1.2").contains(&v("1.2.0")));
    assert!(!range("1.2").contains(&v("1.2.1")));
    assert!(range("*").contains(&v("42")));
    assert!(VersionRange::any().contains(&v("0.0.1")));
}

#[test]
fn test_prereleases_excluded_unless_requested() {
    assert!(!range(">=1.0").contains(&v("2.0-beta")));
    assert!(range(">=1.0, include_prerelease").contains(&v("2.0-beta")));
    assert!(range(">=2.0-alpha").contains(&v("2.0-beta")));
}

#[test]
fn test_unknown_range_option_rejected() {
    let err = VersionRange::parse(">=1.0, loose").unwrap_err();
    assert!(err.to_string().contains("loose"));
}

#[test]
fn test_range_display_uses_brackets() {
    assert_eq!(range(">=1.0 <2.0").to_string(), "[>=1.0 <2.0]");
}
