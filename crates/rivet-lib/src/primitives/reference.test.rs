use super::*;

#[test]
fn test_parse_full_reference() {
    let r = PackageReference::parse("zlib/1.3@acme/stable#abc123%1700000000").unwrap();
    assert_eq!(r.name, "zlib");
    assert_eq!(r.version.as_str(), "1.3");
    assert_eq!(r.user.as_deref(), Some("acme"));
    assert_eq!(r.channel.as_deref(), Some("stable"));
    assert_eq!(r.revision.as_deref(), Some("abc123"));
    assert_eq!(r.timestamp, Some(1_700_000_000));
    assert!(r.is_resolved());
}

#[test]
fn test_display_omits_timestamp_but_full_repr_keeps_it() {
    let r = PackageReference::parse("zlib/1.3#abc%42").unwrap();
    assert_eq!(r.to_string(), "zlib/1.3#abc");
    assert_eq!(r.full_repr(), "zlib/1.3#abc%42");
    assert_eq!(r.recipe_repr(), "zlib/1.3");
}

#[test]
fn test_parse_rejects_malformed_references() {
    assert!(PackageReference::parse("zlib").is_err());
    assert!(PackageReference::parse("Zlib/1.0").is_err());
    assert!(PackageReference::parse("zlib/1.0#").is_err());
    assert!(PackageReference::parse("zlib/1.0#abc%soon").is_err());
    assert!(PackageReference::parse("zlib/1.0@").is_err());
}

#[test]
fn test_equality_ignores_revision_unless_both_have_one() {
    let plain = PackageReference::parse("fmt/10.1").unwrap();
    let rev_a = PackageReference::parse("fmt/10.1#aaa").unwrap();
    let rev_b = PackageReference::parse("fmt/10.1#bbb").unwrap();

    assert_eq!(plain, rev_a);
    assert_eq!(plain, rev_b);
    assert_ne!(rev_a, rev_b);
    assert_ne!(plain, PackageReference::parse("fmt/10.2").unwrap());
}

#[test]
fn test_expression_variants() {
    match RefExpression::parse("liba/[>=1.0 <2.0]").unwrap() {
        RefExpression::Range { name, range, .. } => {
            assert_eq!(name, "liba");
            assert_eq!(range.as_str(), ">=1.0 <2.0");
        }
        other => panic!("expected range, got {:?}", other),
    }

    match RefExpression::parse("liba/(latest)@team").unwrap() {
        RefExpression::Alias { alias, user, .. } => {
            assert_eq!(alias, "latest");
            assert_eq!(user.as_deref(), Some("team"));
        }
        other => panic!("expected alias, got {:?}", other),
    }

    assert!(matches!(
        RefExpression::parse("liba/1.2#r1").unwrap(),
        RefExpression::Exact(_)
    ));
}

#[test]
fn test_range_cannot_pin_revision() {
    assert!(RefExpression::parse("liba/[>=1.0]#abc").is_err());
    assert!(RefExpression::parse("liba/[>=1.0").is_err());
    assert!(RefExpression::parse("liba/()").is_err());
}

#[test]
fn test_accepts_fixed_reference() {
    let fixed = PackageReference::parse("liba/1.5#r1").unwrap();

    assert!(RefExpression::parse("liba/[>=1.0 <2.0]").unwrap().accepts(&fixed));
    assert!(!RefExpression::parse("liba/[>=2.0]").unwrap().accepts(&fixed));
    assert!(RefExpression::parse("liba/1.5").unwrap().accepts(&fixed));
    assert!(!RefExpression::parse("liba/1.2").unwrap().accepts(&fixed));
    assert!(!RefExpression::parse("liba/1.5#r2").unwrap().accepts(&fixed));
    assert!(!RefExpression::parse("liba/1.5@other").unwrap().accepts(&fixed));
    assert!(!RefExpression::parse("liba/(latest)").unwrap().accepts(&fixed));
}

#[test]
fn test_expression_display_round_trips() {
    for text in ["liba/[>=1.0 <2.0]@u/c", "liba/(stable)", "liba/1.2@u#r9"] {
        assert_eq!(RefExpression::parse(text).unwrap().to_string(), text);
    }
}
