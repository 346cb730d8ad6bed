use super::*;
use std::fs;
use tempfile::TempDir;

fn reference(text: &str) -> PackageReference {
    PackageReference::parse(text).unwrap()
}

#[test]
fn test_parse_profile_from_toml() {
    let profile = Profile::from_toml_str(
        r#"
[settings]
os = "Linux"
"compiler.version" = "13"

[options]
"*:shared" = "False"

[[tool_requires]]
pattern = "!cmake/*"
requires = ["cmake/3.27"]

[overrides]
zlib = "1.3"
"#,
    )
    .unwrap();

    assert_eq!(profile.settings.get("os").map(String::as_str), Some("Linux"));
    assert_eq!(profile.tool_requires.len(), 1);
    assert_eq!(profile.overrides.get("zlib").map(String::as_str), Some("1.3"));
}

#[test]
fn test_load_profile_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("host.toml");
    fs::write(&path, "[settings]\narch = \"armv8\"\n").unwrap();

    let profile = Profile::load(&path).unwrap();
    assert_eq!(profile.settings.get("arch").map(String::as_str), Some("armv8"));

    let missing = Profile::load(&temp_dir.path().join("nope.toml"));
    assert!(matches!(missing, Err(ProfileError::FileReadError { .. })));
}

#[test]
fn test_settings_for_keeps_declared_and_sub_settings() {
    let profile = Profile::default()
        .with_setting("os", "Linux")
        .with_setting("compiler", "gcc")
        .with_setting("compiler.version", "13")
        .with_setting("compilerx", "ignored")
        .with_setting("build_type", "Release");

    let settings = profile.settings_for(&["compiler".to_string()]);
    assert_eq!(settings.len(), 2);
    assert!(settings.contains_key("compiler.version"));
    assert!(!settings.contains_key("compilerx"));
    assert!(!settings.contains_key("os"));
}

#[test]
fn test_option_values_prefer_specific_patterns() {
    let profile = Profile::default()
        .with_option("*:shared", "False")
        .with_option("zlib:shared", "True")
        .with_option("zlib/*:fPIC", "False");

    let zlib = profile.option_values_for(&reference("zlib/1.3")).unwrap();
    assert_eq!(zlib.get("shared").map(String::as_str), Some("True"));
    assert_eq!(zlib.get("fPIC").map(String::as_str), Some("False"));

    let fmt = profile.option_values_for(&reference("fmt/10.1")).unwrap();
    assert_eq!(fmt.get("shared").map(String::as_str), Some("False"));
    assert!(!fmt.contains_key("fPIC"));
}

#[test]
fn test_option_key_without_colon_is_rejected() {
    let profile = Profile::default().with_option("shared", "True");
    assert!(matches!(
        profile.option_values_for(&reference("zlib/1.3")),
        Err(ProfileError::InvalidOptionKey { .. })
    ));
}

#[test]
fn test_negated_tool_requires_pattern_skips_matching_nodes() {
    let profile = Profile::default().with_tool_requires("!cmake/*", &["cmake/3.27"]);

    let for_zlib = profile.tool_requires_for(Some(&reference("zlib/1.3"))).unwrap();
    assert_eq!(for_zlib.len(), 1);
    assert!(for_zlib[0].traits.build);

    let for_cmake = profile
        .tool_requires_for(Some(&reference("cmake/3.27#abc")))
        .unwrap();
    assert!(for_cmake.is_empty());

    let for_root = profile.tool_requires_for(None).unwrap();
    assert_eq!(for_root.len(), 1);
}

#[test]
fn test_override_for_expands_bare_versions() {
    let profile = Profile::default()
        .with_override("zlib", "1.3")
        .with_override("fmt", "fmt/[>=10 <11]");

    assert_eq!(
        profile.override_for("zlib").unwrap(),
        Some(RefExpression::parse("zlib/1.3").unwrap())
    );
    assert!(matches!(
        profile.override_for("fmt").unwrap(),
        Some(RefExpression::Range { .. })
    ));
    assert_eq!(profile.override_for("boost").unwrap(), None);
}

#[test]
fn test_ref_pattern_matching() {
    let by_name = RefPattern::parse("zlib").unwrap();
    assert!(by_name.matches(&reference("zlib/1.3")));

    let by_user = RefPattern::parse("*@acme/*").unwrap();
    assert!(by_user.matches(&reference("zlib/1.3@acme/stable")));
    assert!(!by_user.matches(&reference("zlib/1.3")));

    let negated = RefPattern::parse("!zlib/*").unwrap();
    assert!(negated.is_negated());
    assert!(!negated.selects(Some(&reference("zlib/1.3"))));
    assert!(negated.selects(Some(&reference("fmt/10.1"))));
}
