use super::*;

#[test]
fn test_default_traits_per_requirement_kind() {
    let requires = RequireTraits::requires();
    assert!(requires.visible && requires.direct && !requires.build);

    let tool = RequireTraits::tool_requires();
    assert!(tool.build && tool.run && !tool.visible);

    let test = RequireTraits::test_requires();
    assert!(test.test && !test.visible && !test.build);

    assert!(!requires.inherited().direct);
    assert!(requires.inherited().visible);
}

#[test]
fn test_declaration_builder_parses_edges() {
    let declaration = RecipeDeclaration::new(PackageType::Library)
        .with_requires(&["zlib/[>=1.2 <2]", "fmt/10.1"])
        .unwrap()
        .with_tool_requires(&["cmake/3.27"])
        .unwrap()
        .with_settings(&["os", "arch"]);

    assert_eq!(declaration.requires.len(), 2);
    assert_eq!(declaration.requires[0].name(), "zlib");
    assert_eq!(declaration.tool_requires[0].name(), "cmake");
    assert!(declaration.tool_requires[0].traits.build);
    assert_eq!(declaration.settings, vec!["os", "arch"]);
}

#[test]
fn test_declaration_builder_rejects_bad_requirement() {
    assert!(
        RecipeDeclaration::default()
            .with_requires(&["not a reference"])
            .is_err()
    );
}

#[test]
fn test_option_declaration_allows() {
    let shared = OptionDeclaration::new(&["True", "False"], Some("False"));
    assert!(shared.allows("True"));
    assert!(!shared.allows("maybe"));
    assert!(OptionDeclaration::new(&[], None).allows("anything"));
}

#[test]
fn test_configuration_independent_package_types() {
    assert!(PackageType::HeaderLibrary.is_configuration_independent());
    assert!(PackageType::BuildScripts.is_configuration_independent());
    assert!(!PackageType::SharedLibrary.is_configuration_independent());
}

#[test]
fn test_package_id_mode_from_str() {
    assert_eq!("minor_mode".parse::<PackageIdMode>().unwrap(), PackageIdMode::Minor);
    assert_eq!("Semver".parse::<PackageIdMode>().unwrap(), PackageIdMode::Semver);
    assert!("sometimes".parse::<PackageIdMode>().is_err());
}
