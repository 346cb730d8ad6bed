//! Fixture infrastructure for end-to-end resolution tests
//!
//! A fixture is a JSON "universe": the revisions, binaries and aliases held
//! by the local cache and each remote, plus the recipe declaration of every
//! package. Fixtures live under `fixtures/` in this crate.

use anyhow::{Context, Result};
use rivet_lib::recipe::{OptionDeclaration, PackageIdMode, PackageType, RecipeDeclaration};
use rivet_lib::storage::SourceSet;
use rivet_lib::testing::{MemoryRecipes, MemorySource};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Contents of one cache or remote
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SourceFixture {
    /// `name/version#revision%timestamp`
    pub revisions: Vec<String>,
    /// Package names with a binary for every configuration
    pub any_binaries: Vec<String>,
    /// `name/(alias)` to target requirement
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteFixture {
    pub name: String,
    #[serde(flatten)]
    pub contents: SourceFixture,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecipeFixture {
    pub package_type: PackageType,
    pub requires: Vec<String>,
    pub tool_requires: Vec<String>,
    pub test_requires: Vec<String>,
    pub settings: Vec<String>,
    pub options: BTreeMap<String, OptionDeclaration>,
    pub package_id_modes: BTreeMap<String, PackageIdMode>,
}

impl RecipeFixture {
    pub fn declaration(&self) -> Result<RecipeDeclaration> {
        let mut declaration = RecipeDeclaration::new(self.package_type)
            .with_requires(&as_strs(&self.requires))?
            .with_tool_requires(&as_strs(&self.tool_requires))?
            .with_test_requires(&as_strs(&self.test_requires))?
            .with_settings(&as_strs(&self.settings));
        for (name, option) in &self.options {
            declaration = declaration.with_option(name, option.clone());
        }
        for (dependency, mode) in &self.package_id_modes {
            declaration = declaration.with_package_id_mode(dependency, *mode);
        }
        Ok(declaration)
    }
}

/// Everything a resolution can see
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Universe {
    pub cache: SourceFixture,
    pub remotes: Vec<RemoteFixture>,
    /// Recipe coordinates (`name/version`) to declaration
    pub recipes: BTreeMap<String, RecipeFixture>,
}

impl Universe {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse universe fixture")
    }

    /// Cache and remotes, in priority order
    pub fn sources(&self) -> Result<(SourceSet, Arc<MemorySource>, Vec<Arc<MemorySource>>)> {
        let cache = Arc::new(populate("cache", &self.cache)?);
        let mut set = SourceSet::new(cache.clone());
        let mut remotes = Vec::new();
        for remote in &self.remotes {
            let source = Arc::new(populate(&remote.name, &remote.contents)?);
            set = set.with_remote(source.clone());
            remotes.push(source);
        }
        Ok((set, cache, remotes))
    }

    pub fn recipes(&self) -> Result<MemoryRecipes> {
        let mut recipes = MemoryRecipes::new();
        for (reference, fixture) in &self.recipes {
            recipes
                .add(reference, fixture.declaration()?)
                .with_context(|| format!("Invalid recipe key '{}'", reference))?;
        }
        Ok(recipes)
    }
}

/// Load `fixtures/<name>.json` from this crate
pub fn load_universe(name: &str) -> Result<Universe> {
    let path = format!("{}/fixtures/{}.json", env!("CARGO_MANIFEST_DIR"), name);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to load universe fixture '{}'", path))?;
    Universe::from_json(&text).with_context(|| format!("In fixture '{}'", path))
}

fn populate(name: &str, fixture: &SourceFixture) -> Result<MemorySource> {
    let source = MemorySource::new(name);
    source.add_revisions(&as_strs(&fixture.revisions))?;
    for package in &fixture.any_binaries {
        source.add_any_binary(package);
    }
    for (alias, target) in &fixture.aliases {
        source.add_alias(alias, target)?;
    }
    Ok(source)
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}
