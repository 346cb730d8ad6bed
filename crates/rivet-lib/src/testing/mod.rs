//! In-memory collaborators for resolution tests
//!
//! Provides:
//! - [`MemorySource`]: a cache or remote backed by plain collections
//! - [`MemoryRecipes`]: a recipe provider keyed by recipe coordinates

use crate::package_id::PackageId;
use crate::primitives::{PackageReference, RefExpression, ReferenceError, VersionRange};
use crate::recipe::{RecipeDeclaration, RecipeError, RecipeProvider};
use crate::storage::{PackageSource, SourceError};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Package source holding revisions, binaries and aliases in memory
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    revisions: Mutex<Vec<PackageReference>>,
    /// `(reference text, package id)` pairs with a stored binary
    binaries: Mutex<HashSet<(String, String)>>,
    /// Recipe names whose every configuration has a binary
    any_binary: Mutex<HashSet<String>>,
    aliases: Mutex<HashMap<String, RefExpression>>,
    failing: AtomicBool,
    list_calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            revisions: Mutex::new(Vec::new()),
            binaries: Mutex::new(HashSet::new()),
            any_binary: Mutex::new(HashSet::new()),
            aliases: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Register revisions given as `name/version#revision%timestamp`
    pub fn add_revisions(&self, texts: &[&str]) -> Result<(), ReferenceError> {
        let mut revisions = locked(&self.revisions);
        for text in texts {
            revisions.push(PackageReference::parse(text)?);
        }
        Ok(())
    }

    pub fn add_binary(&self, reference: &PackageReference, package_id: &PackageId) {
        locked(&self.binaries).insert((reference.to_string(), package_id.to_string()));
    }

    /// Pretend a binary exists for every configuration of `name`
    pub fn add_any_binary(&self, name: &str) {
        locked(&self.any_binary).insert(name.to_string());
    }

    /// Make `alias` (e.g. `zlib/(stable)`) point at `target`
    pub fn add_alias(&self, alias: &str, target: &str) -> Result<(), ReferenceError> {
        let alias = RefExpression::parse(alias)?;
        let target = RefExpression::parse(target)?;
        locked(&self.aliases).insert(alias.to_string(), target);
        Ok(())
    }

    /// Make every call fail as if the source were unreachable
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `list_revisions` calls answered so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable {
                origin: self.name.clone(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

impl PackageSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_revisions(
        &self,
        name: &str,
        range: Option<&VersionRange>,
    ) -> Result<Vec<PackageReference>, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(locked(&self.revisions)
            .iter()
            .filter(|r| r.name == name)
            .filter(|r| range.is_none_or(|range| range.contains(&r.version)))
            .cloned()
            .collect())
    }

    fn has_binary(
        &self,
        reference: &PackageReference,
        package_id: &PackageId,
    ) -> Result<bool, SourceError> {
        self.check_available()?;
        if locked(&self.any_binary).contains(&reference.name) {
            return Ok(true);
        }
        Ok(locked(&self.binaries).contains(&(reference.to_string(), package_id.to_string())))
    }

    fn alias_target(&self, alias: &RefExpression) -> Result<Option<RefExpression>, SourceError> {
        self.check_available()?;
        Ok(locked(&self.aliases).get(&alias.to_string()).cloned())
    }
}

/// Recipe provider backed by a list of declarations
#[derive(Debug, Default)]
pub struct MemoryRecipes {
    recipes: Vec<(PackageReference, RecipeDeclaration)>,
    calls: AtomicUsize,
}

impl MemoryRecipes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the recipe for `reference` (any revision)
    pub fn add(&mut self, reference: &str, declaration: RecipeDeclaration) -> Result<(), ReferenceError> {
        let reference = PackageReference::parse(reference)?;
        self.recipes.retain(|(r, _)| !r.same_recipe(&reference));
        self.recipes.push((reference, declaration));
        Ok(())
    }

    /// Number of declarations handed out
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecipeProvider for MemoryRecipes {
    fn declaration(&self, reference: &PackageReference) -> Result<RecipeDeclaration, RecipeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recipes
            .iter()
            .find(|(r, _)| r.same_recipe(reference))
            .map(|(_, declaration)| declaration.clone())
            .ok_or_else(|| RecipeError::NotAvailable {
                reference: reference.to_string(),
            })
    }
}
