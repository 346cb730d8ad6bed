//! Reference patterns (`zlib/*`, `*@acme/*`, `!cmake/*`)

use crate::primitives::PackageReference;
use std::fmt;

/// A glob over reference text, optionally negated with a leading `!`
///
/// A pattern without `/` matches on the package name alone, so `zlib`
/// selects every version of zlib.
#[derive(Debug, Clone)]
pub struct RefPattern {
    text: String,
    pattern: glob::Pattern,
    negated: bool,
}

impl RefPattern {
    pub fn parse(text: &str) -> Result<Self, glob::PatternError> {
        let trimmed = text.trim();
        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed),
        };
        Ok(Self {
            text: trimmed.to_string(),
            pattern: glob::Pattern::new(body)?,
            negated,
        })
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether the pattern body matches, ignoring negation
    pub fn matches(&self, reference: &PackageReference) -> bool {
        let body = self.pattern.as_str();
        if !body.contains('/') {
            return self.pattern.matches(&reference.name);
        }
        self.pattern.matches(&reference.recipe_repr())
            || (reference.revision.is_some() && self.pattern.matches(&reference.to_string()))
    }

    /// Whether the pattern selects a node, honoring negation.
    /// Nodes without a reference (the virtual root) match as empty text.
    pub fn selects(&self, reference: Option<&PackageReference>) -> bool {
        let hit = match reference {
            Some(reference) => self.matches(reference),
            None => self.pattern.matches(""),
        };
        hit != self.negated
    }

    /// Patterns without glob metacharacters are more specific than globs
    pub fn specificity(&self) -> (bool, usize) {
        let body = self.pattern.as_str();
        let literal = !body.contains(['*', '?', '[']);
        (literal, body.len())
    }
}

impl fmt::Display for RefPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for RefPattern {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for RefPattern {}
