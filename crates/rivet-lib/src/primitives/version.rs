//! Package versions and version-range expressions
//!
//! Versions are dotted component lists (`1.2`, `1.2.3.4`, `2.0.1a`) with an
//! optional `-prerelease` and `+build` suffix. Trailing zero components do
//! not affect ordering, so `1.2 == 1.2.0`.

use super::ReferenceError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// One dotted component of a version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionComponent {
    Number(u64),
    Text(String),
}

impl VersionComponent {
    fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Self::Number(0))
    }
}

impl Ord for VersionComponent {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }
}

impl PartialOrd for VersionComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A package version as written in a reference
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    components: Vec<VersionComponent>,
    prerelease: Option<String>,
    build: Option<String>,
}

impl Version {
    /// Parse a version string
    pub fn parse(text: &str) -> Result<Self, ReferenceError> {
        let invalid = |reason: &str| ReferenceError::InvalidVersion {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty version"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'))
        {
            return Err(invalid("unexpected character"));
        }

        let (rest, build) = match trimmed.split_once('+') {
            Some((head, build)) if !build.is_empty() => (head, Some(build.to_string())),
            Some(_) => return Err(invalid("empty build metadata")),
            None => (trimmed, None),
        };
        let (main, prerelease) = match rest.split_once('-') {
            Some((head, pre)) if !pre.is_empty() => (head, Some(pre.to_string())),
            Some(_) => return Err(invalid("empty prerelease")),
            None => (rest, None),
        };

        let mut components = Vec::new();
        for raw in main.split('.') {
            if raw.is_empty() {
                return Err(invalid("empty version component"));
            }
            components.push(VersionComponent::parse(raw));
        }

        Ok(Self {
            text: trimmed.to_string(),
            components,
            prerelease,
            build,
        })
    }

    fn from_components(components: Vec<VersionComponent>) -> Self {
        let text = components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self {
            text,
            components,
            prerelease: None,
            build: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn components(&self) -> &[VersionComponent] {
        &self.components
    }

    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// Numeric value of the component at `index`, treating absent components as 0
    pub fn numeric(&self, index: usize) -> Option<u64> {
        match self.components.get(index) {
            Some(VersionComponent::Number(n)) => Some(*n),
            Some(VersionComponent::Text(_)) => None,
            None => Some(0),
        }
    }

    pub fn major(&self) -> Option<u64> {
        self.numeric(0)
    }

    /// Smallest version strictly above every version sharing the first
    /// `index + 1` components with this one (`1.2.3` bumped at 1 is `1.3`).
    /// `None` when the bumped component would overflow.
    pub fn bump(&self, index: usize) -> Option<Self> {
        let mut components: Vec<VersionComponent> = (0..=index)
            .map(|i| {
                self.components
                    .get(i)
                    .cloned()
                    .unwrap_or(VersionComponent::Number(0))
            })
            .collect();
        let last = components.len() - 1;
        components[last] = match &components[last] {
            VersionComponent::Number(n) => VersionComponent::Number(n.checked_add(1)?),
            VersionComponent::Text(s) => VersionComponent::Text(format!("{}~", s)),
        };
        Some(Self::from_components(components))
    }

    /// Render the first `keep` components followed by wildcard markers for
    /// the remainder, e.g. `1.2.Z` for `keep = 2` and three components shown.
    pub fn masked(&self, keep: usize, shown: usize) -> String {
        const MARKERS: [&str; 3] = ["X", "Y", "Z"];
        (0..shown.max(keep))
            .map(|i| {
                if i < keep {
                    self.components
                        .get(i)
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "0".to_string())
                } else {
                    MARKERS.get(i).copied().unwrap_or("Z").to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn significant(&self) -> &[VersionComponent] {
        let mut end = self.components.len();
        while end > 1 && self.components[end - 1].is_zero() {
            end -= 1;
        }
        &self.components[..end]
    }
}

fn cmp_dotted(a: &str, b: &str) -> Ordering {
    let left: Vec<VersionComponent> = a.split('.').map(VersionComponent::parse).collect();
    let right: Vec<VersionComponent> = b.split('.').map(VersionComponent::parse).collect();
    left.cmp(&right)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let main = {
            let (a, b) = (self.significant(), other.significant());
            let len = a.len().max(b.len());
            let zero = VersionComponent::Number(0);
            (0..len)
                .map(|i| a.get(i).unwrap_or(&zero).cmp(b.get(i).unwrap_or(&zero)))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        };
        main.then_with(|| match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => cmp_dotted(a, b),
        })
        .then_with(|| match (&self.build, &other.build) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => cmp_dotted(a, b),
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
        self.prerelease.hash(state);
        self.build.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition {
    operator: Operator,
    version: Version,
}

impl Condition {
    fn holds(&self, version: &Version) -> bool {
        match self.operator {
            Operator::Gt => version > &self.version,
            Operator::Ge => version >= &self.version,
            Operator::Lt => version < &self.version,
            Operator::Le => version <= &self.version,
            Operator::Eq => version == &self.version,
        }
    }
}

/// A version-range expression such as `>=1.0 <2.0 || ^3.1, include_prerelease`
///
/// Conditions separated by whitespace must all hold; `||` separates
/// alternatives of which one must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    text: String,
    alternatives: Vec<Vec<Condition>>,
    include_prerelease: bool,
}

impl VersionRange {
    /// Parse a range body (without the surrounding brackets)
    pub fn parse(text: &str) -> Result<Self, ReferenceError> {
        let invalid = |reason: String| ReferenceError::InvalidRange {
            text: text.to_string(),
            reason,
        };

        let mut parts = text.split(',');
        let expression = parts.next().unwrap_or_default().trim();
        let mut include_prerelease = false;
        for flag in parts.map(str::trim).filter(|f| !f.is_empty()) {
            match flag {
                "include_prerelease" => include_prerelease = true,
                other => return Err(invalid(format!("unknown range option '{}'", other))),
            }
        }

        let mut alternatives = Vec::new();
        for alternative in expression.split("||") {
            let mut conditions = Vec::new();
            for token in alternative.split_whitespace() {
                conditions.extend(parse_token(token).map_err(|e| invalid(e))?);
            }
            alternatives.push(conditions);
        }

        Ok(Self {
            text: text.trim().to_string(),
            alternatives,
            include_prerelease,
        })
    }

    /// The range that accepts every (non-prerelease) version
    pub fn any() -> Self {
        Self {
            text: "*".to_string(),
            alternatives: vec![Vec::new()],
            include_prerelease: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether `version` satisfies this range
    pub fn contains(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|conditions| {
            if version.is_prerelease()
                && !self.include_prerelease
                && !conditions.iter().any(|c| c.version.is_prerelease())
            {
                return false;
            }
            conditions.iter().all(|c| c.holds(version))
        })
    }
}

fn parse_token(token: &str) -> Result<Vec<Condition>, String> {
    let version = |raw: &str| Version::parse(raw).map_err(|e| e.to_string());
    let single = |operator, raw: &str| -> Result<Vec<Condition>, String> {
        Ok(vec![Condition {
            operator,
            version: version(raw)?,
        }])
    };

    if token == "*" {
        return Ok(Vec::new());
    }
    if let Some(raw) = token.strip_prefix(">=") {
        return single(Operator::Ge, raw);
    }
    if let Some(raw) = token.strip_prefix("<=") {
        return single(Operator::Le, raw);
    }
    if let Some(raw) = token.strip_prefix('>') {
        return single(Operator::Gt, raw);
    }
    if let Some(raw) = token.strip_prefix('<') {
        return single(Operator::Lt, raw);
    }
    if let Some(raw) = token.strip_prefix('=') {
        return single(Operator::Eq, raw);
    }
    if let Some(raw) = token.strip_prefix('~') {
        let lower = version(raw)?;
        let index = if lower.components().len() > 1 { 1 } else { 0 };
        let upper = lower
            .bump(index)
            .ok_or_else(|| format!("no upper bound above '{}'", raw))?;
        return Ok(vec![
            Condition {
                operator: Operator::Ge,
                version: lower,
            },
            Condition {
                operator: Operator::Lt,
                version: upper,
            },
        ]);
    }
    if let Some(raw) = token.strip_prefix('^') {
        let lower = version(raw)?;
        let last = lower.components().len().saturating_sub(1);
        let index = (0..last)
            .find(|&i| lower.numeric(i) != Some(0))
            .unwrap_or(last);
        let upper = lower
            .bump(index)
            .ok_or_else(|| format!("no upper bound above '{}'", raw))?;
        return Ok(vec![
            Condition {
                operator: Operator::Ge,
                version: lower,
            },
            Condition {
                operator: Operator::Lt,
                version: upper,
            },
        ]);
    }
    single(Operator::Eq, token)
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.text)
    }
}

#[cfg(test)]
mod tests {
    include!("version.test.rs");
}
