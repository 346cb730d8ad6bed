//! Package references and requirement expressions
//!
//! Text form: `name/version[@user[/channel]][#revision[%timestamp]]`.
//! A requirement may replace the version with a range (`name/[>=1.0 <2.0]`)
//! or an alias (`name/(latest)`).

use super::ReferenceError;
use super::version::{Version, VersionRange};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A concrete package reference
///
/// Equality ignores the revision unless both sides carry one. The timestamp
/// never participates in equality.
#[derive(Debug, Clone)]
pub struct PackageReference {
    pub name: String,
    pub version: Version,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub revision: Option<String>,
    /// Seconds since the epoch at which the revision was created
    pub timestamp: Option<u64>,
}

impl PackageReference {
    pub fn new(name: &str, version: Version) -> Self {
        Self {
            name: name.to_string(),
            version,
            user: None,
            channel: None,
            revision: None,
            timestamp: None,
        }
    }

    pub fn with_user_channel(mut self, user: &str, channel: Option<&str>) -> Self {
        self.user = Some(user.to_string());
        self.channel = channel.map(str::to_string);
        self
    }

    pub fn with_revision(mut self, revision: &str, timestamp: Option<u64>) -> Self {
        self.revision = Some(revision.to_string());
        self.timestamp = timestamp;
        self
    }

    /// Parse the textual form of a reference
    pub fn parse(text: &str) -> Result<Self, ReferenceError> {
        let (body, revision, timestamp) = split_revision(text)?;
        let (name, version, user, channel) = split_body(text, body)?;
        let version = Version::parse(version)?;
        Ok(Self {
            name: name.to_string(),
            version,
            user,
            channel,
            revision,
            timestamp,
        })
    }

    /// A reference carrying a revision is resolved; without one it is a requirement
    pub fn is_resolved(&self) -> bool {
        self.revision.is_some()
    }

    pub fn without_revision(&self) -> Self {
        Self {
            revision: None,
            timestamp: None,
            ..self.clone()
        }
    }

    /// Same recipe coordinates (name, version, user, channel)
    pub fn same_recipe(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.user == other.user
            && self.channel == other.channel
    }

    /// Text form including the revision timestamp, used for persistence
    pub fn full_repr(&self) -> String {
        match (&self.revision, self.timestamp) {
            (Some(_), Some(ts)) => format!("{}%{}", self, ts),
            _ => self.to_string(),
        }
    }

    /// Text form without revision
    pub fn recipe_repr(&self) -> String {
        self.without_revision().to_string()
    }
}

fn split_revision(text: &str) -> Result<(&str, Option<String>, Option<u64>), ReferenceError> {
    let Some((body, rev)) = text.split_once('#') else {
        return Ok((text, None, None));
    };
    let (revision, timestamp) = match rev.split_once('%') {
        Some((revision, ts)) => {
            let ts = ts.parse::<u64>().map_err(|_| ReferenceError::InvalidReference {
                text: text.to_string(),
                reason: format!("invalid revision timestamp '{}'", ts),
            })?;
            (revision, Some(ts))
        }
        None => (rev, None),
    };
    if revision.is_empty() || !revision.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ReferenceError::InvalidReference {
            text: text.to_string(),
            reason: "revision must be a non-empty alphanumeric string".to_string(),
        });
    }
    Ok((body, Some(revision.to_string()), timestamp))
}

type Body<'a> = (&'a str, &'a str, Option<String>, Option<String>);

fn split_body<'a>(text: &str, body: &'a str) -> Result<Body<'a>, ReferenceError> {
    let invalid = |reason: &str| ReferenceError::InvalidReference {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let (coords, user_channel) = match body.split_once('@') {
        Some((coords, uc)) => (coords, Some(uc)),
        None => (body, None),
    };
    let (name, version) = coords
        .split_once('/')
        .ok_or_else(|| invalid("expected 'name/version'"))?;
    validate_name(name).map_err(|reason| invalid(&reason))?;
    if version.is_empty() {
        return Err(invalid("empty version"));
    }

    let (user, channel) = match user_channel {
        None => (None, None),
        Some(uc) => {
            let (user, channel) = match uc.split_once('/') {
                Some((u, c)) => (u, Some(c)),
                None => (uc, None),
            };
            validate_name(user).map_err(|reason| invalid(&reason))?;
            if let Some(channel) = channel {
                validate_name(channel).map_err(|reason| invalid(&reason))?;
            }
            (Some(user.to_string()), channel.map(str::to_string))
        }
    };

    Ok((name, version, user, channel))
}

fn validate_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' => {}
        Some(_) => return Err(format!("'{}' must start with a lowercase letter, digit or '_'", name)),
        None => return Err("empty name component".to_string()),
    }
    if chars.all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '+' | '.')
    }) {
        Ok(())
    } else {
        Err(format!("'{}' contains invalid characters", name))
    }
}

impl PartialEq for PackageReference {
    fn eq(&self, other: &Self) -> bool {
        if !self.same_recipe(other) {
            return false;
        }
        match (&self.revision, &other.revision) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl Eq for PackageReference {}

impl Hash for PackageReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.user.hash(state);
        self.channel.hash(state);
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if let Some(user) = &self.user {
            write!(f, "@{}", user)?;
            if let Some(channel) = &self.channel {
                write!(f, "/{}", channel)?;
            }
        }
        if let Some(revision) = &self.revision {
            write!(f, "#{}", revision)?;
        }
        Ok(())
    }
}

impl FromStr for PackageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// What a requirement asks for before it is resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefExpression {
    /// A pinned version, optionally with a revision
    Exact(PackageReference),
    /// Highest available version satisfying a range
    Range {
        name: String,
        range: VersionRange,
        user: Option<String>,
        channel: Option<String>,
    },
    /// One level of indirection to another requirement, e.g. `name/(latest)`
    Alias {
        name: String,
        alias: String,
        user: Option<String>,
        channel: Option<String>,
    },
}

impl RefExpression {
    pub fn parse(text: &str) -> Result<Self, ReferenceError> {
        let trimmed = text.trim();
        let (body, revision, timestamp) = split_revision(trimmed)?;
        let (name, version, user, channel) = split_body(trimmed, body)?;

        if let Some(inner) = version.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(|| ReferenceError::InvalidRange {
                text: version.to_string(),
                reason: "missing closing ']'".to_string(),
            })?;
            if revision.is_some() {
                return Err(ReferenceError::InvalidReference {
                    text: trimmed.to_string(),
                    reason: "a version range cannot pin a revision".to_string(),
                });
            }
            return Ok(Self::Range {
                name: name.to_string(),
                range: VersionRange::parse(inner)?,
                user,
                channel,
            });
        }

        if let Some(inner) = version.strip_prefix('(') {
            let alias = inner
                .strip_suffix(')')
                .filter(|a| !a.is_empty())
                .ok_or_else(|| ReferenceError::InvalidReference {
                    text: trimmed.to_string(),
                    reason: "malformed alias, expected 'name/(alias)'".to_string(),
                })?;
            return Ok(Self::Alias {
                name: name.to_string(),
                alias: alias.to_string(),
                user,
                channel,
            });
        }

        Ok(Self::Exact(PackageReference {
            name: name.to_string(),
            version: Version::parse(version)?,
            user,
            channel,
            revision,
            timestamp,
        }))
    }

    /// Requirement for the highest available version of `name`
    pub fn latest(name: &str) -> Self {
        Self::Range {
            name: name.to_string(),
            range: VersionRange::any(),
            user: None,
            channel: None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Exact(reference) => &reference.name,
            Self::Range { name, .. } | Self::Alias { name, .. } => name,
        }
    }

    fn user_channel(&self) -> (Option<&str>, Option<&str>) {
        match self {
            Self::Exact(r) => (r.user.as_deref(), r.channel.as_deref()),
            Self::Range { user, channel, .. } | Self::Alias { user, channel, .. } => {
                (user.as_deref(), channel.as_deref())
            }
        }
    }

    /// Whether an already fixed reference satisfies this requirement.
    /// Aliases never accept directly; they must be resolved first.
    pub fn accepts(&self, reference: &PackageReference) -> bool {
        if self.name() != reference.name
            || self.user_channel() != (reference.user.as_deref(), reference.channel.as_deref())
        {
            return false;
        }
        match self {
            Self::Exact(pinned) => pinned == reference,
            Self::Range { range, .. } => range.contains(&reference.version),
            Self::Alias { .. } => false,
        }
    }
}

impl fmt::Display for RefExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, version, user, channel) = match self {
            Self::Exact(reference) => return write!(f, "{}", reference),
            Self::Range {
                name,
                range,
                user,
                channel,
            } => (name, range.to_string(), user, channel),
            Self::Alias {
                name,
                alias,
                user,
                channel,
            } => (name, format!("({})", alias), user, channel),
        };
        write!(f, "{}/{}", name, version)?;
        if let Some(user) = user {
            write!(f, "@{}", user)?;
            if let Some(channel) = channel {
                write!(f, "/{}", channel)?;
            }
        }
        Ok(())
    }
}

impl FromStr for RefExpression {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<PackageReference> for RefExpression {
    fn from(reference: PackageReference) -> Self {
        Self::Exact(reference)
    }
}

#[cfg(test)]
mod tests {
    include!("reference.test.rs");
}
