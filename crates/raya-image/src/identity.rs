//! Module identities
//!
//! A module identity names a module for resolution purposes. Its canonical
//! string (the "full name") is the only thing compared when matching:
//!
//! ```text
//! json.core, Version=1.4.0, Culture=neutral, PublicKeyToken=b77a5c561934e089
//! ```

use semver::Version;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Culture written for identities without a locale
pub const NEUTRAL_CULTURE: &str = "neutral";

/// Token written for identities without a signing key
const NULL_TOKEN: &str = "null";

/// Errors produced while building or parsing a module identity
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Module name is empty
    #[error("Module name cannot be empty")]
    EmptyName,

    /// Name or culture contains a reserved character
    #[error("Invalid character {ch:?} in {component}")]
    InvalidCharacter {
        /// Component being validated
        component: &'static str,
        /// Offending character
        ch: char,
    },

    /// Name or culture starts or ends with whitespace
    #[error("Surrounding whitespace in {0}")]
    SurroundingWhitespace(&'static str),

    /// Version component is missing
    #[error("Missing Version component in {0:?}")]
    MissingVersion(String),

    /// Version is not a semantic version
    #[error("Invalid version {0:?}: {1}")]
    InvalidVersion(String, String),

    /// Public key token is not 16 hex digits
    #[error("Invalid public key token {0:?}")]
    InvalidKeyToken(String),

    /// Component is not `Key=Value`
    #[error("Malformed component {0:?}")]
    MalformedComponent(String),

    /// Component key is not recognised
    #[error("Unknown component {0:?}")]
    UnknownComponent(String),

    /// Component appears more than once
    #[error("Duplicate component {0:?}")]
    DuplicateComponent(String),
}

/// Canonical identity of a module
///
/// Equality, ordering and hashing all follow the full name, so two identities
/// are the same module exactly when their canonical strings are equal.
#[derive(Debug, Clone)]
pub struct ModuleIdentity {
    name: String,
    version: Version,
    culture: Option<String>,
    key_token: Option<[u8; 8]>,
    full_name: String,
}

impl ModuleIdentity {
    /// Create a culture-neutral, unsigned identity
    pub fn new(name: impl Into<String>, version: Version) -> Result<Self, IdentityError> {
        Self::with_parts(name, version, None, None)
    }

    /// Create an identity from all of its components
    pub fn with_parts(
        name: impl Into<String>,
        version: Version,
        culture: Option<String>,
        key_token: Option<[u8; 8]>,
    ) -> Result<Self, IdentityError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        check_chars("name", &name)?;

        // An explicit "neutral" is the same module as no culture at all.
        let culture = match culture {
            Some(c) if c.is_empty() || c.eq_ignore_ascii_case(NEUTRAL_CULTURE) => None,
            Some(c) => {
                check_chars("culture", &c)?;
                Some(c)
            }
            None => None,
        };

        let full_name = format!(
            "{}, Version={}, Culture={}, PublicKeyToken={}",
            name,
            version,
            culture.as_deref().unwrap_or(NEUTRAL_CULTURE),
            key_token
                .map(hex::encode)
                .unwrap_or_else(|| NULL_TOKEN.to_string()),
        );

        Ok(Self {
            name,
            version,
            culture,
            key_token,
            full_name,
        })
    }

    /// Simple module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Module culture, `None` when neutral
    pub fn culture(&self) -> Option<&str> {
        self.culture.as_deref()
    }

    /// Signing-key token, `None` when unsigned
    pub fn key_token(&self) -> Option<&[u8; 8]> {
        self.key_token.as_ref()
    }

    /// Canonical string used for matching
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

fn check_chars(component: &'static str, value: &str) -> Result<(), IdentityError> {
    // A parsed request is always trimmed, so a padded name could never match.
    if value.trim() != value {
        return Err(IdentityError::SurroundingWhitespace(component));
    }
    match value
        .chars()
        .find(|c| matches!(c, ',' | '=') || c.is_control())
    {
        Some(ch) => Err(IdentityError::InvalidCharacter { component, ch }),
        None => Ok(()),
    }
}

fn parse_token(value: &str) -> Result<Option<[u8; 8]>, IdentityError> {
    if value.eq_ignore_ascii_case(NULL_TOKEN) {
        return Ok(None);
    }
    let mut token = [0u8; 8];
    hex::decode_to_slice(value, &mut token)
        .map_err(|_| IdentityError::InvalidKeyToken(value.to_string()))?;
    Ok(Some(token))
}

impl FromStr for ModuleIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default();

        let mut version = None;
        let mut culture = None;
        let mut token = None;

        for part in parts {
            let (key, value) = part
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| IdentityError::MalformedComponent(part.to_string()))?;

            let slot_taken = if key.eq_ignore_ascii_case("version") {
                let parsed = Version::parse(value)
                    .map_err(|e| IdentityError::InvalidVersion(value.to_string(), e.to_string()))?;
                version.replace(parsed).is_some()
            } else if key.eq_ignore_ascii_case("culture") {
                culture.replace(value.to_string()).is_some()
            } else if key.eq_ignore_ascii_case("publickeytoken") {
                token.replace(parse_token(value)?).is_some()
            } else {
                return Err(IdentityError::UnknownComponent(key.to_string()));
            };

            if slot_taken {
                return Err(IdentityError::DuplicateComponent(key.to_string()));
            }
        }

        let version = version.ok_or_else(|| IdentityError::MissingVersion(s.to_string()))?;
        Self::with_parts(name, version, culture, token.flatten())
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

impl PartialEq for ModuleIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
    }
}

impl Eq for ModuleIdentity {}

impl std::hash::Hash for ModuleIdentity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.full_name.hash(state);
    }
}
