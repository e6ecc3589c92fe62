//! Version tokens and migration directions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MigrationError, MigrationResult};

/// Maximum length of a version token (width of the control table column)
pub const MAX_VERSION_LEN: usize = 14;

/// A validated, sortable migration version (e.g. `20240101120000`)
///
/// Versions order as plain strings. The same ordering sorts the unit set,
/// decides pending-ness and is stored in the version log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    /// Parse and validate a version token
    pub fn parse(token: &str) -> MigrationResult<Self> {
        let token = token.trim();
        let valid = !token.is_empty()
            && token.len() <= MAX_VERSION_LEN
            && token.bytes().all(|b| b.is_ascii_digit());

        if !valid {
            return Err(MigrationError::InvalidVersion(token.to_string()));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Version {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = MigrationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Migration direction, stored in the `action` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply the migration
    Up,
    /// Revert the migration
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(MigrationError::Database(format!(
                "Unknown migration action '{}'",
                other
            ))),
        }
    }
}

/// Render an optional current version, `0` meaning the log is empty
pub fn display_version(version: Option<&Version>) -> String {
    version.map_or_else(|| "0".to_string(), |v| v.to_string())
}
