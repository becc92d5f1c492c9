//! Identity of a migration derived from its location.

use super::types::MigrationError;
use crate::version::SemVer;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// `name-v{major}.{minor}.{patch}-{timestamp}` with an optional extension.
static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<prefix>[^.]+?)-v(?P<version>[0-9]+\.[0-9]+\.[0-9]+)-(?P<timestamp>[0-9]+)(?:\.[A-Za-z][A-Za-z0-9]*)?$",
    )
    .expect("migration filename pattern should compile")
});

/// Prefix used for generated migration files.
pub const FILENAME_PREFIX: &str = "migration";

/// One migration file: its family, version and creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub family: String,
    pub version: SemVer,
    /// Creation time in milliseconds since the epoch
    pub created_at: i64,
}

impl MigrationRecord {
    pub fn new(family: impl Into<String>, version: SemVer, created_at: i64) -> Self {
        Self {
            family: family.into(),
            version,
            created_at,
        }
    }

    /// Parse family, version and timestamp from a migration location
    pub fn from_location(location: &Path) -> Result<Self, MigrationError> {
        let family = family_of(location)?;
        let (version, created_at) = parse_filename(location)?;
        Ok(Self {
            family,
            version,
            created_at,
        })
    }

    /// File name (without extension) of this migration
    pub fn filename(&self) -> String {
        format!(
            "{}-{}-{}",
            FILENAME_PREFIX,
            self.version.to_identifier(),
            self.created_at
        )
    }

    /// Conventional migration name, e.g. `users-migration-v1.0.0`
    pub fn display_name(&self) -> String {
        format!("{}-migration-{}", self.family, self.version.to_identifier())
    }
}

/// Family of a migration: the name of its containing directory
pub fn family_of(location: &Path) -> Result<String, MigrationError> {
    location
        .parent()
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| MigrationError::MalformedFilename(location.display().to_string()))
}

/// Version and creation timestamp embedded in a migration file name
pub fn parse_filename(location: &Path) -> Result<(SemVer, i64), MigrationError> {
    let malformed = || MigrationError::MalformedFilename(location.display().to_string());

    let file_name = location
        .file_name()
        .map(|name| name.to_string_lossy())
        .ok_or_else(malformed)?;
    let captures = FILENAME_PATTERN.captures(&file_name).ok_or_else(malformed)?;

    let version = SemVer::parse(&captures["version"]).map_err(|_| malformed())?;
    let created_at = captures["timestamp"].parse().map_err(|_| malformed())?;
    Ok((version, created_at))
}
