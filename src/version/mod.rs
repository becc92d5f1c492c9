//! Version handling for migration files and release tags.
//!
//! Migration filenames embed a `major.minor.patch` version which decides the
//! order of migrations inside a family and the index name they target.
//! Release tags (the application version a migration shipped with) are
//! reduced to a plain integer so rollbacks can be ordered newest first.

mod types;

pub use types::{BumpKind, SemVer, VersionError};

use std::cmp::Ordering;

/// Compare two versions lexicographically on (major, minor, patch).
pub fn compare_versions(a: &SemVer, b: &SemVer) -> Ordering {
    a.cmp(b)
}

/// Numeric identifier of a release tag.
///
/// A single leading version marker is stripped and the remaining digits are
/// concatenated, so "v1.2.0" becomes 120. Anything else is rejected.
pub fn release_identifier(tag: &str) -> Result<u64, VersionError> {
    let trimmed = tag
        .strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag);
    let digits: String = trimmed.split('.').collect();

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidVersion(tag.to_string()));
    }

    digits
        .parse()
        .map_err(|_| VersionError::InvalidVersion(tag.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_versions_is_total() {
        let a = SemVer::new(1, 0, 0);
        let b = SemVer::new(1, 1, 0);
        let c = SemVer::new(2, 0, 0);

        assert_eq!(compare_versions(&a, &a), Ordering::Equal);
        assert_eq!(compare_versions(&a, &b), Ordering::Less);
        assert_eq!(compare_versions(&b, &a), Ordering::Greater);
        assert_eq!(compare_versions(&b, &c), Ordering::Less);
        assert_eq!(compare_versions(&a, &c), Ordering::Less);
    }

    #[test]
    fn test_release_identifier() {
        assert_eq!(release_identifier("1.0.0").unwrap(), 100);
        assert_eq!(release_identifier("v1.2.0").unwrap(), 120);
        assert_eq!(release_identifier("2.0.0").unwrap(), 200);
        assert_eq!(release_identifier("42").unwrap(), 42);
    }

    #[test]
    fn test_release_identifier_rejects_non_numeric() {
        assert!(release_identifier("").is_err());
        assert!(release_identifier("v").is_err());
        assert!(release_identifier("1.0.0-beta").is_err());
        assert!(release_identifier("release-1").is_err());
    }
}
