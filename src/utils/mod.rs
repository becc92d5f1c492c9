use std::path::{Path, PathBuf};

/// Default root of the migrations tree
pub const MIGRATIONS_FOLDER: &str = "migrations";

/// Folder (under the migrations root) holding one directory per index family
pub const INDEXES_FOLDER: &str = "indexes";

/// Name of the alias mapping file (under the migrations root)
pub const CONFIG_FILE: &str = "migration.config.json";

/// Default alias of the index that stores the execution log
pub const DEFAULT_METADATA_ALIAS: &str = "migrations-metadata";

/// Get the path to the family directories
pub fn get_indexes_path(migrations_root: &Path) -> PathBuf {
    migrations_root.join(INDEXES_FOLDER)
}

/// Get the path to the alias mapping file
pub fn get_config_path(migrations_root: &Path) -> PathBuf {
    migrations_root.join(CONFIG_FILE)
}

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Get current timestamp in milliseconds since the epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let root = Path::new("/project/migrations");
        assert_eq!(
            get_indexes_path(root),
            Path::new("/project/migrations/indexes")
        );
        assert_eq!(
            get_config_path(root),
            Path::new("/project/migrations/migration.config.json")
        );
    }

    #[test]
    fn test_now_iso_is_rfc3339() {
        assert!(chrono::DateTime::parse_from_rfc3339(&now_iso()).is_ok());
    }
}
