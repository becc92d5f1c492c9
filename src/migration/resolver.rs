//! Resolves a migration's location into its execution context.

use super::record::{family_of, parse_filename};
use super::types::{ExecutionContext, MigrationError};
use crate::config::AliasConfig;
use std::path::Path;

/// Computes alias, index name and previous index name for migrations.
///
/// Resolution is a pure function of the migration's location, its siblings
/// in the same family directory and the alias mapping.
#[derive(Debug, Clone)]
pub struct MigrationResolver {
    aliases: AliasConfig,
}

impl MigrationResolver {
    pub fn new(aliases: AliasConfig) -> Self {
        Self { aliases }
    }

    /// Alias registered for a family
    pub fn alias_for(&self, family: &str) -> Result<&str, MigrationError> {
        self.aliases
            .alias_for(family)
            .ok_or_else(|| MigrationError::UnknownAlias(family.to_string()))
    }

    /// Build the execution context of the migration at `location`.
    ///
    /// `siblings` lists every migration location of the same family; it may
    /// include `location` itself.
    pub fn resolve<I, P>(
        &self,
        location: &Path,
        siblings: I,
        release_tag: Option<&str>,
    ) -> Result<ExecutionContext, MigrationError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let family = family_of(location)?;
        let alias = self.alias_for(&family)?;
        let (version, _) = parse_filename(location)?;

        let index_name = format!("{}-{}", alias, version.to_identifier());

        let mut previous = None;
        for sibling in siblings {
            let (sibling_version, _) = parse_filename(sibling.as_ref())?;
            if sibling_version < version && previous.map_or(true, |p| sibling_version > p) {
                previous = Some(sibling_version);
            }
        }

        Ok(ExecutionContext {
            alias: alias.to_string(),
            index_name,
            previous_index_name: previous.map(|v| format!("{}-{}", alias, v.to_identifier())),
            release_tag: release_tag
                .filter(|tag| !tag.is_empty())
                .map(str::to_string),
        })
    }
}
