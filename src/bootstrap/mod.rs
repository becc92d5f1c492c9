//! One-time creation of the execution log's backing index.

use crate::store::{DocumentStore, StoreError};
use serde_json::{json, Value};
use tracing::info;

/// Concrete index bound to the metadata alias
pub fn metadata_index_name(metadata_alias: &str) -> String {
    format!("{}-v1.0.0", metadata_alias)
}

/// Strict mapping of the log documents
pub fn metadata_index_body() -> Value {
    json!({
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "alias": { "type": "keyword" },
                "migrations": {
                    "properties": {
                        "name": {
                            "type": "text",
                            "fields": { "keyword": { "type": "keyword" } }
                        },
                        "appVersion": { "type": "keyword" },
                        "createdAt": { "type": "date" }
                    }
                }
            }
        }
    })
}

/// Create the metadata index and bind its alias unless it already exists.
///
/// Returns `true` when the index was created by this call.
pub async fn setup(store: &dyn DocumentStore, metadata_alias: &str) -> Result<bool, StoreError> {
    let index = metadata_index_name(metadata_alias);

    if store.index_exists(&index).await? {
        info!(index = %index, "Migration metadata index already present");
        return Ok(false);
    }

    store.create_index(&index, metadata_index_body()).await?;
    store.put_alias(&index, metadata_alias).await?;

    info!(index = %index, alias = %metadata_alias, "Created migration metadata index");
    Ok(true)
}
