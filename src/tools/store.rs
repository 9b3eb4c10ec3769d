//! MCP `qdrant-store` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `qdrant-store` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreParams {
    #[schemars(description = "The information to remember")]
    pub information: String,

    #[schemars(description = "Optional JSON metadata stored alongside the information")]
    pub metadata: Option<serde_json::Value>,

    #[schemars(
        description = "Collection to store the information in. Defaults to the server's configured collection."
    )]
    pub collection_name: Option<String>,
}
