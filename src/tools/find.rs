use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FindParams {
    #[schemars(description = "What to search for")]
    pub query: String,

    #[schemars(
        description = "Collection to search in. Defaults to the server's configured collection."
    )]
    pub collection_name: Option<String>,
}
