pub mod find;
pub mod store;

use find::FindParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::sync::Arc;
use store::StoreParams;

use crate::config::Settings;
use crate::qdrant::{Entry, QdrantConnector};

pub const STORE_TOOL: &str = "qdrant-store";
pub const FIND_TOOL: &str = "qdrant-find";

/// The MCP tool handler. Holds the shared Qdrant connector and settings and exposes
/// `qdrant-store` and `qdrant-find` via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct QdrantTools {
    tool_router: ToolRouter<Self>,
    connector: Arc<QdrantConnector>,
    settings: Arc<Settings>,
}

#[tool_router]
impl QdrantTools {
    pub fn new(connector: Arc<QdrantConnector>, settings: Arc<Settings>) -> Self {
        let mut tool_router = Self::tool_router();

        // Descriptions are configurable, so patch them over the macro defaults.
        if let Some(route) = tool_router.map.get_mut(STORE_TOOL) {
            route.attr.description = Some(settings.tools.store_description.clone().into());
        }
        if let Some(route) = tool_router.map.get_mut(FIND_TOOL) {
            route.attr.description = Some(settings.tools.find_description.clone().into());
        }
        if settings.qdrant.read_only {
            tool_router.remove_route(STORE_TOOL);
        }

        Self {
            tool_router,
            connector,
            settings,
        }
    }

    /// Names of the tools this handler currently exposes.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        names
    }

    /// Store a memory in Qdrant.
    #[tool(
        name = "qdrant-store",
        description = "Keep the memory for later use, when you are asked to remember something."
    )]
    async fn qdrant_store(
        &self,
        Parameters(params): Parameters<StoreParams>,
    ) -> Result<String, String> {
        if params.information.is_empty() {
            return Err("information must not be empty".into());
        }
        let collection = self
            .connector
            .resolve_collection(params.collection_name.as_deref())
            .map_err(|e| e.to_string())?
            .to_string();

        tracing::info!(
            content_len = params.information.len(),
            collection = %collection,
            "qdrant-store called"
        );

        let entry = Entry {
            content: params.information,
            metadata: params.metadata,
        };
        self.connector
            .store(&entry, Some(&collection))
            .await
            .map_err(|e| format!("store failed: {e:#}"))?;

        Ok(format!("Remembered: {} in collection {collection}", entry.content))
    }

    /// Search memories in Qdrant.
    #[tool(name = "qdrant-find", description = "Look up memories in Qdrant.")]
    async fn qdrant_find(
        &self,
        Parameters(params): Parameters<FindParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.query, "qdrant-find called");

        let entries = self
            .connector
            .search(
                &params.query,
                params.collection_name.as_deref(),
                self.settings.qdrant.search_limit,
            )
            .await
            .map_err(|e| format!("search failed: {e:#}"))?;

        tracing::info!(results = entries.len(), "qdrant-find finished");
        Ok(format_results(&params.query, &entries))
    }
}

#[tool_handler]
impl ServerHandler for QdrantTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Memory server backed by Qdrant. Use qdrant-store to remember information \
                 and qdrant-find to look it up by meaning."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

/// Render one entry as the XML-ish block clients expect.
pub fn format_entry(entry: &Entry) -> String {
    let metadata = entry
        .metadata
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_default();
    format!(
        "<entry><content>{}</content><metadata>{metadata}</metadata></entry>",
        entry.content
    )
}

/// Render a search response: a header line followed by one line per entry.
pub fn format_results(query: &str, entries: &[Entry]) -> String {
    if entries.is_empty() {
        return format!("No information found for the query '{query}'");
    }
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(format!("Results for the query '{query}'"));
    lines.extend(entries.iter().map(format_entry));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_entry_with_and_without_metadata() {
        let plain = Entry {
            content: "likes tea".into(),
            metadata: None,
        };
        assert_eq!(
            format_entry(&plain),
            "<entry><content>likes tea</content><metadata></metadata></entry>"
        );

        let tagged = Entry {
            content: "likes tea".into(),
            metadata: Some(json!({"source": "chat"})),
        };
        assert_eq!(
            format_entry(&tagged),
            r#"<entry><content>likes tea</content><metadata>{"source":"chat"}</metadata></entry>"#
        );
    }

    #[test]
    fn empty_results_message() {
        assert_eq!(
            format_results("tea", &[]),
            "No information found for the query 'tea'"
        );
    }

    #[test]
    fn results_keep_search_order() {
        let entries = vec![
            Entry {
                content: "first".into(),
                metadata: None,
            },
            Entry {
                content: "second".into(),
                metadata: None,
            },
        ];
        let text = format_results("q", &entries);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Results for the query 'q'");
        assert!(lines[1].contains("first"));
        assert!(lines[2].contains("second"));
    }
}
