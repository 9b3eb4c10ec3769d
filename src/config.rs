use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_STORE_DESCRIPTION: &str =
    "Keep the memory for later use, when you are asked to remember something.";

pub const DEFAULT_FIND_DESCRIPTION: &str = "Look up memories in Qdrant. Use this tool when you need to: \n\
     - Find memories by their content \n\
     - Access memories for further analysis \n\
     - Get some personal information about the user";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub qdrant: QdrantConfig,
    pub embedding: EmbeddingConfig,
    pub tools: ToolConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub collection_name: Option<String>,
    pub local_path: Option<String>,
    pub search_limit: usize,
    pub read_only: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    /// Number of inference sessions kept by the local model.
    pub sessions: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ToolConfig {
    pub store_description: String,
    pub find_description: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            log_level: "info".into(),
        }
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            collection_name: None,
            local_path: None,
            search_limit: 10,
            read_only: false,
            timeout_secs: 30,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_app_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "fastembed".into(),
            model: "sentence-transformers/all-MiniLM-L6-v2".into(),
            cache_dir,
            sessions: 2,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            store_description: DEFAULT_STORE_DESCRIPTION.into(),
            find_description: DEFAULT_FIND_DESCRIPTION.into(),
        }
    }
}

/// Returns `~/.mcp-server-qdrant/`
pub fn default_app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".mcp-server-qdrant")
}

/// Returns the config file path, honoring `MCP_SERVER_QDRANT_CONFIG`.
pub fn default_config_path() -> PathBuf {
    match std::env::var("MCP_SERVER_QDRANT_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => default_app_dir().join("config.toml"),
    }
}

impl Settings {
    /// Load settings from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            Settings::default()
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from the environment. `lookup` is `std::env::var` outside tests.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        // Set-but-empty variables count as unset.
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(val) = lookup("QDRANT_URL") {
            self.qdrant.url = Some(val);
        }
        if let Some(val) = lookup("QDRANT_API_KEY") {
            self.qdrant.api_key = Some(val);
        }
        if let Some(val) = lookup("COLLECTION_NAME") {
            self.qdrant.collection_name = Some(val);
        }
        if let Some(val) = lookup("QDRANT_LOCAL_PATH") {
            self.qdrant.local_path = Some(val);
        }
        if let Some(val) = lookup("QDRANT_SEARCH_LIMIT") {
            self.qdrant.search_limit = val
                .parse()
                .with_context(|| format!("invalid QDRANT_SEARCH_LIMIT: {val}"))?;
        }
        if let Some(val) = lookup("QDRANT_READ_ONLY") {
            self.qdrant.read_only = parse_bool(&val)
                .with_context(|| format!("invalid QDRANT_READ_ONLY: {val}"))?;
        }
        if let Some(val) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = val;
        }
        if let Some(val) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = val;
        }
        if let Some(val) = lookup("EMBEDDING_CACHE_DIR") {
            self.embedding.cache_dir = val;
        }
        if let Some(val) = lookup("TOOL_STORE_DESCRIPTION") {
            self.tools.store_description = val;
        }
        if let Some(val) = lookup("TOOL_FIND_DESCRIPTION") {
            self.tools.find_description = val;
        }
        if let Some(val) = lookup("FASTMCP_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("FASTMCP_PORT").or_else(|| lookup("PORT")) {
            self.server.port = val
                .parse()
                .with_context(|| format!("invalid port: {val}"))?;
        }
        if let Some(val) = lookup("LOG_LEVEL") {
            self.server.log_level = val;
        }
        Ok(())
    }

    /// Check the settings needed to serve requests.
    pub fn validate(&self) -> Result<()> {
        if self.qdrant.local_path.is_some() {
            bail!("QDRANT_LOCAL_PATH is not supported; run a Qdrant server and set QDRANT_URL");
        }
        match self.qdrant.url.as_deref() {
            None | Some("") => bail!("QDRANT_URL must be set"),
            Some(_) => {}
        }
        if self.qdrant.search_limit == 0 {
            bail!("search limit must be at least 1");
        }
        Ok(())
    }

    /// Resolve the model cache directory, expanding `~` if needed.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        expand_tilde(&self.embedding.cache_dir)
    }
}

fn parse_bool(val: &str) -> Result<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
