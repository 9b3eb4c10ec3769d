use anyhow::Result;
use clap::{Parser, Subcommand};
use mcp_server_qdrant::server::{self, Transport};
use mcp_server_qdrant::{cli, config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mcp-server-qdrant",
    version,
    about = "MCP server for storing and retrieving memories in a Qdrant vector database"
)]
struct Cli {
    /// Transport protocol to serve MCP over
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download and load the configured embedding model
    Download,
    /// List supported embedding models
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = config::Settings::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&settings.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        None => server::serve(settings, cli.transport).await?,
        Some(Command::Model { action }) => match action {
            ModelAction::Download => cli::model_download(&settings).await?,
            ModelAction::List => cli::model_list(&settings),
        },
    }

    Ok(())
}
