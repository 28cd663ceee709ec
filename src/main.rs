use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The main entry point for the sqlgate application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Allow RUST_LOG to override the default level
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command-line arguments
    let cli = Cli::parse();

    // Execute the appropriate command
    match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// An HTTP gateway that executes client-supplied SQL against PostgreSQL.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway.
    Serve(ServeArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// The port to listen on; overrides the configured PORT.
    #[arg(long)]
    port: Option<u16>,
}

// ==============================================================================
// Serve Command Logic
// ==============================================================================

/// Loads settings, applies command-line overrides, and serves until stopped.
async fn handle_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut settings = configuration::load_settings()?;
    if let Some(port) = args.port {
        settings.port = port;
    }

    tracing::info!(
        strategy = %settings.connection_strategy,
        port = settings.port,
        "Starting sqlgate."
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    web_server::run_server(settings, addr).await
}
