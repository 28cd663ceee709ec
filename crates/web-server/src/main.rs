use std::net::SocketAddr;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// This main function is the entry point when running `cargo run -p web-server`.
// It wires up the environment and delegates to the crate's `run_server`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = configuration::load_settings()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    web_server::run_server(settings, addr).await
}
