use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use configuration::Settings;
use database::Database;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub database: Database,
}

/// Builds the application router over the shared state.
///
/// Separated from [`run_server`] so tests can bind the exact production
/// router to an ephemeral port.
pub fn app_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any())
        .expose_headers(ExposeHeaders::any());

    // --- DEFINE THE APPLICATION ROUTES ---
    Router::new()
        .route("/", get(handlers::index))
        .route("/metadata", get(handlers::metadata))
        .route("/health", get(handlers::health))
        .route("/run_sql", post(handlers::run_sql))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(cors)
        // This middleware automatically logs information about every
        // incoming request.
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024)) // Set a 1MB body limit
}

/// The main function to configure and run the web server.
///
/// Establishes the database resource for the configured strategy first, so
/// with the pooled strategy an unreachable database fails startup here, and
/// with the singleton strategy this keeps retrying and does not start
/// serving until the database accepts a connection.
pub async fn run_server(settings: Settings, addr: SocketAddr) -> anyhow::Result<()> {
    let database = Database::connect(&settings).await?;
    let app_state = Arc::new(AppState { settings, database });
    let app = app_router(app_state);

    tracing::info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
