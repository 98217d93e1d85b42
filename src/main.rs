use tracing_subscriber::EnvFilter;

use flightbook::config::AppConfig;
use flightbook::db;
use flightbook::handlers;
use flightbook::services::conversation;
use flightbook::state::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let recognizer = state::build_recognizer(&config)?;

    let state = AppState::new(config.clone(), conn, recognizer);
    conversation::spawn_expiry_task(state.clone());

    let app = handlers::routes(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
