use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod cooldown;
mod database;
mod forecast;
mod refresh;
mod routes;
mod utils;

use config::Config;
use database::Database;
use forecast::open_meteo::OpenMeteoClient;
use refresh::RefreshService;
use routes::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "city_weather_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let database = Arc::new(Database::connect(&config.database_url).await?);
    database.bootstrap().await?;

    let weather_client = Arc::new(OpenMeteoClient::new(&config)?);

    let refresher = Arc::new(RefreshService::new(
        database.clone(),
        weather_client,
        config.refresh_cooldown(),
    ));

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        database,
        refresher,
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server starting on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
