use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    config::Config,
    cooldown,
    database::{City, CityStore, Database, DatabaseError, NewCity},
    forecast::WeatherError,
    refresh::{RefreshError, RefreshService, RefreshSummary},
    utils::ErrorResponse,
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub refresher: Arc<RefreshService>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct CityListResponse {
    pub cities: Vec<City>,
    pub last_refreshed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub can_refresh: bool,
    pub cooldown_secs: u64,
}

pub enum ApiError {
    Refresh(RefreshError),
    Database(DatabaseError),
    Path(PathRejection),
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::Path(e)
    }
}

impl From<RefreshError> for ApiError {
    fn from(e: RefreshError) -> Self {
        ApiError::Refresh(e)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        ApiError::Database(e)
    }
}

fn database_error_response(e: &DatabaseError) -> (StatusCode, ErrorResponse) {
    let message = e.to_string();
    match e {
        DatabaseError::CityNotFound(_) => (StatusCode::NOT_FOUND, ErrorResponse::new(&message, "city_not_found")),
        DatabaseError::DuplicateCity(_) => (StatusCode::BAD_REQUEST, ErrorResponse::new(&message, "duplicate_city")),
        DatabaseError::InvalidData(_) => (StatusCode::BAD_REQUEST, ErrorResponse::new(&message, "invalid_data")),
        DatabaseError::NoDefaultCities => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new(&message, "no_default_cities"),
        ),
        DatabaseError::Query(_) => {
            tracing::error!("Database failure: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Internal database error", "database_error"),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Database(e) => database_error_response(e),
            ApiError::Path(e) => (StatusCode::BAD_REQUEST, ErrorResponse::new(&e.body_text(), "invalid_path")),
            ApiError::Refresh(e) => {
                let message = e.to_string();
                match e {
                    RefreshError::CooldownActive { retry_after, .. } => {
                        // Round up so a client that waits exactly this long is let through.
                        let secs = (retry_after.num_milliseconds() + 999) / 1000;
                        (
                            StatusCode::BAD_REQUEST,
                            ErrorResponse::new(&message, "cooldown_active").with_retry_after(secs),
                        )
                    }
                    RefreshError::NoCities => (StatusCode::BAD_REQUEST, ErrorResponse::new(&message, "no_cities")),
                    RefreshError::Weather(WeatherError::UpstreamUnavailable { .. }) => {
                        tracing::error!("Refresh failed: {}", e);
                        (
                            StatusCode::SERVICE_UNAVAILABLE,
                            ErrorResponse::new(&message, "upstream_unavailable"),
                        )
                    }
                    RefreshError::Weather(WeatherError::Network(_)) => {
                        tracing::error!("Refresh failed: {}", e);
                        (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(&message, "network_error"))
                    }
                    RefreshError::Weather(WeatherError::MalformedResponse(_)) => {
                        tracing::error!("Refresh failed: {}", e);
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            ErrorResponse::new(&message, "malformed_response"),
                        )
                    }
                    RefreshError::Store(db) => database_error_response(db),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

// Route handlers
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.database.health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

pub async fn list_cities(State(state): State<AppState>) -> Result<Json<CityListResponse>, ApiError> {
    let cities = state.database.list_cities().await?;
    let stamps: Vec<_> = cities.iter().map(|c| c.updated_at).collect();

    Ok(Json(CityListResponse {
        last_refreshed_at: cooldown::last_refresh(stamps.iter().copied()),
        can_refresh: cooldown::can_refresh(stamps, chrono::Utc::now(), state.config.refresh_cooldown()),
        cooldown_secs: state.config.refresh_cooldown_secs,
        cities,
    }))
}

pub async fn add_city(
    State(state): State<AppState>,
    Json(request): Json<NewCity>,
) -> Result<(StatusCode, Json<City>), ApiError> {
    let city = state.database.add_city(request).await?;
    tracing::info!("Added city {} ({}, {})", city.name, city.latitude, city.longitude);
    Ok((StatusCode::CREATED, Json(city)))
}

pub async fn remove_city(
    State(state): State<AppState>,
    city_id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(city_id) = city_id?;
    state.database.remove_city(city_id).await?;
    tracing::info!("Removed city {}", city_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_cities(State(state): State<AppState>) -> Result<Json<Vec<City>>, ApiError> {
    let cities = state.database.reset_to_defaults().await?;
    tracing::info!("Reset city list to {} defaults", cities.len());
    Ok(Json(cities))
}

pub async fn refresh_cities(State(state): State<AppState>) -> Result<Json<RefreshSummary>, ApiError> {
    let summary = state.refresher.refresh_all().await?;
    Ok(Json(summary))
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cities", get(list_cities).post(add_city))
        .route("/cities/:city_id", delete(remove_city))
        .route("/cities/reset", post(reset_cities))
        .route("/cities/refresh", post(refresh_cities))
        .with_state(state)
}
