pub mod open_meteo;
pub mod types;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Weather service unavailable (HTTP {status}): {body}")]
    UpstreamUnavailable { status: u16, body: String },
    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),
}

/// Source of the current temperature (°C) at a coordinate pair.
///
/// Coordinates are trusted to be in range; implementations make exactly one
/// attempt and leave any retry policy to the caller.
#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn current_temperature(&self, latitude: f64, longitude: f64) -> Result<f64, WeatherError>;
}
