use chrono::{DateTime, Utc};
use serde::Serialize;

pub const MAX_CITY_NAME_LEN: usize = 50;

/// Validate latitude and longitude coordinates
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("Invalid latitude: {}. Must be between -90 and 90", lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("Invalid longitude: {}. Must be between -180 and 180", lon));
    }
    Ok(())
}

/// Trim a user-supplied city name and check its length
pub fn normalize_city_name(input: &str) -> Result<String, String> {
    let name: String = input
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string();

    let len = name.chars().count();
    if len == 0 {
        return Err("City name must not be empty".to_string());
    }
    if len > MAX_CITY_NAME_LEN {
        return Err(format!(
            "City name is {} characters long, at most {} allowed",
            len, MAX_CITY_NAME_LEN
        ));
    }
    Ok(name)
}

/// Error response helper
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<i64>,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
            timestamp: Utc::now(),
            retry_after_secs: None,
        }
    }

    pub fn with_retry_after(mut self, secs: i64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }
}
