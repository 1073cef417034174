use serde::{Deserialize, Serialize};

// Only the fields the refresh cycle reads; Open-Meteo sends many more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: Option<f64>,
    pub time: Option<String>,
}

impl ForecastResponse {
    pub fn temperature(&self) -> Option<f64> {
        self.current_weather.as_ref().and_then(|current| current.temperature)
    }

    pub fn observed_at(&self) -> Option<&str> {
        self.current_weather.as_ref().and_then(|current| current.time.as_deref())
    }
}
