use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::cooldown::DEFAULT_COOLDOWN_SECS;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub open_meteo_base_url: String,
    pub open_meteo_forecast_path: String,
    pub weather_timeout_secs: u64,
    pub refresh_cooldown_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let refresh_cooldown_secs: u64 = var_or("REFRESH_COOLDOWN_SECS", &DEFAULT_COOLDOWN_SECS.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("REFRESH_COOLDOWN_SECS must be a whole number of seconds"))?;
        if cooldown_duration(refresh_cooldown_secs).is_none() {
            anyhow::bail!("REFRESH_COOLDOWN_SECS is out of range: {}", refresh_cooldown_secs);
        }

        Ok(Config {
            database_url: var_or("DATABASE_URL", "sqlite:./cities.db"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            open_meteo_base_url: var_or("OPEN_METEO_BASE_URL", "https://api.open-meteo.com"),
            open_meteo_forecast_path: var_or("OPEN_METEO_FORECAST_PATH", "/v1/forecast"),
            weather_timeout_secs: var_or("WEATHER_TIMEOUT_SECS", "10")
                .parse()
                .map_err(|_| anyhow::anyhow!("WEATHER_TIMEOUT_SECS must be a whole number of seconds"))?,
            refresh_cooldown_secs,
        })
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_secs(self.weather_timeout_secs)
    }

    // Range is checked at load time; saturate if the field was changed since.
    pub fn refresh_cooldown(&self) -> chrono::Duration {
        cooldown_duration(self.refresh_cooldown_secs).unwrap_or(chrono::Duration::MAX)
    }

    pub fn forecast_url(&self) -> String {
        format!("{}{}", self.open_meteo_base_url, self.open_meteo_forecast_path)
    }
}

fn cooldown_duration(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds)
}
