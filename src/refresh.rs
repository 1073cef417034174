//! Refresh cycle: cooldown check, concurrent fetch for every city, and a
//! single all-or-nothing write of the results.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::cooldown;
use crate::database::{CityStore, DatabaseError, TemperatureUpdate};
use crate::forecast::{WeatherClient, WeatherError};

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Last refresh was less than {cooldown_secs}s ago, retry in {}s", .retry_after.num_seconds())]
    CooldownActive { retry_after: Duration, cooldown_secs: i64 },
    #[error("No cities to refresh")]
    NoCities,
    #[error(transparent)]
    Weather(#[from] WeatherError),
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub updated: usize,
    pub refreshed_at: DateTime<Utc>,
}

pub struct RefreshService {
    store: Arc<dyn CityStore>,
    client: Arc<dyn WeatherClient>,
    cooldown: Duration,
    in_flight: Mutex<()>,
}

impl RefreshService {
    pub fn new(store: Arc<dyn CityStore>, client: Arc<dyn WeatherClient>, cooldown: Duration) -> Self {
        Self {
            store,
            client,
            cooldown,
            in_flight: Mutex::new(()),
        }
    }

    /// Runs one cycle against the wall clock. The cooldown is checked once the
    /// lock is held and the batch is stamped after every fetch has finished.
    pub async fn refresh_all(&self) -> Result<RefreshSummary, RefreshError> {
        self.run_cycle(Utc::now).await
    }

    /// Runs one cycle as of `now`, which is used for both the cooldown check
    /// and the stored timestamp. Callers are serialized; a caller that had to
    /// wait sees the state the previous cycle wrote.
    pub async fn refresh_all_at(&self, now: DateTime<Utc>) -> Result<RefreshSummary, RefreshError> {
        self.run_cycle(move || now).await
    }

    async fn run_cycle<C>(&self, clock: C) -> Result<RefreshSummary, RefreshError>
    where
        C: Fn() -> DateTime<Utc> + Send + Sync,
    {
        let _guard = self.in_flight.lock().await;

        let cities = self.store.list_cities().await?;
        let now = clock();

        if let Some(retry_after) = cooldown::remaining(cities.iter().map(|c| c.updated_at), now, self.cooldown) {
            tracing::warn!(
                "Refresh rejected, cooldown active for another {}s",
                retry_after.num_seconds()
            );
            return Err(RefreshError::CooldownActive {
                retry_after,
                cooldown_secs: self.cooldown.num_seconds(),
            });
        }

        if cities.is_empty() {
            return Err(RefreshError::NoCities);
        }

        tracing::info!("Refreshing temperatures for {} cities", cities.len());

        let fetches = cities
            .iter()
            .map(|city| self.client.current_temperature(city.latitude, city.longitude));
        let results = join_all(fetches).await;

        let mut readings = Vec::with_capacity(cities.len());
        let mut first_error = None;
        for (city, result) in cities.iter().zip(results) {
            match result {
                Ok(temperature) => readings.push((city.id, temperature)),
                Err(e) => {
                    tracing::warn!("Failed to fetch temperature for {}: {}", city.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        // One failed city discards the whole cycle.
        if let Some(e) = first_error {
            tracing::error!("Refresh aborted, no temperatures were written");
            return Err(e.into());
        }

        let refreshed_at = clock();
        let updates: Vec<_> = readings
            .into_iter()
            .map(|(city_id, temperature)| TemperatureUpdate {
                city_id,
                temperature,
                updated_at: refreshed_at,
            })
            .collect();

        self.store.apply_temperature_batch(&updates).await?;

        tracing::info!("Refreshed temperatures for {} cities", updates.len());

        Ok(RefreshSummary {
            updated: updates.len(),
            refreshed_at,
        })
    }
}
