use super::{WeatherClient, WeatherError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockReply {
    Temperature(f64),
    DelayedTemperature(f64, Duration),
    NetworkFailure,
    Unavailable(u16),
    Malformed,
}

/// Scripted weather client keyed by coordinates. Unscripted coordinates fail
/// as malformed so a missing script entry shows up in assertions.
pub struct MockWeatherClient {
    replies: HashMap<String, MockReply>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(f64, f64)>>,
}

impl MockWeatherClient {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(mut self, lat: f64, lon: f64, reply: MockReply) -> Self {
        self.replies.insert(coord_key(lat, lon), reply);
        self
    }

    pub fn with_temperature(self, lat: f64, lon: f64, temp: f64) -> Self {
        self.with_reply(lat, lon, MockReply::Temperature(temp))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_coordinates(&self) -> Vec<(f64, f64)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl WeatherClient for MockWeatherClient {
    async fn current_temperature(&self, latitude: f64, longitude: f64) -> Result<f64, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((latitude, longitude));

        match self.replies.get(&coord_key(latitude, longitude)).cloned() {
            Some(MockReply::Temperature(temp)) => Ok(temp),
            Some(MockReply::DelayedTemperature(temp, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(temp)
            }
            Some(MockReply::NetworkFailure) => Err(network_error()),
            Some(MockReply::Unavailable(status)) => Err(WeatherError::UpstreamUnavailable {
                status,
                body: "mock outage".to_string(),
            }),
            Some(MockReply::Malformed) | None => Err(WeatherError::MalformedResponse(
                "missing current_weather.temperature".to_string(),
            )),
        }
    }
}

fn coord_key(lat: f64, lon: f64) -> String {
    format!("{:.4}_{:.4}", lat, lon)
}

// reqwest has no public constructor for its error type; a relative URL fails
// at build time without touching the network.
fn network_error() -> WeatherError {
    match reqwest::Client::new().get("not-a-url").build() {
        Err(e) => WeatherError::Network(e),
        Ok(_) => WeatherError::MalformedResponse("expected a request build failure".to_string()),
    }
}
