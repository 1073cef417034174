use super::types::ForecastResponse;
use super::{WeatherClient, WeatherError};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 200;

pub struct OpenMeteoClient {
    client: Client,
    forecast_url: String,
}

impl OpenMeteoClient {
    pub fn new(config: &Config) -> Result<Self, WeatherError> {
        Self::with_url(config.forecast_url(), config.weather_timeout())
    }

    pub fn with_url(forecast_url: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .user_agent("CityWeatherServer/1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            forecast_url: forecast_url.into(),
        })
    }

    pub async fn get_current_weather(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<ForecastResponse, WeatherError> {
        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // The status alone classifies the failure; the body is best effort.
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::UpstreamUnavailable {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| WeatherError::MalformedResponse(format!("invalid JSON: {}", e)))
    }
}

#[async_trait]
impl WeatherClient for OpenMeteoClient {
    async fn current_temperature(&self, latitude: f64, longitude: f64) -> Result<f64, WeatherError> {
        let forecast = self.get_current_weather(latitude, longitude).await?;
        tracing::debug!(
            "Open-Meteo reading for ({}, {}) observed at {}",
            latitude,
            longitude,
            forecast.observed_at().unwrap_or("unknown time")
        );

        forecast.temperature().ok_or_else(|| {
            WeatherError::MalformedResponse("missing current_weather.temperature".to_string())
        })
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY {
        let head: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", head)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> OpenMeteoClient {
        OpenMeteoClient::with_url(format!("{}/v1/forecast", server.uri()), Duration::from_secs(2))
            .expect("client construction should not fail")
    }

    #[tokio::test]
    async fn test_returns_current_temperature() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "48.85"))
            .and(query_param("longitude", "2.35"))
            .and(query_param("current_weather", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "latitude": 48.86,
                "longitude": 2.34,
                "current_weather": {
                    "temperature": 12.4,
                    "windspeed": 9.7,
                    "weathercode": 3,
                    "time": "2026-10-17T09:00"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let temp = test_client(&server).current_temperature(48.85, 2.35).await.unwrap();
        assert_eq!(temp, 12.4);
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = test_client(&server).current_temperature(0.0, 0.0).await.unwrap_err();
        match err {
            WeatherError::UpstreamUnavailable { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_error_body_is_still_upstream_unavailable() {
        let server = MockServer::start().await;

        // Content-Length promises more bytes than are sent, so reading the body fails.
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(502)
                    .insert_header("content-length", "64")
                    .set_body_string("gateway"),
            )
            .mount(&server)
            .await;

        let err = test_client(&server).current_temperature(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::UpstreamUnavailable { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_missing_temperature_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "latitude": 0.0,
                "longitude": 0.0,
                "current_weather": { "windspeed": 3.0 }
            })))
            .mount(&server)
            .await;

        let err = test_client(&server).current_temperature(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = test_client(&server).current_temperature(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "current_weather": { "temperature": 1.0 } }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = OpenMeteoClient::with_url(
            format!("{}/v1/forecast", server.uri()),
            Duration::from_millis(50),
        )
        .unwrap();

        let err = client.current_temperature(0.0, 0.0).await.unwrap_err();
        match err {
            WeatherError::Network(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client =
            OpenMeteoClient::with_url(format!("http://{}/v1/forecast", addr), Duration::from_secs(1)).unwrap();

        let err = client.current_temperature(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::Network(_)));
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(250);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.len(), MAX_ERROR_BODY + 3);
        assert!(truncated.ends_with("..."));
    }
}
