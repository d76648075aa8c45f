use super::daily::{condition_from_openweather, group_into_days, rain_volume};
use super::types::*;
use crate::fallback::{Decline, Provider};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Error, Debug)]
pub enum OpenWeatherError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("Rate limited, retry after: {0}s")]
    RateLimited(u64),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("API key not set")]
    MissingApiKey,
}

impl From<OpenWeatherError> for Decline {
    fn from(err: OpenWeatherError) -> Self {
        match err {
            OpenWeatherError::MissingApiKey => Decline::NotConfigured,
            other => Decline::Failed(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub current_path: String,
    pub forecast3h_path: String,
    pub forecast_days: u32,
    pub timeout: Duration,
}

pub struct OpenWeatherClient {
    client: Client,
    settings: OpenWeatherSettings,
}

impl OpenWeatherClient {
    pub fn new(settings: OpenWeatherSettings) -> Result<Self, OpenWeatherError> {
        let client = Client::builder()
            .user_agent("AgriConnect/1.0")
            .timeout(settings.timeout)
            .build()?;

        Ok(Self { client, settings })
    }

    pub async fn get_current(&self, coords: Coordinates) -> Result<CurrentWeatherResponse, OpenWeatherError> {
        let url = format!("{}{}", self.settings.base_url, self.settings.current_path);
        let response = self.make_request_with_retry(&url, coords).await?;
        Ok(serde_json::from_value(response)?)
    }

    pub async fn get_forecast3h(&self, coords: Coordinates) -> Result<Forecast3hResponse, OpenWeatherError> {
        let url = format!("{}{}", self.settings.base_url, self.settings.forecast3h_path);
        let response = self.make_request_with_retry(&url, coords).await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn make_request_with_retry(
        &self,
        url: &str,
        coords: Coordinates,
    ) -> Result<Value, OpenWeatherError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(OpenWeatherError::MissingApiKey)?;
        let lat = coords.lat.to_string();
        let lon = coords.lon.to_string();
        let params = [
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("units", "metric"),
            ("appid", api_key),
        ];

        let mut retry_count = 0;
        let max_retries = 2;
        let mut delay = Duration::from_millis(500);

        loop {
            let response = self.client.get(url).query(&params).send().await?;

            match response.status() {
                reqwest::StatusCode::OK => {
                    let json: Value = response.json().await?;
                    return Ok(json);
                }
                reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    if retry_count >= max_retries {
                        return Err(OpenWeatherError::RateLimited(delay.as_secs()));
                    }

                    tracing::warn!(
                        "Rate limited by OpenWeather API, retrying in {}ms",
                        delay.as_millis()
                    );

                    sleep(delay).await;
                    delay = delay.mul_f32(2.0 + fastrand::f32() * 0.5); // Exponential backoff with jitter
                    retry_count += 1;
                }
                status => {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(OpenWeatherError::ApiError(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )));
                }
            }
        }
    }
}

pub fn to_observation(
    current: &CurrentWeatherResponse,
    forecast: &Forecast3hResponse,
    max_days: usize,
) -> Observation {
    let observed_at = chrono::DateTime::from_timestamp(current.dt, 0).unwrap_or_default();
    let condition = current
        .weather
        .first()
        .map(|w| condition_from_openweather(&w.main))
        .unwrap_or_else(|| "Unknown".to_string());

    Observation {
        name: current
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| Some(forecast.city.name.clone()).filter(|n| !n.is_empty())),
        current: CurrentConditions {
            temp_c: current.main.temp,
            humidity: current.main.humidity,
            wind_ms: current.wind.speed,
            cloud: current.clouds.all / 100.0, // Convert percentage to 0-1
            rain_mm: rain_volume(&current.rain, "1h"),
            condition,
            observed_at,
        },
        daily: group_into_days(&forecast.list, forecast.city.timezone, max_days),
    }
}

#[async_trait]
impl Provider<Coordinates, Observation> for OpenWeatherClient {
    fn name(&self) -> &str {
        "openweather"
    }

    fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    async fn fetch(&self, coords: &Coordinates) -> Result<Observation, Decline> {
        let (current, forecast) =
            tokio::try_join!(self.get_current(*coords), self.get_forecast3h(*coords))?;

        if forecast.list.is_empty() {
            return Err(Decline::Empty);
        }

        Ok(to_observation(
            &current,
            &forecast,
            self.settings.forecast_days as usize,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn settings(api_key: Option<&str>) -> OpenWeatherSettings {
        OpenWeatherSettings {
            api_key: api_key.map(str::to_string),
            // Nothing listens on the discard port.
            base_url: "http://127.0.0.1:9".to_string(),
            current_path: "/data/2.5/weather".to_string(),
            forecast3h_path: "/data/2.5/forecast".to_string(),
            forecast_days: 5,
            timeout: Duration::from_secs(2),
        }
    }

    fn current_payload() -> serde_json::Value {
        json!({
            "dt": 1705312800,
            "name": "Gaborone",
            "timezone": 7200,
            "main": { "temp": 31.2, "temp_min": 30.0, "temp_max": 32.0, "humidity": 38.0, "pressure": 1012 },
            "weather": [{ "id": 802, "main": "Clouds", "description": "scattered clouds", "icon": "03d" }],
            "clouds": { "all": 40 },
            "wind": { "speed": 4.1, "deg": 60 },
            "rain": { "1h": 0.3 }
        })
    }

    /// Answers one connection per canned response, in order.
    async fn serve_in_order(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);

                let mut request = vec![0u8; 4096];
                let _ = socket.read(&mut request).await;

                let reason = if status == 200 { "OK" } else { "Too Many Requests" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), hits)
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let (base_url, hits) = serve_in_order(vec![
            (429, "{}".to_string()),
            (429, "{}".to_string()),
            (200, current_payload().to_string()),
        ])
        .await;
        let client = OpenWeatherClient::new(OpenWeatherSettings {
            base_url,
            ..settings(Some("key"))
        })
        .unwrap();

        let current = client.get_current(Coordinates::new(-24.65, 25.90)).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(current.name.as_deref(), Some("Gaborone"));
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_retries() {
        let (base_url, hits) = serve_in_order(vec![
            (429, "{}".to_string()),
            (429, "{}".to_string()),
            (429, "{}".to_string()),
        ])
        .await;
        let client = OpenWeatherClient::new(OpenWeatherSettings {
            base_url,
            ..settings(Some("key"))
        })
        .unwrap();

        let result = client.get_current(Coordinates::new(-24.65, 25.90)).await;

        assert!(matches!(result, Err(OpenWeatherError::RateLimited(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unconfigured_without_key() {
        let client = OpenWeatherClient::new(settings(None)).unwrap();
        assert!(!client.is_configured());
        assert_eq!(client.name(), "openweather");
    }

    #[tokio::test]
    async fn test_missing_key_declines_as_not_configured() {
        let client = OpenWeatherClient::new(settings(None)).unwrap();
        let result = client.fetch(&Coordinates::new(-24.65, 25.90)).await;
        assert!(matches!(result, Err(Decline::NotConfigured)));
    }

    #[tokio::test]
    async fn test_unreachable_api_declines_as_failed() {
        let client = OpenWeatherClient::new(settings(Some("key"))).unwrap();
        let result = client.fetch(&Coordinates::new(-24.65, 25.90)).await;
        assert!(matches!(result, Err(Decline::Failed(_))));
    }

    #[test]
    fn test_to_observation_parses_api_payloads() {
        let current: CurrentWeatherResponse = serde_json::from_value(current_payload()).unwrap();
        let forecast: Forecast3hResponse = serde_json::from_value(json!({
            "cod": "200",
            "cnt": 2,
            "list": [
                {
                    "dt": 1705323600,
                    "main": { "temp": 29.0, "temp_min": 28.0, "temp_max": 30.0, "humidity": 45.0 },
                    "weather": [{ "id": 500, "main": "Rain", "description": "light rain" }],
                    "clouds": { "all": 75 },
                    "wind": { "speed": 3.0 },
                    "pop": 0.62,
                    "rain": { "3h": 2.4 }
                },
                {
                    "dt": 1705334400,
                    "main": { "temp": 24.0, "temp_min": 23.5, "temp_max": 24.5, "humidity": 60.0 },
                    "weather": [{ "id": 500, "main": "Rain", "description": "light rain" }],
                    "clouds": { "all": 90 },
                    "wind": { "speed": 2.0 }
                }
            ],
            "city": { "id": 933773, "name": "Gaborone", "country": "BW", "timezone": 7200 }
        }))
        .unwrap();

        let observation = to_observation(&current, &forecast, 5);

        assert_eq!(observation.name.as_deref(), Some("Gaborone"));
        assert_eq!(observation.current.condition, "Cloudy");
        assert!((observation.current.cloud - 0.4).abs() < 1e-9);
        assert_eq!(observation.current.rain_mm, 0.3);
        assert_eq!(observation.daily.len(), 1);
        assert_eq!(observation.daily[0].rain_probability, 0.62);
        assert_eq!(observation.daily[0].temp_max_c, 30.0);
    }
}
