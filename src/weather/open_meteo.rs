use super::daily::condition_from_wmo;
use super::types::*;
use crate::fallback::{Decline, Provider};
use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,wind_speed_10m,cloud_cover,precipitation,weather_code";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,precipitation_probability_max,weather_code";

#[derive(Error, Debug)]
pub enum OpenMeteoError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl From<OpenMeteoError> for Decline {
    fn from(err: OpenMeteoError) -> Self {
        Decline::Failed(err.to_string())
    }
}

/// Keyless forecast API, used when OpenWeather is unavailable.
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    forecast_days: u32,
    enabled: bool,
}

impl OpenMeteoClient {
    pub fn new(
        base_url: String,
        forecast_days: u32,
        enabled: bool,
        timeout: Duration,
    ) -> Result<Self, OpenMeteoError> {
        let client = Client::builder()
            .user_agent("AgriConnect/1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            forecast_days,
            enabled,
        })
    }

    pub async fn get_forecast(&self, coords: Coordinates) -> Result<OpenMeteoResponse, OpenMeteoError> {
        let url = format!("{}/v1/forecast", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", coords.lat.to_string()),
                ("longitude", coords.lon.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("wind_speed_unit", "ms".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", self.forecast_days.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OpenMeteoError::ApiError(format!("HTTP {}: {}", status, error_text)));
        }

        Ok(response.json().await?)
    }
}

pub fn to_observation(response: &OpenMeteoResponse) -> Result<Observation, OpenMeteoError> {
    let current = &response.current;
    // `time` is local wall-clock time at the location.
    let observed_at = NaiveDateTime::parse_from_str(&current.time, "%Y-%m-%dT%H:%M")
        .map(|naive| {
            Utc.from_utc_datetime(&naive) - chrono::Duration::seconds(response.utc_offset_seconds as i64)
        })
        .map_err(|_| OpenMeteoError::InvalidTimestamp(current.time.clone()))?;

    let daily = &response.daily;
    let forecast = daily
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, date)| {
            let temp_max_c = daily.temperature_2m_max.get(i).copied().flatten()?;
            let temp_min_c = daily.temperature_2m_min.get(i).copied().flatten()?;
            Some(DailyForecast {
                date: *date,
                temp_min_c,
                temp_max_c,
                rain_mm: daily.precipitation_sum.get(i).copied().flatten().unwrap_or(0.0),
                rain_probability: daily
                    .precipitation_probability_max
                    .get(i)
                    .copied()
                    .flatten()
                    .unwrap_or(0.0)
                    / 100.0,
                condition: daily
                    .weather_code
                    .get(i)
                    .copied()
                    .flatten()
                    .map(condition_from_wmo)
                    .unwrap_or_else(|| "Unknown".to_string()),
            })
        })
        .collect();

    Ok(Observation {
        name: None,
        current: CurrentConditions {
            temp_c: current.temperature_2m,
            humidity: current.relative_humidity_2m,
            wind_ms: current.wind_speed_10m,
            cloud: current.cloud_cover / 100.0,
            rain_mm: current.precipitation,
            condition: condition_from_wmo(current.weather_code),
            observed_at,
        },
        daily: forecast,
    })
}

#[async_trait]
impl Provider<Coordinates, Observation> for OpenMeteoClient {
    fn name(&self) -> &str {
        "open-meteo"
    }

    fn is_configured(&self) -> bool {
        self.enabled
    }

    async fn fetch(&self, coords: &Coordinates) -> Result<Observation, Decline> {
        let response = self.get_forecast(*coords).await?;
        let observation = to_observation(&response)?;
        if observation.daily.is_empty() {
            return Err(Decline::Empty);
        }
        Ok(observation)
    }
}
