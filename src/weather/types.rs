use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Two decimals groups requests roughly a kilometre apart.
    pub fn cache_key(&self) -> String {
        format!("{:.2}_{:.2}", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentConditions {
    pub temp_c: f64,
    pub humidity: f64,
    pub wind_ms: f64,
    /// Cloud cover, 0-1.
    pub cloud: f64,
    pub rain_mm: f64,
    pub condition: String,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub rain_mm: f64,
    /// 0-1.
    pub rain_probability: f64,
    pub condition: String,
}

/// What a weather provider hands back before the service stamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub name: Option<String>,
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherReport {
    pub location: Location,
    pub current: CurrentConditions,
    pub forecast: Vec<DailyForecast>,
    pub advisories: Vec<String>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

// OpenWeather wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherResponse {
    pub dt: i64,
    pub name: Option<String>,
    pub timezone: Option<i32>,
    pub main: OwMain,
    pub weather: Vec<OwWeather>,
    pub clouds: OwClouds,
    pub wind: OwWind,
    pub rain: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast3hResponse {
    pub cnt: i32,
    pub list: Vec<Forecast3hItem>,
    pub city: Forecast3hCity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast3hItem {
    pub dt: i64,
    pub main: OwMain,
    pub weather: Vec<OwWeather>,
    pub clouds: OwClouds,
    pub wind: OwWind,
    #[serde(default)]
    pub pop: f64,
    pub rain: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwMain {
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwWeather {
    pub id: i32,
    pub main: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwClouds {
    pub all: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwWind {
    pub speed: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast3hCity {
    pub name: String,
    pub country: Option<String>,
    pub timezone: i32,
}

// Open-Meteo wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMeteoResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub utc_offset_seconds: i32,
    pub current: OpenMeteoCurrent,
    pub daily: OpenMeteoDaily,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMeteoCurrent {
    pub time: String,
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub wind_speed_10m: f64,
    pub cloud_cover: f64,
    pub precipitation: f64,
    pub weather_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMeteoDaily {
    pub time: Vec<NaiveDate>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
    pub precipitation_sum: Vec<Option<f64>>,
    pub precipitation_probability_max: Vec<Option<f64>>,
    pub weather_code: Vec<Option<i32>>,
}
