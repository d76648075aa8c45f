pub mod advisory;
pub mod climate;
pub mod daily;
pub mod open_meteo;
pub mod openweather;
pub mod regions;
pub mod types;

use crate::cache::{Clock, TtlCache};
use crate::config::Config;
use crate::fallback::{FallbackChain, Resolved};
use climate::ClimateNormals;
use open_meteo::OpenMeteoClient;
use openweather::{OpenWeatherClient, OpenWeatherSettings};
use std::sync::Arc;
use thiserror::Error;
use types::*;

pub type WeatherCache = TtlCache<WeatherReport>;
pub type WeatherChain = FallbackChain<Coordinates, Observation>;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Invalid coordinates: lat {lat}, lon {lon}. Latitude must be between -90 and 90, longitude between -180 and 180")]
    InvalidCoordinates { lat: f64, lon: f64 },
}

/// OpenWeather, then Open-Meteo, then climate normals.
pub fn build_chain(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<WeatherChain> {
    let openweather = OpenWeatherClient::new(OpenWeatherSettings {
        api_key: config.openweather_api_key.clone(),
        base_url: config.openweather_base_url.clone(),
        current_path: config.openweather_current_path.clone(),
        forecast3h_path: config.openweather_forecast3h_path.clone(),
        forecast_days: config.forecast_days,
        timeout: config.http_timeout,
    })?;
    let open_meteo = OpenMeteoClient::new(
        config.open_meteo_base_url.clone(),
        config.forecast_days,
        config.open_meteo_enabled,
        config.http_timeout,
    )?;
    let climate = ClimateNormals::new(clock, config.app_timezone, config.forecast_days);

    Ok(WeatherChain::new(Arc::new(climate))
        .with_provider(Arc::new(openweather))
        .with_provider(Arc::new(open_meteo)))
}

pub struct WeatherService {
    cache: Arc<WeatherCache>,
    chain: WeatherChain,
    clock: Arc<dyn Clock>,
}

impl WeatherService {
    pub fn new(cache: Arc<WeatherCache>, chain: WeatherChain, clock: Arc<dyn Clock>) -> Self {
        Self { cache, chain, clock }
    }

    pub fn providers(&self) -> Vec<&str> {
        self.chain.provider_names()
    }

    /// Serves a cached report while fresh, otherwise walks the provider chain.
    /// Only answers from external providers are cached, so a climate
    /// estimate never hides a recovered API.
    pub async fn get_weather(&self, coords: Coordinates) -> Result<WeatherReport, WeatherError> {
        validate_coordinates(coords)?;

        let key = coords.cache_key();
        if let Some(mut report) = self.cache.get(&key) {
            tracing::debug!("Weather cache hit for {}", key);
            // The entry may have been stored for a nearby point with the same key.
            report.location.lat = coords.lat;
            report.location.lon = coords.lon;
            return Ok(report);
        }

        let resolved = self.chain.resolve(&coords).await;
        let from_fallback = resolved.from_fallback;
        let report = into_report(coords, resolved, self.clock.now());

        if from_fallback {
            tracing::warn!("Serving climate estimate for {}", key);
        } else {
            self.cache.put(key, report.clone());
        }

        Ok(report)
    }
}

fn into_report(
    coords: Coordinates,
    resolved: Resolved<Observation>,
    fetched_at: chrono::DateTime<chrono::Utc>,
) -> WeatherReport {
    let observation = resolved.value;
    let advisories = advisory::farming_advisories(&observation.current, &observation.daily);
    let name = observation.name.or_else(|| nearest_region_name(coords));

    WeatherReport {
        location: Location {
            lat: coords.lat,
            lon: coords.lon,
            name,
        },
        current: observation.current,
        forecast: observation.daily,
        advisories,
        source: resolved.source,
        fetched_at,
    }
}

/// Names the location after a known town within ~25 km.
fn nearest_region_name(coords: Coordinates) -> Option<String> {
    regions::REGIONS
        .iter()
        .map(|r| (r, haversine_distance(coords.lat, coords.lon, r.lat, r.lon)))
        .filter(|(_, km)| *km <= 25.0)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(r, _)| r.name.to_string())
}

pub fn validate_coordinates(coords: Coordinates) -> Result<(), WeatherError> {
    if (-90.0..=90.0).contains(&coords.lat) && (-180.0..=180.0).contains(&coords.lon) {
        Ok(())
    } else {
        Err(WeatherError::InvalidCoordinates {
            lat: coords.lat,
            lon: coords.lon,
        })
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}


#[cfg(test)]
mod tests {
    use super::testing::sample_observation;
    use super::*;
    use crate::cache::ManualClock;
    use crate::fallback::testing::ScriptedProvider;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(30 * 60);

    struct Fixture {
        service: WeatherService,
        clock: Arc<ManualClock>,
        primary: Arc<ScriptedProvider<Observation>>,
    }

    fn fixture(primary: ScriptedProvider<Observation>) -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap(),
        ));
        let primary = Arc::new(primary);
        let chain = WeatherChain::new(Arc::new(ClimateNormals::new(
            clock.clone(),
            chrono_tz::Africa::Gaborone,
            5,
        )))
        .with_provider(primary.clone());
        let cache = Arc::new(WeatherCache::with_clock(TTL, clock.clone()));

        Fixture {
            service: WeatherService::new(cache, chain, clock.clone()),
            clock,
            primary,
        }
    }

    #[tokio::test]
    async fn test_cached_within_ttl_then_refetched() {
        let f = fixture(ScriptedProvider::answering("openweather", sample_observation()));
        let coords = Coordinates::new(-24.65, 25.90);

        let first = f.service.get_weather(coords).await.unwrap();
        f.clock.advance(Duration::from_secs(5 * 60));
        let second = f.service.get_weather(coords).await.unwrap();

        assert_eq!(f.primary.calls(), 1);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );

        f.clock.advance(Duration::from_secs(26 * 60));
        f.service.get_weather(coords).await.unwrap();
        assert_eq!(f.primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_nearby_coordinates_share_entry() {
        let f = fixture(ScriptedProvider::answering("openweather", sample_observation()));

        f.service.get_weather(Coordinates::new(-24.651, 25.899)).await.unwrap();
        f.service.get_weather(Coordinates::new(-24.649, 25.901)).await.unwrap();

        assert_eq!(f.primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_shared_entry_reports_requested_location() {
        let f = fixture(ScriptedProvider::answering("openweather", sample_observation()));

        let first = f.service.get_weather(Coordinates::new(-24.651, 25.899)).await.unwrap();
        let second = f.service.get_weather(Coordinates::new(-24.649, 25.901)).await.unwrap();

        assert_eq!(f.primary.calls(), 1);
        assert_eq!((first.location.lat, first.location.lon), (-24.651, 25.899));
        assert_eq!((second.location.lat, second.location.lon), (-24.649, 25.901));
        assert_eq!(second.location.name, first.location.name);
        assert_eq!(second.current, first.current);
    }

    #[tokio::test]
    async fn test_fallback_answer_is_not_cached() {
        let f = fixture(ScriptedProvider::failing("openweather"));
        let coords = Coordinates::new(-24.65, 25.90);

        let report = f.service.get_weather(coords).await.unwrap();
        assert_eq!(report.source, "climate");
        assert!(!report.forecast.is_empty());
        assert!(!report.advisories.is_empty());

        f.service.get_weather(coords).await.unwrap();
        assert_eq!(f.primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_falls_back() {
        let f = fixture(
            ScriptedProvider::answering("openweather", sample_observation()).unconfigured(),
        );
        let report = f
            .service
            .get_weather(Coordinates::new(-19.98, 23.42))
            .await
            .unwrap();

        assert_eq!(report.source, "climate");
        assert_eq!(report.location.name.as_deref(), Some("Maun"));
        assert_eq!(f.primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_report_carries_source_and_advisories() {
        let f = fixture(ScriptedProvider::answering("openweather", sample_observation()));
        let report = f
            .service
            .get_weather(Coordinates::new(-24.65, 25.90))
            .await
            .unwrap();

        assert_eq!(report.source, "openweather");
        assert_eq!(report.fetched_at, f.clock.now());
        assert_eq!(report.location.name.as_deref(), Some("Gaborone"));
        assert_eq!(report.forecast.len(), 1);
        assert_eq!(report.advisories, vec!["Conditions are favourable for routine field work."]);
    }

    #[tokio::test]
    async fn test_invalid_coordinates_rejected_before_fetch() {
        let f = fixture(ScriptedProvider::answering("openweather", sample_observation()));

        let result = f.service.get_weather(Coordinates::new(91.0, 25.0)).await;
        assert!(matches!(result, Err(WeatherError::InvalidCoordinates { .. })));
        assert!(f.service.get_weather(Coordinates::new(f64::NAN, 25.0)).await.is_err());
        assert_eq!(f.primary.calls(), 0);
    }

    #[test]
    fn test_haversine_distance() {
        // Gaborone to Francistown is roughly 415 km.
        let distance = haversine_distance(-24.6282, 25.9231, -21.1700, 27.5078);
        assert!((distance - 415.0).abs() < 40.0);
    }

    #[test]
    fn test_chain_order_from_config() {
        let config = Config::for_tests();
        let chain = build_chain(&config, Arc::new(crate::cache::SystemClock)).unwrap();
        assert_eq!(chain.provider_names(), vec!["openweather", "open-meteo", "climate"]);
    }
}
