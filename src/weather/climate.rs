use super::types::*;
use crate::cache::Clock;
use crate::fallback::Fallback;
use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::Tz;
use std::sync::Arc;

/// Latitude of Gaborone, which the monthly normals describe.
const BASELINE_LAT: f64 = -24.65;

/// Gaborone monthly climate normals, January first.
struct MonthlyNormal {
    temp_max_c: f64,
    temp_min_c: f64,
    rain_mm: f64,
    rain_days: f64,
    humidity: f64,
    wind_ms: f64,
}

const NORMALS: [MonthlyNormal; 12] = [
    MonthlyNormal { temp_max_c: 32.0, temp_min_c: 19.0, rain_mm: 95.0, rain_days: 9.0, humidity: 60.0, wind_ms: 3.0 },
    MonthlyNormal { temp_max_c: 31.0, temp_min_c: 18.5, rain_mm: 80.0, rain_days: 8.0, humidity: 62.0, wind_ms: 2.8 },
    MonthlyNormal { temp_max_c: 29.5, temp_min_c: 16.5, rain_mm: 70.0, rain_days: 7.0, humidity: 60.0, wind_ms: 2.6 },
    MonthlyNormal { temp_max_c: 27.0, temp_min_c: 12.0, rain_mm: 45.0, rain_days: 4.0, humidity: 55.0, wind_ms: 2.4 },
    MonthlyNormal { temp_max_c: 24.0, temp_min_c: 6.5, rain_mm: 15.0, rain_days: 2.0, humidity: 45.0, wind_ms: 2.3 },
    MonthlyNormal { temp_max_c: 21.5, temp_min_c: 3.0, rain_mm: 5.0, rain_days: 1.0, humidity: 40.0, wind_ms: 2.3 },
    MonthlyNormal { temp_max_c: 22.0, temp_min_c: 2.5, rain_mm: 2.0, rain_days: 0.5, humidity: 35.0, wind_ms: 2.6 },
    MonthlyNormal { temp_max_c: 25.0, temp_min_c: 5.5, rain_mm: 5.0, rain_days: 1.0, humidity: 30.0, wind_ms: 3.2 },
    MonthlyNormal { temp_max_c: 29.0, temp_min_c: 11.0, rain_mm: 15.0, rain_days: 2.0, humidity: 30.0, wind_ms: 3.8 },
    MonthlyNormal { temp_max_c: 31.0, temp_min_c: 15.5, rain_mm: 40.0, rain_days: 5.0, humidity: 38.0, wind_ms: 3.8 },
    MonthlyNormal { temp_max_c: 31.5, temp_min_c: 17.0, rain_mm: 60.0, rain_days: 7.0, humidity: 48.0, wind_ms: 3.4 },
    MonthlyNormal { temp_max_c: 32.0, temp_min_c: 18.5, rain_mm: 85.0, rain_days: 8.0, humidity: 55.0, wind_ms: 3.1 },
];

/// Terminal weather source: seasonal climate normals for Botswana,
/// computed locally from the date and latitude.
pub struct ClimateNormals {
    clock: Arc<dyn Clock>,
    timezone: Tz,
    forecast_days: u32,
}

impl ClimateNormals {
    pub fn new(clock: Arc<dyn Clock>, timezone: Tz, forecast_days: u32) -> Self {
        Self {
            clock,
            timezone,
            forecast_days,
        }
    }

    fn day(&self, date: NaiveDate, lat: f64) -> DailyForecast {
        let normal = &NORMALS[date.month0() as usize];
        // Warmer towards the equator, roughly 0.3°C per degree.
        let shift = (lat - BASELINE_LAT) * 0.3;
        let days_in_month = 30.0;

        DailyForecast {
            date,
            temp_min_c: round1(normal.temp_min_c + shift),
            temp_max_c: round1(normal.temp_max_c + shift),
            rain_mm: round1(normal.rain_mm / days_in_month),
            rain_probability: round1(normal.rain_days / days_in_month),
            condition: condition_for(normal).to_string(),
        }
    }
}

impl Fallback<Coordinates, Observation> for ClimateNormals {
    fn name(&self) -> &str {
        "climate"
    }

    fn produce(&self, coords: &Coordinates) -> Observation {
        let now = self.clock.now();
        let today = now.with_timezone(&self.timezone).date_naive();

        let daily: Vec<DailyForecast> = (0..self.forecast_days.max(1) as i64)
            .map(|offset| self.day(today + Duration::days(offset), coords.lat))
            .collect();

        let normal = &NORMALS[today.month0() as usize];
        let shift = (coords.lat - BASELINE_LAT) * 0.3;

        Observation {
            name: None,
            current: CurrentConditions {
                temp_c: round1((normal.temp_max_c + normal.temp_min_c) / 2.0 + shift),
                humidity: normal.humidity,
                wind_ms: normal.wind_ms,
                cloud: round1((normal.rain_days / 10.0).min(0.8)),
                rain_mm: 0.0,
                condition: condition_for(normal).to_string(),
                observed_at: now,
            },
            daily,
        }
    }
}

fn condition_for(normal: &MonthlyNormal) -> &'static str {
    if normal.rain_days >= 7.0 {
        "Partly Cloudy"
    } else if normal.rain_days >= 3.0 {
        "Mostly Clear"
    } else {
        "Clear"
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
