use super::types::*;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::BTreeMap;

/// Groups 3-hourly forecast steps into one entry per local calendar day.
pub fn group_into_days(
    items: &[Forecast3hItem],
    timezone_offset: i32,
    max_days: usize,
) -> Vec<DailyForecast> {
    let offset = FixedOffset::east_opt(timezone_offset).unwrap_or_else(|| Utc.fix());

    let mut days: BTreeMap<NaiveDate, Vec<&Forecast3hItem>> = BTreeMap::new();
    for item in items {
        let Some(ts) = DateTime::from_timestamp(item.dt, 0) else {
            continue;
        };
        let local_date = ts.with_timezone(&offset).date_naive();
        days.entry(local_date).or_default().push(item);
    }

    days.into_iter()
        .take(max_days)
        .map(|(date, steps)| summarize_day(date, &steps))
        .collect()
}

fn summarize_day(date: NaiveDate, steps: &[&Forecast3hItem]) -> DailyForecast {
    let temp_min_c = steps
        .iter()
        .map(|s| s.main.temp_min)
        .fold(f64::INFINITY, f64::min);
    let temp_max_c = steps
        .iter()
        .map(|s| s.main.temp_max)
        .fold(f64::NEG_INFINITY, f64::max);
    // Max probability in the day, total expected rain
    let rain_probability = steps.iter().map(|s| s.pop).fold(0.0, f64::max);
    let rain_mm: f64 = steps.iter().map(|s| rain_volume(&s.rain, "3h")).sum();

    DailyForecast {
        date,
        temp_min_c,
        temp_max_c,
        rain_mm,
        rain_probability,
        condition: dominant_condition(steps),
    }
}

/// The most frequent label, ties going to the more severe one.
fn dominant_condition(steps: &[&Forecast3hItem]) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for step in steps {
        if let Some(weather) = step.weather.first() {
            *counts.entry(condition_from_openweather(&weather.main)).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .max_by_key(|(label, count)| (*count, severity(label)))
        .map(|(label, _)| label)
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn rain_volume(rain: &Option<std::collections::HashMap<String, f64>>, window: &str) -> f64 {
    rain.as_ref()
        .and_then(|r| r.get(window))
        .copied()
        .unwrap_or(0.0)
}

pub fn condition_from_openweather(main: &str) -> String {
    match main {
        "Clear" => "Clear",
        "Clouds" => "Cloudy",
        "Drizzle" => "Drizzle",
        "Rain" => "Rain",
        "Thunderstorm" => "Thunderstorm",
        "Snow" => "Snow",
        "Dust" | "Sand" => "Dust",
        "Mist" | "Fog" | "Haze" | "Smoke" => "Haze",
        _ => "Unknown",
    }
    .to_string()
}

/// Maps a WMO weather interpretation code to the same labels.
pub fn condition_from_wmo(code: i32) -> String {
    match code {
        0 => "Clear",
        1 | 2 => "Partly Cloudy",
        3 => "Cloudy",
        45 | 48 => "Haze",
        51..=57 => "Drizzle",
        61..=67 | 80..=82 => "Rain",
        71..=77 | 85 | 86 => "Snow",
        95..=99 => "Thunderstorm",
        _ => "Unknown",
    }
    .to_string()
}

fn severity(label: &str) -> u8 {
    match label {
        "Thunderstorm" => 6,
        "Rain" => 5,
        "Drizzle" => 4,
        "Dust" | "Snow" => 3,
        "Cloudy" | "Haze" => 2,
        "Partly Cloudy" => 1,
        _ => 0,
    }
}
