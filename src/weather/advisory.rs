//! Rule-based farming advisories derived from a forecast.

use super::types::{CurrentConditions, DailyForecast};

const HEAT_STRESS_C: f64 = 35.0;
const FROST_RISK_C: f64 = 2.0;
const HIGH_WIND_MS: f64 = 8.0;
const RAIN_PROBABILITY: f64 = 0.6;
const RAIN_MM: f64 = 5.0;
const HIGH_VPD_KPA: f64 = 2.5;
const LOW_VPD_KPA: f64 = 0.4;
const DRY_SPELL_DAYS: usize = 4;

/// Vapour-pressure deficit in kPa (Tetens equation).
pub fn calculate_vpd_kpa(temp_c: f64, rh: f64) -> f64 {
    let es = 0.6108 * ((17.27 * temp_c) / (temp_c + 237.3)).exp();
    let e = es * (rh / 100.0);
    (es - e).max(0.0)
}

pub fn farming_advisories(current: &CurrentConditions, forecast: &[DailyForecast]) -> Vec<String> {
    let mut advisories = Vec::new();

    let hottest = forecast
        .iter()
        .map(|d| d.temp_max_c)
        .fold(current.temp_c, f64::max);
    if hottest >= HEAT_STRESS_C {
        advisories.push(format!(
            "Heat stress likely (up to {:.0}°C): irrigate early morning or late afternoon and make sure livestock have shade and water.",
            hottest
        ));
    }

    if let Some(cold) = forecast.iter().find(|d| d.temp_min_c <= FROST_RISK_C) {
        advisories.push(format!(
            "Frost risk on {} (low of {:.0}°C): cover seedlings and delay transplanting.",
            cold.date.format("%a %d %b"),
            cold.temp_min_c
        ));
    }

    if let Some(wet) = forecast
        .iter()
        .take(3)
        .find(|d| d.rain_probability >= RAIN_PROBABILITY || d.rain_mm >= RAIN_MM)
    {
        advisories.push(format!(
            "Rain expected on {}: hold off on spraying and fertiliser application until it passes.",
            wet.date.format("%a %d %b")
        ));
    }

    if current.wind_ms >= HIGH_WIND_MS {
        advisories.push("Strong winds: avoid spraying and secure shade netting.".to_string());
    }

    let vpd = calculate_vpd_kpa(current.temp_c, current.humidity);
    if vpd >= HIGH_VPD_KPA {
        advisories.push(format!(
            "High evaporative demand (VPD {:.1} kPa): increase irrigation and mulch to keep soil moisture.",
            vpd
        ));
    } else if vpd < LOW_VPD_KPA && current.humidity >= 85.0 {
        advisories.push(
            "Very humid conditions favour fungal disease: scout crops and improve air flow.".to_string(),
        );
    }

    let dry_days = forecast
        .iter()
        .take_while(|d| d.rain_mm < 1.0 && d.rain_probability < 0.3)
        .count();
    if dry_days >= DRY_SPELL_DAYS && forecast.iter().take(dry_days).any(|d| d.temp_max_c >= 30.0) {
        advisories.push(format!(
            "Dry spell for the next {} days: conserve water and prioritise young plants.",
            dry_days
        ));
    }

    if advisories.is_empty() {
        advisories.push("Conditions are favourable for routine field work.".to_string());
    }

    advisories
}
