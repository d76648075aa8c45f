use chrono_tz::Tz;
use std::env;
use std::time::Duration;

use crate::ai::LlmSettings;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub or_model: String,
    pub openweather_api_key: Option<String>,
    pub openweather_base_url: String,
    pub openweather_current_path: String,
    pub openweather_forecast3h_path: String,
    pub open_meteo_enabled: bool,
    pub open_meteo_base_url: String,
    pub weather_cache_ttl: Duration,
    pub forecast_days: u32,
    pub http_timeout: Duration,
    pub app_timezone: Tz,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let app_timezone = var("APP_TIMEZONE", "Africa/Gaborone");
        let app_timezone = app_timezone
            .parse::<Tz>()
            .map_err(|_| anyhow::anyhow!("APP_TIMEZONE is not a valid timezone: {}", app_timezone))?;

        Ok(Config {
            bind_addr: var("BIND_ADDR", "0.0.0.0:8080"),
            openai_api_key: non_blank(lookup("OPENAI_API_KEY")),
            openai_base_url: var("OPENAI_BASE_URL", "https://api.openai.com/v1/chat/completions"),
            openai_model: var("OPENAI_MODEL", "gpt-4o-mini"),
            openrouter_api_key: non_blank(lookup("OPENROUTER_API_KEY")),
            openrouter_base_url: var(
                "OPENROUTER_BASE_URL",
                "https://openrouter.ai/api/v1/chat/completions",
            ),
            or_model: var("OR_MODEL", "deepseek/deepseek-chat-v3-0324:free"),
            openweather_api_key: non_blank(lookup("OPENWEATHER_API_KEY")),
            openweather_base_url: var("OPENWEATHER_BASE_URL", "https://api.openweathermap.org"),
            openweather_current_path: var("OPENWEATHER_CURRENT_PATH", "/data/2.5/weather"),
            openweather_forecast3h_path: var("OPENWEATHER_FORECAST3H_PATH", "/data/2.5/forecast"),
            open_meteo_enabled: parse_or("OPEN_METEO_ENABLED", lookup("OPEN_METEO_ENABLED"), true)?,
            open_meteo_base_url: var("OPEN_METEO_BASE_URL", "https://api.open-meteo.com"),
            weather_cache_ttl: Duration::from_secs(parse_or(
                "WEATHER_CACHE_TTL_SECS",
                lookup("WEATHER_CACHE_TTL_SECS"),
                30 * 60,
            )?),
            forecast_days: parse_or::<u32>("FORECAST_DAYS", lookup("FORECAST_DAYS"), 5)?.clamp(1, 7),
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                lookup("HTTP_TIMEOUT_SECS"),
                30,
            )?),
            app_timezone,
        })
    }

    pub fn openai_settings(&self) -> LlmSettings {
        LlmSettings {
            name: "openai".to_string(),
            base_url: self.openai_base_url.clone(),
            api_key: self.openai_api_key.clone(),
            model: self.openai_model.clone(),
            timeout: self.http_timeout,
        }
    }

    pub fn openrouter_settings(&self) -> LlmSettings {
        LlmSettings {
            name: "openrouter".to_string(),
            base_url: self.openrouter_base_url.clone(),
            api_key: self.openrouter_api_key.clone(),
            model: self.or_model.clone(),
            timeout: self.http_timeout,
        }
    }
}

/// Treats unset and blank credentials alike.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// No credentials, and every base URL points at a closed local port.
    pub fn for_tests() -> Self {
        let unreachable = "http://127.0.0.1:9".to_string();
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            openai_api_key: None,
            openai_base_url: unreachable.clone(),
            openai_model: "gpt-4o-mini".to_string(),
            openrouter_api_key: None,
            openrouter_base_url: unreachable.clone(),
            or_model: "deepseek/deepseek-chat-v3-0324:free".to_string(),
            openweather_api_key: None,
            openweather_base_url: unreachable.clone(),
            openweather_current_path: "/data/2.5/weather".to_string(),
            openweather_forecast3h_path: "/data/2.5/forecast".to_string(),
            open_meteo_enabled: true,
            open_meteo_base_url: unreachable,
            weather_cache_ttl: Duration::from_secs(30 * 60),
            forecast_days: 5,
            http_timeout: Duration::from_secs(2),
            app_timezone: chrono_tz::Africa::Gaborone,
        }
    }
}
