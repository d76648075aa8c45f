use utoipa::OpenApi;

use crate::{
    ai::{
        chat::{ChatTurn, TurnRole},
        intent::Intent,
        tips::TipsRequest,
    },
    error::ErrorResponse,
    routes::{
        ChatRequest, ChatResponse, CurrentWeather, CurrentWeatherResponse, Forecast,
        ForecastResponse, HealthResponse, RegionsResponse, TipsResponse, WeatherResponse,
    },
    weather::{
        regions::RegionInfo,
        types::{CurrentConditions, DailyForecast, Location, WeatherReport},
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::get_weather,
        crate::routes::get_current_weather,
        crate::routes::get_weather_forecast,
        crate::routes::list_regions,
        crate::routes::get_region_weather,
        crate::routes::chat,
        crate::routes::farming_tips
    ),
    components(schemas(
        HealthResponse,
        WeatherResponse,
        WeatherReport,
        Location,
        CurrentConditions,
        DailyForecast,
        CurrentWeather,
        CurrentWeatherResponse,
        Forecast,
        ForecastResponse,
        RegionInfo,
        RegionsResponse,
        ChatRequest,
        ChatTurn,
        TurnRole,
        ChatResponse,
        Intent,
        TipsRequest,
        TipsResponse,
        ErrorResponse
    )),
    tags(
        (name = "agriconnect", description = "Weather, assistant and farming tips API")
    ),
    info(
        title = "AgriConnect API",
        description = "Weather data and assistant replies with provider fallback",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;
