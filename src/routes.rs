use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    ai::{
        chat::{ChatService, ChatTurn},
        intent::Intent,
        tips::{TipsRequest, TipsService},
    },
    config::Config,
    error::ApiError,
    openapi::ApiDoc,
    weather::{
        regions::{find_region, RegionInfo, REGIONS},
        types::{Coordinates, CurrentConditions, DailyForecast, Location, WeatherReport},
        WeatherService,
    },
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub weather: Arc<WeatherService>,
    pub chat: Arc<ChatService>,
    pub tips: Arc<TipsService>,
}

// Request/Response types
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeatherQuery {
    /// Latitude in degrees, -90 to 90
    pub lat: Option<f64>,
    /// Longitude in degrees, -180 to 180
    pub lon: Option<f64>,
}

impl WeatherQuery {
    fn coordinates(&self) -> Result<Coordinates, ApiError> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(ApiError::BadRequest(
                "lat and lon query parameters are required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ForecastQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Number of days to return, 1 to 7
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub timezone: String,
    pub weather_providers: Vec<String>,
    pub chat_providers: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherResponse {
    pub success: bool,
    pub data: WeatherReport,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentWeather {
    pub location: Location,
    pub current: CurrentConditions,
    pub source: String,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentWeatherResponse {
    pub success: bool,
    pub data: CurrentWeather,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Forecast {
    pub location: Location,
    pub forecast: Vec<DailyForecast>,
    pub source: String,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastResponse {
    pub success: bool,
    pub data: Forecast,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegionsResponse {
    pub success: bool,
    pub data: Vec<RegionInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub success: bool,
    pub reply: String,
    pub source: String,
    pub intent: Intent,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TipsResponse {
    pub success: bool,
    pub tips: Vec<String>,
    pub source: String,
}

// Route handlers
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timezone: state.config.app_timezone.to_string(),
        weather_providers: state.weather.providers().into_iter().map(String::from).collect(),
        chat_providers: state.chat.providers().into_iter().map(String::from).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/weather",
    params(WeatherQuery),
    responses(
        (status = 200, description = "Current conditions, forecast and advisories", body = WeatherResponse),
        (status = 400, description = "Missing or invalid coordinates", body = ErrorResponse)
    )
)]
pub async fn get_weather(
    State(state): State<AppState>,
    query: Result<Query<WeatherQuery>, QueryRejection>,
) -> Result<Json<WeatherResponse>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let report = state.weather.get_weather(params.coordinates()?).await?;

    Ok(Json(WeatherResponse {
        success: true,
        data: report,
    }))
}

#[utoipa::path(
    get,
    path = "/weather/current",
    params(WeatherQuery),
    responses(
        (status = 200, description = "Current conditions", body = CurrentWeatherResponse),
        (status = 400, description = "Missing or invalid coordinates", body = ErrorResponse)
    )
)]
pub async fn get_current_weather(
    State(state): State<AppState>,
    query: Result<Query<WeatherQuery>, QueryRejection>,
) -> Result<Json<CurrentWeatherResponse>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let report = state.weather.get_weather(params.coordinates()?).await?;

    Ok(Json(CurrentWeatherResponse {
        success: true,
        data: CurrentWeather {
            location: report.location,
            current: report.current,
            source: report.source,
            fetched_at: report.fetched_at,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/weather/forecast",
    params(ForecastQuery),
    responses(
        (status = 200, description = "Daily forecast", body = ForecastResponse),
        (status = 400, description = "Missing or invalid parameters", body = ErrorResponse)
    )
)]
pub async fn get_weather_forecast(
    State(state): State<AppState>,
    query: Result<Query<ForecastQuery>, QueryRejection>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let coords = WeatherQuery {
        lat: params.lat,
        lon: params.lon,
    }
    .coordinates()?;

    let days = params.days.unwrap_or(7);
    if !(1..=7).contains(&days) {
        return Err(ApiError::BadRequest("days must be between 1 and 7".to_string()));
    }

    let report = state.weather.get_weather(coords).await?;
    let mut forecast = report.forecast;
    forecast.truncate(days as usize);

    Ok(Json(ForecastResponse {
        success: true,
        data: Forecast {
            location: report.location,
            forecast,
            source: report.source,
            fetched_at: report.fetched_at,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/weather/regions",
    responses((status = 200, description = "Known regions", body = RegionsResponse))
)]
pub async fn list_regions() -> Json<RegionsResponse> {
    Json(RegionsResponse {
        success: true,
        data: REGIONS.iter().map(RegionInfo::from).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/weather/regions/{name}",
    params(("name" = String, Path, description = "Region name, e.g. Gaborone")),
    responses(
        (status = 200, description = "Weather for the region", body = WeatherResponse),
        (status = 404, description = "Unknown region", body = ErrorResponse)
    )
)]
pub async fn get_region_weather(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WeatherResponse>, ApiError> {
    let region = find_region(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown region: {}", name)))?;
    let report = state.weather.get_weather(region.coordinates()).await?;

    Ok(Json(WeatherResponse {
        success: true,
        data: report,
    }))
}

#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Invalid message", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let reply = state.chat.send_message(&request.message, request.history).await?;

    Ok(Json(ChatResponse {
        success: true,
        reply: reply.reply,
        source: reply.source,
        intent: reply.intent,
    }))
}

#[utoipa::path(
    post,
    path = "/ai/farming-tips",
    request_body = TipsRequest,
    responses(
        (status = 200, description = "Farming tips for the crop", body = TipsResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn farming_tips(
    State(state): State<AppState>,
    payload: Result<Json<TipsRequest>, JsonRejection>,
) -> Result<Json<TipsResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let tips = state.tips.get_tips(request).await?;

    Ok(Json(TipsResponse {
        success: true,
        tips: tips.tips,
        source: tips.source,
    }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/weather", get(get_weather))
        .route("/weather/current", get(get_current_weather))
        .route("/weather/forecast", get(get_weather_forecast))
        .route("/weather/regions", get(list_regions))
        .route("/weather/regions/:name", get(get_region_weather))
        .route("/ai/farming-tips", post(farming_tips))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
