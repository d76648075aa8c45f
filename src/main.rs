use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod ai;
mod cache;
mod config;
mod error;
mod fallback;
mod openapi;
mod routes;
mod weather;

use ai::{chat::ChatService, tips::TipsService};
use cache::{Clock, SystemClock, TtlCache};
use config::Config;
use routes::{create_router, AppState};
use weather::WeatherService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agriconnect_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // One cache for the whole process, shared by every request
    let weather_cache = Arc::new(TtlCache::with_clock(config.weather_cache_ttl, clock.clone()));
    tracing::info!("Weather cache TTL: {}s", weather_cache.ttl().as_secs());
    let weather = WeatherService::new(
        weather_cache,
        weather::build_chain(&config, clock.clone())?,
        clock.clone(),
    );
    let chat = ChatService::new(ai::chat::build_chain(&config)?);
    let tips = TipsService::new(ai::tips::build_chain(&config)?, clock, config.app_timezone);

    tracing::info!("Weather providers: {}", weather.providers().join(" -> "));
    tracing::info!("Chat providers: {}", chat.providers().join(" -> "));

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        weather: Arc::new(weather),
        chat: Arc::new(chat),
        tips: Arc::new(tips),
    };

    let app = create_router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server starting on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
