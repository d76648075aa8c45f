//! Crop-specific farming tips.

use super::{ChatMessage, LlmClient};
use crate::cache::Clock;
use crate::config::Config;
use crate::fallback::{Decline, Fallback, FallbackChain, Provider};
use async_trait::async_trait;
use chrono::Datelike;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

pub const MAX_TIPS: usize = 8;

const SYSTEM_PROMPT: &str = "You are an agricultural extension officer in Botswana. \
Give short, practical tips suited to smallholder farmers in a semi-arid climate.";

pub type TipsChain = FallbackChain<TipsQuery, Vec<String>>;

#[derive(Error, Debug)]
pub enum TipsError {
    #[error("Crop must not be empty")]
    EmptyCrop,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TipsRequest {
    pub crop: String,
    pub region: Option<String>,
    pub season: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FarmingTips {
    pub tips: Vec<String>,
    pub source: String,
}

/// Southern-hemisphere seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Summer,
    Autumn,
    Winter,
    Spring,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Summer,
            3..=5 => Season::Autumn,
            6..=8 => Season::Winter,
            _ => Season::Spring,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "summer" | "rainy" | "wet" => Some(Season::Summer),
            "autumn" | "fall" => Some(Season::Autumn),
            "winter" | "dry" => Some(Season::Winter),
            "spring" => Some(Season::Spring),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
            Season::Spring => "spring",
        }
    }

    fn tip(&self) -> &'static str {
        match self {
            Season::Summer => "Summer is the main rainy season: plant after the first 25 mm of rain and weed early while the soil is soft.",
            Season::Autumn => "Autumn: harvest and dry grain well before storage, and plant cool-season vegetables as temperatures drop.",
            Season::Winter => "Winter is dry with frost risk at night: irrigate vegetables in the morning and cover seedlings on cold nights.",
            Season::Spring => "Spring is hot and dry: prepare land, repair fences and mulch beds so they are ready for the first rains.",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TipsQuery {
    pub crop: String,
    pub region: Option<String>,
    pub season: Season,
}

pub struct LlmTipsProvider {
    client: LlmClient,
}

impl LlmTipsProvider {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Provider<TipsQuery, Vec<String>> for LlmTipsProvider {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn fetch(&self, query: &TipsQuery) -> Result<Vec<String>, Decline> {
        let prompt = format!(
            "Give up to {} short practical tips for growing {} in {} during the {} season. \
             Put one tip per line and do not add an introduction.",
            MAX_TIPS,
            query.crop,
            query.region.as_deref().unwrap_or("Botswana"),
            query.season.label()
        );
        let text = self
            .client
            .complete(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .await?;

        let tips = parse_tips(&text);
        if tips.is_empty() {
            return Err(Decline::Empty);
        }
        Ok(tips)
    }
}

/// Splits model output into one tip per line, dropping bullets and numbering.
pub fn parse_tips(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_marker)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .take(MAX_TIPS)
        .map(str::to_string)
        .collect()
}

fn strip_marker(line: &str) -> &str {
    let line = line.trim().trim_start_matches(['-', '*', '•']).trim_start();
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() < line.len() {
        // "1. " or "10) " but not "2.5 cm"
        if let Some(stripped) = rest.strip_prefix(['.', ')']) {
            if stripped.is_empty() || stripped.starts_with(char::is_whitespace) {
                return stripped.trim();
            }
        }
    }
    line.trim()
}

/// Locally known tips per crop plus one for the season.
pub struct StaticTips;

impl Fallback<TipsQuery, Vec<String>> for StaticTips {
    fn name(&self) -> &str {
        "static"
    }

    fn produce(&self, query: &TipsQuery) -> Vec<String> {
        let mut tips: Vec<String> = crop_tips(&query.crop).iter().map(|t| t.to_string()).collect();
        tips.push(query.season.tip().to_string());
        if let Some(region) = &query.region {
            tips.push(format!(
                "Check the forecast for {} on /weather before planting or spraying.",
                region
            ));
        }
        tips.truncate(MAX_TIPS);
        tips
    }
}

/// Names match at the start of a word, so "beans" finds "bean" but
/// "grapes" does not find "rape".
fn crop_tips(crop: &str) -> &'static [&'static str] {
    let lowered = crop.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let padded = format!(" {}", words.join(" "));
    let has = |names: &[&str]| names.iter().any(|name| padded.contains(&format!(" {}", name)));

    if has(&["maize", "corn"]) {
        &[
            "Plant maize at 75-90 cm between rows and 25-30 cm within the row.",
            "Apply nitrogen top-dressing when plants are knee high.",
            "Scout for fall armyworm in the leaf funnels every week.",
        ]
    } else if has(&["sorghum"]) {
        &[
            "Sorghum tolerates drought well: plant it where rainfall is unreliable.",
            "Thin seedlings to one plant every 15-20 cm two weeks after emergence.",
            "Protect ripening heads from birds with scarecrows or early harvesting.",
        ]
    } else if has(&["millet"]) {
        &[
            "Pearl millet suits sandy soils and low rainfall areas.",
            "Sow shallow, about 2-3 cm deep, into moist soil.",
            "Harvest as soon as the grain is hard to limit bird damage.",
        ]
    } else if has(&["bean", "cowpea"]) {
        &[
            "Legumes fix nitrogen: rotate them with maize or sorghum.",
            "Avoid waterlogged soil; beans and cowpeas rot in wet conditions.",
            "Control aphids early, as they spread mosaic virus.",
        ]
    } else if has(&["groundnut", "peanut"]) {
        &[
            "Grow groundnuts in loose sandy soil so pods form easily.",
            "Apply gypsum at flowering to improve pod filling.",
            "Dry pods well before storage to prevent aflatoxin.",
        ]
    } else if has(&["tomato"]) {
        &[
            "Stake or trellis tomatoes to keep fruit off the ground.",
            "Water at the base in the morning to reduce leaf disease.",
            "Watch for Tuta absoluta and remove mined leaves promptly.",
        ]
    } else if has(&["cabbage"]) {
        &[
            "Transplant cabbage seedlings at 4-6 weeks with 45-60 cm spacing.",
            "Keep soil evenly moist to prevent heads from splitting.",
            "Check for diamondback moth larvae under the leaves.",
        ]
    } else if has(&["spinach", "rape", "chard"]) {
        &[
            "Harvest outer leaves regularly to keep plants producing.",
            "Give leafy greens frequent light irrigation and some afternoon shade.",
            "Side-dress with compost or manure every few weeks.",
        ]
    } else if has(&["onion"]) {
        &[
            "Plant onions in autumn so bulbs form as days lengthen.",
            "Keep beds weed-free; onions compete poorly with weeds.",
            "Stop watering when the tops fall over, then cure bulbs before storage.",
        ]
    } else if has(&["watermelon", "melon"]) {
        &[
            "Sow melons on warm soil after the first good rains.",
            "Reduce watering as fruit ripens to improve sweetness.",
            "Turn fruit occasionally and rest it on dry grass to prevent rot.",
        ]
    } else if has(&["sweet potato", "sweetpotato"]) {
        &[
            "Plant vine cuttings 30 cm long on ridges or mounds.",
            "Weed during the first two months until the vines cover the ground.",
            "Harvest 4-5 months after planting, before the soil dries hard.",
        ]
    } else {
        &[
            "Test your soil and add compost or manure before planting.",
            "Mulch to keep moisture in the soil during dry spells.",
            "Rotate crops each season to break pest and disease cycles.",
        ]
    }
}

/// OpenAI, then OpenRouter, then the static tips table.
pub fn build_chain(config: &Config) -> anyhow::Result<TipsChain> {
    let openai = LlmClient::new(config.openai_settings())?;
    let openrouter = LlmClient::new(config.openrouter_settings())?;

    Ok(TipsChain::new(Arc::new(StaticTips))
        .with_provider(Arc::new(LlmTipsProvider::new(openai)))
        .with_provider(Arc::new(LlmTipsProvider::new(openrouter))))
}

pub struct TipsService {
    chain: TipsChain,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl TipsService {
    pub fn new(chain: TipsChain, clock: Arc<dyn Clock>, timezone: Tz) -> Self {
        Self {
            chain,
            clock,
            timezone,
        }
    }

    /// An unrecognised season is replaced by the current one.
    pub async fn get_tips(&self, request: TipsRequest) -> Result<FarmingTips, TipsError> {
        let crop = request.crop.trim().to_lowercase();
        if crop.is_empty() {
            return Err(TipsError::EmptyCrop);
        }

        let season = request
            .season
            .as_deref()
            .and_then(Season::parse)
            .unwrap_or_else(|| self.current_season());
        let region = request
            .region
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let query = TipsQuery { crop, region, season };
        let resolved = self.chain.resolve(&query).await;

        Ok(FarmingTips {
            tips: resolved.value,
            source: resolved.source,
        })
    }

    fn current_season(&self) -> Season {
        Season::from_month(self.clock.now().with_timezone(&self.timezone).month())
    }
}
