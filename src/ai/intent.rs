//! Keyword intent classification for the marketplace assistant.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Sell,
    Prices,
    Buy,
    Orders,
    Weather,
    FarmingAdvice,
    Account,
    Greeting,
    Unknown,
}

enum Keyword {
    /// Whole word.
    Word(&'static str),
    /// Any word starting with the stem.
    Stem(&'static str),
    /// Consecutive words.
    Phrase(&'static str),
}

use Keyword::{Phrase, Stem, Word};

/// Checked top to bottom; the first intent with a matching keyword wins.
const RULES: &[(Intent, &[Keyword])] = &[
    (
        Intent::Sell,
        &[Stem("sell"), Word("sold"), Stem("listing"), Phrase("list my"), Phrase("create listing")],
    ),
    (
        Intent::Prices,
        &[Stem("price"), Word("cost"), Word("costs"), Phrase("how much"), Phrase("market rate")],
    ),
    (
        Intent::Buy,
        &[Word("buy"), Word("buying"), Word("bought"), Stem("purchas"), Phrase("looking for"), Word("supplier")],
    ),
    (
        Intent::Orders,
        &[Stem("order"), Stem("deliver"), Phrase("track my"), Word("shipment")],
    ),
    (
        Intent::Weather,
        &[
            Word("weather"),
            Word("forecast"),
            Stem("rain"),
            Word("temperature"),
            Word("drought"),
            Word("frost"),
            Word("sunny"),
        ],
    ),
    (
        Intent::FarmingAdvice,
        &[
            Stem("plant"),
            Word("crop"),
            Word("crops"),
            Word("grow"),
            Word("growing"),
            Stem("fertili"),
            Stem("pest"),
            Word("soil"),
            Stem("harvest"),
            Stem("irrigat"),
            Stem("disease"),
            Word("tips"),
            Word("advice"),
        ],
    ),
    (
        Intent::Account,
        &[
            Stem("regist"),
            Word("account"),
            Word("profile"),
            Word("password"),
            Word("login"),
            Phrase("log in"),
            Phrase("sign up"),
        ],
    ),
    (
        Intent::Greeting,
        &[
            Word("hello"),
            Word("hi"),
            Word("hey"),
            Word("dumela"),
            Phrase("good morning"),
            Phrase("good afternoon"),
            Phrase("good evening"),
        ],
    ),
];

pub fn classify(message: &str) -> Intent {
    let lowered = message.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let padded = format!(" {} ", words.join(" "));

    let hit = |keyword: &Keyword| match keyword {
        Word(word) => words.iter().any(|w| w == word),
        Stem(stem) => words.iter().any(|w| w.starts_with(stem)),
        Phrase(phrase) => padded.contains(&format!(" {} ", phrase)),
    };

    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| hit(k)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Unknown)
}

pub fn static_reply(intent: Intent) -> &'static str {
    match intent {
        Intent::Sell => "You can sell your produce by creating a listing at /farmer/create-listing. Add the crop, quantity, price and a photo, and buyers in your area will see it on the marketplace.",
        Intent::Prices => "Current market prices for common crops are on /market-prices. Compare them before you set your listing price.",
        Intent::Buy => "Browse fresh produce from local farmers at /marketplace, or post what you need at /buyer/requests so farmers can offer to supply you.",
        Intent::Orders => "You can follow the status of your orders and deliveries at /orders.",
        Intent::Weather => "Check the forecast and farming advisories for your area at /weather.",
        Intent::FarmingAdvice => "Crop-specific tips for planting, watering and pest control are available at /farming-tips.",
        Intent::Account => "Create an account or update your profile at /register. Farmers and buyers both sign up there.",
        Intent::Greeting => "Dumela! I'm the AgriConnect assistant. I can help you sell produce (/farmer/create-listing), check prices (/market-prices), find produce (/marketplace) or see the weather (/weather).",
        Intent::Unknown => "I can help with selling produce (/farmer/create-listing), market prices (/market-prices), buying (/marketplace), orders (/orders), weather (/weather) and farming tips (/farming-tips). What would you like to do?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_each_intent() {
        assert_eq!(classify("I want to sell tomatoes"), Intent::Sell);
        assert_eq!(classify("What is the price of maize?"), Intent::Prices);
        assert_eq!(classify("Where can I buy onions"), Intent::Buy);
        assert_eq!(classify("Has my order been delivered?"), Intent::Orders);
        assert_eq!(classify("Will it rain tomorrow in Maun?"), Intent::Weather);
        assert_eq!(classify("How do I control pests on cabbage"), Intent::FarmingAdvice);
        assert_eq!(classify("I forgot my password"), Intent::Account);
        assert_eq!(classify("Dumela"), Intent::Greeting);
        assert_eq!(classify("asdf qwerty"), Intent::Unknown);
        assert_eq!(classify(""), Intent::Unknown);
    }

    #[test]
    fn test_priority_order() {
        // Both sell and prices match; sell is checked first.
        assert_eq!(classify("How much should I sell my beans for?"), Intent::Sell);
        assert_eq!(classify("hi, what are cabbage prices today"), Intent::Prices);
        assert_eq!(classify("Should I plant before the rains?"), Intent::Weather);
    }

    #[test]
    fn test_words_do_not_match_inside_other_words() {
        assert_eq!(classify("this is a test"), Intent::Unknown);
        assert_eq!(classify("the chicken is ready"), Intent::Unknown);
        assert_eq!(classify("I need to log in"), Intent::Account);
        assert_eq!(classify("good   morning!"), Intent::Greeting);
    }

    #[test]
    fn test_static_replies_reference_platform_paths() {
        assert!(static_reply(Intent::Sell).contains("/farmer/create-listing"));
        assert!(static_reply(Intent::Prices).contains("/market-prices"));
        assert!(static_reply(Intent::Buy).contains("/marketplace"));
        assert!(static_reply(Intent::Buy).contains("/buyer/requests"));
        assert!(static_reply(Intent::Orders).contains("/orders"));
        assert!(static_reply(Intent::Weather).contains("/weather"));
        assert!(static_reply(Intent::FarmingAdvice).contains("/farming-tips"));
        assert!(static_reply(Intent::Account).contains("/register"));
    }

    #[test]
    fn test_intent_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Intent::FarmingAdvice).unwrap(), "\"farming_advice\"");
    }
}
