use super::intent::{classify, static_reply, Intent};
use super::{ChatMessage, LlmClient};
use crate::config::Config;
use crate::fallback::{Decline, Fallback, FallbackChain, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const MAX_HISTORY_TURNS: usize = 10;

const SYSTEM_PROMPT: &str = "You are the AgriConnect assistant for a Botswana farm marketplace. \
Help farmers and buyers with selling produce, market prices, buying, orders, weather and farming practice. \
Keep answers short and practical, and point to the relevant page when one fits: \
/farmer/create-listing, /market-prices, /marketplace, /buyer/requests, /orders, /weather, /farming-tips, /register.";

pub type ChatChain = FallbackChain<ChatPrompt, String>;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error("Message must be at most {max} characters")]
    MessageTooLong { max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatPrompt {
    pub message: String,
    pub history: Vec<ChatTurn>,
    pub intent: Intent,
}

impl ChatPrompt {
    fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(self.history.iter().map(|turn| match turn.role {
            TurnRole::User => ChatMessage::user(turn.content.clone()),
            TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
        }));
        messages.push(ChatMessage::user(self.message.clone()));
        messages
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatReply {
    pub reply: String,
    pub source: String,
    pub intent: Intent,
}

pub struct LlmChatProvider {
    client: LlmClient,
}

impl LlmChatProvider {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Provider<ChatPrompt, String> for LlmChatProvider {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn fetch(&self, prompt: &ChatPrompt) -> Result<String, Decline> {
        let reply = self.client.complete(prompt.to_messages()).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(Decline::Empty);
        }
        Ok(reply.to_string())
    }
}

/// Canned reply for the classified intent.
pub struct StaticResponder;

impl Fallback<ChatPrompt, String> for StaticResponder {
    fn name(&self) -> &str {
        "static"
    }

    fn produce(&self, prompt: &ChatPrompt) -> String {
        static_reply(prompt.intent).to_string()
    }
}

/// OpenAI, then OpenRouter, then the static responder.
pub fn build_chain(config: &Config) -> anyhow::Result<ChatChain> {
    let openai = LlmClient::new(config.openai_settings())?;
    let openrouter = LlmClient::new(config.openrouter_settings())?;

    Ok(ChatChain::new(Arc::new(StaticResponder))
        .with_provider(Arc::new(LlmChatProvider::new(openai)))
        .with_provider(Arc::new(LlmChatProvider::new(openrouter))))
}

pub struct ChatService {
    chain: ChatChain,
}

impl ChatService {
    pub fn new(chain: ChatChain) -> Self {
        Self { chain }
    }

    pub fn providers(&self) -> Vec<&str> {
        self.chain.provider_names()
    }

    pub async fn send_message(
        &self,
        message: &str,
        history: Vec<ChatTurn>,
    ) -> Result<ChatReply, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ChatError::MessageTooLong {
                max: MAX_MESSAGE_CHARS,
            });
        }

        let intent = classify(message);
        tracing::debug!("Classified chat message as {:?}", intent);

        let prompt = ChatPrompt {
            message: message.to_string(),
            history: recent_turns(history),
            intent,
        };
        let resolved = self.chain.resolve(&prompt).await;

        Ok(ChatReply {
            reply: resolved.value,
            source: resolved.source,
            intent,
        })
    }
}

/// Keeps the last turns with content, oldest first.
fn recent_turns(history: Vec<ChatTurn>) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = history
        .into_iter()
        .filter(|turn| !turn.content.trim().is_empty())
        .collect();
    let excess = turns.len().saturating_sub(MAX_HISTORY_TURNS);
    turns.drain(..excess);
    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::testing::ScriptedProvider;

    fn turn(role: TurnRole, content: &str) -> ChatTurn {
        ChatTurn {
            role,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_credentials_uses_static_reply() {
        let service = ChatService::new(build_chain(&Config::for_tests()).unwrap());
        assert_eq!(service.providers(), vec!["openai", "openrouter", "static"]);

        let reply = service.send_message("I want to sell tomatoes", Vec::new()).await.unwrap();

        assert_eq!(reply.source, "static");
        assert_eq!(reply.intent, Intent::Sell);
        assert!(reply.reply.contains("/farmer/create-listing"));
    }

    #[tokio::test]
    async fn test_failing_primary_still_replies() {
        let primary = Arc::new(ScriptedProvider::failing("openai"));
        let service = ChatService::new(
            ChatChain::new(Arc::new(StaticResponder)).with_provider(primary.clone()),
        );

        let reply = service.send_message("hello", Vec::new()).await.unwrap();

        assert_eq!(primary.calls(), 1);
        assert_eq!(reply.source, "static");
        assert_eq!(reply.intent, Intent::Greeting);
        assert!(!reply.reply.is_empty());
    }

    #[tokio::test]
    async fn test_secondary_answers_when_primary_is_empty() {
        let primary = Arc::new(ScriptedProvider::new("openai", || Err(Decline::Empty)));
        let secondary = Arc::new(ScriptedProvider::answering(
            "openrouter",
            "Maize prices are up this week.".to_string(),
        ));
        let service = ChatService::new(
            ChatChain::new(Arc::new(StaticResponder))
                .with_provider(primary)
                .with_provider(secondary),
        );

        let reply = service.send_message("maize prices?", Vec::new()).await.unwrap();

        assert_eq!(reply.source, "openrouter");
        assert_eq!(reply.reply, "Maize prices are up this week.");
        assert_eq!(reply.intent, Intent::Prices);
    }

    #[tokio::test]
    async fn test_message_validation() {
        let service = ChatService::new(ChatChain::new(Arc::new(StaticResponder)));

        assert!(matches!(
            service.send_message("   ", Vec::new()).await,
            Err(ChatError::EmptyMessage)
        ));
        assert!(matches!(
            service.send_message(&"a".repeat(MAX_MESSAGE_CHARS + 1), Vec::new()).await,
            Err(ChatError::MessageTooLong { max: 2000 })
        ));
        assert!(service.send_message(&"a".repeat(MAX_MESSAGE_CHARS), Vec::new()).await.is_ok());
    }

    #[test]
    fn test_history_keeps_last_turns() {
        let mut history: Vec<ChatTurn> = (0..14)
            .map(|i| turn(TurnRole::User, &format!("message {}", i)))
            .collect();
        history.insert(3, turn(TurnRole::Assistant, "  "));

        let kept = recent_turns(history);

        assert_eq!(kept.len(), MAX_HISTORY_TURNS);
        assert_eq!(kept[0].content, "message 4");
        assert_eq!(kept[9].content, "message 13");
    }

    #[test]
    fn test_prompt_messages_in_order() {
        let prompt = ChatPrompt {
            message: "and sorghum?".to_string(),
            history: vec![
                turn(TurnRole::User, "maize price?"),
                turn(TurnRole::Assistant, "See /market-prices."),
            ],
            intent: Intent::Prices,
        };

        let roles: Vec<String> = prompt.to_messages().into_iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }
}
