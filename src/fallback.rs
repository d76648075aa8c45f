//! Ordered provider chains that always produce an answer.
//!
//! External providers are tried in priority order. Each either returns a
//! value or declines; declines are logged and the chain moves on. The chain
//! ends in a [`Fallback`], which computes its answer locally and cannot fail.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Decline {
    #[error("not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Failed(String),
    #[error("empty or unusable result")]
    Empty,
}

#[async_trait]
pub trait Provider<I, O>: Send + Sync
where
    I: Sync,
    O: Send,
{
    fn name(&self) -> &str;

    /// Providers gated on a credential report `false` when it is absent and
    /// are skipped without being invoked.
    fn is_configured(&self) -> bool {
        true
    }

    async fn fetch(&self, input: &I) -> Result<O, Decline>;
}

/// Terminal provider of a chain.
pub trait Fallback<I, O>: Send + Sync {
    fn name(&self) -> &str;

    fn produce(&self, input: &I) -> O;
}

#[derive(Debug, Clone)]
pub struct Resolved<O> {
    pub value: O,
    pub source: String,
    pub from_fallback: bool,
}

pub struct FallbackChain<I, O> {
    providers: Vec<Arc<dyn Provider<I, O>>>,
    fallback: Arc<dyn Fallback<I, O>>,
}

impl<I, O> FallbackChain<I, O>
where
    I: Sync,
    O: Send,
{
    pub fn new(fallback: Arc<dyn Fallback<I, O>>) -> Self {
        Self {
            providers: Vec::new(),
            fallback,
        }
    }

    /// Appends a provider with lower priority than those already added.
    pub fn with_provider(mut self, provider: Arc<dyn Provider<I, O>>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers
            .iter()
            .map(|p| p.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    pub async fn resolve(&self, input: &I) -> Resolved<O> {
        for provider in &self.providers {
            if !provider.is_configured() {
                tracing::debug!("Provider {} is not configured, skipping", provider.name());
                continue;
            }

            match provider.fetch(input).await {
                Ok(value) => {
                    tracing::debug!("Provider {} answered", provider.name());
                    return Resolved {
                        value,
                        source: provider.name().to_string(),
                        from_fallback: false,
                    };
                }
                Err(Decline::NotConfigured) => {
                    tracing::debug!("Provider {} declined: not configured", provider.name());
                }
                Err(reason) => {
                    tracing::warn!("Provider {} declined: {}", provider.name(), reason);
                }
            }
        }

        tracing::info!("All providers declined, using {}", self.fallback.name());
        Resolved {
            value: self.fallback.produce(input),
            source: self.fallback.name().to_string(),
            from_fallback: true,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;

    struct Echo;

    impl Fallback<String, String> for Echo {
        fn name(&self) -> &str {
            "static"
        }

        fn produce(&self, input: &String) -> String {
            format!("static:{}", input)
        }
    }

    fn chain(providers: &[Arc<ScriptedProvider<String>>]) -> FallbackChain<String, String> {
        providers.iter().fold(FallbackChain::<String, String>::new(Arc::new(Echo)), |chain, p| {
            chain.with_provider(p.clone())
        })
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let a = Arc::new(ScriptedProvider::answering("a", "from a".to_string()));
        let b = Arc::new(ScriptedProvider::answering("b", "from b".to_string()));
        let c = Arc::new(ScriptedProvider::answering("c", "from c".to_string()));

        let resolved = chain(&[a.clone(), b.clone(), c.clone()])
            .resolve(&"hi".to_string())
            .await;

        assert_eq!(resolved.value, "from a");
        assert_eq!(resolved.source, "a");
        assert!(!resolved.from_fallback);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_moves_to_next_provider() {
        let a = Arc::new(ScriptedProvider::failing("a"));
        let b = Arc::new(ScriptedProvider::answering("b", "from b".to_string()));

        let resolved = chain(&[a.clone(), b.clone()]).resolve(&"hi".to_string()).await;

        assert_eq!(resolved.source, "b");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_not_invoked() {
        let a = Arc::new(ScriptedProvider::answering("a", "from a".to_string()).unconfigured());
        let b = Arc::new(ScriptedProvider::answering("b", "from b".to_string()));

        let resolved = chain(&[a.clone(), b.clone()]).resolve(&"hi".to_string()).await;

        assert_eq!(resolved.source, "b");
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_every_decline_kind_reaches_fallback() {
        let a = Arc::new(ScriptedProvider::new("a", || Err(Decline::NotConfigured)));
        let b = Arc::new(ScriptedProvider::new("b", || Err(Decline::Empty)));
        let c = Arc::new(ScriptedProvider::failing("c"));

        let resolved = chain(&[a.clone(), b.clone(), c.clone()])
            .resolve(&"hi".to_string())
            .await;

        assert_eq!(resolved.value, "static:hi");
        assert_eq!(resolved.source, "static");
        assert!(resolved.from_fallback);
        assert_eq!(a.calls() + b.calls() + c.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_chain_uses_fallback() {
        let resolved = FallbackChain::<String, String>::new(Arc::new(Echo))
            .resolve(&"x".to_string())
            .await;
        assert_eq!(resolved.value, "static:x");
    }

    #[test]
    fn test_provider_names_in_priority_order() {
        let a = Arc::new(ScriptedProvider::answering("openai", String::new()));
        let b = Arc::new(ScriptedProvider::answering("openrouter", String::new()));
        assert_eq!(chain(&[a, b]).provider_names(), vec!["openai", "openrouter", "static"]);
    }
}
