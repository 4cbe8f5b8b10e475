use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Whether (and how) the model may consult live search before answering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode {
    Off,
    /// Ground the answer in a live web search
    Grounded,
    /// Social + web search restricted to a date window
    SocialAndWeb { from: NaiveDate, to: NaiveDate },
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub search: SearchMode,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.3,
            max_tokens: 1024,
            search: SearchMode::Off,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn search(mut self, search: SearchMode) -> Self {
        self.search = search;
        self
    }
}

/// A text completion backend: instruction in, free text out
#[async_trait]
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Limits applied to every model call made for one locale
#[derive(Debug, Clone)]
pub struct LlmPolicy {
    pub max_concurrent_calls: usize,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for LlmPolicy {
    fn default() -> Self {
        Self {
            // The shared rate limit empties batch runs when stages overlap
            max_concurrent_calls: 1,
            timeout: Duration::from_secs(90),
            max_attempts: 3,
        }
    }
}

/// Wraps a backend with a concurrency gate, a per-attempt timeout and
/// retry with backoff.
pub struct GatedCompletion {
    inner: Arc<dyn CompletionService>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    max_attempts: u32,
}

impl GatedCompletion {
    pub fn new(inner: Arc<dyn CompletionService>, semaphore: Arc<Semaphore>, policy: &LlmPolicy) -> Self {
        Self {
            inner,
            semaphore,
            timeout: policy.timeout,
            max_attempts: policy.max_attempts.max(1),
        }
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<String> {
        tokio::time::timeout(self.timeout, self.inner.complete(request))
            .await
            .with_context(|| format!("{} call timed out after {:?}", self.inner.name(), self.timeout))?
    }

    fn backoff(attempt: u32, is_rate_limit: bool) -> Duration {
        if is_rate_limit {
            Duration::from_secs(15 * (attempt as u64 + 1))
        } else {
            Duration::from_millis(1000 * 2_u64.pow(attempt))
        }
    }
}

#[async_trait]
impl CompletionService for GatedCompletion {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let _permit = self.semaphore.acquire().await?;

        let mut attempt = 0;
        loop {
            let start = Instant::now();
            debug!(
                "LLM call starting - service={}, prompt_length={} chars, search={:?}",
                self.inner.name(),
                request.prompt.len(),
                request.search
            );

            match self.attempt(request).await {
                Ok(text) => {
                    info!(
                        "LLM call completed - service={}, duration={:.2}s, response_length={} chars",
                        self.inner.name(),
                        start.elapsed().as_secs_f32(),
                        text.len()
                    );
                    return Ok(text);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(e.context(format!(
                            "{} failed after {} attempts",
                            self.inner.name(),
                            attempt
                        )));
                    }

                    let message = format!("{:#}", e);
                    let is_rate_limit = message.contains("rate_limit") || message.contains("429");
                    let backoff = Self::backoff(attempt - 1, is_rate_limit);
                    warn!(
                        "LLM call failed - service={}, attempt={}, retry_in={:?}: {:#}",
                        self.inner.name(),
                        attempt,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
