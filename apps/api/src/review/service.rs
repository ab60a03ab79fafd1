//! Review Orchestrator: truncation, prompt, backend call with 429 backoff,
//! and parse-or-fallback of the model reply.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::{ChatBackend, LlmError};
use crate::review::models::{ReplyOutcome, ReviewResult};
use crate::review::prompts::build_prompt;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("LLM backend is rate limiting requests after {attempts} attempts, please try again later")]
    RateLimited { attempts: u32 },

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Backoff schedule for rate-limited backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): base, 2×base, 4×base, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * (1u32 << retry.saturating_sub(1).min(16))
    }
}

/// Drives one review per call. Holds only immutable configuration, so a
/// single instance is shared by all in-flight requests.
pub struct ReviewService {
    backend: Arc<dyn ChatBackend>,
    model: String,
    max_chars: usize,
    retry: RetryPolicy,
}

impl ReviewService {
    pub fn new(backend: Arc<dyn ChatBackend>, model: String, max_chars: usize) -> Self {
        Self {
            backend,
            model,
            max_chars,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Reviews a CV against an optional vacancy description.
    ///
    /// Decode problems never surface here: an unparseable reply becomes a
    /// fallback `ReviewResult` that still carries the raw text.
    pub async fn review(
        &self,
        cv_text: Option<&str>,
        vacancy_text: Option<&str>,
    ) -> Result<ReviewResult, ReviewError> {
        let (cv_text, cv_truncated) = truncate_chars(cv_text.unwrap_or_default(), self.max_chars);
        if cv_truncated {
            warn!(
                "The CV text was truncated to {} characters to comply with the limit",
                self.max_chars
            );
        }

        let (vacancy_text, vacancy_truncated) =
            truncate_chars(vacancy_text.unwrap_or_default(), self.max_chars);
        if vacancy_truncated {
            warn!(
                "The job description was truncated to {} characters to comply with the limit",
                self.max_chars
            );
        }

        let prompt = build_prompt(cv_text, vacancy_text);
        debug!("Prompt length: {}", prompt.len());

        let reply = self.send_with_retry(&prompt).await?;

        let outcome = ReplyOutcome::from_reply(&reply);
        if !outcome.is_decoded() {
            warn!("Unable to parse the model response as a review: {reply}");
        }

        let truncated_to = (cv_truncated || vacancy_truncated).then_some(self.max_chars);
        Ok(outcome.into_result(truncated_to))
    }

    /// Calls the backend, backing off and retrying only on 429.
    async fn send_with_retry(&self, prompt: &str) -> Result<String, ReviewError> {
        let mut retries = 0;

        loop {
            match self.backend.send(&self.model, prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_rate_limited() => {
                    if retries >= self.retry.max_retries {
                        warn!("LLM backend still rate limited after {} retries", retries);
                        return Err(ReviewError::RateLimited {
                            attempts: retries + 1,
                        });
                    }
                    retries += 1;
                    let delay = self.retry.delay_for(retries);
                    warn!(
                        "LLM backend rate limited, retry {}/{} after {}ms",
                        retries,
                        self.retry.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(ReviewError::Llm(e)),
            }
        }
    }
}

/// Keeps at most `max_chars` characters of `text`. Returns whether it cut.
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
