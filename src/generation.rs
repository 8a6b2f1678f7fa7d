//! Generation service client with bounded retry
//!
//! The external provider sits behind the [`TextGenerator`] trait. Its one
//! contractually meaningful failure distinction is the transient-overload
//! signal: only that signal is retried, with exponential backoff, up to a
//! configured attempt budget. Everything else fails fast.
//!
//! Backoff waits are `tokio::time::sleep` calls, so a waiting request
//! yields its worker instead of blocking it.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::AppError;
use crate::metrics;
use crate::records::InsightPayload;

/// Failure reported by the generation provider
#[derive(Debug)]
pub struct GenerationError {
    /// True only for the provider's "temporarily unavailable / overloaded"
    /// status. All other causes are presumed non-transient.
    pub transient_overload: bool,
    pub cause: String,
}

impl GenerationError {
    pub fn overloaded(cause: impl Into<String>) -> Self {
        Self {
            transient_overload: true,
            cause: cause.into(),
        }
    }

    pub fn fatal(cause: impl Into<String>) -> Self {
        Self {
            transient_overload: false,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl std::error::Error for GenerationError {}

/// External generation provider boundary
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One synchronous-from-the-caller's-view generation attempt.
    /// All-or-nothing: no partial or streamed output.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

// ============================================================================
// Retry policy
// ============================================================================

/// Bounded-retry configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first call
    pub max_attempts: u32,
    /// Backoff base; attempt n waits `base_delay * 2^n` before retrying
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Provider handle plus retry policy, shared across requests
#[derive(Clone)]
pub struct GenerationClient {
    generator: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
}

impl GenerationClient {
    pub fn new(generator: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    /// Call the provider, retrying only on the transient-overload signal.
    ///
    /// Delays are 1, 2, 4, ... base units for attempts 0, 1, 2, ...; a
    /// non-transient failure returns immediately as `GenerationFailed`, an
    /// exhausted budget as `GenerationOverloaded`.
    pub async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let mut attempt: u32 = 0;

        loop {
            match self.generator.generate(prompt).await {
                Ok(text) => {
                    metrics::GENERATION_ATTEMPTS_TOTAL
                        .with_label_values(&["ok"])
                        .inc();
                    return Ok(text);
                }
                Err(err) if !err.transient_overload => {
                    metrics::GENERATION_ATTEMPTS_TOTAL
                        .with_label_values(&["failed"])
                        .inc();
                    tracing::error!(attempt, cause = %err, "generation failed (non-transient)");
                    return Err(AppError::GenerationFailed(err.cause));
                }
                Err(err) => {
                    metrics::GENERATION_ATTEMPTS_TOTAL
                        .with_label_values(&["overloaded"])
                        .inc();

                    if attempt + 1 >= self.policy.max_attempts {
                        tracing::error!(
                            attempts = self.policy.max_attempts,
                            cause = %err,
                            "generation retry budget exhausted"
                        );
                        return Err(AppError::GenerationOverloaded {
                            attempts: self.policy.max_attempts,
                        });
                    }

                    let delay = self.policy.base_delay * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "generation provider overloaded, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ============================================================================
// Prompt assembly
// ============================================================================

/// Fixed instruction block prefixed to every generation request
const INSIGHT_INSTRUCTIONS: &str = "\
You are an experienced school counselor. Using the structured student data \
below, write a concise analytical report covering: academic performance \
trends per subject, strengths shown in activities, behavioural patterns from \
observations, and two or three concrete recommendations for the educator. \
Write in plain prose, no markdown headings.";

/// Build the full prompt: instruction template plus the serialized payload.
pub fn build_prompt(payload: &InsightPayload) -> anyhow::Result<String> {
    let serialized = serde_json::to_string_pretty(payload)?;
    Ok(format!("{INSIGHT_INSTRUCTIONS}\n\nStudent data:\n{serialized}"))
}

// ============================================================================
// HTTP provider
// ============================================================================

/// Generation provider over an OpenAI-compatible chat completions endpoint
pub struct HttpTextGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpTextGenerator {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Overload statuses: standard rate-limit (429), unavailable (503) and
    /// the Anthropic-style overloaded status (529).
    fn is_overload_status(status: reqwest::StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 503 | 529)
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await
            .map_err(|e| GenerationError::fatal(format!("generation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let cause = format!(
                "generation request failed with status {}: {}",
                status.as_u16(),
                body.chars().take(240).collect::<String>()
            );
            return if Self::is_overload_status(status) {
                Err(GenerationError::overloaded(cause))
            } else {
                Err(GenerationError::fatal(cause))
            };
        }

        let payload = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| GenerationError::fatal(format!("failed to parse response json: {e}")))?;

        payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.pointer("/message/content"))
            .and_then(serde_json::Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(|text| text.to_string())
            .ok_or_else(|| GenerationError::fatal("response missing message content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{InsightPayload, PayloadStudent};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Fails `failures` times (overloaded or fatal), then succeeds.
    struct Scripted {
        failures: u32,
        overload: bool,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(failures: u32, overload: bool) -> Self {
            Self {
                failures,
                overload,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.overload {
                    Err(GenerationError::overloaded("upstream overloaded"))
                } else {
                    Err(GenerationError::fatal("quota exhausted"))
                }
            } else {
                Ok("generated report".to_string())
            }
        }
    }

    fn client(gen: Arc<Scripted>, max_attempts: u32) -> GenerationClient {
        GenerationClient::new(
            gen,
            RetryPolicy {
                max_attempts,
                base_delay: Duration::from_secs(1),
            },
        )
    }

    #[tokio::test]
    async fn first_attempt_success_makes_one_call() {
        let gen = Arc::new(Scripted::new(0, true));
        let out = client(gen.clone(), 3).generate("p").await.unwrap();

        assert_eq!(out, "generated report");
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overload_retries_with_exponential_backoff() {
        let gen = Arc::new(Scripted::new(2, true));
        let start = Instant::now();

        let out = client(gen.clone(), 4).generate("p").await.unwrap();

        assert_eq!(out, "generated report");
        // k=2 failures then success: 3 calls, delays 1s + 2s
        assert_eq!(gen.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn overload_exhausts_budget() {
        let gen = Arc::new(Scripted::new(10, true));
        let start = Instant::now();

        let err = client(gen.clone(), 3).generate("p").await.unwrap_err();

        assert_eq!(err.code(), "GENERATION_OVERLOADED");
        assert_eq!(err.status_code().as_u16(), 503);
        // Exactly max_attempts calls, waits of 1s and 2s between them
        assert_eq!(gen.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn non_transient_failure_does_not_retry() {
        let gen = Arc::new(Scripted::new(10, false));

        let err = client(gen.clone(), 3).generate("p").await.unwrap_err();

        assert_eq!(err.code(), "GENERATION_FAILED");
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_budget_never_sleeps() {
        let gen = Arc::new(Scripted::new(10, true));
        let start = Instant::now();

        let err = client(gen.clone(), 1).generate("p").await.unwrap_err();

        assert_eq!(err.code(), "GENERATION_OVERLOADED");
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn prompt_contains_instructions_and_payload() {
        let payload = InsightPayload {
            student: PayloadStudent {
                full_name: "Mira Khatri".into(),
                student_number: "R-042".into(),
                date_of_birth: chrono::NaiveDate::from_ymd_opt(2012, 4, 17).unwrap(),
                gender: "F".into(),
            },
            grades: vec![],
            activity_evaluations: vec![],
            observations: vec!["Helps peers".into()],
        };

        let prompt = build_prompt(&payload).unwrap();
        assert!(prompt.starts_with("You are an experienced school counselor"));
        assert!(prompt.contains("Mira Khatri"));
        assert!(prompt.contains("Helps peers"));
    }

    #[test]
    fn overload_status_detection() {
        use reqwest::StatusCode;
        assert!(HttpTextGenerator::is_overload_status(
            StatusCode::TOO_MANY_REQUESTS
        ));
        assert!(HttpTextGenerator::is_overload_status(
            StatusCode::SERVICE_UNAVAILABLE
        ));
        assert!(HttpTextGenerator::is_overload_status(
            StatusCode::from_u16(529).unwrap()
        ));
        assert!(!HttpTextGenerator::is_overload_status(
            StatusCode::BAD_REQUEST
        ));
        assert!(!HttpTextGenerator::is_overload_status(
            StatusCode::UNAUTHORIZED
        ));
        assert!(!HttpTextGenerator::is_overload_status(
            StatusCode::INTERNAL_SERVER_ERROR
        ));
    }
}
