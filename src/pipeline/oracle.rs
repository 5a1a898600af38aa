//! Oracle collaborators: the rewrite and stitch interfaces, and the
//! LLM-backed implementation of both.
//!
//! The core never talks to a model directly. It only sees two narrow traits:
//!
//! * [`RewriteOracle`]: rewrite one window's text;
//! * [`StitchOracle`]: merge a left tail and a right head into one fragment.
//!
//! Retry and timeout policy belongs to the oracle: by the time either call
//! returns, the oracle has done all the retrying it is going to do.
//!
//! ## Retry Strategy
//!
//! [`LlmOracle`] retries transient failures (HTTP 429/5xx, timeouts, empty
//! completions) with exponential backoff: `retry_backoff_ms * 2^(attempt-1)`,
//! i.e. 500 ms → 1 s → 2 s with the defaults. Failures that will not change
//! on retry (authentication, content filter, context overflow) return
//! [`OracleError::Rejected`] immediately.

use crate::config::StitchConfig;
use crate::error::{OracleError, StitchError};
use crate::pipeline::postprocess::clean_output;
use crate::pipeline::split::Window;
use crate::prompts::{rewrite_request, stitch_request, DEFAULT_REWRITE_PROMPT, STITCH_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A window together with the oracle's rewrite of it.
///
/// `rewritten_text` has no length or byte-level relationship to
/// `source_window.text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenWindow {
    pub source_window: Window,
    pub rewritten_text: String,
}

impl RewrittenWindow {
    pub fn index(&self) -> usize {
        self.source_window.index
    }
}

/// Rewrites a single window of text.
#[async_trait]
pub trait RewriteOracle: Send + Sync {
    async fn rewrite(&self, window_text: &str) -> Result<String, OracleError>;
}

/// Merges two overlapping fragments into one.
#[async_trait]
pub trait StitchOracle: Send + Sync {
    async fn stitch(&self, left_tail: &str, right_head: &str) -> Result<String, OracleError>;
}

// ── LLM-backed oracle ────────────────────────────────────────────────────

/// Call parameters copied out of [`StitchConfig`].
#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub system_prompt: String,
    pub document_label: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub api_timeout_secs: u64,
}

impl OracleSettings {
    pub fn from_config(config: &StitchConfig) -> Self {
        Self {
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_REWRITE_PROMPT.to_string()),
            document_label: config.document_label.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Identifies the output-affecting settings, for keying a [`MemoOracle`].
    pub fn fingerprint(&self, model: &str) -> String {
        format!(
            "{model}|{}|{}|{}|{}",
            self.temperature,
            self.max_tokens,
            self.document_label.as_deref().unwrap_or(""),
            self.system_prompt
        )
    }
}

/// Rewrite and stitch oracle backed by an `edgequake_llm` provider.
pub struct LlmOracle {
    provider: Arc<dyn LLMProvider>,
    settings: OracleSettings,
}

impl LlmOracle {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: OracleSettings) -> Self {
        Self { provider, settings }
    }

    /// Resolve the provider from `config` and build an oracle around it.
    pub fn from_config(config: &StitchConfig) -> Result<Self, StitchError> {
        Ok(Self::new(
            resolve_provider(config)?,
            OracleSettings::from_config(config),
        ))
    }

    /// See [`OracleSettings::fingerprint`].
    pub fn fingerprint(&self, model: &str) -> String {
        self.settings.fingerprint(model)
    }

    /// Send `messages`, retrying transient failures.
    async fn complete(&self, what: &str, messages: Vec<ChatMessage>) -> Result<String, OracleError> {
        let start = Instant::now();
        let s = &self.settings;
        let options = build_options(s);
        let call_timeout = Duration::from_secs(s.api_timeout_secs);
        let mut last_err: Option<String> = None;

        for attempt in 0..=s.max_retries {
            if attempt > 0 {
                let backoff = s.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    what, attempt, s.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(call_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    let text = clean_output(&response.content);
                    if text.trim().is_empty() {
                        warn!("{}: attempt {} returned an empty completion", what, attempt + 1);
                        last_err = Some("empty completion".to_string());
                        continue;
                    }
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        what,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(text);
                }
                Ok(Err(e)) => {
                    let detail = e.to_string();
                    if is_permanent_failure(&detail) {
                        warn!("{}: rejected: {}", what, detail);
                        return Err(OracleError::Rejected { detail });
                    }
                    warn!("{}: attempt {} failed: {}", what, attempt + 1, detail);
                    last_err = Some(detail);
                }
                Err(_) => {
                    warn!(
                        "{}: attempt {} timed out after {}s",
                        what,
                        attempt + 1,
                        s.api_timeout_secs
                    );
                    last_err = Some(format!("timed out after {}s", s.api_timeout_secs));
                }
            }
        }

        Err(OracleError::Unavailable {
            attempts: s.max_retries + 1,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

#[async_trait]
impl RewriteOracle for LlmOracle {
    async fn rewrite(&self, window_text: &str) -> Result<String, OracleError> {
        let messages = vec![
            ChatMessage::system(self.settings.system_prompt.as_str()),
            ChatMessage::user(rewrite_request(
                window_text,
                self.settings.document_label.as_deref(),
            )),
        ];
        self.complete("rewrite", messages).await
    }
}

#[async_trait]
impl StitchOracle for LlmOracle {
    async fn stitch(&self, left_tail: &str, right_head: &str) -> Result<String, OracleError> {
        let messages = vec![
            ChatMessage::system(STITCH_SYSTEM_PROMPT),
            ChatMessage::user(stitch_request(left_tail, right_head)),
        ];
        self.complete("stitch", messages).await
    }
}

/// Build `CompletionOptions` from the oracle settings.
fn build_options(settings: &OracleSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        ..Default::default()
    }
}

/// Provider errors that a retry cannot fix.
fn is_permanent_failure(detail: &str) -> bool {
    const MARKERS: [&str; 9] = [
        "content_filter",
        "content filter",
        "401",
        "403",
        "unauthorized",
        "invalid api key",
        "invalid_api_key",
        "context_length_exceeded",
        "maximum context length",
    ];
    let lower = detail.to_lowercase();
    MARKERS.iter().any(|m| lower.contains(m))
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`), API key from env.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &StitchConfig) -> Result<Arc<dyn LLMProvider>, StitchError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| StitchError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, StitchError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        StitchError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

// ── Memoization ──────────────────────────────────────────────────────────

/// Memoizing decorator around a [`RewriteOracle`].
///
/// Successful rewrites are cached in memory, keyed on the oracle
/// fingerprint plus the exact window text; failures are never cached.
/// Re-running an assembly after a partial failure then only pays for the
/// windows that failed.
pub struct MemoOracle {
    inner: Arc<dyn RewriteOracle>,
    fingerprint: String,
    cache: Mutex<HashMap<String, String>>,
}

impl MemoOracle {
    pub fn new(inner: Arc<dyn RewriteOracle>, fingerprint: impl Into<String>) -> Self {
        Self {
            inner,
            fingerprint: fingerprint.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached rewrites.
    pub async fn cached(&self) -> usize {
        self.cache.lock().await.len()
    }

    fn key(&self, window_text: &str) -> String {
        format!("{}\u{1f}{}", self.fingerprint, window_text)
    }
}

#[async_trait]
impl RewriteOracle for MemoOracle {
    async fn rewrite(&self, window_text: &str) -> Result<String, OracleError> {
        let key = self.key(window_text);
        if let Some(hit) = self.cache.lock().await.get(&key).cloned() {
            debug!("rewrite cache hit ({} chars)", hit.len());
            return Ok(hit);
        }

        let rewritten = self.inner.rewrite(window_text).await?;
        self.cache.lock().await.insert(key, rewritten.clone());
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOracle {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RewriteOracle for CountingOracle {
        async fn rewrite(&self, window_text: &str) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(OracleError::Unavailable {
                    attempts: 1,
                    detail: "503".into(),
                });
            }
            Ok(window_text.to_uppercase())
        }
    }

    #[test]
    fn build_options_defaults() {
        let settings = OracleSettings::from_config(&StitchConfig::default());
        let opts = build_options(&settings);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[test]
    fn settings_fall_back_to_default_prompt() {
        let settings = OracleSettings::from_config(&StitchConfig::default());
        assert_eq!(settings.system_prompt, DEFAULT_REWRITE_PROMPT);

        let custom = StitchConfig::builder()
            .system_prompt("be brief")
            .build()
            .unwrap();
        assert_eq!(OracleSettings::from_config(&custom).system_prompt, "be brief");
    }

    #[test]
    fn fingerprint_changes_with_output_settings() {
        let base = OracleSettings::from_config(&StitchConfig::default());
        let labelled = OracleSettings::from_config(
            &StitchConfig::builder()
                .document_label("chapter_8")
                .build()
                .unwrap(),
        );
        assert_eq!(base.fingerprint("m"), base.fingerprint("m"));
        assert_ne!(base.fingerprint("m"), base.fingerprint("n"));
        assert_ne!(base.fingerprint("m"), labelled.fingerprint("m"));
    }

    #[test]
    fn permanent_failures_classified() {
        assert!(is_permanent_failure("API error: 401 Unauthorized"));
        assert!(is_permanent_failure("finish_reason=content_filter"));
        assert!(is_permanent_failure("This model's maximum context length is 8192"));
        assert!(!is_permanent_failure("503 Service Unavailable"));
        assert!(!is_permanent_failure("rate limit exceeded"));
    }

    fn mock_oracle(mock: &Arc<edgequake_llm::MockProvider>, max_retries: u32) -> LlmOracle {
        let config = StitchConfig::builder()
            .provider(mock.clone())
            .max_retries(max_retries)
            .retry_backoff_ms(0)
            .build()
            .unwrap();
        LlmOracle::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn empty_completion_is_retried_and_output_cleaned() {
        let mock = Arc::new(edgequake_llm::MockProvider::new());
        mock.add_response("").await;
        mock.add_response("```markdown\n# Chapter 8\n\nBody text.\n```").await;
        let oracle = mock_oracle(&mock, 2);

        let text = oracle.rewrite("raw window").await;
        assert_eq!(text.unwrap(), "# Chapter 8\n\nBody text.");
    }

    #[tokio::test]
    async fn exhausted_retries_are_unavailable() {
        let mock = Arc::new(edgequake_llm::MockProvider::new());
        mock.add_response("").await;
        mock.add_response("  \n").await;
        mock.add_response("never reached").await;
        let oracle = mock_oracle(&mock, 1);

        match oracle.stitch("left tail", "right head").await {
            Err(OracleError::Unavailable { attempts, detail }) => {
                assert_eq!(attempts, 2);
                assert!(detail.contains("empty completion"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn memo_oracle_caches_successes() {
        let inner = Arc::new(CountingOracle {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let memo = MemoOracle::new(inner.clone(), "model-a");

        assert_eq!(memo.rewrite("abc").await.unwrap(), "ABC");
        assert_eq!(memo.rewrite("abc").await.unwrap(), "ABC");
        assert_eq!(memo.rewrite("xyz").await.unwrap(), "XYZ");

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(memo.cached().await, 2);
    }

    #[tokio::test]
    async fn memo_oracle_does_not_cache_failures() {
        let inner = Arc::new(CountingOracle {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let memo = MemoOracle::new(inner.clone(), "model-a");

        assert!(memo.rewrite("abc").await.is_err());
        assert!(memo.rewrite("abc").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(memo.cached().await, 0);
    }
}
