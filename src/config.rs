//! Configuration types for window splitting, rewriting and reassembly.
//!
//! Every knob lives in [`StitchConfig`], built via [`StitchConfigBuilder`].

use crate::error::StitchError;
use crate::pipeline::split::validate_sizes;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for one assembly run.
///
/// # Example
/// ```rust
/// use edgequake_stitch::StitchConfig;
///
/// let config = StitchConfig::builder()
///     .window_size(4000)
///     .overlap_size(1500)
///     .oracle_concurrency(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.min_match_len, 20);
/// ```
#[derive(Clone)]
pub struct StitchConfig {
    /// Window length in chars. Default: 6000.
    pub window_size: usize,

    /// Overlap between consecutive windows in chars. Default: 3000.
    ///
    /// Also bounds the reconciler's search: only the last `overlap_size`
    /// chars of a left window and the first `overlap_size` chars of a right
    /// window are compared.
    pub overlap_size: usize,

    /// Shortest shared block accepted as a genuine overlap. Default: 20.
    ///
    /// Shorter blocks (a shared word, a run of punctuation) occur by chance
    /// in prose and would corrupt the join.
    pub min_match_len: usize,

    /// Maximum concurrent rewrite calls. Default: 4.
    pub oracle_concurrency: usize,

    /// Escalate unmatched boundaries to the stitch oracle. Default: true.
    pub assisted_reconcile: bool,

    /// Join unresolved boundaries by plain concatenation with an audit
    /// marker instead of failing the run. Default: false.
    pub force_unresolved: bool,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 8192.
    ///
    /// A 6000-char window rewrites to roughly 1500–2000 tokens; a cap that
    /// truncates the rewrite would also truncate the overlap region.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient oracle failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom rewrite prompt. If None, uses [`crate::prompts::DEFAULT_REWRITE_PROMPT`].
    pub system_prompt: Option<String>,

    /// Label of the document being rewritten, e.g. `chapter_8`.
    pub document_label: Option<String>,

    /// Optional per-window / per-boundary progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            window_size: 6000,
            overlap_size: 3000,
            min_match_len: 20,
            oracle_concurrency: 4,
            assisted_reconcile: true,
            force_unresolved: false,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            system_prompt: None,
            document_label: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for StitchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StitchConfig")
            .field("window_size", &self.window_size)
            .field("overlap_size", &self.overlap_size)
            .field("min_match_len", &self.min_match_len)
            .field("oracle_concurrency", &self.oracle_concurrency)
            .field("assisted_reconcile", &self.assisted_reconcile)
            .field("force_unresolved", &self.force_unresolved)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("document_label", &self.document_label)
            .finish()
    }
}

impl StitchConfig {
    /// Create a new builder for `StitchConfig`.
    pub fn builder() -> StitchConfigBuilder {
        StitchConfigBuilder {
            config: Self::default(),
        }
    }

    /// Validate the constraints `build()` enforces.
    pub fn validate(&self) -> Result<(), StitchError> {
        validate_sizes(self.window_size, self.overlap_size)?;
        if self.min_match_len == 0 {
            return Err(StitchError::InvalidConfig(
                "min_match_len must be ≥ 1".into(),
            ));
        }
        if self.oracle_concurrency == 0 {
            return Err(StitchError::InvalidConfig(
                "oracle_concurrency must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`StitchConfig`].
#[derive(Debug)]
pub struct StitchConfigBuilder {
    config: StitchConfig,
}

impl StitchConfigBuilder {
    pub fn window_size(mut self, n: usize) -> Self {
        self.config.window_size = n;
        self
    }

    pub fn overlap_size(mut self, n: usize) -> Self {
        self.config.overlap_size = n;
        self
    }

    pub fn min_match_len(mut self, n: usize) -> Self {
        self.config.min_match_len = n;
        self
    }

    pub fn oracle_concurrency(mut self, n: usize) -> Self {
        self.config.oracle_concurrency = n.max(1);
        self
    }

    pub fn assisted_reconcile(mut self, v: bool) -> Self {
        self.config.assisted_reconcile = v;
        self
    }

    pub fn force_unresolved(mut self, v: bool) -> Self {
        self.config.force_unresolved = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn document_label(mut self, label: impl Into<String>) -> Self {
        self.config.document_label = Some(label.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StitchConfig, StitchError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = StitchConfig::default();
        assert_eq!(c.window_size, 6000);
        assert_eq!(c.overlap_size, 3000);
        assert_eq!(c.min_match_len, 20);
        assert!(c.oracle_concurrency >= 1);
        assert!(c.assisted_reconcile);
        assert!(!c.force_unresolved);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn build_rejects_overlap_not_smaller_than_window() {
        let err = StitchConfig::builder()
            .window_size(1000)
            .overlap_size(1000)
            .build()
            .unwrap_err();
        assert!(matches!(err, StitchError::SplitConfiguration { .. }));
    }

    #[test]
    fn build_rejects_zero_overlap() {
        let err = StitchConfig::builder().overlap_size(0).build().unwrap_err();
        assert!(matches!(err, StitchError::SplitConfiguration { .. }));
    }

    #[test]
    fn build_rejects_zero_min_match() {
        let err = StitchConfig::builder().min_match_len(0).build().unwrap_err();
        assert!(matches!(err, StitchError::InvalidConfig(_)));
    }

    #[test]
    fn setters_clamp() {
        let c = StitchConfig::builder()
            .oracle_concurrency(0)
            .temperature(9.0)
            .api_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.oracle_concurrency, 1);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.api_timeout_secs, 1);
    }

    #[test]
    fn debug_hides_provider() {
        let dbg = format!("{:?}", StitchConfig::default());
        assert!(dbg.contains("window_size: 6000"));
        assert!(dbg.contains("provider: None"));
    }
}
