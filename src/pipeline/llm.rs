//! Vision backends: send one page image plus the layout prompt, get text back.
//!
//! Two implementations sit behind [`VisionBackend`]:
//!
//! * [`GeminiBackend`] talks to the Gemini `generateContent` REST endpoint
//!   directly, using the key resolved from the environment or key file. It
//!   asks for `application/json` output so replies rarely need cleaning.
//! * [`ProviderBackend`] goes through `edgequake-llm`, which covers OpenAI,
//!   Anthropic, Ollama and the other providers it knows, each reading its own
//!   API key variable.
//!
//! Backends do not retry. They report what happened as an [`ExtractError`]
//! and leave the policy to [`crate::pipeline::retry`].

use crate::config::{Backend, ConversionConfig};
use crate::error::{ExtractError, Pdf2PptxError};
use crate::pipeline::encode::EncodedImage;
use crate::prompts::JSON_ONLY_REMINDER;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Default Gemini REST endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One model call.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub image: &'a EncodedImage,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Raw model output and token usage.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Something that can describe a page image.
pub trait VisionBackend: Send + Sync {
    /// Short name for logs and error messages.
    fn name(&self) -> &str;

    fn generate<'a>(
        &'a self,
        request: VisionRequest<'a>,
    ) -> impl Future<Output = Result<ModelReply, ExtractError>> + Send + 'a;
}

// ── Error classification ─────────────────────────────────────────────────

/// Classify a provider error message.
///
/// Used for errors that only arrive as text (Gemini error bodies with a 4xx
/// status other than 401/403/429). Status codes count only as whole tokens,
/// so token counts, request ids or pixel sizes that happen to contain
/// `401` or `429` stay ordinary model errors.
pub fn classify_error_text(model: &str, message: &str) -> ExtractError {
    let lower = message.to_ascii_lowercase();
    if RE_RATE_STATUS.is_match(&lower)
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("resource_exhausted")
        || lower.contains("quota")
        || lower.contains("too many requests")
    {
        ExtractError::RateLimited {
            model: model.to_string(),
            retry_after_secs: retry_delay_hint(message),
        }
    } else if RE_AUTH_STATUS.is_match(&lower)
        || lower.contains("unauthorized")
        || lower.contains("permission_denied")
        || lower.contains("api_key_invalid")
        || lower.contains("invalid api key")
        || lower.contains("api key not valid")
    {
        ExtractError::Unauthorized {
            model: model.to_string(),
            detail: truncate(message, 300),
        }
    } else {
        ExtractError::model_error(model, truncate(message, 300))
    }
}

/// Map a typed edgequake-llm error. Only the provider's own rate-limit and
/// auth variants are special; everything else moves on to the next model.
fn classify_llm_error(model: &str, err: &LlmError) -> ExtractError {
    match err {
        LlmError::RateLimited(msg) => ExtractError::RateLimited {
            model: model.to_string(),
            retry_after_secs: retry_delay_hint(msg),
        },
        LlmError::AuthError(msg) => ExtractError::Unauthorized {
            model: model.to_string(),
            detail: truncate(msg, 300),
        },
        other => ExtractError::model_error(model, truncate(&other.to_string(), 300)),
    }
}

static RE_RATE_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b429\b").unwrap());
static RE_AUTH_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(401|403)\b").unwrap());

static RE_RETRY_DELAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)retry_?delay"?\s*[:=]\s*"?(\d+)(?:\.\d+)?s"#).unwrap());

/// Gemini puts a `RetryInfo.retryDelay` such as `"31s"` in 429 bodies.
fn retry_delay_hint(body: &str) -> Option<u64> {
    RE_RETRY_DELAY
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.trim();
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// ── Gemini ───────────────────────────────────────────────────────────────

/// Gemini `generateContent` over HTTPS.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiBackend {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, Pdf2PptxError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Pdf2PptxError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or(GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Build from config, resolving the key from `config.api_key`, then the
    /// environment variable, then the key file.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Pdf2PptxError> {
        let key = match config.api_key.as_deref().map(str::trim) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => crate::config::resolve_api_key(&config.api_key_env, &config.key_file)?.ok_or_else(
                || Pdf2PptxError::MissingApiKey {
                    backend: config.backend.name().to_string(),
                    env_var: config.api_key_env.clone(),
                    key_file: config.key_file.display().to_string(),
                },
            )?,
        };
        Self::new(
            key,
            config.api_base_url.as_deref(),
            Duration::from_secs(config.api_timeout_secs.max(1)),
        )
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn call(&self, req: VisionRequest<'_>) -> Result<ModelReply, ExtractError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": req.prompt },
                    { "inline_data": { "mime_type": req.image.mime_type, "data": req.image.data } }
                ]
            }],
            "generationConfig": {
                "temperature": req.temperature,
                "maxOutputTokens": req.max_tokens,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(self.endpoint(req.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::model_error(req.model, "request timed out")
                } else {
                    ExtractError::model_error(req.model, format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| ExtractError::model_error(req.model, format!("reading response: {e}")))?;

        if !status.is_success() {
            return Err(gemini_status_error(req.model, status.as_u16(), retry_after, &text));
        }
        parse_gemini_reply(req.model, &text)
    }
}

impl VisionBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate<'a>(
        &'a self,
        request: VisionRequest<'a>,
    ) -> impl Future<Output = Result<ModelReply, ExtractError>> + Send + 'a {
        self.call(request)
    }
}

fn gemini_status_error(model: &str, status: u16, retry_after: Option<u64>, body: &str) -> ExtractError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error)
        .map(|e| format!("{} {}", e.status.unwrap_or_default(), e.message.unwrap_or_default()))
        .unwrap_or_else(|| body.to_string());

    match status {
        429 => ExtractError::RateLimited {
            model: model.to_string(),
            retry_after_secs: retry_after.or_else(|| retry_delay_hint(body)),
        },
        401 | 403 => ExtractError::Unauthorized {
            model: model.to_string(),
            detail: truncate(&message, 300),
        },
        // Server-side failures say nothing about the key or the quota.
        500..=599 => {
            ExtractError::model_error(model, format!("HTTP {status}: {}", truncate(&message, 300)))
        }
        // Gemini reports a bad key as 400 INVALID_ARGUMENT with API_KEY_INVALID.
        _ => match classify_error_text(model, body) {
            ExtractError::ModelError { .. } => {
                ExtractError::model_error(model, format!("HTTP {status}: {}", truncate(&message, 300)))
            }
            other => other,
        },
    }
}

fn parse_gemini_reply(model: &str, body: &str) -> Result<ModelReply, ExtractError> {
    let parsed: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| ExtractError::model_error(model, format!("unexpected response shape: {e}")))?;

    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ExtractError::model_error(model, format!("prompt blocked: {reason}")));
    }

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::model_error(model, "no candidates in response"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(ExtractError::model_error(
            model,
            format!("empty response (finish reason: {reason})"),
        ));
    }

    let usage = parsed.usage_metadata.unwrap_or_default();
    Ok(ModelReply {
        text,
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: Option<usize>,
    #[serde(default)]
    candidates_token_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    #[serde(default)]
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// ── edgequake-llm providers ──────────────────────────────────────────────

/// Any provider `edgequake-llm` can build, one instance per model.
pub struct ProviderBackend {
    provider: String,
    cache: Mutex<HashMap<String, Arc<dyn LLMProvider>>>,
}

impl std::fmt::Debug for ProviderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBackend")
            .field("provider", &self.provider)
            .finish()
    }
}

impl ProviderBackend {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Build the provider for `model` now, so a missing key or unknown
    /// provider name fails before any page is rendered.
    pub fn check(&self, model: &str) -> Result<(), Pdf2PptxError> {
        self.provider_for(model)
            .map(|_| ())
            .map_err(|hint| Pdf2PptxError::ProviderNotConfigured {
                provider: self.provider.clone(),
                hint,
            })
    }

    fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, String> {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(p) = cache.get(model) {
            return Ok(Arc::clone(p));
        }
        let provider =
            ProviderFactory::create_llm_provider(&self.provider, model).map_err(|e| format!("{e}"))?;
        cache.insert(model.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    async fn call(&self, req: VisionRequest<'_>) -> Result<ModelReply, ExtractError> {
        let provider = self
            .provider_for(req.model)
            .map_err(|e| ExtractError::model_error(req.model, e))?;

        let image = ImageData::new(req.image.data.clone(), req.image.mime_type).with_detail("high");
        let messages = vec![
            ChatMessage::system(req.prompt),
            ChatMessage::user_with_images(JSON_ONLY_REMINDER, vec![image]),
        ];
        let options = CompletionOptions {
            temperature: Some(req.temperature),
            max_tokens: Some(req.max_tokens),
            ..Default::default()
        };

        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_llm_error(req.model, &e))?;

        debug!(
            "{}/{}: {} input tokens, {} output tokens",
            self.provider, req.model, response.prompt_tokens, response.completion_tokens
        );

        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

impl VisionBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.provider
    }

    fn generate<'a>(
        &'a self,
        request: VisionRequest<'a>,
    ) -> impl Future<Output = Result<ModelReply, ExtractError>> + Send + 'a {
        self.call(request)
    }
}

// ── Backend selection ────────────────────────────────────────────────────

/// The backend chosen by [`ConversionConfig::backend`].
#[derive(Debug)]
pub enum AnyBackend {
    Gemini(GeminiBackend),
    Provider(ProviderBackend),
}

impl AnyBackend {
    /// Build and validate the configured backend.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Pdf2PptxError> {
        match &config.backend {
            Backend::Gemini => Ok(AnyBackend::Gemini(GeminiBackend::from_config(config)?)),
            Backend::Provider(name) => {
                let backend = ProviderBackend::new(name.clone());
                if let Some(first) = config.models.first() {
                    backend.check(first)?;
                }
                Ok(AnyBackend::Provider(backend))
            }
        }
    }
}

impl VisionBackend for AnyBackend {
    fn name(&self) -> &str {
        match self {
            AnyBackend::Gemini(b) => b.name(),
            AnyBackend::Provider(b) => b.name(),
        }
    }

    fn generate<'a>(
        &'a self,
        request: VisionRequest<'a>,
    ) -> impl Future<Output = Result<ModelReply, ExtractError>> + Send + 'a {
        async move {
            match self {
                AnyBackend::Gemini(b) => b.generate(request).await,
                AnyBackend::Provider(b) => b.generate(request).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_messages_are_recognised() {
        for msg in [
            "HTTP 429 Too Many Requests",
            "Rate limit reached for gpt-4.1-mini",
            "RESOURCE_EXHAUSTED: quota exceeded",
        ] {
            assert!(
                matches!(classify_error_text("m", msg), ExtractError::RateLimited { .. }),
                "{msg}"
            );
        }
    }

    #[test]
    fn auth_messages_are_recognised() {
        for msg in ["401 Unauthorized", "API key not valid. Please pass a valid API key.", "API_KEY_INVALID"] {
            assert!(
                matches!(classify_error_text("m", msg), ExtractError::Unauthorized { .. }),
                "{msg}"
            );
        }
    }

    #[test]
    fn other_messages_are_model_errors() {
        for msg in [
            "connection reset by peer",
            "HTTP 400: The input token count (14013) exceeds the maximum number of tokens allowed",
            "Provider error: image 1429x900 too large",
            "internal error, request id 84031",
            "upstream returned 4290 bytes of garbage",
            "Authentication header was stripped by proxy 403401",
        ] {
            assert!(
                matches!(classify_error_text("m", msg), ExtractError::ModelError { .. }),
                "{msg}"
            );
        }
    }

    #[test]
    fn status_codes_match_as_whole_tokens() {
        assert!(matches!(
            classify_error_text("m", "status: 403 PERMISSION_DENIED"),
            ExtractError::Unauthorized { .. }
        ));
        assert!(matches!(
            classify_error_text("m", "upstream said (429)"),
            ExtractError::RateLimited { .. }
        ));
    }

    #[test]
    fn server_error_is_never_reclassified_from_body() {
        for body in [
            r#"{"error":{"message":"internal error, request id 84031","status":"INTERNAL"}}"#,
            r#"{"error":{"message":"quota backend unavailable","status":"UNAVAILABLE"}}"#,
            "401 upstream",
        ] {
            assert!(
                matches!(gemini_status_error("m", 500, None, body), ExtractError::ModelError { .. }),
                "{body}"
            );
        }
        assert!(matches!(
            gemini_status_error("m", 503, None, "Unauthorized"),
            ExtractError::ModelError { .. }
        ));
    }

    #[test]
    fn typed_provider_errors_map_by_variant() {
        assert!(matches!(
            classify_llm_error("m", &LlmError::RateLimited("slow down".into())),
            ExtractError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_llm_error("m", &LlmError::AuthError("bad key".into())),
            ExtractError::Unauthorized { .. }
        ));
        for err in [
            LlmError::ApiError("HTTP 401 echoed in a 14013-token prompt".into()),
            LlmError::ProviderError("429".into()),
            LlmError::InvalidRequest("image 1429x900 too large".into()),
            LlmError::Timeout,
        ] {
            assert!(
                matches!(classify_llm_error("m", &err), ExtractError::ModelError { .. }),
                "{err}"
            );
        }
    }

    #[test]
    fn retry_delay_is_read_from_gemini_body() {
        let body = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"31s"}]}}"#;
        assert_eq!(retry_delay_hint(body), Some(31));
        match gemini_status_error("gemini-2.5-flash", 429, None, body) {
            ExtractError::RateLimited { retry_after_secs, .. } => assert_eq!(retry_after_secs, Some(31)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn header_retry_after_wins() {
        match gemini_status_error("m", 429, Some(7), "{}") {
            ExtractError::RateLimited { retry_after_secs, .. } => assert_eq!(retry_after_secs, Some(7)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_key_in_400_body_is_unauthorized() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        assert!(matches!(
            gemini_status_error("m", 400, None, body),
            ExtractError::Unauthorized { .. }
        ));
    }

    #[test]
    fn server_error_is_model_error_with_status() {
        let e = gemini_status_error("m", 500, None, r#"{"error":{"message":"internal","status":"INTERNAL"}}"#);
        match e {
            ExtractError::ModelError { detail, .. } => assert!(detail.contains("HTTP 500"), "{detail}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn gemini_reply_text_and_usage() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"[]"}],"role":"model"},"finishReason":"STOP"}],
            "usageMetadata":{"promptTokenCount":1290,"candidatesTokenCount":3}}"#;
        let reply = parse_gemini_reply("m", body).unwrap();
        assert_eq!(reply.text, "[]");
        assert_eq!(reply.input_tokens, 1290);
        assert_eq!(reply.output_tokens, 3);
    }

    #[test]
    fn gemini_blocked_prompt_is_model_error() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let e = parse_gemini_reply("m", body).unwrap_err();
        assert!(e.to_string().contains("SAFETY"));
    }

    #[test]
    fn gemini_empty_candidate_is_model_error() {
        let body = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        let e = parse_gemini_reply("m", body).unwrap_err();
        assert!(e.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn missing_key_is_reported_with_sources() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .api_key_env("EDGEQUAKE_PDF2PPTX_TEST_KEY_THAT_IS_NEVER_SET")
            .key_file(dir.path().join("absent.env"))
            .build()
            .unwrap();
        let err = GeminiBackend::from_config(&config).unwrap_err();
        assert!(matches!(err, Pdf2PptxError::MissingApiKey { .. }));
    }

    #[test]
    fn explicit_key_builds_backend() {
        let config = ConversionConfig::builder().api_key("k").build().unwrap();
        let backend = GeminiBackend::from_config(&config).unwrap();
        assert_eq!(backend.endpoint("gemini-2.5-flash"), format!("{GEMINI_BASE_URL}/models/gemini-2.5-flash:generateContent"));
        assert!(!format!("{backend:?}").contains("\"k\""));
    }
}
