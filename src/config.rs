//! Configuration types for PDF-to-PPTX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`] and passed explicitly into
//! [`crate::convert::convert`]. Nothing is read from module-level state; the
//! only environment access is [`resolve_api_key`], which callers invoke
//! themselves (the CLI does so once at startup).

use crate::error::Pdf2PptxError;
use crate::pipeline::retry::RetryPolicy;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Gemini models tried in order when none are configured. Ordered by
/// free-tier requests-per-minute, highest first.
pub const DEFAULT_GEMINI_MODELS: &[&str] =
    &["gemini-2.5-flash-lite", "gemini-2.5-flash", "gemini-2.0-flash"];

/// Environment variable holding the Gemini API key.
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Key-value file consulted when the environment variable is unset.
pub const DEFAULT_KEY_FILE: &str = ".env";

/// Which API the layout extractor talks to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Google Gemini `generateContent` REST API, called directly.
    #[default]
    Gemini,
    /// Any provider known to edgequake-llm (`openai`, `anthropic`, `ollama`, …).
    /// Credentials come from that provider's usual environment variable.
    Provider(String),
}

impl Backend {
    /// Parse a `--provider` value.
    pub fn parse(s: &str) -> Backend {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "gemini" | "google" => Backend::Gemini,
            other => Backend::Provider(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Backend::Gemini => "gemini",
            Backend::Provider(name) => name,
        }
    }

    /// Candidate models used when the caller does not list any.
    pub fn default_models(&self) -> Vec<String> {
        let models: &[&str] = match self {
            Backend::Gemini => DEFAULT_GEMINI_MODELS,
            Backend::Provider(name) => match name.as_str() {
                "openai" => &["gpt-4.1-mini", "gpt-4.1-nano"],
                "anthropic" => &["claude-sonnet-4-20250514", "claude-haiku-4-20250514"],
                "ollama" => &["llama3.2-vision"],
                _ => &[],
            },
        };
        models.iter().map(|m| m.to_string()).collect()
    }
}

/// Physical size of the generated slides.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SlideSize {
    /// 16:9 when the first page's aspect ratio exceeds 1.5, 4:3 otherwise. (default)
    #[default]
    Auto,
    /// 13.333 in × 7.5 in.
    Widescreen,
    /// 10 in × 7.5 in.
    Standard,
    /// Explicit size in EMU (914 400 per inch).
    Custom { width_emu: i64, height_emu: i64 },
}

impl SlideSize {
    pub const EMU_PER_INCH: i64 = 914_400;
    const WIDESCREEN: (i64, i64) = (12_192_000, 6_858_000);
    const STANDARD: (i64, i64) = (9_144_000, 6_858_000);

    /// Resolve to `(width_emu, height_emu)` for a page of the given size in points.
    pub fn resolve(self, page_width_pt: f32, page_height_pt: f32) -> (i64, i64) {
        match self {
            SlideSize::Widescreen => Self::WIDESCREEN,
            SlideSize::Standard => Self::STANDARD,
            SlideSize::Custom {
                width_emu,
                height_emu,
            } => (width_emu, height_emu),
            SlideSize::Auto => {
                if page_height_pt > 0.0 && page_width_pt / page_height_pt > 1.5 {
                    Self::WIDESCREEN
                } else {
                    Self::STANDARD
                }
            }
        }
    }
}

/// Configuration for a PDF-to-PPTX conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2pptx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(150)
///     .api_key("test-key")
///     .models(["gemini-2.5-flash"])
///     .build()
///     .unwrap();
/// assert_eq!(config.models, vec!["gemini-2.5-flash".to_string()]);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// DPI of the background render. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Cap on either edge of the background render, in pixels. Default: 2400.
    pub max_rendered_pixels: u32,

    /// Longest edge of the copy sent to the model, in pixels. Default: 1200.
    ///
    /// The model needs far less resolution than the slide background, and
    /// image tokens are billed by size.
    pub model_max_dimension: u32,

    /// Which API performs layout extraction. Default: [`Backend::Gemini`].
    pub backend: Backend,

    /// Candidate models, tried in order. Filled from
    /// [`Backend::default_models`] when left empty.
    pub models: Vec<String>,

    /// API key for the Gemini backend.
    pub api_key: Option<String>,

    /// Variable the key was expected in; used in error messages.
    pub api_key_env: String,

    /// Key-value file the key was expected in; used in error messages.
    pub key_file: PathBuf,

    /// Override for the Gemini endpoint base URL.
    pub api_base_url: Option<String>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 8192.
    pub max_tokens: usize,

    /// Backoff and attempt limits for rate-limited calls.
    pub retry: RetryPolicy,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom extraction prompt. If None, uses [`crate::prompts::LAYOUT_PROMPT`].
    pub system_prompt: Option<String>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Slide dimensions. Default: [`SlideSize::Auto`].
    pub slide_size: SlideSize,

    /// Typeface applied to every text run. Default: "Arial".
    pub font_family: String,

    /// Skip extraction; every slide is image-only and no API key is needed.
    pub images_only: bool,

    /// Pause between pages, to stay under per-minute quotas. Default: 0.
    pub page_delay_ms: u64,

    /// HTTP timeout for a single model call, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Explicit pdfium library (file or directory). Falls back to
    /// `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 2400,
            model_max_dimension: 1200,
            backend: Backend::default(),
            models: Backend::default().default_models(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            api_base_url: None,
            temperature: 0.1,
            max_tokens: 8192,
            retry: RetryPolicy::default(),
            password: None,
            system_prompt: None,
            pages: PageSelection::default(),
            slide_size: SlideSize::default(),
            font_family: "Arial".to_string(),
            images_only: false,
            page_delay_ms: 0,
            api_timeout_secs: 120,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model_max_dimension", &self.model_max_dimension)
            .field("backend", &self.backend)
            .field("models", &self.models)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .field("pages", &self.pages)
            .field("slide_size", &self.slide_size)
            .field("font_family", &self.font_family)
            .field("images_only", &self.images_only)
            .field("page_delay_ms", &self.page_delay_ms)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
            models_set: false,
        }
    }

    /// The extraction prompt in effect.
    pub fn prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(crate::prompts::LAYOUT_PROMPT)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
    models_set: bool,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model_max_dimension(mut self, px: u32) -> Self {
        self.config.model_max_dimension = px.max(64);
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Replace the candidate model list.
    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.models = models.into_iter().map(Into::into).collect();
        self.models_set = true;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.key_file = path.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = Some(url.into());
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

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn slide_size(mut self, size: SlideSize) -> Self {
        self.config.slide_size = size;
        self
    }

    pub fn font_family(mut self, family: impl Into<String>) -> Self {
        self.config.font_family = family.into();
        self
    }

    pub fn images_only(mut self, v: bool) -> Self {
        self.config.images_only = v;
        self
    }

    pub fn page_delay_ms(mut self, ms: u64) -> Self {
        self.config.page_delay_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ConversionConfig, Pdf2PptxError> {
        if !self.models_set {
            self.config.models = self.config.backend.default_models();
        }
        self.config.models.retain(|m| !m.trim().is_empty());

        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Pdf2PptxError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if !c.images_only && c.models.is_empty() {
            return Err(Pdf2PptxError::InvalidConfig(format!(
                "no candidate models for provider '{}'; pass --model",
                c.backend.name()
            )));
        }
        c.retry.validate()?;
        if let SlideSize::Custom { width_emu, height_emu } = c.slide_size {
            if width_emu < SlideSize::EMU_PER_INCH || height_emu < SlideSize::EMU_PER_INCH {
                return Err(Pdf2PptxError::InvalidConfig(format!(
                    "custom slide size must be at least 1 inch per side, got {width_emu} × {height_emu} EMU"
                )));
            }
        }
        if c.font_family.trim().is_empty() {
            return Err(Pdf2PptxError::InvalidConfig(
                "font family must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── API key resolution ───────────────────────────────────────────────────

/// Read a `KEY=VALUE` file.
///
/// Blank lines and `#` comments are skipped, an optional `export ` prefix is
/// accepted and matching single or double quotes around the value are
/// removed. A missing file yields an empty map.
pub fn load_key_file(path: &Path) -> Result<HashMap<String, String>, Pdf2PptxError> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(Pdf2PptxError::KeyFileUnreadable {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    Ok(parse_key_values(&text))
}

fn parse_key_values(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = ['"', '\'']
            .iter()
            .find_map(|q| {
                value
                    .strip_prefix(*q)
                    .and_then(|v| v.strip_suffix(*q))
            })
            .unwrap_or(value);
        // First definition wins, like a shell sourcing the file once.
        map.entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }
    map
}

/// Look the API key up in the environment, then in the key file.
///
/// Returns `Ok(None)` when neither has a non-empty value.
pub fn resolve_api_key(env_var: &str, key_file: &Path) -> Result<Option<String>, Pdf2PptxError> {
    if let Ok(v) = std::env::var(env_var) {
        if !v.trim().is_empty() {
            return Ok(Some(v.trim().to_string()));
        }
    }
    let entries = load_key_file(key_file)?;
    Ok(entries
        .get(env_var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF become slides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
