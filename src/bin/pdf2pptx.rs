//! CLI binary for edgequake-pdf2pptx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2pptx::config::load_key_file;
use edgequake_pdf2pptx::{
    convert_to_file, inspect, Backend, ConversionConfig, ConversionProgressCallback,
    PageSelection, ProgressCallback, RetryPolicy, SlideSize,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a bar at the bottom, one log line per slide.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_pages} pages to slides…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_boxes: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_boxes:>3} text boxes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_fallback(&self, page_num: usize, total: usize, reason: &str) {
        let secs = self.elapsed_secs(page_num);
        let msg: String = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            yellow("◐"),
            page_num,
            total,
            yellow(&format!("image only: {msg}")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, editable_count: usize) {
        self.bar.finish_and_clear();
        let image_only = total_pages.saturating_sub(editable_count);
        if image_only == 0 {
            eprintln!(
                "{} {} slides with editable text",
                green("✔"),
                bold(&editable_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides editable  ({} image-only)",
                cyan("⚠"),
                bold(&editable_count.to_string()),
                total_pages,
                yellow(&image_only.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes deck.pptx next to the PDF)
  pdf2pptx deck.pdf

  # Choose the output path and a page range
  pdf2pptx deck.pdf -o out/deck.pptx --pages 1-12

  # Try a specific model first, then the defaults are not used
  pdf2pptx --model gemini-2.5-flash,gemini-2.0-flash deck.pdf

  # Use OpenAI through edgequake-llm
  pdf2pptx --provider openai --model gpt-4.1-mini deck.pdf

  # No model at all: every slide is the page image
  pdf2pptx --images-only deck.pdf

  # Stay under a free-tier per-minute quota
  pdf2pptx --page-delay-ms 4000 deck.pdf

  # Inspect PDF metadata (no API key needed)
  pdf2pptx --inspect-only deck.pdf

  # JSON report of what happened per slide
  pdf2pptx --json deck.pdf > report.json

API KEYS:
  gemini (default)  --api-key, $GEMINI_API_KEY, or GEMINI_API_KEY=... in ./.env
  openai            $OPENAI_API_KEY
  anthropic         $ANTHROPIC_API_KEY
  ollama            none (local)

  Entries in the key file (--key-file, default ./.env) are exported to the
  environment unless already set, so provider keys can live there too.

RETRIES:
  Rate-limited calls retry on the same model with exponential backoff
  (base 2s, doubling, capped at 60s, plus jitter). Any other failure moves
  to the next model. When every model fails, the slide keeps the page image
  with no editable text and the run continues.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Gemini API key
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Convert PDF slide decks to editable PowerPoint files using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2pptx",
    version,
    about = "Convert PDF slide decks to editable PowerPoint files using Vision LLMs",
    long_about = "Render every PDF page, ask a vision model where each text block sits and \
how it is styled, and rebuild the deck as a .pptx: the page image as the slide background \
with editable text boxes on top. Pages the model cannot read become image-only slides.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Output .pptx path. Default: the input path with a .pptx extension.
    #[arg(short, long, env = "PDF2PPTX_OUTPUT")]
    output: Option<PathBuf>,

    /// Vision backend: gemini (default), or an edgequake-llm provider
    /// such as openai, anthropic, ollama.
    #[arg(long, env = "PDF2PPTX_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Candidate models in fallback order (comma-separated or repeated).
    #[arg(long, env = "PDF2PPTX_MODEL", value_delimiter = ',')]
    model: Vec<String>,

    /// API key for the gemini backend (overrides environment and key file).
    #[arg(long, hide_env_values = true)]
    api_key: Option<String>,

    /// Environment variable holding the gemini API key.
    #[arg(long, default_value = "GEMINI_API_KEY")]
    api_key_env: String,

    /// KEY=VALUE file consulted for API keys.
    #[arg(long, env = "PDF2PPTX_KEY_FILE", default_value = ".env")]
    key_file: PathBuf,

    /// Override the gemini API base URL.
    #[arg(long, env = "PDF2PPTX_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2PPTX_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Longest edge of the slide background, in pixels.
    #[arg(long, env = "PDF2PPTX_MAX_PIXELS", default_value_t = 2400)]
    max_pixels: u32,

    /// Longest edge of the image sent to the model, in pixels.
    #[arg(long, env = "PDF2PPTX_MODEL_MAX_DIM", default_value_t = 1200)]
    model_max_dim: u32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2PPTX_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PPTX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "PDF2PPTX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2PPTX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max model output tokens per page.
    #[arg(long, env = "PDF2PPTX_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Calls per model when rate limited.
    #[arg(long, env = "PDF2PPTX_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// First backoff delay in milliseconds.
    #[arg(long, default_value_t = 2_000)]
    retry_base_ms: u64,

    /// Backoff cap in milliseconds.
    #[arg(long, default_value_t = 60_000)]
    retry_max_ms: u64,

    /// Pause between pages in milliseconds.
    #[arg(long, env = "PDF2PPTX_PAGE_DELAY_MS", default_value_t = 0)]
    page_delay_ms: u64,

    /// Per-call API timeout in seconds.
    #[arg(long, env = "PDF2PPTX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Slide size: auto, 16:9, 4:3.
    #[arg(long, env = "PDF2PPTX_SLIDE_SIZE", default_value = "auto")]
    slide_size: String,

    /// Font family for the text boxes.
    #[arg(long, env = "PDF2PPTX_FONT", default_value = "Arial")]
    font: String,

    /// Skip text extraction; every slide is the page image only.
    #[arg(long)]
    images_only: bool,

    /// Print a JSON report (ConversionOutput) to stdout.
    #[arg(long, env = "PDF2PPTX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2PPTX_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2PPTX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2PPTX_QUIET")]
    quiet: bool,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Provider keys (OPENAI_API_KEY, …) are read from the environment by
    // edgequake-llm, so key-file entries are exported here, before the
    // runtime starts any threads.
    let entries = load_key_file(&cli.key_file)
        .with_context(|| format!("Failed to read key file {:?}", cli.key_file))?;
    for (key, value) in entries {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(key, value);
        }
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are noise while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            let (w, h) = config
                .slide_size
                .resolve(meta.page_width_pt, meta.page_height_pt);
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!(
                "Page size:    {:.0} × {:.0} pt",
                meta.page_width_pt, meta.page_height_pt
            );
            println!(
                "Slide size:   {:.3} × {:.3} in",
                w as f64 / 914_400.0,
                h as f64 / 914_400.0
            );
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("pptx"));

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_to_file(&cli.input, &output_path, &config)
        .await
        .context("Conversion failed")?;
    let stats = &output.stats;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        eprintln!(
            "{}  {} slides ({} editable)  {}ms  →  {}",
            if stats.fallback_pages.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.slides_written,
            stats.editable_slides,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if !stats.fallback_pages.is_empty() {
            eprintln!(
                "   image-only pages: {}",
                yellow(
                    &stats
                        .fallback_pages
                        .iter()
                        .map(|p| p.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            );
        }
        if !config.images_only {
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .backend(Backend::parse(&cli.provider))
        .dpi(cli.dpi)
        .max_rendered_pixels(cli.max_pixels)
        .model_max_dimension(cli.model_max_dim)
        .pages(parse_pages(&cli.pages)?)
        .api_key_env(cli.api_key_env.clone())
        .key_file(cli.key_file.clone())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .retry(RetryPolicy {
            max_attempts: cli.max_attempts,
            base_delay_ms: cli.retry_base_ms,
            max_delay_ms: cli.retry_max_ms,
            ..RetryPolicy::default()
        })
        .slide_size(parse_slide_size(&cli.slide_size)?)
        .font_family(cli.font.clone())
        .images_only(cli.images_only)
        .page_delay_ms(cli.page_delay_ms)
        .api_timeout_secs(cli.api_timeout);

    if !cli.model.is_empty() {
        builder = builder.models(cli.model.iter().map(|m| m.trim().to_string()));
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref url) = cli.api_base_url {
        builder = builder.api_base_url(url.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref lib) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--slide-size`.
fn parse_slide_size(s: &str) -> Result<SlideSize> {
    match s.trim().to_lowercase().as_str() {
        "auto" => Ok(SlideSize::Auto),
        "16:9" | "wide" | "widescreen" => Ok(SlideSize::Widescreen),
        "4:3" | "standard" => Ok(SlideSize::Standard),
        other => anyhow::bail!("Invalid slide size '{}': use auto, 16:9 or 4:3", other),
    }
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
