//! # edgequake-pdf2pptx
//!
//! Turn PDF slide decks back into editable PowerPoint files using Vision
//! Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Decks usually travel as PDFs, and once exported the text is locked in.
//! Text-layer extraction loses positions and styling, and many exported
//! decks have no usable text layer at all. Instead this crate rasterises each
//! page, asks a VLM where every text block sits and how it is styled, and
//! rebuilds the slide: the original render as a full-bleed background with
//! editable text boxes laid over it. Pages the model cannot read still
//! become slides, just without the editable overlay.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │  (one page at a time)
//!  ├─ 1. Input     validate path + %PDF magic
//!  ├─ 2. Render    rasterise via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode    full-size PNG background + downscaled base64 for the model
//!  ├─ 4. Extract   VLM call → JSON text elements, with backoff + model fallback
//!  ├─ 5. Assemble  percent boxes → EMU geometry, styled paragraphs
//!  └─ 6. Package   append slide to the .pptx archive
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2pptx::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini by default; the key comes from GEMINI_API_KEY or ./.env
//!     let config = ConversionConfig::default();
//!     let output = convert_to_file("deck.pdf", "deck.pptx", &config).await?;
//!     eprintln!(
//!         "{} slides, {} editable, image-only: {:?}",
//!         output.stats.slides_written,
//!         output.stats.editable_slides,
//!         output.stats.fallback_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2pptx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2pptx = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Backend | Key | Default models |
//! |---------|-----|----------------|
//! | `gemini` (default) | `GEMINI_API_KEY` / `.env` | `gemini-2.5-flash-lite` → `gemini-2.5-flash` → `gemini-2.0-flash` |
//! | `openai` | `OPENAI_API_KEY` | `gpt-4.1-mini` → `gpt-4.1-nano` |
//! | `anthropic` | `ANTHROPIC_API_KEY` | `claude-sonnet-4-20250514` → `claude-haiku-4-20250514` |
//! | `ollama` | — | `llama3.2-vision` |
//!
//! Models are tried in order; each gets `max_attempts` calls when rate
//! limited, and any other failure moves on to the next model.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod pptx;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Backend, ConversionConfig, ConversionConfigBuilder, PageSelection, SlideSize};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file, convert_with, inspect};
pub use error::{ExtractError, Pdf2PptxError};
pub use layout::{Alignment, ElementKind, Rgb, SlideResult, TextElement};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, SlideReport};
pub use pipeline::llm::{AnyBackend, GeminiBackend, ModelReply, ProviderBackend, VisionBackend, VisionRequest};
pub use pipeline::render::{PageRenderer, PdfiumRenderer};
pub use pipeline::retry::RetryPolicy;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
