//! Error types for the edgequake-pdf2pptx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2PptxError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad input file, unrenderable page, missing API key, unwritable output).
//!   Returned as `Err(Pdf2PptxError)` from the top-level `convert*` functions.
//!
//! * [`ExtractError`] — **Non-fatal**: the vision model could not describe a
//!   single page. The page still becomes a slide (image-only), and the error
//!   is kept in [`crate::output::SlideReport::fallback`] for reporting.
//!
//! A slide cannot exist without its background image, so render failures are
//! fatal while extraction failures are not.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2pptx library.
#[derive(Debug, Error)]
pub enum Pdf2PptxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Render errors ─────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The document has no pages, or the selection matched none of them.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium for your platform, or point PDFIUM_LIB_PATH at an existing\n\
libpdfium (file or directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// No API key was found in the config, the environment or the key file.
    #[error(
        "No API key found for the '{backend}' backend.\n\
Set {env_var}, add `{env_var}=...` to {key_file}, or pass --api-key.\n\
Use --images-only to build a non-editable deck without a model."
    )]
    MissingApiKey {
        backend: String,
        env_var: String,
        key_file: String,
    },

    /// The key-value file exists but could not be read.
    #[error("Failed to read key file '{path}': {source}")]
    KeyFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The vision API rejected the API key.
    #[error("Authentication error from provider '{provider}': {detail}\nCheck the API key.")]
    AuthFailed { provider: String, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output presentation.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PPTX package could not be assembled.
    #[error("Failed to build presentation package: {0}")]
    Package(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2PptxError {
    /// `true` for errors that stop the run before any page is processed
    /// because the configuration is unusable.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey { .. }
                | Self::AuthFailed { .. }
                | Self::KeyFileUnreadable { .. }
                | Self::ProviderNotConfigured { .. }
                | Self::InvalidConfig(_)
        )
    }

    /// `true` for errors raised while opening or rasterising the PDF.
    pub fn is_render_error(&self) -> bool {
        matches!(
            self,
            Self::CorruptPdf { .. }
                | Self::PasswordRequired { .. }
                | Self::WrongPassword { .. }
                | Self::PageOutOfRange { .. }
                | Self::RasterisationFailed { .. }
                | Self::PdfiumBindingFailed(_)
        )
    }
}

impl From<zip::result::ZipError> for Pdf2PptxError {
    fn from(e: zip::result::ZipError) -> Self {
        Pdf2PptxError::Package(e.to_string())
    }
}

/// A page-level extraction failure.
///
/// `RateLimited` and `ModelError` are what a single model call produces; the
/// retry controller turns them into `Exhausted` once every candidate model
/// has been tried.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ExtractError {
    /// The API signalled quota or rate exhaustion (HTTP 429).
    #[error("model '{model}' is rate limited")]
    RateLimited {
        model: String,
        retry_after_secs: Option<u64>,
    },

    /// The model rejected the request or returned unusable content.
    #[error("model '{model}' failed: {detail}")]
    ModelError { model: String, detail: String },

    /// The API rejected the credentials. Retrying or switching models on the
    /// same account will not help, so the run stops.
    #[error("authentication rejected for model '{model}': {detail}")]
    Unauthorized { model: String, detail: String },

    /// Every candidate model and every retry was used up.
    #[error("all models exhausted after {attempts} attempts; last error: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl ExtractError {
    pub fn model_error(model: &str, detail: impl Into<String>) -> Self {
        ExtractError::ModelError {
            model: model.to_string(),
            detail: detail.into(),
        }
    }
}
