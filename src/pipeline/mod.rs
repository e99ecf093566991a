//! Pipeline stages for PDF-to-PPTX conversion.
//!
//! Each submodule implements one transformation step, so each can be tested
//! on its own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ retry ─▶ extract ─▶ llm ──▶ assemble ──▶ pptx
//! (path)   (pdfium)   (PNG/b64)  (fallback)  (JSON)   (VLM)   (EMU boxes)  (zip)
//! ```
//!
//! 1. [`input`]    — validate the user-supplied path
//! 2. [`render`]   — rasterise one page at a time; `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]   — full-size PNG for the background, downscaled base64 for
//!    the model
//! 4. [`retry`]    — backoff on rate limits, fall back across models
//! 5. [`extract`]  — one model call, parsed and validated into text elements
//! 6. [`llm`]      — the backends; the only stage with network I/O
//! 7. [`assemble`] — percent boxes to slide geometry and paragraph styling

pub mod assemble;
pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod render;
pub mod retry;
