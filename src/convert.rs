//! Conversion entry points.
//!
//! Pages go through the pipeline one at a time, in order:
//! render → encode → extract (retry/fallback) → assemble → append to the
//! archive. Only the current page's images are in memory; earlier slides are
//! already compressed into the output buffer.
//!
//! Failure policy:
//!
//! * Input, render and packaging errors abort the run. A slide cannot exist
//!   without its background.
//! * Extraction errors never abort. The page becomes an image-only slide,
//!   the reason is logged and recorded in [`SlideReport::fallback`].
//! * The one exception is a rejected API key: every later page would fail
//!   the same way, so the run stops with [`Pdf2PptxError::AuthFailed`].

use crate::config::ConversionConfig;
use crate::error::{ExtractError, Pdf2PptxError};
use crate::layout::SlideResult;
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, SlideReport};
use crate::pipeline::assemble::assemble_slide;
use crate::pipeline::encode::encode_for_model;
use crate::pipeline::llm::{AnyBackend, VisionBackend};
use crate::pipeline::render::{self, PageRenderer, PdfiumRenderer};
use crate::pipeline::retry::{extract_with_fallback, ControlledExtraction};
use crate::pipeline::input;
use crate::pptx::{DocumentProperties, PresentationWriter};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Convert a PDF slide deck into a `.pptx` held in memory.
///
/// # Errors
/// Returns `Err(Pdf2PptxError)` only for fatal errors:
/// - file not found, unreadable, or not a PDF
/// - missing API key or unusable provider (checked before any rendering)
/// - a page that cannot be rasterised
/// - the API key being rejected
///
/// Pages whose extraction fails still produce image-only slides; check
/// `output.stats.fallback_pages`.
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    let pdf_path = input::resolve_input(input.as_ref())?;
    info!("Starting conversion: {}", pdf_path.display());

    // Config problems surface before the (slow) PDF work starts.
    let backend = if config.images_only {
        info!("Images-only mode: skipping text extraction");
        None
    } else {
        Some(AnyBackend::from_config(config)?)
    };

    let renderer = PdfiumRenderer::open(&pdf_path, config).await?;
    let metadata = renderer.metadata().clone();
    convert_with(Arc::new(renderer), backend.as_ref(), metadata, config).await
}

/// Run the pipeline over any page source and vision backend.
///
/// `backend = None` produces image-only slides for every page.
pub async fn convert_with<R, B>(
    renderer: Arc<R>,
    backend: Option<&B>,
    metadata: DocumentMetadata,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError>
where
    R: PageRenderer,
    B: VisionBackend,
{
    let total_start = Instant::now();
    let total_pages = renderer.page_count();
    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Pdf2PptxError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    let selected = page_indices.len();
    debug!("Selected {} of {} pages", selected, total_pages);

    // The first selected page sets the deck size, not necessarily page 1.
    let (page_w, page_h) = renderer
        .page_size(page_indices[0])
        .unwrap_or((metadata.page_width_pt, metadata.page_height_pt));
    let (slide_w, slide_h) = config.slide_size.resolve(page_w, page_h);
    info!(
        "Slide size {:.3} × {:.3} in (page {} is {:.0} × {:.0} pt)",
        slide_w as f64 / 914_400.0,
        slide_h as f64 / 914_400.0,
        page_indices[0] + 1,
        page_w,
        page_h
    );

    let mut writer = PresentationWriter::new(Cursor::new(Vec::new()), slide_w, slide_h)
        .with_properties(DocumentProperties {
            title: metadata.title.clone(),
            author: metadata.author.clone(),
        });

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(selected);
    }

    let mut reports = Vec::with_capacity(selected);
    let mut render_ms = 0u64;
    let mut extract_ms = 0u64;

    for (i, &idx) in page_indices.iter().enumerate() {
        let page_num = idx + 1;
        if i > 0 && config.page_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.page_delay_ms)).await;
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, selected);
        }
        let page_start = Instant::now();

        // ── Render ───────────────────────────────────────────────────────
        let render_start = Instant::now();
        let source = Arc::clone(&renderer);
        let image = tokio::task::spawn_blocking(move || source.render_page(idx))
            .await
            .map_err(|e| Pdf2PptxError::Internal(format!("Render task panicked: {}", e)))??;
        render_ms += render_start.elapsed().as_millis() as u64;

        // ── Extract ──────────────────────────────────────────────────────
        let mut report = SlideReport {
            page_num,
            text_boxes: 0,
            model: None,
            attempts: 0,
            fallback: None,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        };

        let slide = match backend {
            None => SlideResult::image_only(page_num, image, None),
            Some(backend) => {
                let encoded = encode_for_model(&image, config.model_max_dimension).map_err(|e| {
                    Pdf2PptxError::RasterisationFailed {
                        page: page_num,
                        detail: format!("image encoding failed: {}", e),
                    }
                })?;

                let extract_start = Instant::now();
                let outcome = extract_with_fallback(backend, &encoded, page_num, config).await;
                extract_ms += extract_start.elapsed().as_millis() as u64;

                match outcome {
                    Ok(ControlledExtraction { page, attempts }) => {
                        report.model = Some(page.model);
                        report.attempts = attempts;
                        report.input_tokens = page.input_tokens;
                        report.output_tokens = page.output_tokens;
                        SlideResult::with_text(page_num, image, page.elements)
                    }
                    Err(ExtractError::Unauthorized { model, detail }) => {
                        return Err(Pdf2PptxError::AuthFailed {
                            provider: backend.name().to_string(),
                            detail: format!("{model}: {detail}"),
                        });
                    }
                    Err(e) => {
                        warn!("Page {}: no editable text, using image-only slide ({})", page_num, e);
                        if let ExtractError::Exhausted { attempts, .. } = &e {
                            report.attempts = *attempts;
                        }
                        SlideResult::image_only(page_num, image, Some(e))
                    }
                }
            }
        };

        // ── Assemble ─────────────────────────────────────────────────────
        let spec = assemble_slide(&slide, (slide_w, slide_h), &config.font_family).map_err(|e| {
            Pdf2PptxError::RasterisationFailed {
                page: page_num,
                detail: format!("background encoding failed: {}", e),
            }
        })?;
        drop(slide.image);
        writer.append_slide(&spec)?;

        report.text_boxes = spec.text_boxes.len();
        report.fallback = slide.fallback;
        report.duration_ms = page_start.elapsed().as_millis() as u64;
        info!(
            "Page {}/{}: {} text boxes{}",
            page_num,
            total_pages,
            report.text_boxes,
            if report.fallback.is_some() { " (fallback)" } else { "" }
        );

        if let Some(ref cb) = config.progress_callback {
            match &report.fallback {
                Some(reason) => cb.on_page_fallback(page_num, selected, &reason.to_string()),
                None => cb.on_page_complete(page_num, selected, report.text_boxes),
            }
        }
        reports.push(report);
    }

    let pptx = writer.finish()?.into_inner();

    let stats = ConversionStats {
        total_pages,
        slides_written: reports.len(),
        editable_slides: reports.iter().filter(|r| r.is_editable()).count(),
        fallback_pages: reports
            .iter()
            .filter(|r| r.fallback.is_some())
            .map(|r| r.page_num)
            .collect(),
        total_input_tokens: reports.iter().map(|r| r.input_tokens).sum(),
        total_output_tokens: reports.iter().map(|r| r.output_tokens).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms: render_ms,
        extract_duration_ms: extract_ms,
    };

    info!(
        "Conversion complete: {} slides ({} editable, {} image-only after fallback), {}ms total",
        stats.slides_written,
        stats.editable_slides,
        stats.fallback_pages.len(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(selected, stats.editable_slides);
    }

    Ok(ConversionOutput {
        pptx,
        slides: reports,
        metadata,
        stats,
        slide_width_emu: slide_w,
        slide_height_emu: slide_h,
    })
}

/// Convert a PDF and write the presentation to `output_path`.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// failed run never leaves a truncated `.pptx` behind.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    let mut output = convert(input, config).await?;
    let path = output_path.as_ref().to_path_buf();
    let bytes = std::mem::take(&mut output.pptx);

    let written = path.clone();
    tokio::task::spawn_blocking(move || write_atomic(&written, &bytes))
        .await
        .map_err(|e| Pdf2PptxError::Internal(format!("Write task panicked: {}", e)))??;

    info!("Wrote {}", path.display());
    Ok(output)
}

/// Write `bytes` to `path` via a temp file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2PptxError> {
    let write_err = |source: std::io::Error| Pdf2PptxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2PptxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Convert PDF bytes held in memory.
///
/// The bytes are written to a managed temp file (pdfium needs a path) that is
/// removed when the call returns.
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PptxError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Pdf2PptxError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2PptxError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_path_buf();
    convert(&path, config).await
}

/// Read page count, page size and document info without converting.
///
/// Needs no API key.
pub async fn inspect(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentMetadata, Pdf2PptxError> {
    let pdf_path = input::resolve_input(input.as_ref())?;
    render::inspect_pdf(&pdf_path, config).await
}
