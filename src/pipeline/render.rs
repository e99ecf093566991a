//! PDF rasterisation: one page at a time, via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state; calls are CPU-bound and
//! must not run on Tokio worker threads. [`PdfiumRenderer::open`] does its
//! work in `spawn_blocking`, and the conversion loop does the same for each
//! [`PageRenderer::render_page`] call.
//!
//! ## Why a trait?
//!
//! [`PageRenderer`] is the seam between "where page images come from" and the
//! rest of the pipeline. The conversion loop only needs a page count, page
//! sizes and a way to get one image; tests substitute synthetic renders.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 200 DPI would be 6,600 × 9,400 px.
//! `max_rendered_pixels` caps the longest edge regardless of physical size,
//! which keeps memory bounded and slide backgrounds a sane size.

use crate::config::ConversionConfig;
use crate::error::Pdf2PptxError;
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of page images.
pub trait PageRenderer: Send + Sync + 'static {
    fn page_count(&self) -> usize;

    /// Page size in points (1/72 inch), or `None` past the last page.
    fn page_size(&self, index: usize) -> Option<(f32, f32)>;

    /// Rasterise page `index` (0-based). Blocking; call from `spawn_blocking`.
    fn render_page(&self, index: usize) -> Result<DynamicImage, Pdf2PptxError>;
}

/// A PDF on disk rendered through pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    path: PathBuf,
    password: Option<String>,
    dpi: u32,
    max_pixels: u32,
    lib_path: Option<PathBuf>,
    page_sizes: Vec<(f32, f32)>,
    metadata: DocumentMetadata,
}

impl PdfiumRenderer {
    /// Open the document once to read its page sizes and metadata.
    ///
    /// Password and corruption problems surface here, before any page is
    /// processed.
    pub async fn open(path: &Path, config: &ConversionConfig) -> Result<Self, Pdf2PptxError> {
        let path = path.to_path_buf();
        let password = config.password.clone();
        let dpi = config.dpi;
        let max_pixels = config.max_rendered_pixels;
        let lib_path = config.pdfium_lib_path.clone();

        tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium(lib_path.as_deref())?;
            let document = load_document(&pdfium, &path, password.as_deref())?;

            let pages = document.pages();
            let page_sizes: Vec<(f32, f32)> = pages
                .iter()
                .map(|p| (p.width().value, p.height().value))
                .collect();
            let metadata = read_metadata(&document, page_sizes.first().copied());
            info!("PDF loaded: {} pages", page_sizes.len());

            Ok(PdfiumRenderer {
                path,
                password: password.clone(),
                dpi,
                max_pixels,
                lib_path,
                page_sizes,
                metadata,
            })
        })
        .await
        .map_err(|e| Pdf2PptxError::Internal(format!("Open task panicked: {}", e)))?
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageRenderer for PdfiumRenderer {
    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    fn page_size(&self, index: usize) -> Option<(f32, f32)> {
        self.page_sizes.get(index).copied()
    }

    fn render_page(&self, index: usize) -> Result<DynamicImage, Pdf2PptxError> {
        let total = self.page_count();
        if index >= total {
            return Err(Pdf2PptxError::PageOutOfRange {
                page: index + 1,
                total,
            });
        }

        // `PdfDocument` borrows the `Pdfium` binding and neither is Send, so
        // they cannot live in `self` across spawn_blocking calls. Each page
        // rebinds and reloads; the reload costs a parse of the cross-reference
        // table, small next to rasterising at 150+ DPI, and memory stays
        // bounded to one page.
        let pdfium = bind_pdfium(self.lib_path.as_deref())?;
        let document = load_document(&pdfium, &self.path, self.password.as_deref())?;
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| Pdf2PptxError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Pdf2PptxError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        if image.width() == 0 || image.height() == 0 {
            return Err(Pdf2PptxError::RasterisationFailed {
                page: index + 1,
                detail: "empty bitmap".into(),
            });
        }
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

/// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the system
/// library. Either path may name the library file or its directory.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, Pdf2PptxError> {
    let env_path = std::env::var_os("PDFIUM_LIB_PATH")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);

    let bindings = match lib_path.map(Path::to_path_buf).or(env_path) {
        Some(p) => {
            let file = if p.is_dir() {
                p.join(Pdfium::pdfium_platform_library_name())
            } else {
                p
            };
            Pdfium::bind_to_library(&file).map_err(|e| {
                Pdf2PptxError::PdfiumBindingFailed(format!("{}: {:?}", file.display(), e))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| Pdf2PptxError::PdfiumBindingFailed(format!("system library: {:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2PptxError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2PptxError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                Pdf2PptxError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            Pdf2PptxError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn read_metadata(document: &PdfDocument<'_>, first_page: Option<(f32, f32)>) -> DocumentMetadata {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    let (page_width_pt, page_height_pt) = first_page.unwrap_or((0.0, 0.0));
    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
        page_width_pt,
        page_height_pt,
    }
}

/// Read page count, page size and document info without rendering.
pub async fn inspect_pdf(path: &Path, config: &ConversionConfig) -> Result<DocumentMetadata, Pdf2PptxError> {
    Ok(PdfiumRenderer::open(path, config).await?.metadata)
}
