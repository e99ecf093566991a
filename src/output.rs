//! Conversion results: the presentation bytes plus what happened per slide.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};

/// Document information read from the PDF without rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    /// First page size in points; drives the automatic slide size.
    pub page_width_pt: f32,
    pub page_height_pt: f32,
}

/// What happened on one slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideReport {
    /// 1-indexed PDF page number.
    pub page_num: usize,
    pub text_boxes: usize,
    /// Model that produced the text, `None` for image-only slides.
    pub model: Option<String>,
    /// Model calls made for this page.
    pub attempts: u32,
    /// Why the slide is image-only, if it is because extraction failed.
    pub fallback: Option<ExtractError>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

impl SlideReport {
    pub fn is_editable(&self) -> bool {
        self.text_boxes > 0
    }
}

/// Aggregate numbers for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub slides_written: usize,
    /// Slides carrying at least one editable text box.
    pub editable_slides: usize,
    /// Pages whose extraction failed on every model.
    pub fallback_pages: Vec<usize>,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub extract_duration_ms: u64,
}

/// Complete result of a conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The `.pptx` archive.
    #[serde(skip)]
    pub pptx: Vec<u8>,
    pub slides: Vec<SlideReport>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
    pub slide_width_emu: i64,
    pub slide_height_emu: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_report_skips_archive_bytes() {
        let out = ConversionOutput {
            pptx: vec![1, 2, 3],
            slides: vec![SlideReport {
                page_num: 2,
                text_boxes: 0,
                model: None,
                attempts: 3,
                fallback: Some(ExtractError::Exhausted {
                    attempts: 3,
                    last_error: "bad json".into(),
                }),
                input_tokens: 0,
                output_tokens: 0,
                duration_ms: 10,
            }],
            metadata: DocumentMetadata::default(),
            stats: ConversionStats::default(),
            slide_width_emu: 12_192_000,
            slide_height_emu: 6_858_000,
        };
        let json = serde_json::to_string(&out).unwrap();
        assert!(!json.contains("pptx"));
        assert!(json.contains("Exhausted"));
        assert!(!out.slides[0].is_editable());
    }
}
