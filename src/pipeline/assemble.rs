//! Slide assembly: percent-space text elements to absolute slide geometry.
//!
//! The model's boxes are estimates. Tiny boxes are grown so the text stays
//! selectable, and every box is pushed back inside the slide; nothing here
//! tries to resolve overlaps (z-order is extraction order).

use crate::layout::{ElementKind, SlideResult, TextElement};
use crate::pipeline::encode::encode_background;
use crate::pptx::{ParagraphSpec, Rect, RunStyle, SlideSpec, TextBoxSpec};

pub const EMU_PER_INCH: i64 = 914_400;
/// Boxes narrower than this are widened to [`GROWN_BOX_WIDTH_EMU`].
pub const MIN_BOX_WIDTH_EMU: i64 = EMU_PER_INCH;
pub const GROWN_BOX_WIDTH_EMU: i64 = 2 * EMU_PER_INCH;
/// Boxes shorter than this grow to [`GROWN_BOX_HEIGHT_EMU`].
pub const MIN_BOX_HEIGHT_EMU: i64 = EMU_PER_INCH * 2 / 5;
pub const GROWN_BOX_HEIGHT_EMU: i64 = EMU_PER_INCH * 3 / 5;

pub const MIN_FONT_PT: f32 = 10.0;
pub const MAX_FONT_PT: f32 = 60.0;

const BULLET_GLYPHS: &[char] = &['•', '-', '*', '▪', '◦', '‣'];

/// Absolute rectangle for `element` on a `width × height` EMU slide.
///
/// The result always satisfies [`Rect::fits_within`].
pub fn place(element: &TextElement, width: i64, height: i64) -> Rect {
    let pct = |v: f32| f64::from(v.clamp(0.0, 100.0)) / 100.0;
    let scale = |v: f32, total: i64| (pct(v) * total as f64).round() as i64;

    let mut cx = scale(element.width, width);
    let mut cy = scale(element.height, height);
    if cx < MIN_BOX_WIDTH_EMU {
        cx = GROWN_BOX_WIDTH_EMU;
    }
    if cy < MIN_BOX_HEIGHT_EMU {
        cy = GROWN_BOX_HEIGHT_EMU;
    }
    let cx = cx.min(width);
    let cy = cy.min(height);

    let x = scale(element.x, width).min(width - cx).max(0);
    let y = scale(element.y, height).min(height - cy).max(0);
    Rect { x, y, cx, cy }
}

/// Font size after the per-kind floor/ceiling and the global clamp.
pub fn effective_font_size(element: &TextElement) -> f32 {
    let size = if element.font_size.is_finite() && element.font_size > 0.0 {
        element.font_size
    } else {
        TextElement::DEFAULT_FONT_SIZE
    };
    let size = match element.kind {
        ElementKind::Title => size.max(32.0),
        ElementKind::Subtitle => size.max(24.0),
        ElementKind::Heading => size.max(22.0),
        ElementKind::Caption => size.min(14.0),
        ElementKind::Body | ElementKind::Bullet => size,
    };
    size.clamp(MIN_FONT_PT, MAX_FONT_PT)
}

/// Split an element into styled paragraphs, one per non-blank line.
///
/// A line that starts with a bullet glyph loses the glyph and becomes a
/// bulleted paragraph even when the element itself is not a list item.
pub fn paragraphs(element: &TextElement, font_family: &str) -> Vec<ParagraphSpec> {
    let run = RunStyle {
        size_pt: effective_font_size(element),
        color: element.color,
        bold: element.bold || matches!(element.kind, ElementKind::Title | ElementKind::Heading),
        italic: element.italic,
        font_family: font_family.to_string(),
    };
    let level = element.bullet_level.min(TextElement::MAX_BULLET_LEVEL);
    let ooxml_level = level.saturating_sub(1);

    element
        .content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let glyph = line.starts_with(BULLET_GLYPHS);
            let text = if glyph {
                line.trim_start_matches(|c: char| BULLET_GLYPHS.contains(&c) || c.is_whitespace())
            } else {
                line
            };
            if text.is_empty() {
                return None;
            }
            let bulleted = glyph || element.is_bullet();
            Some(ParagraphSpec {
                text: text.to_string(),
                alignment: element.alignment,
                bullet_level: bulleted.then_some(ooxml_level),
                run: run.clone(),
            })
        })
        .collect()
}

/// Build the slide for one page: the render as background, then one text box
/// per element that still has text after cleanup.
pub fn assemble_slide(
    result: &SlideResult,
    slide_size: (i64, i64),
    font_family: &str,
) -> Result<SlideSpec, image::ImageError> {
    let (width, height) = slide_size;
    let background_png = encode_background(&result.image)?;

    let text_boxes = result
        .elements
        .iter()
        .filter_map(|element| {
            let paragraphs = paragraphs(element, font_family);
            (!paragraphs.is_empty()).then(|| TextBoxSpec {
                rect: place(element, width, height),
                paragraphs,
            })
        })
        .collect();

    Ok(SlideSpec {
        background_png,
        text_boxes,
    })
}
