//! Domain types for what the vision model sees on a page.
//!
//! A [`TextElement`] is one run of text with its position (in percent of the
//! page) and style. Elements have no identity beyond their index in the
//! page's list; that order is also the z-order of the text boxes on the slide.

use crate::error::ExtractError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Parse `#RRGGBB` or `RRGGBB`. Anything else is `None`.
    pub fn from_hex(s: &str) -> Option<Rgb> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Upper-case hex without `#`, as OOXML `srgbClr` expects.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Horizontal paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Lenient parse of the model's alignment string.
    pub fn parse(s: &str) -> Alignment {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" | "centered" | "middle" => Alignment::Center,
            "right" | "end" => Alignment::Right,
            _ => Alignment::Left,
        }
    }
}

/// The role the model assigned to a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Title,
    Subtitle,
    Heading,
    #[default]
    Body,
    Bullet,
    Caption,
}

impl ElementKind {
    pub fn parse(s: &str) -> ElementKind {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => ElementKind::Title,
            "subtitle" => ElementKind::Subtitle,
            "heading" | "header" => ElementKind::Heading,
            "bullet" | "list" => ElementKind::Bullet,
            "caption" | "footnote" => ElementKind::Caption,
            _ => ElementKind::Body,
        }
    }
}

/// One extracted text run.
///
/// Coordinates are percentages of the page in `[0, 100]`; the extractor
/// guarantees this before constructing a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub color: Rgb,
    pub bold: bool,
    pub italic: bool,
    pub alignment: Alignment,
    pub bullet_level: u8,
    pub kind: ElementKind,
}

impl TextElement {
    pub const DEFAULT_FONT_SIZE: f32 = 18.0;
    /// Deepest paragraph level OOXML supports (`lvl` 0–8).
    pub const MAX_BULLET_LEVEL: u8 = 9;

    /// A plain body element at the given rectangle, for callers that build
    /// elements by hand.
    pub fn new(content: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            content: content.into(),
            x: clamp_percent(x),
            y: clamp_percent(y),
            width: clamp_percent(width),
            height: clamp_percent(height),
            font_size: Self::DEFAULT_FONT_SIZE,
            color: Rgb::BLACK,
            bold: false,
            italic: false,
            alignment: Alignment::Left,
            bullet_level: 0,
            kind: ElementKind::Body,
        }
    }

    /// `true` when the element should render as a bulleted list item.
    pub fn is_bullet(&self) -> bool {
        self.bullet_level > 0 || self.kind == ElementKind::Bullet
    }
}

/// Clamp a percentage into `[0, 100]`. Callers must filter non-finite values first.
pub fn clamp_percent(v: f32) -> f32 {
    v.clamp(0.0, 100.0)
}

/// Everything the assembler needs to build one slide.
///
/// `elements` is empty for an image-only slide; `fallback` then says why.
#[derive(Debug, Clone)]
pub struct SlideResult {
    /// 1-indexed page number.
    pub page_num: usize,
    pub image: DynamicImage,
    pub elements: Vec<TextElement>,
    pub fallback: Option<ExtractError>,
}

impl SlideResult {
    pub fn with_text(page_num: usize, image: DynamicImage, elements: Vec<TextElement>) -> Self {
        Self {
            page_num,
            image,
            elements,
            fallback: None,
        }
    }

    pub fn image_only(page_num: usize, image: DynamicImage, reason: Option<ExtractError>) -> Self {
        Self {
            page_num,
            image,
            elements: Vec::new(),
            fallback: reason,
        }
    }

    pub fn is_image_only(&self) -> bool {
        self.elements.is_empty()
    }
}
