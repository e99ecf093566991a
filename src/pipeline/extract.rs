//! Layout extraction: one model call, one validated list of text elements.
//!
//! The model's reply is untrusted text. It goes through three gates:
//!
//! 1. [`clean_response`] strips markdown fences and any prose around the
//!    JSON payload.
//! 2. The payload must be a JSON array, or an object with an `elements`
//!    array. Anything else is a [`ExtractError::ModelError`].
//! 3. Each entry is deserialised on its own into [`RawElement`] and
//!    converted with `TextElement::try_from`. Entries that fail either step
//!    are dropped individually; the rest of the page survives.

use crate::config::ConversionConfig;
use crate::error::ExtractError;
use crate::layout::{clamp_percent, Alignment, ElementKind, Rgb, TextElement};
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::llm::{VisionBackend, VisionRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Elements parsed from one successful model reply.
#[derive(Debug, Clone)]
pub struct PageExtraction {
    pub elements: Vec<TextElement>,
    pub model: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Entries the model returned that failed validation.
    pub dropped: usize,
}

/// Ask `model` for the layout of one page and parse the reply.
pub async fn extract_page<B: VisionBackend>(
    backend: &B,
    model: &str,
    image: &EncodedImage,
    config: &ConversionConfig,
) -> Result<PageExtraction, ExtractError> {
    let request = VisionRequest {
        model,
        prompt: config.prompt(),
        image,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    let reply = backend.generate(request).await?;

    let parsed = parse_elements(&reply.text).map_err(|detail| ExtractError::model_error(model, detail))?;
    if parsed.dropped > 0 {
        warn!(
            "{}: dropped {} malformed element(s), kept {}",
            model,
            parsed.dropped,
            parsed.elements.len()
        );
    }
    debug!(
        "{}: {} elements, {} input tokens, {} output tokens",
        model,
        parsed.elements.len(),
        reply.input_tokens,
        reply.output_tokens
    );

    Ok(PageExtraction {
        elements: parsed.elements,
        model: model.to_string(),
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
        dropped: parsed.dropped,
    })
}

/// Result of [`parse_elements`].
#[derive(Debug, Clone, Default)]
pub struct ParsedElements {
    pub elements: Vec<TextElement>,
    pub dropped: usize,
}

/// Parse a model reply into validated elements.
///
/// An empty array is a valid answer (a slide without text). A non-empty
/// array in which *every* entry is malformed is rejected, so the caller
/// can try another model.
pub fn parse_elements(raw: &str) -> Result<ParsedElements, String> {
    let cleaned = clean_response(raw);
    if cleaned.is_empty() {
        return Err("empty response".to_string());
    }

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| format!("response is not valid JSON: {e}"))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("elements").or_else(|| map.remove("text_elements")) {
            Some(Value::Array(items)) => items,
            _ => return Err("expected a JSON array of text elements".to_string()),
        },
        _ => return Err("expected a JSON array of text elements".to_string()),
    };

    let total = entries.len();
    let elements: Vec<TextElement> = entries
        .into_iter()
        .filter_map(|entry| {
            let raw: RawElement = serde_json::from_value(entry).ok()?;
            TextElement::try_from(raw).ok()
        })
        .collect();

    if total > 0 && elements.is_empty() {
        return Err(format!("none of the {total} returned elements were valid"));
    }

    Ok(ParsedElements {
        dropped: total - elements.len(),
        elements,
    })
}

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```").unwrap());

/// Strip code fences and surrounding prose, returning the JSON payload.
pub fn clean_response(raw: &str) -> &str {
    let trimmed = raw.trim().trim_start_matches('\u{FEFF}');
    let body = match RE_FENCED.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => trimmed,
    };

    // Cut leading/trailing prose around the outermost array or object.
    let start = body.find(['[', '{']);
    let end = body.rfind([']', '}']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => &body[s..=e],
        _ => body,
    }
}

// ── Wire shape ───────────────────────────────────────────────────────────

/// A number that may arrive as `12.5`, `"12.5"`, `"12.5%"` or `"18pt"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(f64),
    Text(String),
}

impl Lenient {
    fn value(&self) -> Option<f64> {
        let v = match self {
            Lenient::Number(n) => *n,
            Lenient::Text(s) => s
                .trim()
                .trim_end_matches('%')
                .trim_end_matches("pt")
                .trim_end_matches("px")
                .trim()
                .parse()
                .ok()?,
        };
        v.is_finite().then_some(v)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawColor {
    Hex(String),
    Triple([f64; 3]),
    Channels { r: f64, g: f64, b: f64 },
}

impl RawColor {
    fn to_rgb(&self) -> Option<Rgb> {
        let channel = |v: f64| v.is_finite().then(|| v.round().clamp(0.0, 255.0) as u8);
        match self {
            RawColor::Hex(s) => Rgb::from_hex(s),
            RawColor::Triple([r, g, b]) | RawColor::Channels { r, g, b } => {
                Some(Rgb(channel(*r)?, channel(*g)?, channel(*b)?))
            }
        }
    }
}

/// Nested position object used by older prompts.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawPosition {
    #[serde(default, alias = "x_percent")]
    x: Option<Lenient>,
    #[serde(default, alias = "y_percent")]
    y: Option<Lenient>,
    #[serde(default, alias = "width_percent", alias = "w")]
    width: Option<Lenient>,
    #[serde(default, alias = "height_percent", alias = "h")]
    height: Option<Lenient>,
}

/// Nested style object used by older prompts.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawStyle {
    #[serde(default)]
    font_size: Option<Lenient>,
    #[serde(default, alias = "font_color")]
    color: Option<RawColor>,
    #[serde(default)]
    bold: Option<bool>,
    #[serde(default)]
    italic: Option<bool>,
    #[serde(default, alias = "align")]
    alignment: Option<String>,
}

/// One entry of the model's reply, every field optional.
///
/// Flat fields win over the nested `position` / `style` objects.
#[derive(Debug, Clone, Deserialize)]
pub struct RawElement {
    #[serde(default, alias = "text")]
    content: Option<String>,
    #[serde(default, rename = "type", alias = "kind")]
    kind: Option<String>,
    #[serde(default, alias = "x_percent")]
    x: Option<Lenient>,
    #[serde(default, alias = "y_percent")]
    y: Option<Lenient>,
    #[serde(default, alias = "width_percent", alias = "w")]
    width: Option<Lenient>,
    #[serde(default, alias = "height_percent", alias = "h")]
    height: Option<Lenient>,
    #[serde(default)]
    position: Option<RawPosition>,
    #[serde(default)]
    style: Option<RawStyle>,
    #[serde(default)]
    font_size: Option<Lenient>,
    #[serde(default, alias = "font_color")]
    color: Option<RawColor>,
    #[serde(default)]
    bold: Option<bool>,
    #[serde(default)]
    italic: Option<bool>,
    #[serde(default, alias = "align")]
    alignment: Option<String>,
    #[serde(default)]
    bullet_level: Option<Lenient>,
}

/// Why a [`RawElement`] was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyContent,
    MissingCoordinates,
}

impl TryFrom<RawElement> for TextElement {
    type Error = RejectReason;

    fn try_from(raw: RawElement) -> Result<Self, Self::Error> {
        let content = raw
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(RejectReason::EmptyContent)?
            .to_string();

        let position = raw.position.unwrap_or_default();
        let style = raw.style.unwrap_or_default();
        let coord = |flat: &Option<Lenient>, nested: &Option<Lenient>| {
            flat.as_ref()
                .or(nested.as_ref())
                .and_then(Lenient::value)
                .map(|v| clamp_percent(v as f32))
        };
        let (Some(x), Some(y), Some(width), Some(height)) = (
            coord(&raw.x, &position.x),
            coord(&raw.y, &position.y),
            coord(&raw.width, &position.width),
            coord(&raw.height, &position.height),
        ) else {
            return Err(RejectReason::MissingCoordinates);
        };

        let font_size = raw
            .font_size
            .as_ref()
            .or(style.font_size.as_ref())
            .and_then(Lenient::value)
            .filter(|v| *v > 0.0)
            .map(|v| v as f32)
            .unwrap_or(TextElement::DEFAULT_FONT_SIZE);

        let color = raw
            .color
            .as_ref()
            .or(style.color.as_ref())
            .and_then(RawColor::to_rgb)
            .unwrap_or(Rgb::BLACK);

        let alignment = raw
            .alignment
            .as_deref()
            .or(style.alignment.as_deref())
            .map(Alignment::parse)
            .unwrap_or_default();

        let bullet_level = raw
            .bullet_level
            .as_ref()
            .and_then(Lenient::value)
            .map(|v| v.round().clamp(0.0, f64::from(TextElement::MAX_BULLET_LEVEL)) as u8)
            .unwrap_or(0);

        Ok(TextElement {
            content,
            x,
            y,
            width,
            height,
            font_size,
            color,
            bold: raw.bold.or(style.bold).unwrap_or(false),
            italic: raw.italic.or(style.italic).unwrap_or(false),
            alignment,
            bullet_level,
            kind: raw.kind.as_deref().map(ElementKind::parse).unwrap_or_default(),
        })
    }
}
