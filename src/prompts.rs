//! The extraction prompt sent with every page image.
//!
//! Callers can override it via [`crate::config::ConversionConfig::system_prompt`];
//! the parser in [`crate::pipeline::extract`] accepts the field names used
//! here plus the aliases older prompts produced.

/// Default instruction prompt for describing a slide's text layout.
pub const LAYOUT_PROMPT: &str = r##"Analyze this presentation slide image and extract ALL visible text with precise position and styling.

Return a JSON array. Each array item describes one text block:
[
  {
    "type": "title" | "subtitle" | "heading" | "body" | "bullet" | "caption",
    "content": "exact text content",
    "x": 0-100,
    "y": 0-100,
    "width": 0-100,
    "height": 0-100,
    "font_size": number (points, estimated from the visual size),
    "color": "#RRGGBB",
    "bold": true | false,
    "italic": true | false,
    "alignment": "left" | "center" | "right",
    "bullet_level": 0-3 (0 = no bullet, 1+ = bullet indent level)
  }
]

RULES:
1. Extract ALL text visible on the slide; do not skip anything
2. Preserve the EXACT text, including punctuation and special characters
3. x, y, width and height are percentages of the slide width/height (0-100),
   measured from the top-left corner of the text block
4. Titles are usually 28-48pt, body text 16-24pt, captions 10-14pt
5. For multi-line blocks put every line in "content", separated by \n
6. Use hex colors (#RRGGBB) for the text color
7. Return ONLY the JSON array: no markdown code fences, no explanation"##;

/// Instruction appended to the prompt for backends without a JSON mode.
pub const JSON_ONLY_REMINDER: &str =
    "Respond with the JSON array only. If the slide has no text, respond with [].";
