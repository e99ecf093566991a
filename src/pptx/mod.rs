//! Minimal OOXML presentation writer.
//!
//! A `.pptx` file is a ZIP archive of XML parts plus media. This module
//! writes the smallest set of parts PowerPoint, Keynote and LibreOffice all
//! open without repair:
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! docProps/core.xml, docProps/app.xml
//! ppt/presentation.xml (+ _rels)
//! ppt/slideMasters/slideMaster1.xml (+ _rels)
//! ppt/slideLayouts/slideLayout1.xml (+ _rels)      blank layout
//! ppt/theme/theme1.xml
//! ppt/presProps.xml, viewProps.xml, tableStyles.xml
//! ppt/slides/slideN.xml (+ _rels)
//! ppt/media/imageN.png
//! ```
//!
//! Slides are streamed: [`PresentationWriter::append_slide`] writes the
//! slide part and its image straight into the archive, so only one page's
//! background is held in memory at a time. Parts that list every slide are
//! written by [`PresentationWriter::finish`].

mod parts;

use crate::error::Pdf2PptxError;
use crate::layout::{Alignment, Rgb};
use std::io::{Seek, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Absolute rectangle in EMU (914,400 per inch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Rect {
    /// `true` when the rectangle lies inside a `width × height` slide.
    pub fn fits_within(&self, width: i64, height: i64) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.cx >= 0
            && self.cy >= 0
            && self.x + self.cx <= width
            && self.y + self.cy <= height
    }
}

/// Character formatting applied to a paragraph's single run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStyle {
    pub size_pt: f32,
    pub color: Rgb,
    pub bold: bool,
    pub italic: bool,
    pub font_family: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphSpec {
    pub text: String,
    pub alignment: Alignment,
    /// `Some(lvl)` for a bulleted paragraph at OOXML level `lvl` (0-based).
    pub bullet_level: Option<u8>,
    pub run: RunStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBoxSpec {
    pub rect: Rect,
    pub paragraphs: Vec<ParagraphSpec>,
}

/// One slide: a full-bleed PNG background plus text boxes in z-order.
#[derive(Debug, Clone, Default)]
pub struct SlideSpec {
    pub background_png: Vec<u8>,
    pub text_boxes: Vec<TextBoxSpec>,
}

/// Values for `docProps/core.xml`.
#[derive(Debug, Clone, Default)]
pub struct DocumentProperties {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Streams slides into a `.pptx` archive.
pub struct PresentationWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    width_emu: i64,
    height_emu: i64,
    slide_count: usize,
    properties: DocumentProperties,
}

impl<W: Write + Seek> PresentationWriter<W> {
    pub fn new(writer: W, width_emu: i64, height_emu: i64) -> Self {
        Self {
            zip: ZipWriter::new(writer),
            width_emu,
            height_emu,
            slide_count: 0,
            properties: DocumentProperties::default(),
        }
    }

    pub fn with_properties(mut self, properties: DocumentProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn slide_count(&self) -> usize {
        self.slide_count
    }

    /// Write one slide. Returns its 1-based number.
    pub fn append_slide(&mut self, slide: &SlideSpec) -> Result<usize, Pdf2PptxError> {
        let n = self.slide_count + 1;

        self.put_stored(&format!("ppt/media/image{n}.png"), &slide.background_png)?;
        let xml = parts::slide_xml(slide, self.width_emu, self.height_emu);
        self.put(&format!("ppt/slides/slide{n}.xml"), xml.as_bytes())?;
        self.put(
            &format!("ppt/slides/_rels/slide{n}.xml.rels"),
            parts::slide_rels(n).as_bytes(),
        )?;

        self.slide_count = n;
        debug!(
            "Wrote slide {} ({} text boxes, {} byte background)",
            n,
            slide.text_boxes.len(),
            slide.background_png.len()
        );
        Ok(n)
    }

    /// Write the package-level parts and close the archive.
    pub fn finish(mut self) -> Result<W, Pdf2PptxError> {
        let n = self.slide_count;
        let package_parts: [(&str, String); 14] = [
            ("[Content_Types].xml", parts::content_types(n)),
            ("_rels/.rels", parts::ROOT_RELS.to_string()),
            ("docProps/core.xml", parts::core_props(&self.properties)),
            (
                "docProps/app.xml",
                parts::app_props(n, self.width_emu, self.height_emu),
            ),
            (
                "ppt/presentation.xml",
                parts::presentation_xml(n, self.width_emu, self.height_emu),
            ),
            ("ppt/_rels/presentation.xml.rels", parts::presentation_rels(n)),
            ("ppt/slideMasters/slideMaster1.xml", parts::SLIDE_MASTER.to_string()),
            (
                "ppt/slideMasters/_rels/slideMaster1.xml.rels",
                parts::SLIDE_MASTER_RELS.to_string(),
            ),
            ("ppt/slideLayouts/slideLayout1.xml", parts::SLIDE_LAYOUT.to_string()),
            (
                "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
                parts::SLIDE_LAYOUT_RELS.to_string(),
            ),
            ("ppt/theme/theme1.xml", parts::THEME.to_string()),
            ("ppt/presProps.xml", parts::PRES_PROPS.to_string()),
            ("ppt/viewProps.xml", parts::VIEW_PROPS.to_string()),
            ("ppt/tableStyles.xml", parts::TABLE_STYLES.to_string()),
        ];
        for (name, body) in package_parts.iter() {
            self.put(name, body.as_bytes())?;
        }

        Ok(self.zip.finish()?)
    }

    fn put(&mut self, name: &str, bytes: &[u8]) -> Result<(), Pdf2PptxError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.write_entry(name, options, bytes)
    }

    /// PNG data is already compressed.
    fn put_stored(&mut self, name: &str, bytes: &[u8]) -> Result<(), Pdf2PptxError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.write_entry(name, options, bytes)
    }

    fn write_entry(
        &mut self,
        name: &str,
        options: SimpleFileOptions,
        bytes: &[u8],
    ) -> Result<(), Pdf2PptxError> {
        self.zip.start_file(name, options)?;
        self.zip
            .write_all(bytes)
            .map_err(|e| Pdf2PptxError::Package(format!("{name}: {e}")))
    }
}
