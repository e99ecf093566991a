//! Offline pipeline tests.
//!
//! A synthetic renderer stands in for pdfium and a scripted backend replays
//! canned model replies, so these run without a PDF library or network.
//! The generated `.pptx` is read back with `zip` + `quick-xml`.

use edgequake_pdf2pptx::{
    convert_with, ConversionConfig, ConversionProgressCallback, DocumentMetadata, ExtractError,
    ModelReply, PageRenderer, PageSelection, Pdf2PptxError, RetryPolicy, VisionBackend,
    VisionRequest,
};
use edgequake_pdf2pptx::pipeline::llm::classify_error_text;
use image::{DynamicImage, RgbImage};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::VecDeque;
use std::future::Future;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const WIDE_W: i64 = 12_192_000;
const WIDE_H: i64 = 6_858_000;

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Solid-colour 16:9 pages.
struct SyntheticRenderer {
    pages: usize,
}

impl PageRenderer for SyntheticRenderer {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn page_size(&self, index: usize) -> Option<(f32, f32)> {
        (index < self.pages).then_some((960.0, 540.0))
    }

    fn render_page(&self, index: usize) -> Result<DynamicImage, Pdf2PptxError> {
        if index >= self.pages {
            return Err(Pdf2PptxError::PageOutOfRange {
                page: index + 1,
                total: self.pages,
            });
        }
        let shade = 40 * (index as u8 % 6);
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            160,
            90,
            image::Rgb([shade, 200, 255 - shade]),
        )))
    }
}

/// Pages of differing sizes, in points.
struct MixedRenderer {
    sizes: Vec<(f32, f32)>,
}

impl PageRenderer for MixedRenderer {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, index: usize) -> Option<(f32, f32)> {
        self.sizes.get(index).copied()
    }

    fn render_page(&self, index: usize) -> Result<DynamicImage, Pdf2PptxError> {
        let (w, h) = self.page_size(index).ok_or(Pdf2PptxError::PageOutOfRange {
            page: index + 1,
            total: self.sizes.len(),
        })?;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            (w / 6.0) as u32,
            (h / 6.0) as u32,
            image::Rgb([90, 90, 90]),
        )))
    }
}

/// Replays scripted replies in call order and records which model was asked.
/// Once the script runs out every call returns an empty element list.
#[derive(Default)]
struct ScriptedBackend {
    script: Mutex<VecDeque<Result<ModelReply, ExtractError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(script: Vec<Result<ModelReply, ExtractError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl VisionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate<'a>(
        &'a self,
        request: VisionRequest<'a>,
    ) -> impl Future<Output = Result<ModelReply, ExtractError>> + Send + 'a {
        self.calls.lock().unwrap().push(request.model.to_string());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(reply("[]")));
        std::future::ready(next)
    }
}

#[derive(Default)]
struct Tracking {
    started: AtomicUsize,
    page_starts: AtomicUsize,
    completes: AtomicUsize,
    fallbacks: AtomicUsize,
    finished_total: AtomicUsize,
    finished_editable: AtomicUsize,
}

impl ConversionProgressCallback for Tracking {
    fn on_conversion_start(&self, total_pages: usize) {
        self.started.store(total_pages, Ordering::SeqCst);
    }
    fn on_page_start(&self, _page_num: usize, _total: usize) {
        self.page_starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_page_complete(&self, _page_num: usize, _total: usize, _text_boxes: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_page_fallback(&self, _page_num: usize, _total: usize, _reason: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
    }
    fn on_conversion_complete(&self, total_pages: usize, editable_count: usize) {
        self.finished_total.store(total_pages, Ordering::SeqCst);
        self.finished_editable.store(editable_count, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn reply(text: &str) -> ModelReply {
    ModelReply {
        text: text.to_string(),
        input_tokens: 100,
        output_tokens: 20,
    }
}

fn one_box(content: &str) -> Result<ModelReply, ExtractError> {
    Ok(reply(&format!(
        r#"[{{"content": "{content}", "x": 10, "y": 10, "width": 50, "height": 15, "font_size": 24}}]"#
    )))
}

fn rate_limited(model: &str) -> Result<ModelReply, ExtractError> {
    Err(ExtractError::RateLimited {
        model: model.to_string(),
        retry_after_secs: None,
    })
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter_ratio: 0.0,
    }
}

fn config(models: &[&str]) -> ConversionConfig {
    ConversionConfig::builder()
        .models(models.iter().copied())
        .retry(fast_retry(3))
        .build()
        .unwrap()
}

fn metadata(pages: usize) -> DocumentMetadata {
    DocumentMetadata {
        title: Some("Quarterly review".into()),
        page_count: pages,
        pdf_version: "1.7".into(),
        page_width_pt: 960.0,
        page_height_pt: 540.0,
        ..DocumentMetadata::default()
    }
}

fn read_part(pptx: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(pptx)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut s = String::new();
    file.read_to_string(&mut s).unwrap();
    s
}

fn slide_names(pptx: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(pptx)).unwrap();
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

#[derive(Debug, Default)]
struct Shape {
    x: i64,
    y: i64,
    cx: i64,
    cy: i64,
    texts: Vec<String>,
}

fn attr_i64(e: &BytesStart, key: &str) -> i64 {
    let attr = e.try_get_attribute(key).unwrap().unwrap();
    String::from_utf8_lossy(&attr.value).parse().unwrap()
}

/// Text-box shapes (`p:sp`) of a slide, in document order.
fn text_boxes(xml: &str) -> Vec<Shape> {
    let mut reader = Reader::from_str(xml);
    let mut shapes = Vec::new();
    let mut current: Option<Shape> = None;
    let mut in_text = false;

    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"p:sp" => current = Some(Shape::default()),
            Event::End(e) if e.name().as_ref() == b"p:sp" => shapes.extend(current.take()),
            Event::Start(e) if e.name().as_ref() == b"a:t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"a:t" => in_text = false,
            Event::Empty(e) => {
                if let Some(shape) = current.as_mut() {
                    match e.name().as_ref() {
                        b"a:off" => {
                            shape.x = attr_i64(&e, "x");
                            shape.y = attr_i64(&e, "y");
                        }
                        b"a:ext" => {
                            shape.cx = attr_i64(&e, "cx");
                            shape.cy = attr_i64(&e, "cy");
                        }
                        _ => {}
                    }
                }
            }
            Event::Text(t) if in_text => {
                if let Some(shape) = current.as_mut() {
                    shape.texts.push(t.unescape().unwrap().into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    shapes
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unreadable_page_becomes_image_only_slide() {
    let backend = ScriptedBackend::new(vec![
        one_box("Welcome"),
        Ok(reply("I'm sorry, I cannot read this slide.")),
        Ok(reply("{\"elements\": \"nope\"}")),
        one_box("Thanks"),
    ]);
    let cfg = config(&["primary", "secondary"]);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 3 }),
        Some(&backend),
        metadata(3),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!(slide_names(&out.pptx).len(), 3);
    assert_eq!(out.stats.slides_written, 3);
    assert_eq!(out.stats.editable_slides, 2);
    assert_eq!(out.stats.fallback_pages, vec![2]);

    let slide2 = read_part(&out.pptx, "ppt/slides/slide2.xml");
    assert!(slide2.contains("<p:pic>"), "background must still be present");
    assert!(text_boxes(&slide2).is_empty());

    let report = &out.slides[1];
    assert_eq!(report.attempts, 2);
    assert!(report.model.is_none());
    assert!(matches!(
        report.fallback,
        Some(ExtractError::Exhausted { attempts: 2, .. })
    ));

    let slide3 = read_part(&out.pptx, "ppt/slides/slide3.xml");
    let boxes = text_boxes(&slide3);
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].texts, vec!["Thanks"]);

    // Malformed JSON moves to the next model without retrying.
    assert_eq!(
        backend.calls(),
        vec!["primary", "primary", "secondary", "primary"]
    );
}

#[tokio::test]
async fn slide_count_matches_page_selection() {
    let backend = ScriptedBackend::default();
    let mut cfg = config(&["m"]);
    cfg.pages = PageSelection::Set(vec![1, 3, 3, 9]);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 4 }),
        Some(&backend),
        metadata(4),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!(slide_names(&out.pptx).len(), 2);
    let pages: Vec<usize> = out.slides.iter().map(|s| s.page_num).collect();
    assert_eq!(pages, vec![1, 3]);
    assert_eq!(out.stats.total_pages, 4);

    let pres = read_part(&out.pptx, "ppt/presentation.xml");
    assert_eq!(pres.matches("<p:sldId ").count(), 2);
}

#[tokio::test]
async fn empty_selection_is_an_error() {
    let backend = ScriptedBackend::default();
    let mut cfg = config(&["m"]);
    cfg.pages = PageSelection::Range(10, 12);

    let err = convert_with(
        Arc::new(SyntheticRenderer { pages: 3 }),
        Some(&backend),
        metadata(3),
        &cfg,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Pdf2PptxError::PageOutOfRange { total: 3, .. }));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn styling_survives_into_the_slide() {
    let backend = ScriptedBackend::new(vec![Ok(reply(
        r##"```json
[
  {"content": "Revenue grew", "type": "bullet", "x": "5%", "y": "30%", "width": "60%", "height": "10%",
   "font_size": "20pt", "color": "#1F4E79", "bold": true, "italic": true,
   "alignment": "center", "bullet_level": 1}
]
```"##,
    ))]);
    let cfg = config(&["m"]);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 1 }),
        Some(&backend),
        metadata(1),
        &cfg,
    )
    .await
    .unwrap();

    let xml = read_part(&out.pptx, "ppt/slides/slide1.xml");
    let boxes = text_boxes(&xml);
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].texts, vec!["Revenue grew"]);
    assert!(xml.contains(r#"algn="ctr""#));
    assert!(xml.contains(r#"<a:buChar char="•"/>"#));
    assert!(xml.contains(r#"sz="2000" b="1" i="1""#));
    assert!(xml.contains(r#"<a:srgbClr val="1F4E79"/>"#));
    assert!(xml.contains(r#"<a:latin typeface="Arial"/>"#));
}

#[tokio::test]
async fn boxes_are_kept_inside_the_slide() {
    let backend = ScriptedBackend::new(vec![Ok(reply(
        r#"[
            {"content": "Footer", "x": 95, "y": 97, "width": 50, "height": 20},
            {"content": "Huge", "x": -10, "y": 0, "width": 300, "height": 150},
            {"content": "Tiny", "x": 50, "y": 50, "width": 0.5, "height": 0.5}
        ]"#,
    ))]);
    let cfg = config(&["m"]);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 1 }),
        Some(&backend),
        metadata(1),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!((out.slide_width_emu, out.slide_height_emu), (WIDE_W, WIDE_H));
    let boxes = text_boxes(&read_part(&out.pptx, "ppt/slides/slide1.xml"));
    assert_eq!(boxes.len(), 3);
    for b in &boxes {
        assert!(b.x >= 0 && b.y >= 0, "{b:?}");
        assert!(b.x + b.cx <= WIDE_W, "{b:?}");
        assert!(b.y + b.cy <= WIDE_H, "{b:?}");
        assert!(b.cx > 0 && b.cy > 0, "{b:?}");
    }
    // Tiny boxes are grown to a usable size.
    assert!(boxes[2].cx >= 914_400);
}

#[tokio::test]
async fn rate_limits_retry_then_fall_back_to_next_model() {
    let backend = ScriptedBackend::new(vec![
        rate_limited("fast"),
        rate_limited("fast"),
        one_box("Agenda"),
    ]);
    let mut cfg = config(&["fast", "slow"]);
    cfg.retry = fast_retry(2);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 1 }),
        Some(&backend),
        metadata(1),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!(backend.calls(), vec!["fast", "fast", "slow"]);
    let report = &out.slides[0];
    assert_eq!(report.model.as_deref(), Some("slow"));
    assert_eq!(report.attempts, 3);
    assert!(report.fallback.is_none());
    assert_eq!(report.text_boxes, 1);
}

#[tokio::test]
async fn rate_limit_on_every_model_still_writes_the_slide() {
    let backend = ScriptedBackend::new((0..4).map(|_| rate_limited("m")).collect());
    let mut cfg = config(&["a", "b"]);
    cfg.retry = fast_retry(2);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 1 }),
        Some(&backend),
        metadata(1),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!(backend.calls().len(), 4);
    assert_eq!(out.stats.fallback_pages, vec![1]);
    assert_eq!(slide_names(&out.pptx).len(), 1);
}

#[tokio::test]
async fn rejected_key_aborts_the_run() {
    let backend = ScriptedBackend::new(vec![Err(ExtractError::Unauthorized {
        model: "m".into(),
        detail: "API key not valid".into(),
    })]);
    let cfg = config(&["m", "n"]);

    let err = convert_with(
        Arc::new(SyntheticRenderer { pages: 2 }),
        Some(&backend),
        metadata(2),
        &cfg,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Pdf2PptxError::AuthFailed { .. }), "{err:?}");
    assert_eq!(backend.calls(), vec!["m"]);
}

#[tokio::test]
async fn token_count_in_error_text_is_not_a_rejected_key() {
    let too_long = "HTTP 400: The input token count (14013) exceeds the maximum number of tokens allowed";
    let backend = ScriptedBackend::new(vec![
        Err(classify_error_text("m", too_long)),
        Err(classify_error_text("n", "HTTP 500: internal error, request id 84031")),
    ]);
    let cfg = config(&["m", "n"]);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 1 }),
        Some(&backend),
        metadata(1),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!(out.stats.slides_written, 1);
    assert_eq!(out.stats.fallback_pages, vec![1]);
    assert!(text_boxes(&read_part(&out.pptx, "ppt/slides/slide1.xml")).is_empty());
    assert_eq!(backend.calls(), vec!["m", "n"]);
}

#[tokio::test]
async fn slide_size_follows_first_selected_page() {
    let backend = ScriptedBackend::default();
    let mut cfg = config(&["m"]);
    cfg.pages = PageSelection::Single(2);

    let out = convert_with(
        Arc::new(MixedRenderer {
            sizes: vec![(720.0, 540.0), (960.0, 540.0)],
        }),
        Some(&backend),
        metadata(2),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!((out.slide_width_emu, out.slide_height_emu), (WIDE_W, WIDE_H));
    assert_eq!(slide_names(&out.pptx), vec!["ppt/slides/slide1.xml"]);
}

#[tokio::test]
async fn images_only_skips_the_model() {
    let tracking = Arc::new(Tracking::default());
    let mut cfg = ConversionConfig::builder()
        .images_only(true)
        .build()
        .unwrap();
    cfg.progress_callback = Some(tracking.clone() as Arc<dyn ConversionProgressCallback>);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 2 }),
        None::<&ScriptedBackend>,
        metadata(2),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!(out.stats.slides_written, 2);
    assert_eq!(out.stats.editable_slides, 0);
    assert!(out.stats.fallback_pages.is_empty());
    assert_eq!(out.stats.total_input_tokens, 0);
    for name in slide_names(&out.pptx) {
        assert!(text_boxes(&read_part(&out.pptx, &name)).is_empty());
    }
    assert_eq!(tracking.completes.load(Ordering::SeqCst), 2);
    assert_eq!(tracking.fallbacks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn progress_events_cover_every_page() {
    let tracking = Arc::new(Tracking::default());
    let backend = ScriptedBackend::new(vec![
        one_box("One"),
        Ok(reply("not json")),
        one_box("Three"),
    ]);
    let mut cfg = config(&["only"]);
    cfg.progress_callback = Some(tracking.clone() as Arc<dyn ConversionProgressCallback>);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 3 }),
        Some(&backend),
        metadata(3),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!(tracking.started.load(Ordering::SeqCst), 3);
    assert_eq!(tracking.page_starts.load(Ordering::SeqCst), 3);
    assert_eq!(tracking.completes.load(Ordering::SeqCst), 2);
    assert_eq!(tracking.fallbacks.load(Ordering::SeqCst), 1);
    assert_eq!(tracking.finished_total.load(Ordering::SeqCst), 3);
    assert_eq!(tracking.finished_editable.load(Ordering::SeqCst), 2);
    assert_eq!(out.stats.total_input_tokens, 200);
}

#[tokio::test]
async fn document_title_lands_in_core_properties() {
    let backend = ScriptedBackend::default();
    let cfg = config(&["m"]);

    let out = convert_with(
        Arc::new(SyntheticRenderer { pages: 1 }),
        Some(&backend),
        metadata(1),
        &cfg,
    )
    .await
    .unwrap();

    let core = read_part(&out.pptx, "docProps/core.xml");
    assert!(core.contains("<dc:title>Quarterly review</dc:title>"));
    let pres = read_part(&out.pptx, "ppt/presentation.xml");
    assert!(pres.contains(&format!(r#"cx="{WIDE_W}""#)));
}
