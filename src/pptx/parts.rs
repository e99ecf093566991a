//! XML bodies of the package parts.

use super::{DocumentProperties, ParagraphSpec, SlideSpec, TextBoxSpec};
use crate::layout::Alignment;
use std::fmt::Write as _;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_PML: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_DOC: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Relationship ids 1–5 in `presentation.xml.rels` are fixed parts; slides
/// start at 6.
const FIRST_SLIDE_RID: usize = 6;
/// `p:sldId/@id` must be ≥ 256.
const FIRST_SLIDE_ID: usize = 256;

/// Left margin added per bullet level, in EMU (0.3125 in).
const BULLET_INDENT_EMU: i64 = 285_750;

/// Escape text for element content or attribute values, dropping characters
/// XML 1.0 cannot represent at all.
pub(crate) fn xml_text(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}'))
        .collect();
    quick_xml::escape::escape(cleaned.as_str()).into_owned()
}

pub(crate) fn content_types(slides: usize) -> String {
    let mut s = String::with_capacity(2048 + slides * 160);
    s.push_str(XML_DECL);
    s.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    s.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    s.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    s.push_str(r#"<Default Extension="png" ContentType="image/png"/>"#);
    for (part, ct) in [
        ("/ppt/presentation.xml", "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"),
        ("/ppt/slideMasters/slideMaster1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"),
        ("/ppt/slideLayouts/slideLayout1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"),
        ("/ppt/theme/theme1.xml", "application/vnd.openxmlformats-officedocument.theme+xml"),
        ("/ppt/presProps.xml", "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml"),
        ("/ppt/viewProps.xml", "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml"),
        ("/ppt/tableStyles.xml", "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml"),
        ("/docProps/core.xml", "application/vnd.openxmlformats-package.core-properties+xml"),
        ("/docProps/app.xml", "application/vnd.openxmlformats-officedocument.extended-properties+xml"),
    ] {
        let _ = write!(s, r#"<Override PartName="{part}" ContentType="{ct}"/>"#);
    }
    for n in 1..=slides {
        let _ = write!(
            s,
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        );
    }
    s.push_str("</Types>");
    s
}

pub(crate) const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
    r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>"#,
    r#"</Relationships>"#
);

pub(crate) fn core_props(props: &DocumentProperties) -> String {
    let mut s = String::from(XML_DECL);
    s.push_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);
    if let Some(title) = props.title.as_deref().filter(|t| !t.trim().is_empty()) {
        let _ = write!(s, "<dc:title>{}</dc:title>", xml_text(title));
    }
    if let Some(author) = props.author.as_deref().filter(|a| !a.trim().is_empty()) {
        let _ = write!(s, "<dc:creator>{}</dc:creator>", xml_text(author));
    }
    s.push_str("<cp:lastModifiedBy>edgequake-pdf2pptx</cp:lastModifiedBy>");
    s.push_str("</cp:coreProperties>");
    s
}

pub(crate) fn app_props(slides: usize, width_emu: i64, height_emu: i64) -> String {
    let format = match (width_emu, height_emu) {
        (12_192_000, 6_858_000) => "Widescreen",
        (9_144_000, 6_858_000) => "On-screen Show (4:3)",
        _ => "Custom",
    };
    format!(
        "{XML_DECL}<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\" \
xmlns:vt=\"http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes\">\
<Application>edgequake-pdf2pptx</Application><PresentationFormat>{format}</PresentationFormat>\
<Slides>{slides}</Slides><Notes>0</Notes><HiddenSlides>0</HiddenSlides>\
<AppVersion>{}</AppVersion></Properties>",
        app_version()
    )
}

/// `AppVersion` must look like `XX.YYYY`.
fn app_version() -> String {
    let major: u32 = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0);
    let minor: u32 = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0);
    format!("{:02}.{:04}", major, minor)
}

pub(crate) fn presentation_xml(slides: usize, width_emu: i64, height_emu: i64) -> String {
    let mut s = String::from(XML_DECL);
    let _ = write!(s, r#"<p:presentation {NS_PML} saveSubsetFonts="1">"#);
    s.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);
    if slides > 0 {
        s.push_str("<p:sldIdLst>");
        for i in 0..slides {
            let _ = write!(
                s,
                r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                FIRST_SLIDE_ID + i,
                FIRST_SLIDE_RID + i
            );
        }
        s.push_str("</p:sldIdLst>");
    }
    let _ = write!(s, r#"<p:sldSz cx="{width_emu}" cy="{height_emu}"/>"#);
    s.push_str(r#"<p:notesSz cx="6858000" cy="9144000"/>"#);
    s.push_str("</p:presentation>");
    s
}

pub(crate) fn presentation_rels(slides: usize) -> String {
    let mut s = String::from(XML_DECL);
    let _ = write!(s, r#"<Relationships xmlns="{REL_NS}">"#);
    for (id, kind, target) in [
        (1, "slideMaster", "slideMasters/slideMaster1.xml"),
        (2, "theme", "theme/theme1.xml"),
        (3, "presProps", "presProps.xml"),
        (4, "viewProps", "viewProps.xml"),
        (5, "tableStyles", "tableStyles.xml"),
    ] {
        let _ = write!(
            s,
            r#"<Relationship Id="rId{id}" Type="{REL_DOC}/{kind}" Target="{target}"/>"#
        );
    }
    for i in 0..slides {
        let _ = write!(
            s,
            r#"<Relationship Id="rId{}" Type="{REL_DOC}/slide" Target="slides/slide{}.xml"/>"#,
            FIRST_SLIDE_RID + i,
            i + 1
        );
    }
    s.push_str("</Relationships>");
    s
}

pub(crate) fn slide_rels(n: usize) -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"{REL_NS}\">\
<Relationship Id=\"rId1\" Type=\"{REL_DOC}/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"{REL_DOC}/image\" Target=\"../media/image{n}.png\"/>\
</Relationships>"
    )
}

const EMPTY_GROUP: &str = concat!(
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#,
    r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
);

/// Slide body: background picture first (bottom of the z-order), then the
/// text boxes in the order given.
pub(crate) fn slide_xml(slide: &SlideSpec, width_emu: i64, height_emu: i64) -> String {
    let mut s = String::with_capacity(1024 + slide.text_boxes.len() * 768);
    s.push_str(XML_DECL);
    let _ = write!(s, "<p:sld {NS_PML}><p:cSld><p:spTree>");
    s.push_str(EMPTY_GROUP);

    let _ = write!(
        s,
        r#"<p:pic><p:nvPicPr><p:cNvPr id="2" name="Background"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{width_emu}" cy="{height_emu}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
    );

    for (i, tb) in slide.text_boxes.iter().enumerate() {
        write_text_box(&mut s, tb, i + 3, i + 1);
    }

    s.push_str("</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>");
    s
}

fn write_text_box(s: &mut String, tb: &TextBoxSpec, shape_id: usize, ordinal: usize) {
    let r = tb.rect;
    let _ = write!(
        s,
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{shape_id}" name="TextBox {ordinal}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#,
        r.x, r.y, r.cx, r.cy
    );
    s.push_str(r#"<p:txBody><a:bodyPr wrap="square" lIns="0" tIns="0" rIns="0" bIns="0" rtlCol="0"><a:noAutofit/></a:bodyPr><a:lstStyle/>"#);
    if tb.paragraphs.is_empty() {
        s.push_str("<a:p/>");
    }
    for p in &tb.paragraphs {
        write_paragraph(s, p);
    }
    s.push_str("</p:txBody></p:sp>");
}

fn write_paragraph(s: &mut String, p: &ParagraphSpec) {
    let algn = match p.alignment {
        Alignment::Left => "l",
        Alignment::Center => "ctr",
        Alignment::Right => "r",
    };
    let font = xml_text(&p.run.font_family);

    s.push_str("<a:p>");
    match p.bullet_level {
        Some(lvl) => {
            let mar_l = BULLET_INDENT_EMU * (i64::from(lvl) + 1);
            let _ = write!(
                s,
                r#"<a:pPr marL="{mar_l}" lvl="{lvl}" indent="-{BULLET_INDENT_EMU}" algn="{algn}"><a:buFont typeface="Arial"/><a:buChar char="•"/></a:pPr>"#
            );
        }
        None => {
            let _ = write!(s, r#"<a:pPr algn="{algn}"><a:buNone/></a:pPr>"#);
        }
    }

    let sz = (p.run.size_pt * 100.0).round() as i64;
    let _ = write!(
        s,
        r#"<a:r><a:rPr lang="en-US" sz="{sz}" b="{}" i="{}" dirty="0"><a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:latin typeface="{font}"/><a:cs typeface="{font}"/></a:rPr><a:t>{}</a:t></a:r>"#,
        u8::from(p.run.bold),
        u8::from(p.run.italic),
        p.run.color.to_hex(),
        xml_text(&p.text)
    );
    s.push_str("</a:p>");
}

pub(crate) const SLIDE_MASTER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
    r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>"#,
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
    r#"</p:spTree></p:cSld>"#,
    r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
    r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#,
    r#"<p:txStyles>"#,
    r#"<p:titleStyle><a:lvl1pPr algn="l"><a:defRPr sz="4400" kern="1200"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mj-lt"/><a:ea typeface="+mj-ea"/><a:cs typeface="+mj-cs"/></a:defRPr></a:lvl1pPr></p:titleStyle>"#,
    r#"<p:bodyStyle><a:lvl1pPr marL="228600" indent="-228600" algn="l"><a:buFont typeface="Arial"/><a:buChar char="•"/><a:defRPr sz="2800" kern="1200"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mn-lt"/><a:ea typeface="+mn-ea"/><a:cs typeface="+mn-cs"/></a:defRPr></a:lvl1pPr></p:bodyStyle>"#,
    r#"<p:otherStyle><a:defPPr><a:defRPr lang="en-US"/></a:defPPr><a:lvl1pPr marL="0" algn="l"><a:defRPr sz="1800" kern="1200"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mn-lt"/><a:ea typeface="+mn-ea"/><a:cs typeface="+mn-cs"/></a:defRPr></a:lvl1pPr></p:otherStyle>"#,
    r#"</p:txStyles></p:sldMaster>"#
);

pub(crate) const SLIDE_MASTER_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/>"#,
    r#"</Relationships>"#
);

pub(crate) const SLIDE_LAYOUT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1">"#,
    r#"<p:cSld name="Blank"><p:spTree>"#,
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
    r#"</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
);

pub(crate) const SLIDE_LAYOUT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/>"#,
    r#"</Relationships>"#
);

pub(crate) const THEME: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements>"#,
    r#"<a:clrScheme name="Office">"#,
    r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#,
    r#"<a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>"#,
    r#"<a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2>"#,
    r#"<a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4>"#,
    r#"<a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6>"#,
    r#"<a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink>"#,
    r#"</a:clrScheme>"#,
    r#"<a:fontScheme name="Office">"#,
    r#"<a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
    r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
    r#"</a:fontScheme>"#,
    r#"<a:fmtScheme name="Office">"#,
    r#"<a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst>"#,
    r#"<a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst>"#,
    r#"<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>"#,
    r#"<a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst>"#,
    r#"</a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#
);

pub(crate) const PRES_PROPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:presentationPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#
);

pub(crate) const VIEW_PROPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<p:viewPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
    r#"<p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
);

pub(crate) const TABLE_STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}"/>"#
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Rgb;
    use crate::pptx::{Rect, RunStyle};

    fn para(text: &str, bullet: Option<u8>) -> ParagraphSpec {
        ParagraphSpec {
            text: text.into(),
            alignment: Alignment::Center,
            bullet_level: bullet,
            run: RunStyle {
                size_pt: 24.0,
                color: Rgb(0x12, 0xAB, 0xEF),
                bold: true,
                italic: true,
                font_family: "Arial".into(),
            },
        }
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(xml_text(r#"a < b & "c""#), "a &lt; b &amp; &quot;c&quot;");
    }

    #[test]
    fn control_characters_are_dropped() {
        assert_eq!(xml_text("a\u{0}b\u{1b}c\td"), "abc\td");
    }

    #[test]
    fn bulleted_paragraph_markup() {
        let mut s = String::new();
        write_paragraph(&mut s, &para("Point", Some(1)));
        assert!(s.contains(r#"lvl="1""#), "{s}");
        assert!(s.contains(r#"marL="571500""#), "{s}");
        assert!(s.contains(r#"algn="ctr""#));
        assert!(s.contains(r#"<a:buChar char="•"/>"#));
        assert!(s.contains(r#"sz="2400" b="1" i="1""#));
        assert!(s.contains(r#"<a:srgbClr val="12ABEF"/>"#));
    }

    #[test]
    fn plain_paragraph_has_no_bullet() {
        let mut s = String::new();
        write_paragraph(&mut s, &para("Plain", None));
        assert!(s.contains("<a:buNone/>"));
        assert!(!s.contains("buChar"));
    }

    #[test]
    fn background_is_first_shape() {
        let slide = SlideSpec {
            background_png: vec![],
            text_boxes: vec![TextBoxSpec {
                rect: Rect { x: 1, y: 2, cx: 3, cy: 4 },
                paragraphs: vec![para("x", None)],
            }],
        };
        let xml = slide_xml(&slide, 100, 50);
        let pic = xml.find("<p:pic>").unwrap();
        let sp = xml.find("<p:sp>").unwrap();
        assert!(pic < sp);
        assert!(xml.contains(r#"<a:ext cx="100" cy="50"/>"#));
        assert!(xml.contains(r#"<a:off x="1" y="2"/><a:ext cx="3" cy="4"/>"#));
    }

    #[test]
    fn app_version_format() {
        let v = app_version();
        let (major, minor) = v.split_once('.').unwrap();
        assert_eq!(major.len(), 2);
        assert_eq!(minor.len(), 4);
    }
}
