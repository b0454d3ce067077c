//! Shared test fixtures for deckforge-pptx and its dependents
//!
//! [`library_fixture`] builds a small template library in memory:
//!
//! 1. Title slide: `Title 1` (centered title) and `Subtitle 2`
//! 2. Section slide, hidden, with speaker notes: `Title 1` and `Subtitle 2`,
//!    the latter linking to slide 3
//! 3. Content slide: `Titre 1`, `ZoneTexte 8`, the 2x2 table `Table 7`,
//!    group `Group 5` holding `TextBox 2`, `Picture 3` and a connector
//!    from `ZoneTexte 8` to `Picture 3`
//!
//! Every shape carries real geometry, so copies can be compared with their
//! templates beyond the text bodies.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use deckforge_ooxml::{OoxmlArchive, XmlDocument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

const REL_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";

/// Slot catalog describing slide 3 of [`library_fixture`]
pub const CATALOG: &str = r#"
[meta]
library = "library.pptx"
name = "Fixture library"

[[slides]]
index = 3
category = "content"
description = "Bullets, a 2x2 table and a callout"
title_shape = "Titre 1"

[slides.slots.bullets]
shape = "ZoneTexte 8"
max_items = 5
max_words = 40

[slides.slots.cell]
shape = "Table 7"
cell = [2, 1]

[slides.slots.callout]
shape = "TextBox 2"
group = "Group 5"

[slides.slots.picture]
shape = "Picture 3"
kind = "toggle"
"#;

fn xfrm(x: u32, y: u32, cx: u32, cy: u32) -> String {
    format!(r#"<a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#)
}

fn text_shape(id: u32, name: &str, placeholder: Option<&str>, text: &str) -> String {
    let ph = placeholder
        .map(|t| format!(r#"<p:ph type="{}"/>"#, t))
        .unwrap_or_default();
    let geometry = xfrm(457200, 274638 + id * 1143000, 8229600, 1143000);
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr/><p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr>{geometry}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:solidFill><a:srgbClr val="F2F2F2"/></a:solidFill></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:pPr algn="l"/><a:r><a:rPr lang="fr-FR" sz="2000" b="1"/><a:t>{text}</a:t></a:r><a:endParaRPr lang="fr-FR" sz="2000"/></a:p></p:txBody></p:sp>"#
    )
}

fn slide(attrs: &str, shapes: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld {NS}{attrs}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        shapes.concat()
    )
}

fn cell(text: &str) -> String {
    format!(
        r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="fr-FR" sz="1200"/><a:t>{text}</a:t></a:r></a:p></a:txBody><a:tcPr/></a:tc>"#
    )
}

fn content_slide() -> String {
    let table = format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="7" name="Table 7"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm><a:off x="457200" y="4114800"/><a:ext cx="6000000" cy="741680"/></p:xfrm><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblGrid><a:gridCol w="3000000"/><a:gridCol w="3000000"/></a:tblGrid><a:tr h="370840">{}{}</a:tr><a:tr h="370840">{}{}</a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
        cell("Quarter"),
        cell("Revenue"),
        cell("Q0"),
        cell("0")
    );
    // The grouped text box reuses id 2 on purpose
    let group = format!(
        r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="5" name="Group 5"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="6858000" y="1600200"/><a:ext cx="4572000" cy="1143000"/><a:chOff x="457200" y="2560638"/><a:chExt cx="8229600" cy="1143000"/></a:xfrm></p:grpSpPr>{}</p:grpSp>"#,
        text_shape(2, "TextBox 2", None, "Callout")
    );
    let picture = format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="3" name="Picture 3"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        xfrm(7315200, 4114800, 3657600, 2057400)
    );
    let connector = format!(
        r#"<p:cxnSp><p:nvCxnSpPr><p:cNvPr id="9" name="Connector 9"/><p:cNvCxnSpPr><a:stCxn id="8" idx="3"/><a:endCxn id="3" idx="1"/></p:cNvCxnSpPr><p:nvPr/></p:nvCxnSpPr><p:spPr>{}<a:prstGeom prst="straightConnector1"><a:avLst/></a:prstGeom><a:ln w="12700"/></p:spPr></p:cxnSp>"#,
        xfrm(8686800, 2560638, 0, 1554162)
    );

    slide(
        "",
        &[
            text_shape(2, "Titre 1", Some("title"), "[TITLE HERE]"),
            text_shape(8, "ZoneTexte 8", None, "Bullet text"),
            table,
            group,
            picture,
            connector,
        ],
    )
}

fn relationships(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, rel_type, target) in entries {
        xml.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{rel_type}" Target="{target}"/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// Parts of the fixture library, in archive order
pub fn library_parts() -> Vec<(String, Vec<u8>)> {
    let rel = |name: &str| {
        format!(
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/{}",
            name
        )
    };

    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/><Override PartName="/ppt/slides/slide2.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/><Override PartName="/ppt/slides/slide3.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/><Override PartName="/ppt/notesSlides/notesSlide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/></Types>"#;

    let presentation = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {NS} saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/><p:sldId id="258" r:id="rId4"/></p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    );

    let master = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
    );
    let layout = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout {NS} type="obj"><p:cSld name="Title and Content"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld></p:sldLayout>"#
    );
    let theme = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Fixture"><a:themeElements/></a:theme>"#;
    let notes = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:notes {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld></p:notes>"#
    );
    let app = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>Microsoft Office PowerPoint</Application><Slides>3</Slides><Notes>1</Notes></Properties>"#;

    let layout_rel = [("rId1", REL_LAYOUT, "../slideLayouts/slideLayout1.xml")];

    vec![
        ("[Content_Types].xml".into(), content_types.into()),
        (
            "_rels/.rels".into(),
            relationships(&[
                ("rId1", &*rel("officeDocument"), "ppt/presentation.xml"),
                ("rId2", &*rel("extended-properties"), "docProps/app.xml"),
            ])
            .into(),
        ),
        ("docProps/app.xml".into(), app.into()),
        ("ppt/presentation.xml".into(), presentation.into()),
        (
            "ppt/_rels/presentation.xml.rels".into(),
            relationships(&[
                ("rId1", &*rel("slideMaster"), "slideMasters/slideMaster1.xml"),
                ("rId2", &*rel("slide"), "slides/slide1.xml"),
                ("rId3", &*rel("slide"), "slides/slide2.xml"),
                ("rId4", &*rel("slide"), "slides/slide3.xml"),
                ("rId5", &*rel("theme"), "theme/theme1.xml"),
            ])
            .into(),
        ),
        ("ppt/slideMasters/slideMaster1.xml".into(), master.into()),
        (
            "ppt/slideMasters/_rels/slideMaster1.xml.rels".into(),
            relationships(&[
                ("rId1", REL_LAYOUT, "../slideLayouts/slideLayout1.xml"),
                ("rId2", &*rel("theme"), "../theme/theme1.xml"),
            ])
            .into(),
        ),
        ("ppt/slideLayouts/slideLayout1.xml".into(), layout.into()),
        (
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels".into(),
            relationships(&[(
                "rId1",
                &*rel("slideMaster"),
                "../slideMasters/slideMaster1.xml",
            )])
            .into(),
        ),
        ("ppt/theme/theme1.xml".into(), theme.into()),
        ("ppt/media/image1.png".into(), b"\x89PNG\r\n\x1a\nfixture".to_vec()),
        (
            "ppt/slides/slide1.xml".into(),
            slide(
                "",
                &[
                    text_shape(2, "Title 1", Some("ctrTitle"), "[DECK TITLE]"),
                    text_shape(3, "Subtitle 2", Some("subTitle"), "[DATE]"),
                ],
            )
            .into(),
        ),
        (
            "ppt/slides/_rels/slide1.xml.rels".into(),
            relationships(&layout_rel).into(),
        ),
        (
            "ppt/slides/slide2.xml".into(),
            slide(
                r#" show="0""#,
                &[
                    text_shape(2, "Title 1", Some("title"), "[TITLE HERE]"),
                    text_shape(3, "Subtitle 2", Some("body"), "[SUBTITLE]").replacen(
                        r#"name="Subtitle 2"/>"#,
                        r#"name="Subtitle 2"><a:hlinkClick r:id="rId3" action="ppaction://hlinksldjump"/></p:cNvPr>"#,
                        1,
                    ),
                ],
            )
            .into(),
        ),
        (
            "ppt/slides/_rels/slide2.xml.rels".into(),
            relationships(&[
                layout_rel[0],
                ("rId2", &*rel("notesSlide"), "../notesSlides/notesSlide1.xml"),
                ("rId3", &*rel("slide"), "slide3.xml"),
            ])
            .into(),
        ),
        ("ppt/slides/slide3.xml".into(), content_slide().into()),
        (
            "ppt/slides/_rels/slide3.xml.rels".into(),
            relationships(&[layout_rel[0], ("rId2", &*rel("image"), "../media/image1.png")])
                .into(),
        ),
        ("ppt/notesSlides/notesSlide1.xml".into(), notes.into()),
        (
            "ppt/notesSlides/_rels/notesSlide1.xml.rels".into(),
            relationships(&[("rId1", &*rel("slide"), "../slides/slide2.xml")]).into(),
        ),
    ]
}

/// Zip a list of parts
pub fn zip_parts(parts: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for (name, data) in parts {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();

    buffer.into_inner()
}

/// The fixture library as `.pptx` bytes
pub fn library_fixture() -> Vec<u8> {
    zip_parts(&library_parts())
}

/// The fixture library without one of its parts
pub fn library_without(part: &str) -> Vec<u8> {
    let parts: Vec<_> = library_parts()
        .into_iter()
        .filter(|(name, _)| name != part)
        .collect();
    zip_parts(&parts)
}

/// Write the fixture library and its catalog into `dir`
///
/// Returns the library path; the catalog is `slots.toml` beside it.
pub fn write_library(dir: &Path) -> PathBuf {
    let path = dir.join("library.pptx");
    std::fs::write(&path, library_fixture()).unwrap();
    std::fs::write(dir.join("slots.toml"), CATALOG).unwrap();
    path
}

/// Parse one slide (1-based) of an output deck
pub fn output_slide(deck: &[u8], number: usize) -> XmlDocument {
    let archive = OoxmlArchive::from_bytes(deck).unwrap();
    archive
        .xml_part(&format!("ppt/slides/slide{}.xml", number))
        .unwrap()
}

/// Text of every `a:t` of a shape on an output slide, paragraphs joined by `\n`
pub fn shape_text(slide: &XmlDocument, name: &str) -> Option<String> {
    let mut found = None;
    slide.root.walk(&mut |element| {
        if found.is_some() || !matches!(element.local_name(), "sp" | "graphicFrame") {
            return;
        }
        if crate::shapes::shape_name(element) == Some(name) {
            let body = if element.local_name() == "graphicFrame" {
                element.find("tbl")
            } else {
                element.child("txBody")
            };
            found = Some(
                body.map(|b| {
                    let mut paragraphs = Vec::new();
                    b.walk(&mut |e| {
                        if e.local_name() == "p" {
                            paragraphs.push(e.text());
                        }
                    });
                    paragraphs.join("\n")
                })
                .unwrap_or_default(),
            );
        }
    });
    found
}

/// Whether a shape on an output slide is hidden
pub fn shape_hidden(slide: &XmlDocument, name: &str) -> bool {
    let mut hidden = false;
    slide.root.walk(&mut |element| {
        if element.local_name() == "cNvPr" && element.attr("name") == Some(name) {
            hidden = element.attr("hidden") == Some("1");
        }
    });
    hidden
}
