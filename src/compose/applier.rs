use crate::common::color::contrast_ratio;
use crate::common::xml::escape_xml;
use crate::common::RGBColor;
use crate::compose::fit;
use crate::compose::matcher::MatchResult;
use crate::compose::StyleWarning;
use crate::content::ContentBlock;
use crate::template::model::{PlaceholderDescriptor, PlaceholderKind, Rect, ResolvedStyle};
use crate::template::{LayoutDescriptor, TemplateModel};
use fixedbitset::FixedBitSet;

/// Style application: synthesize one slide's XML.
///
/// Text lands in the matched placeholders with fonts, sizes and colors
/// resolved through the inheritance chain; overflowing text shrinks and
/// then truncates with a visible marker; low-contrast colors are swapped
/// for the theme's better-contrasting text role. Problems downgrade to
/// [`StyleWarning`]s, never to a failed slide.

/// Minimum acceptable contrast between text and background (WCAG AA).
pub(crate) const CONTRAST_THRESHOLD: f64 = 4.5;

/// An image chosen for a slide: catalog index plus the layout placeholder
/// it fills.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ImagePlacement {
    pub(crate) image_index: usize,
    pub(crate) ph_index: usize,
}

/// Aspect-ratio differences closer than this count as a tie.
const ASPECT_TIE_EPSILON: f64 = 1e-6;

/// Pick the best unused image for the layout's picture placeholder.
///
/// Preference order: closest aspect ratio to the placeholder box; on an
/// aspect tie, the larger asset (more pixels to give when scaled into the
/// box). At most one image per slide; a layout without a picture
/// placeholder gets none.
pub(crate) fn select_image(
    model: &TemplateModel,
    layout: &LayoutDescriptor,
    used: &FixedBitSet,
) -> Option<ImagePlacement> {
    let ph_index = layout
        .placeholders
        .iter()
        .position(|ph| ph.kind == PlaceholderKind::Image)?;
    let frame = layout.placeholders[ph_index].frame;
    let target_aspect = frame
        .filter(|f| f.cy > 0)
        .map(|f| f.cx as f64 / f.cy as f64)
        .unwrap_or(16.0 / 9.0);

    let mut best: Option<(f64, usize, usize)> = None; // (aspect diff, byte size, index)
    for (i, asset) in model.images.iter().enumerate() {
        if used.contains(i) {
            continue;
        }
        // Images without readable dimensions rank behind every sized one
        let diff = asset
            .aspect_ratio()
            .map(|a| (a - target_aspect).abs())
            .unwrap_or(f64::MAX);
        let better = match best {
            None => true,
            Some((d, size, _)) => {
                diff < d - ASPECT_TIE_EPSILON
                    || ((diff - d).abs() <= ASPECT_TIE_EPSILON && asset.byte_size > size)
            },
        };
        if better {
            best = Some((diff, asset.byte_size, i));
        }
    }

    best.map(|(_, _, image_index)| ImagePlacement {
        image_index,
        ph_index,
    })
}

/// Build the slide part XML for one matched block.
///
/// `image` pairs a placement with the rId the assembler registered for the
/// image part. Returns the XML and any warnings raised while styling.
pub(crate) fn build_slide_xml(
    model: &TemplateModel,
    mr: &MatchResult,
    block: &ContentBlock,
    slide_no: usize,
    image: Option<(ImagePlacement, &str)>,
) -> (String, Vec<StyleWarning>) {
    let mut warnings = Vec::new();
    let mut shapes = String::with_capacity(2048);
    let mut shape_id = 2u32;

    if !block.title.trim().is_empty() {
        match mr.title_ph.and_then(|i| mr.layout.placeholders.get(i)) {
            Some(ph) => {
                write_text_shape(
                    &mut shapes,
                    model,
                    mr.layout.background,
                    ph,
                    &[block.title.trim().to_string()],
                    shape_id,
                    "Title",
                    slide_no,
                    "title",
                    &mut warnings,
                );
                shape_id += 1;
            },
            None => {
                log::warn!("slide {}: layout offers no title placeholder", slide_no);
                warnings.push(StyleWarning::MissingPlaceholder {
                    slide: slide_no,
                    field: "title",
                });
            },
        }
    }

    let body_paragraphs = block.body_paragraphs();
    if !body_paragraphs.is_empty() {
        match mr.body_ph.and_then(|i| mr.layout.placeholders.get(i)) {
            Some(ph) => {
                write_text_shape(
                    &mut shapes,
                    model,
                    mr.layout.background,
                    ph,
                    &body_paragraphs,
                    shape_id,
                    "Content",
                    slide_no,
                    "body",
                    &mut warnings,
                );
                shape_id += 1;
            },
            None => {
                warnings.push(StyleWarning::MissingPlaceholder {
                    slide: slide_no,
                    field: "body",
                });
            },
        }
    }

    if let Some((placement, rid)) = image {
        if let Some(ph) = mr.layout.placeholders.get(placement.ph_index) {
            write_picture_shape(&mut shapes, ph, rid, shape_id);
        }
    }

    let xml = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\r\n",
            r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
            r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
            r#" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
            r#"<p:cSld><p:spTree>"#,
            r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
            r#"<p:grpSpPr/>{shapes}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
        ),
        shapes = shapes
    );
    (xml, warnings)
}

/// Build a notes-slide part for a block's speaker notes.
pub(crate) fn build_notes_xml(notes: &str) -> String {
    let mut paragraphs = String::new();
    for line in notes.lines().filter(|l| !l.trim().is_empty()) {
        paragraphs.push_str("<a:p><a:r><a:rPr lang=\"en-US\" dirty=\"0\"/><a:t>");
        paragraphs.push_str(&escape_xml(line.trim()));
        paragraphs.push_str("</a:t></a:r></a:p>");
    }
    if paragraphs.is_empty() {
        paragraphs.push_str("<a:p/>");
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\r\n",
            r#"<p:notes xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
            r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
            r#" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
            r#"<p:cSld><p:spTree>"#,
            r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
            r#"<p:grpSpPr/>"#,
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Notes Placeholder 1"/>"#,
            r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#,
            r#"<p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr>"#,
            r#"<p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
            r#"</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:notes>"#
        ),
        paragraphs = paragraphs
    )
}

/// The background a placeholder's text actually sits on: the shape's own
/// fill, else the layout's background fill, else the theme background role.
pub(crate) fn effective_background(
    model: &TemplateModel,
    layout_background: Option<RGBColor>,
    ph: &PlaceholderDescriptor,
) -> RGBColor {
    ph.fill
        .or(layout_background)
        .unwrap_or_else(|| model.background_color())
}

/// Swap a low-contrast color for the theme text role that reads better
/// against the given background. Substitutions stay inside the template's
/// palette.
pub(crate) fn ensure_contrast(
    model: &TemplateModel,
    color: RGBColor,
    background: RGBColor,
) -> (RGBColor, bool) {
    if contrast_ratio(color, background) >= CONTRAST_THRESHOLD {
        return (color, false);
    }

    // Candidates are theme roles only: the mapped text role, and the
    // background role used as text (the readable choice where a dark fill
    // sits behind the placeholder).
    let text_role = model.text_color();
    let bg_as_text = model.background_color();
    let substituted =
        if contrast_ratio(text_role, background) >= contrast_ratio(bg_as_text, background) {
            text_role
        } else {
            bg_as_text
        };
    (substituted, substituted != color)
}

#[allow(clippy::too_many_arguments)]
fn write_text_shape(
    out: &mut String,
    model: &TemplateModel,
    layout_background: Option<RGBColor>,
    ph: &PlaceholderDescriptor,
    paragraphs: &[String],
    shape_id: u32,
    name_prefix: &str,
    slide_no: usize,
    field: &'static str,
    warnings: &mut Vec<StyleWarning>,
) {
    let resolved = model.resolve_style(ph);
    let background = effective_background(model, layout_background, ph);
    let (color, substituted) = ensure_contrast(model, resolved.color, background);
    if substituted {
        warnings.push(StyleWarning::LowContrast {
            slide: slide_no,
            original: resolved.color,
            substituted: color,
        });
    }

    let plan = fit::plan_fit(paragraphs.to_vec(), ph.frame, resolved.size_centipt);
    if plan.truncated {
        warnings.push(StyleWarning::Truncated {
            slide: slide_no,
            field,
        });
    }

    out.push_str("<p:sp><p:nvSpPr><p:cNvPr id=\"");
    push_u32(out, shape_id);
    out.push_str("\" name=\"");
    out.push_str(name_prefix);
    out.push(' ');
    push_u32(out, shape_id - 1);
    out.push_str("\"/><p:cNvSpPr><a:spLocks noGrp=\"1\"/></p:cNvSpPr><p:nvPr>");
    write_ph(out, ph);
    out.push_str("</p:nvPr></p:nvSpPr><p:spPr>");
    if let Some(frame) = ph.frame {
        write_xfrm(out, frame);
    }
    out.push_str("</p:spPr><p:txBody><a:bodyPr/><a:lstStyle/>");

    let style = ResolvedStyle {
        color,
        size_centipt: plan.size_centipt,
        ..resolved
    };
    for paragraph in &plan.paragraphs {
        write_run_paragraph(out, paragraph, &style);
    }
    if plan.paragraphs.is_empty() {
        out.push_str("<a:p/>");
    }
    out.push_str("</p:txBody></p:sp>");
}

fn write_run_paragraph(out: &mut String, text: &str, style: &ResolvedStyle) {
    out.push_str("<a:p><a:r><a:rPr lang=\"en-US\" sz=\"");
    push_u32(out, style.size_centipt);
    out.push('"');
    if style.bold {
        out.push_str(" b=\"1\"");
    }
    out.push_str(" dirty=\"0\"><a:solidFill><a:srgbClr val=\"");
    out.push_str(&style.color.to_hex());
    out.push_str("\"/></a:solidFill><a:latin typeface=\"");
    out.push_str(&escape_xml(&style.typeface));
    out.push_str("\"/></a:rPr><a:t>");
    out.push_str(&escape_xml(text));
    out.push_str("</a:t></a:r></a:p>");
}

fn write_picture_shape(out: &mut String, ph: &PlaceholderDescriptor, rid: &str, shape_id: u32) {
    out.push_str("<p:pic><p:nvPicPr><p:cNvPr id=\"");
    push_u32(out, shape_id);
    out.push_str("\" name=\"Picture ");
    push_u32(out, shape_id - 1);
    out.push_str("\"/><p:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></p:cNvPicPr><p:nvPr>");
    write_ph(out, ph);
    out.push_str("</p:nvPr></p:nvPicPr><p:blipFill><a:blip r:embed=\"");
    out.push_str(rid);
    out.push_str("\"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>");
    if let Some(frame) = ph.frame {
        write_xfrm(out, frame);
    }
    out.push_str("<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr></p:pic>");
}

/// Emit the `<p:ph>` element so the slide shape inherits from the layout.
pub(crate) fn write_ph(out: &mut String, ph: &PlaceholderDescriptor) {
    out.push_str("<p:ph");
    if let Some(t) = &ph.ph_type {
        out.push_str(" type=\"");
        out.push_str(t);
        out.push('"');
    }
    if ph.idx != 0 {
        out.push_str(" idx=\"");
        push_u32(out, ph.idx);
        out.push('"');
    }
    out.push_str("/>");
}

pub(crate) fn write_xfrm(out: &mut String, frame: Rect) {
    out.push_str("<a:xfrm><a:off x=\"");
    push_i64(out, frame.x);
    out.push_str("\" y=\"");
    push_i64(out, frame.y);
    out.push_str("\"/><a:ext cx=\"");
    push_i64(out, frame.cx);
    out.push_str("\" cy=\"");
    push_i64(out, frame.cy);
    out.push_str("\"/></a:xfrm>");
}

fn push_u32(out: &mut String, value: u32) {
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(value));
}

fn push_i64(out: &mut String, value: i64) {
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(value));
}
