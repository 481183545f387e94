//! Assembly loop: turn matched content blocks into slide parts inside the
//! template's own package.
//!
//! The template package arrives with its original slides still wired in.
//! Assembly detaches those, appends one new slide part per block, patches
//! `<p:sldIdLst>` in the presentation part, and serializes. Anything the new
//! slide graph no longer reaches (the template's sample slides, their notes,
//! unreferenced media) is dropped by the writer's reachability pass.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fixedbitset::FixedBitSet;
use memchr::memmem;
use thiserror::Error;

use crate::compose::applier::{self, ImagePlacement};
use crate::compose::matcher::{MatchResult, match_block};
use crate::compose::StyleWarning;
use crate::content::ContentBlock;
use crate::opc::constants::{content_type, relationship_type};
use crate::opc::{OpcError, OpcPackage, PackURI, Part};
use crate::template::{LayoutDescriptor, TemplateModel};

/// Slide ids in `<p:sldIdLst>` start here by convention.
const FIRST_SLIDE_ID: u32 = 256;

/// Cooperative cancellation flag shared between a caller and a running
/// generation. Cloning hands out another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The run stops before composing the next slide.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters describing one completed generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Slides in the output deck
    pub slide_count: usize,
    /// Distinct layouts the slides ended up on
    pub distinct_layouts: usize,
    /// Template images placed onto slides
    pub images_placed: usize,
    /// Slides that carry a notes part
    pub slides_with_notes: usize,
    /// True when the content came from the raw-text segmenter rather than a
    /// structured plan
    pub used_fallback_segmenter: bool,
}

/// Finished container bytes plus everything the caller may want to report.
#[derive(Debug)]
pub struct AssembleOutput {
    pub bytes: Vec<u8>,
    pub summary: RunSummary,
    pub warnings: Vec<StyleWarning>,
}

#[derive(Debug, Error)]
pub enum AssembleError {
    /// The cancel token fired between slides
    #[error("generation aborted by caller")]
    Aborted,

    /// The package could not be updated or serialized
    #[error("container output failed: {0}")]
    Output(#[from] OpcError),
}

/// Compose `blocks` into slides inside `pkg` and serialize the result.
///
/// `pkg` must be the same package `model` was analyzed from. The package is
/// consumed conceptually: on error its part graph may be half-rewired, so
/// callers reload from template bytes per run.
pub fn assemble(
    pkg: &mut OpcPackage,
    model: &TemplateModel,
    blocks: &[ContentBlock],
    include_speaker_notes: bool,
    cancel: Option<&CancelToken>,
) -> Result<AssembleOutput, AssembleError> {
    let pres_partname = pkg.main_document_partname()?;
    detach_existing_slides(pkg, &pres_partname)?;

    let mut warnings = Vec::new();
    let mut summary = RunSummary::default();
    let mut used_images = FixedBitSet::with_capacity(model.images.len());
    let mut layouts_seen: HashSet<String> = HashSet::new();
    let mut synthesized_layout: Option<PackURI> = None;
    let mut slide_entries: Vec<(u32, String)> = Vec::with_capacity(blocks.len());

    for (i, block) in blocks.iter().enumerate() {
        if cancel.map(CancelToken::is_cancelled).unwrap_or(false) {
            log::info!("assembly cancelled after {} of {} slides", i, blocks.len());
            return Err(AssembleError::Aborted);
        }
        let slide_no = i + 1;

        let mr = match_block(model, block);
        let layout_partname =
            ensure_layout_part(pkg, model, &mr.layout, &mut synthesized_layout)?;
        layouts_seen.insert(layout_partname.as_str().to_string());

        let slide_partname = pkg
            .next_partname("/ppt/slides/slide%d.xml")
            .ok_or_else(|| OpcError::InvalidPackUri("slide partname template".to_string()))?;
        let mut slide = Part::new(
            slide_partname.clone(),
            content_type::PML_SLIDE.to_string(),
            Vec::new(),
        );
        slide.relate_to(&layout_partname, relationship_type::SLIDE_LAYOUT);

        let image = place_image(model, &mr, &mut used_images).map(|placement| {
            let rid = slide.relate_to(
                &model.images[placement.image_index].partname,
                relationship_type::IMAGE,
            );
            (placement, rid)
        });
        if image.is_some() {
            summary.images_placed += 1;
        }

        let notes = block
            .speaker_notes
            .as_deref()
            .filter(|n| include_speaker_notes && !n.trim().is_empty());
        if let Some(notes_text) = notes {
            let notes_partname = add_notes_part(pkg, model, &slide_partname, notes_text)?;
            slide.relate_to(&notes_partname, relationship_type::NOTES_SLIDE);
            summary.slides_with_notes += 1;
        }

        let (xml, slide_warnings) = applier::build_slide_xml(
            model,
            &mr,
            block,
            slide_no,
            image.as_ref().map(|(p, rid)| (*p, rid.as_str())),
        );
        slide.set_blob(xml.into_bytes());
        pkg.add_part(slide);

        let pres = pkg
            .get_part_mut(&pres_partname)
            .ok_or_else(|| OpcError::PartNotFound(pres_partname.as_str().to_string()))?;
        let rid = pres.relate_to(&slide_partname, relationship_type::SLIDE);
        slide_entries.push((FIRST_SLIDE_ID + i as u32, rid));

        warnings.extend(slide_warnings);
    }

    summary.slide_count = slide_entries.len();
    summary.distinct_layouts = layouts_seen.len();

    patch_presentation_part(pkg, &pres_partname, &slide_entries)?;
    touch_core_properties(pkg);

    let bytes = pkg.to_bytes()?;
    log::debug!(
        "assembled {} slides across {} layouts, {} bytes out",
        summary.slide_count,
        summary.distinct_layouts,
        bytes.len()
    );
    Ok(AssembleOutput {
        bytes,
        summary,
        warnings,
    })
}

/// Remove the presentation part's slide relationships so the template's own
/// slides fall out of the reachability graph at write time.
fn detach_existing_slides(pkg: &mut OpcPackage, pres_partname: &PackURI) -> Result<(), OpcError> {
    let pres = pkg
        .get_part_mut(pres_partname)
        .ok_or_else(|| OpcError::PartNotFound(pres_partname.as_str().to_string()))?;
    let slide_rids: Vec<String> = pres
        .rels()
        .iter()
        .filter(|rel| rel.reltype() == relationship_type::SLIDE)
        .map(|rel| rel.r_id().to_string())
        .collect();
    for r_id in &slide_rids {
        pres.rels_mut().remove(r_id);
    }
    if !slide_rids.is_empty() {
        log::debug!("detached {} template slides", slide_rids.len());
    }
    Ok(())
}

/// Return the partname of the layout a new slide should reference,
/// materializing the synthesized generic layout as a real part on first use.
fn ensure_layout_part(
    pkg: &mut OpcPackage,
    model: &TemplateModel,
    layout: &LayoutDescriptor,
    synthesized: &mut Option<PackURI>,
) -> Result<PackURI, AssembleError> {
    if !layout.synthesized && pkg.contains_part(&layout.partname) {
        return Ok(layout.partname.clone());
    }
    if let Some(partname) = synthesized {
        return Ok(partname.clone());
    }

    let partname = pkg
        .next_partname("/ppt/slideLayouts/slideLayout%d.xml")
        .ok_or_else(|| OpcError::InvalidPackUri("layout partname template".to_string()))?;
    let mut part = Part::new(
        partname.clone(),
        content_type::PML_SLIDE_LAYOUT.to_string(),
        build_layout_xml(layout).into_bytes(),
    );
    part.relate_to(&model.master_partname, relationship_type::SLIDE_MASTER);
    pkg.add_part(part);
    log::debug!("materialized generic layout as {}", partname.as_str());
    *synthesized = Some(partname.clone());
    Ok(partname)
}

/// Serialize a layout descriptor as a minimal slideLayout part. Only used for
/// the synthesized generic layout; real layouts keep their template bytes.
fn build_layout_xml(layout: &LayoutDescriptor) -> String {
    let mut shapes = String::with_capacity(512);
    for (i, ph) in layout.placeholders.iter().enumerate() {
        let shape_id = i as u32 + 2;
        shapes.push_str("<p:sp><p:nvSpPr><p:cNvPr id=\"");
        let mut buf = itoa::Buffer::new();
        shapes.push_str(buf.format(shape_id));
        shapes.push_str("\" name=\"Placeholder ");
        shapes.push_str(buf.format(shape_id - 1));
        shapes.push_str("\"/><p:cNvSpPr><a:spLocks noGrp=\"1\"/></p:cNvSpPr><p:nvPr>");
        applier::write_ph(&mut shapes, ph);
        shapes.push_str("</p:nvPr></p:nvSpPr><p:spPr>");
        if let Some(frame) = ph.frame {
            applier::write_xfrm(&mut shapes, frame);
        }
        shapes.push_str("</p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p/></p:txBody></p:sp>");
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\r\n",
            r#"<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
            r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
            r#" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#,
            r#" showMasterSp="1"><p:cSld name="{name}"><p:spTree>"#,
            r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
            r#"<p:grpSpPr/>{shapes}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
        ),
        name = crate::common::xml::escape_xml(&layout.name),
        shapes = shapes
    )
}

/// Pick an unused image for this slide's picture placeholder and mark it
/// consumed. One image at most per slide.
fn place_image(
    model: &TemplateModel,
    mr: &MatchResult,
    used: &mut FixedBitSet,
) -> Option<ImagePlacement> {
    let placement = applier::select_image(model, &mr.layout, used)?;
    used.insert(placement.image_index);
    Some(placement)
}

/// Create the notes part for one slide and wire its outbound relationships.
fn add_notes_part(
    pkg: &mut OpcPackage,
    model: &TemplateModel,
    slide_partname: &PackURI,
    notes_text: &str,
) -> Result<PackURI, AssembleError> {
    let partname = pkg
        .next_partname("/ppt/notesSlides/notesSlide%d.xml")
        .ok_or_else(|| OpcError::InvalidPackUri("notes partname template".to_string()))?;
    let mut part = Part::new(
        partname.clone(),
        content_type::PML_NOTES_SLIDE.to_string(),
        applier::build_notes_xml(notes_text).into_bytes(),
    );
    part.relate_to(slide_partname, relationship_type::SLIDE);
    if let Some(notes_master) = &model.notes_master {
        part.relate_to(notes_master, relationship_type::NOTES_MASTER);
    }
    pkg.add_part(part);
    Ok(partname)
}

/// Rewrite `<p:sldIdLst>` in the presentation part to list exactly the new
/// slides, in order.
fn patch_presentation_part(
    pkg: &mut OpcPackage,
    pres_partname: &PackURI,
    entries: &[(u32, String)],
) -> Result<(), OpcError> {
    let mut list = String::with_capacity(32 + entries.len() * 40);
    list.push_str("<p:sldIdLst>");
    let mut buf = itoa::Buffer::new();
    for (id, rid) in entries {
        list.push_str("<p:sldId id=\"");
        list.push_str(buf.format(*id));
        list.push_str("\" r:id=\"");
        list.push_str(rid);
        list.push_str("\"/>");
    }
    list.push_str("</p:sldIdLst>");

    let pres = pkg
        .get_part_mut(pres_partname)
        .ok_or_else(|| OpcError::PartNotFound(pres_partname.as_str().to_string()))?;
    let patched = patch_slide_id_list(pres.blob(), &list);
    pres.set_blob(patched);
    Ok(())
}

/// Splice a replacement `<p:sldIdLst>` into presentation XML without
/// reserializing the rest of the part. Handles the paired, self-closing, and
/// absent forms of the element.
fn patch_slide_id_list(blob: &[u8], list_xml: &str) -> Vec<u8> {
    if let Some(start) = memmem::find(blob, b"<p:sldIdLst") {
        let open_end = memchr::memchr(b'>', &blob[start..]).map(|i| start + i);
        let end = match open_end {
            // <p:sldIdLst/>
            Some(gt) if gt > 0 && blob[gt - 1] == b'/' => gt + 1,
            Some(gt) => memmem::find(&blob[gt..], b"</p:sldIdLst>")
                .map(|i| gt + i + b"</p:sldIdLst>".len())
                .unwrap_or(gt + 1),
            None => blob.len(),
        };
        splice(blob, start, end, list_xml)
    } else if let Some(pos) = memmem::find(blob, b"<p:sldSz") {
        // Schema places sldIdLst before sldSz
        splice(blob, pos, pos, list_xml)
    } else if let Some(pos) = memmem::find(blob, b"</p:presentation>") {
        splice(blob, pos, pos, list_xml)
    } else {
        blob.to_vec()
    }
}

fn splice(blob: &[u8], start: usize, end: usize, replacement: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(blob.len() - (end - start) + replacement.len());
    out.extend_from_slice(&blob[..start]);
    out.extend_from_slice(replacement.as_bytes());
    out.extend_from_slice(&blob[end..]);
    out
}

/// Stamp `dcterms:modified` in the core-properties part with the current
/// time. Templates without the part, or without the element, pass through
/// untouched.
fn touch_core_properties(pkg: &mut OpcPackage) {
    let partname = match pkg
        .rels()
        .part_with_reltype(relationship_type::CORE_PROPERTIES)
        .and_then(|rel| rel.target_partname())
    {
        Ok(partname) => partname,
        Err(_) => return,
    };
    let Some(part) = pkg.get_part_mut(&partname) else {
        return;
    };
    let stamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    if let Some(patched) = rewrite_modified_stamp(part.blob(), &stamp) {
        part.set_blob(patched);
    }
}

/// Replace the text content of `<dcterms:modified ...>...</dcterms:modified>`.
/// Returns `None` when the element is absent or self-closing.
fn rewrite_modified_stamp(blob: &[u8], stamp: &str) -> Option<Vec<u8>> {
    let start = memmem::find(blob, b"<dcterms:modified")?;
    let open_end = start + memchr::memchr(b'>', &blob[start..])?;
    if blob[open_end - 1] == b'/' {
        return None;
    }
    let value_start = open_end + 1;
    let close = value_start + memmem::find(&blob[value_start..], b"</dcterms:modified>")?;
    let mut out = Vec::with_capacity(blob.len() + stamp.len());
    out.extend_from_slice(&blob[..value_start]);
    out.extend_from_slice(stamp.as_bytes());
    out.extend_from_slice(&blob[close..]);
    Some(out)
}
