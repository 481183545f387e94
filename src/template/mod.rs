//! Template analysis.
//!
//! Turns a presentation container into a [`TemplateModel`]: slide geometry,
//! theme palette and fonts, the placeholder inventory of every layout, and
//! the catalog of reusable images. The model is pure data and carries no
//! handle to the source package, so analysis runs once and the result can
//! be shared across generation runs.

mod layout;
mod media;
pub mod model;
mod presentation;
mod theme;

pub use model::{
    AnalysisSummary, ImageAsset, LayoutDescriptor, PlaceholderDescriptor, PlaceholderKind, Rect,
    ResolvedStyle, TemplateModel, Theme,
};

use crate::opc::constants::{content_type, relationship_type};
use crate::opc::error::OpcError;
use crate::opc::package::OpcPackage;
use crate::opc::packuri::PackURI;
use crate::template::model::{DEFAULT_SLIDE_HEIGHT, DEFAULT_SLIDE_WIDTH, TextStyle};
use thiserror::Error;

/// Errors from template analysis. All of these are fatal; a template that
/// cannot be analyzed cannot be used for generation.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The container could not be read as an OPC package
    #[error("template container could not be read: {0}")]
    Container(#[from] OpcError),

    /// A part the analysis depends on is absent
    #[error("required part missing: {0}")]
    MissingPart(String),

    /// A part exists but its XML could not be parsed
    #[error("malformed XML in {part}: {detail}")]
    MalformedXml { part: String, detail: String },

    /// The main document part is not presentation content
    #[error("main document part is not a presentation (content type {0})")]
    NotAPresentation(String),
}

/// Analyze a loaded package into a template model.
pub(crate) fn analyze(pkg: &OpcPackage) -> Result<TemplateModel, TemplateError> {
    let main_partname = pkg.main_document_partname()?;
    let main_part = pkg
        .get_part(&main_partname)
        .ok_or_else(|| TemplateError::MissingPart(main_partname.to_string()))?;

    let ct = main_part.content_type();
    if !matches!(
        ct,
        content_type::PML_PRESENTATION_MAIN
            | content_type::PML_TEMPLATE_MAIN
            | content_type::PML_SLIDESHOW_MAIN
    ) {
        return Err(TemplateError::NotAPresentation(ct.to_string()));
    }

    let info = presentation::parse_presentation(main_part.blob())
        .map_err(|detail| malformed(&main_partname, detail))?;

    let master_rid = info
        .master_rids
        .first()
        .ok_or_else(|| TemplateError::MissingPart("slide master".to_string()))?;
    if info.master_rids.len() > 1 {
        log::debug!(
            "template has {} slide masters, analyzing the first",
            info.master_rids.len()
        );
    }
    let master_partname = main_part
        .rel(master_rid)
        .ok_or_else(|| TemplateError::MissingPart(format!("slide master part ({})", master_rid)))?
        .target_partname()?;
    let master_part = pkg
        .get_part(&master_partname)
        .ok_or_else(|| TemplateError::MissingPart(master_partname.to_string()))?;

    let master = layout::parse_master(master_part.blob())
        .map_err(|detail| malformed(&master_partname, detail))?;

    let theme = match master_part.rels().part_with_reltype(relationship_type::THEME) {
        Ok(rel) => {
            let theme_partname = rel.target_partname()?;
            match pkg.get_part(&theme_partname) {
                Some(theme_part) => theme::parse_theme(theme_part.blob())
                    .map_err(|detail| malformed(&theme_partname, detail))?,
                None => Theme::default(),
            }
        },
        Err(_) => {
            log::warn!("template has no theme part, using the fallback palette");
            Theme::default()
        },
    };

    let mut layouts = Vec::new();
    for (index, rid) in master.layout_rids.iter().enumerate() {
        let rel = match master_part.rel(rid) {
            Some(rel) => rel,
            None => {
                log::warn!("master lists layout {} without a relationship", rid);
                continue;
            },
        };
        let layout_partname = rel.target_partname()?;
        let layout_part = match pkg.get_part(&layout_partname) {
            Some(part) => part,
            None => {
                log::warn!("layout part {} missing from package", layout_partname);
                continue;
            },
        };

        let mut data = layout::parse_layout(layout_part.blob())
            .map_err(|detail| malformed(&layout_partname, detail))?;
        layout::inherit_frames(&mut data.placeholders, &master.placeholders);

        layouts.push(LayoutDescriptor {
            partname: layout_partname,
            name: data.name,
            index,
            placeholders: data.placeholders,
            background: data.background,
            synthesized: false,
        });
    }

    let slide_width = info.slide_width.unwrap_or(DEFAULT_SLIDE_WIDTH);
    let slide_height = info.slide_height.unwrap_or(DEFAULT_SLIDE_HEIGHT);

    // A template whose layouts can hold no text at all still has to produce
    // slides, so a generic full-canvas layout joins the pool.
    let no_textual_layout = layouts
        .iter()
        .all(|l| !l.has_kind(PlaceholderKind::Title) && !l.has_kind(PlaceholderKind::Body));
    if no_textual_layout {
        log::warn!("template has no layout with text placeholders, synthesizing a generic layout");
        let partname = layouts
            .first()
            .map(|l| l.partname.clone())
            .unwrap_or_else(|| {
                // Guaranteed valid: literal absolute partname
                PackURI::new("/ppt/slideLayouts/slideLayout1.xml")
                    .unwrap_or_else(|_| master_partname.clone())
            });
        let index = layouts.len();
        layouts.push(synthesize_generic_layout(
            partname,
            index,
            slide_width,
            slide_height,
        ));
    }

    let notes_master = match info.notes_master_rid.as_deref().and_then(|rid| main_part.rel(rid)) {
        Some(rel) => rel.target_partname().ok().filter(|p| pkg.contains_part(p)),
        None => None,
    };

    let images = media::catalog_images(pkg, main_part, &info.slide_rids);

    let model = TemplateModel {
        slide_width,
        slide_height,
        theme,
        clr_map: master.clr_map,
        master_styles: master.styles,
        master_partname,
        layouts,
        images,
        notes_master,
        slide_count: info.slide_rids.len(),
    };

    log::debug!(
        "analyzed template: {} layouts, {} images, {} existing slides",
        model.layouts.len(),
        model.images.len(),
        model.slide_count
    );

    Ok(model)
}

/// Build the full-canvas generic layout used when a template offers no
/// usable text placeholders: a title band across the top and a body area
/// below it, both inset from the edges.
pub(crate) fn synthesize_generic_layout(
    partname: PackURI,
    index: usize,
    slide_width: i64,
    slide_height: i64,
) -> LayoutDescriptor {
    let margin_x = slide_width / 20;
    let margin_y = slide_height / 20;
    let content_width = slide_width - 2 * margin_x;

    let title_frame = Rect {
        x: margin_x,
        y: margin_y,
        cx: content_width,
        cy: slide_height * 3 / 20,
    };
    let body_y = slide_height / 4;
    let body_frame = Rect {
        x: margin_x,
        y: body_y,
        cx: content_width,
        cy: slide_height - body_y - margin_y,
    };

    LayoutDescriptor {
        partname,
        name: "Generic".to_string(),
        index,
        placeholders: vec![
            PlaceholderDescriptor {
                kind: PlaceholderKind::Title,
                ph_type: Some("title".to_string()),
                idx: 0,
                frame: Some(title_frame),
                fill: None,
                style: TextStyle::default(),
            },
            PlaceholderDescriptor {
                kind: PlaceholderKind::Body,
                ph_type: Some("body".to_string()),
                idx: 1,
                frame: Some(body_frame),
                fill: None,
                style: TextStyle::default(),
            },
        ],
        background: None,
        synthesized: true,
    }
}

fn malformed(partname: &PackURI, detail: String) -> TemplateError {
    TemplateError::MalformedXml {
        part: partname.to_string(),
        detail,
    }
}
