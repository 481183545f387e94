use crate::common::RGBColor;
use crate::template::model::{
    ClrMap, MasterStyles, PlaceholderDescriptor, PlaceholderKind, Rect, TextStyle,
};
/// Slide master and slide layout parsing.
///
/// Masters contribute the color map, the per-role text styles and fallback
/// placeholder geometry; layouts contribute the placeholder inventory that
/// drives content assignment. Placeholder frames omitted on a layout are
/// inherited from the matching master placeholder.
use quick_xml::Reader;
use quick_xml::events::Event;

/// Everything template analysis needs from a slide master part.
#[derive(Debug)]
pub(crate) struct MasterData {
    pub(crate) clr_map: ClrMap,
    pub(crate) styles: MasterStyles,
    pub(crate) placeholders: Vec<PlaceholderDescriptor>,
    /// rIds of the master's layouts, in `<p:sldLayoutIdLst>` order
    pub(crate) layout_rids: Vec<String>,
}

/// Everything template analysis needs from a slide layout part.
#[derive(Debug)]
pub(crate) struct LayoutData {
    pub(crate) name: String,
    pub(crate) placeholders: Vec<PlaceholderDescriptor>,
    /// Solid background fill from `<p:bg>`, when one is declared
    pub(crate) background: Option<RGBColor>,
}

/// Scan a shape tree for placeholder shapes.
///
/// Collects the `<p:ph>` identity, the `<a:xfrm>` frame and any level-one
/// run property overrides from each `<p:sp>`. Shapes without a placeholder
/// element are skipped.
pub(crate) fn parse_shape_tree(xml: &[u8]) -> Result<Vec<PlaceholderDescriptor>, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut placeholders = Vec::new();

    let mut in_sp = false;
    let mut has_ph = false;
    let mut ph_type: Option<String> = None;
    let mut idx = 0u32;
    let mut in_xfrm = false;
    let mut off: Option<(i64, i64)> = None;
    let mut ext: Option<(i64, i64)> = None;
    let mut in_sp_pr = false;
    let mut in_sp_fill = false;
    let mut fill: Option<RGBColor> = None;
    let mut in_lst_style = false;
    let mut in_lvl1 = false;
    let mut in_def_rpr = false;
    let mut style = TextStyle::default();

    loop {
        let event = reader.read_event();
        // Self-closing container elements never see an End event, so they
        // must not leave a nesting flag set.
        let self_closing = matches!(&event, Ok(Event::Empty(_)));
        match event {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"sp" => {
                        in_sp = true;
                        has_ph = false;
                        ph_type = None;
                        idx = 0;
                        off = None;
                        ext = None;
                        fill = None;
                        style = TextStyle::default();
                    },
                    b"ph" if in_sp => {
                        has_ph = true;
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"type" => {
                                    ph_type = std::str::from_utf8(&attr.value)
                                        .ok()
                                        .map(|s| s.to_string());
                                },
                                b"idx" => {
                                    idx = atoi_simd::parse::<u32>(&attr.value).unwrap_or(0);
                                },
                                _ => {},
                            }
                        }
                    },
                    b"spPr" if in_sp => {
                        in_sp_pr = !self_closing;
                    },
                    b"solidFill" if in_sp_pr => {
                        in_sp_fill = !self_closing;
                    },
                    b"srgbClr" if in_sp_fill => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"val" {
                                fill = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(RGBColor::from_hex);
                            }
                        }
                    },
                    b"xfrm" if in_sp => {
                        in_xfrm = true;
                    },
                    b"off" if in_xfrm => {
                        let mut x = None;
                        let mut y = None;
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"x" => x = atoi_simd::parse::<i64>(&attr.value).ok(),
                                b"y" => y = atoi_simd::parse::<i64>(&attr.value).ok(),
                                _ => {},
                            }
                        }
                        if let (Some(x), Some(y)) = (x, y) {
                            off = Some((x, y));
                        }
                    },
                    b"ext" if in_xfrm => {
                        let mut cx = None;
                        let mut cy = None;
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"cx" => cx = atoi_simd::parse::<i64>(&attr.value).ok(),
                                b"cy" => cy = atoi_simd::parse::<i64>(&attr.value).ok(),
                                _ => {},
                            }
                        }
                        if let (Some(cx), Some(cy)) = (cx, cy) {
                            ext = Some((cx, cy));
                        }
                    },
                    b"lstStyle" if in_sp => {
                        in_lst_style = true;
                    },
                    b"lvl1pPr" if in_lst_style => {
                        in_lvl1 = true;
                    },
                    b"defRPr" if in_lvl1 => {
                        read_def_rpr_attrs(e, &mut style);
                        in_def_rpr = true;
                    },
                    b"latin" if in_def_rpr => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"typeface" {
                                style.typeface = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .filter(|s| !s.is_empty())
                                    .map(|s| s.to_string());
                            }
                        }
                    },
                    b"srgbClr" if in_def_rpr => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"val" {
                                style.color = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(RGBColor::from_hex);
                            }
                        }
                    },
                    _ => {},
                }
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"sp" => {
                    if has_ph {
                        placeholders.push(PlaceholderDescriptor {
                            kind: PlaceholderKind::from_ph_type(ph_type.as_deref()),
                            ph_type: ph_type.take(),
                            idx,
                            frame: frame_from(off, ext),
                            fill: fill.take(),
                            style: std::mem::take(&mut style),
                        });
                    }
                    in_sp = false;
                },
                b"spPr" => in_sp_pr = false,
                b"solidFill" => in_sp_fill = false,
                b"xfrm" => in_xfrm = false,
                b"lstStyle" => in_lst_style = false,
                b"lvl1pPr" => in_lvl1 = false,
                b"defRPr" => in_def_rpr = false,
                _ => {},
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {},
        }
    }

    Ok(placeholders)
}

/// Parse a slide master part.
///
/// The shape tree is scanned in a second pass so master text styles and
/// placeholder overrides cannot bleed into each other.
pub(crate) fn parse_master(xml: &[u8]) -> Result<MasterData, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut clr_map = ClrMap::default();
    let mut styles = MasterStyles::default();
    let mut layout_rids = Vec::new();

    let mut in_tx_styles = false;
    let mut current_tier: Option<Tier> = None;
    let mut in_lvl1 = false;
    let mut in_def_rpr = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"clrMap" => {
                        for attr in e.attributes().flatten() {
                            let value = match std::str::from_utf8(&attr.value) {
                                Ok(v) => v.to_string(),
                                Err(_) => continue,
                            };
                            match attr.key.as_ref() {
                                b"bg1" => clr_map.bg1 = value,
                                b"tx1" => clr_map.tx1 = value,
                                b"bg2" => clr_map.bg2 = value,
                                b"tx2" => clr_map.tx2 = value,
                                _ => {},
                            }
                        }
                    },
                    b"txStyles" => in_tx_styles = true,
                    b"titleStyle" if in_tx_styles => current_tier = Some(Tier::Title),
                    b"bodyStyle" if in_tx_styles => current_tier = Some(Tier::Body),
                    b"otherStyle" if in_tx_styles => current_tier = Some(Tier::Other),
                    b"lvl1pPr" if current_tier.is_some() => in_lvl1 = true,
                    b"defRPr" if in_lvl1 => {
                        if let Some(tier) = current_tier {
                            read_def_rpr_attrs(e, tier.style_mut(&mut styles));
                        }
                        in_def_rpr = true;
                    },
                    b"latin" if in_def_rpr => {
                        if let Some(tier) = current_tier {
                            for attr in e.attributes().flatten() {
                                if attr.key.as_ref() == b"typeface" {
                                    tier.style_mut(&mut styles).typeface =
                                        std::str::from_utf8(&attr.value)
                                            .ok()
                                            .filter(|s| !s.is_empty())
                                            .map(|s| s.to_string());
                                }
                            }
                        }
                    },
                    b"srgbClr" if in_def_rpr => {
                        if let Some(tier) = current_tier {
                            for attr in e.attributes().flatten() {
                                if attr.key.as_ref() == b"val" {
                                    tier.style_mut(&mut styles).color =
                                        std::str::from_utf8(&attr.value)
                                            .ok()
                                            .and_then(RGBColor::from_hex);
                                }
                            }
                        }
                    },
                    b"sldLayoutId" => {
                        if let Some(rid) = read_r_id(e) {
                            layout_rids.push(rid);
                        }
                    },
                    _ => {},
                }
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"txStyles" => {
                    in_tx_styles = false;
                    current_tier = None;
                },
                b"titleStyle" | b"bodyStyle" | b"otherStyle" => current_tier = None,
                b"lvl1pPr" => in_lvl1 = false,
                b"defRPr" => in_def_rpr = false,
                _ => {},
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {},
        }
    }

    let placeholders = parse_shape_tree(xml)?;

    Ok(MasterData {
        clr_map,
        styles,
        placeholders,
        layout_rids,
    })
}

/// Parse a slide layout part.
pub(crate) fn parse_layout(xml: &[u8]) -> Result<LayoutData, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut name = String::new();
    let mut background = None;
    let mut in_bg = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"cSld" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"name" {
                                name = std::str::from_utf8(&attr.value)
                                    .map(|s| s.to_string())
                                    .unwrap_or_default();
                            }
                        }
                    },
                    b"bg" => in_bg = true,
                    b"srgbClr" if in_bg && background.is_none() => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"val" {
                                background = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(RGBColor::from_hex);
                            }
                        }
                    },
                    // The background precedes the shape tree; no need to
                    // scan further once shapes start
                    b"spTree" => break,
                    _ => {},
                }
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"bg" {
                    in_bg = false;
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {},
        }
    }

    let placeholders = parse_shape_tree(xml)?;

    Ok(LayoutData {
        name,
        placeholders,
        background,
    })
}

/// Fill in frames a layout leaves implicit from the master's placeholders.
///
/// Matching tries raw type plus index first, then role plus index, then
/// role alone.
pub(crate) fn inherit_frames(
    layout_phs: &mut [PlaceholderDescriptor],
    master_phs: &[PlaceholderDescriptor],
) {
    for ph in layout_phs.iter_mut() {
        if ph.frame.is_some() {
            continue;
        }
        ph.frame = master_frame_for(ph, master_phs);
    }
}

/// Combine `a:off` and `a:ext` into a frame; either half missing means no frame.
fn frame_from(off: Option<(i64, i64)>, ext: Option<(i64, i64)>) -> Option<Rect> {
    let (x, y) = off?;
    let (cx, cy) = ext?;
    Some(Rect { x, y, cx, cy })
}

fn master_frame_for(
    ph: &PlaceholderDescriptor,
    master_phs: &[PlaceholderDescriptor],
) -> Option<Rect> {
    master_phs
        .iter()
        .find(|m| m.ph_type == ph.ph_type && m.idx == ph.idx)
        .or_else(|| {
            master_phs
                .iter()
                .find(|m| m.kind == ph.kind && m.idx == ph.idx)
        })
        .or_else(|| master_phs.iter().find(|m| m.kind == ph.kind))
        .and_then(|m| m.frame)
}

#[derive(Debug, Clone, Copy)]
enum Tier {
    Title,
    Body,
    Other,
}

impl Tier {
    fn style_mut<'a>(&self, styles: &'a mut MasterStyles) -> &'a mut TextStyle {
        match self {
            Tier::Title => &mut styles.title,
            Tier::Body => &mut styles.body,
            Tier::Other => &mut styles.other,
        }
    }
}

/// Read sz and b attributes from a `<a:defRPr>` element.
fn read_def_rpr_attrs(e: &quick_xml::events::BytesStart<'_>, style: &mut TextStyle) {
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"sz" => {
                style.size_centipt = atoi_simd::parse::<u32>(&attr.value).ok();
            },
            b"b" => {
                style.bold = Some(matches!(attr.value.as_ref(), b"1" | b"true"));
            },
            _ => {},
        }
    }
}

/// Extract the relationship id attribute from an element.
pub(crate) fn read_r_id(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    for attr in e.attributes().flatten() {
        let key = attr.key;
        if key.as_ref() == b"r:id" || key.local_name().as_ref() == b"id" {
            if let Ok(rid) = std::str::from_utf8(&attr.value) {
                if rid.starts_with("rId") {
                    return Some(rid.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:cSld>
    <p:spTree>
      <p:sp>
        <p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
        <p:spPr><a:xfrm><a:off x="457200" y="274638"/><a:ext cx="8229600" cy="1143000"/></a:xfrm></p:spPr>
      </p:sp>
      <p:sp>
        <p:nvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr>
        <p:spPr><a:xfrm><a:off x="457200" y="1600200"/><a:ext cx="8229600" cy="4525963"/></a:xfrm></p:spPr>
      </p:sp>
    </p:spTree>
  </p:cSld>
  <p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2"/>
  <p:sldLayoutIdLst>
    <p:sldLayoutId id="2147483649" r:id="rId1"/>
    <p:sldLayoutId id="2147483650" r:id="rId2"/>
  </p:sldLayoutIdLst>
  <p:txStyles>
    <p:titleStyle>
      <a:lvl1pPr><a:defRPr sz="4400" b="1"><a:solidFill><a:srgbClr val="1F4E79"/></a:solidFill><a:latin typeface="Georgia"/></a:defRPr></a:lvl1pPr>
    </p:titleStyle>
    <p:bodyStyle>
      <a:lvl1pPr><a:defRPr sz="2000"/></a:lvl1pPr>
      <a:lvl2pPr><a:defRPr sz="1800"/></a:lvl2pPr>
    </p:bodyStyle>
    <p:otherStyle/>
  </p:txStyles>
</p:sldMaster>"#;

    #[test]
    fn test_parse_master() {
        let master = parse_master(MASTER_XML.as_bytes()).unwrap();

        assert_eq!(master.clr_map.bg1, "lt1");
        assert_eq!(master.clr_map.tx2, "dk2");

        assert_eq!(master.layout_rids, vec!["rId1", "rId2"]);

        assert_eq!(master.styles.title.size_centipt, Some(4400));
        assert_eq!(master.styles.title.bold, Some(true));
        assert_eq!(master.styles.title.typeface.as_deref(), Some("Georgia"));
        assert_eq!(
            master.styles.title.color,
            Some(RGBColor::new(0x1F, 0x4E, 0x79))
        );
        // Only level one contributes; lvl2pPr's 18pt must not win
        assert_eq!(master.styles.body.size_centipt, Some(2000));

        assert_eq!(master.placeholders.len(), 2);
        let title = &master.placeholders[0];
        assert_eq!(title.kind, PlaceholderKind::Title);
        assert_eq!(
            title.frame,
            Some(Rect {
                x: 457_200,
                y: 274_638,
                cx: 8_229_600,
                cy: 1_143_000
            })
        );
    }

    #[test]
    fn test_parse_layout_with_inheritance() {
        let layout_xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:cSld name="Title and Content">
    <p:spTree>
      <p:sp>
        <p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
        <p:spPr/>
        <p:txBody><a:bodyPr/><a:lstStyle><a:lvl1pPr><a:defRPr sz="3600"/></a:lvl1pPr></a:lstStyle><a:p/></p:txBody>
      </p:sp>
      <p:sp>
        <p:nvSpPr><p:nvPr><p:ph type="pic" idx="2"/></p:nvPr></p:nvSpPr>
        <p:spPr><a:xfrm><a:off x="5000000" y="1600200"/><a:ext cx="3600000" cy="2700000"/></a:xfrm></p:spPr>
      </p:sp>
      <p:sp>
        <p:nvSpPr><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr>
        <p:spPr/>
      </p:sp>
    </p:spTree>
  </p:cSld>
</p:sldLayout>"#;

        let master = parse_master(MASTER_XML.as_bytes()).unwrap();
        let mut layout = parse_layout(layout_xml.as_bytes()).unwrap();

        assert_eq!(layout.name, "Title and Content");
        assert_eq!(layout.placeholders.len(), 3);

        // Layout-level size override captured from lstStyle
        assert_eq!(layout.placeholders[0].style.size_centipt, Some(3600));

        inherit_frames(&mut layout.placeholders, &master.placeholders);

        // Title frame inherited from the master by type match
        assert_eq!(
            layout.placeholders[0].frame,
            Some(Rect {
                x: 457_200,
                y: 274_638,
                cx: 8_229_600,
                cy: 1_143_000
            })
        );
        // Picture frame declared locally stays untouched
        assert_eq!(layout.placeholders[1].frame.map(|f| f.x), Some(5_000_000));
        // Bare idx=1 placeholder is body-kinded and inherits the body frame
        assert_eq!(layout.placeholders[2].kind, PlaceholderKind::Body);
        assert_eq!(layout.placeholders[2].frame.map(|f| f.y), Some(1_600_200));
    }

    #[test]
    fn test_layout_background_and_shape_fill() {
        let layout_xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:cSld name="Inverted">
    <p:bg><p:bgPr><a:solidFill><a:srgbClr val="102040"/></a:solidFill><a:effectLst/></p:bgPr></p:bg>
    <p:spTree>
      <p:sp>
        <p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
        <p:spPr><a:solidFill><a:srgbClr val="FFFFFF"/></a:solidFill></p:spPr>
      </p:sp>
      <p:sp>
        <p:nvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr>
        <p:spPr/>
        <p:txBody><a:bodyPr/><a:lstStyle><a:lvl1pPr><a:defRPr><a:solidFill><a:srgbClr val="00FF00"/></a:solidFill></a:defRPr></a:lvl1pPr></a:lstStyle><a:p/></p:txBody>
      </p:sp>
    </p:spTree>
  </p:cSld>
</p:sldLayout>"#;

        let layout = parse_layout(layout_xml.as_bytes()).unwrap();
        assert_eq!(layout.background, Some(RGBColor::new(0x10, 0x20, 0x40)));
        assert_eq!(layout.placeholders[0].fill, Some(RGBColor::WHITE));
        // Run-property fill is style color, not shape fill, and a
        // self-closing spPr must not bleed into the txBody scan
        assert_eq!(layout.placeholders[1].fill, None);
        assert_eq!(
            layout.placeholders[1].style.color,
            Some(RGBColor::new(0x00, 0xFF, 0x00))
        );
    }

    #[test]
    fn test_xfrm_without_ext_yields_no_frame() {
        let xml = r#"<p:spTree xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:sp>
    <p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
    <p:spPr><a:xfrm><a:off x="100" y="200"/></a:xfrm></p:spPr>
  </p:sp>
</p:spTree>"#;

        let phs = parse_shape_tree(xml.as_bytes()).unwrap();
        assert_eq!(phs.len(), 1);
        assert_eq!(phs[0].frame, None);
    }

    #[test]
    fn test_shape_without_ph_is_skipped() {
        let xml = r#"<p:spTree xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:sp><p:nvSpPr><p:nvPr/></p:nvSpPr><p:spPr/></p:sp>
  <p:sp><p:nvSpPr><p:nvPr><p:ph type="ftr" idx="11"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp>
</p:spTree>"#;

        let phs = parse_shape_tree(xml.as_bytes()).unwrap();
        assert_eq!(phs.len(), 1);
        assert_eq!(phs[0].kind, PlaceholderKind::Other);
        assert_eq!(phs[0].idx, 11);
    }
}
