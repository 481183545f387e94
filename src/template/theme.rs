use crate::common::RGBColor;
use crate::template::model::{ColorScheme, Theme};
/// Theme part parsing.
///
/// Extracts the color scheme and font scheme from `/ppt/theme/themeN.xml`.
/// Colors come as `<a:srgbClr val="...">` or `<a:sysClr lastClr="...">`
/// children of the twelve scheme slots; fonts come from the latin typefaces
/// of `<a:majorFont>` and `<a:minorFont>`.
use quick_xml::Reader;
use quick_xml::events::Event;

/// Parse a theme part.
///
/// Slots the theme does not define keep their fallback palette values, so
/// a sparse or partial theme still yields a complete scheme.
pub(crate) fn parse_theme(xml: &[u8]) -> Result<Theme, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut theme = Theme::default();

    let mut in_color_scheme = false;
    let mut in_major_font = false;
    let mut in_minor_font = false;
    let mut current_slot = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let tag_name = e.local_name();

                match tag_name.as_ref() {
                    b"theme" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"name" {
                                theme.name = std::str::from_utf8(&attr.value)
                                    .map(|s| s.to_string())
                                    .unwrap_or_default();
                            }
                        }
                    },
                    b"clrScheme" => {
                        in_color_scheme = true;
                    },
                    b"majorFont" => {
                        in_major_font = true;
                    },
                    b"minorFont" => {
                        in_minor_font = true;
                    },
                    b"latin" if in_major_font || in_minor_font => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"typeface" {
                                if let Ok(typeface) = std::str::from_utf8(&attr.value) {
                                    if !typeface.is_empty() {
                                        if in_major_font {
                                            theme.major_font = typeface.to_string();
                                        } else {
                                            theme.minor_font = typeface.to_string();
                                        }
                                    }
                                }
                            }
                        }
                    },
                    b"dk1" | b"lt1" | b"dk2" | b"lt2" | b"accent1" | b"accent2" | b"accent3"
                    | b"accent4" | b"accent5" | b"accent6" | b"hlink" | b"folHlink"
                        if in_color_scheme =>
                    {
                        current_slot = std::str::from_utf8(tag_name.as_ref())
                            .unwrap_or("")
                            .to_string();
                    },
                    b"srgbClr" if in_color_scheme && !current_slot.is_empty() => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"val" {
                                if let Some(color) = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(RGBColor::from_hex)
                                {
                                    assign_slot(&mut theme.colors, &current_slot, color);
                                }
                                current_slot.clear();
                            }
                        }
                    },
                    b"sysClr" if in_color_scheme && !current_slot.is_empty() => {
                        // System colors carry the last-rendered RGB in lastClr
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"lastClr" {
                                if let Some(color) = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .and_then(RGBColor::from_hex)
                                {
                                    assign_slot(&mut theme.colors, &current_slot, color);
                                }
                                current_slot.clear();
                            }
                        }
                    },
                    _ => {},
                }
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"clrScheme" => in_color_scheme = false,
                b"majorFont" => in_major_font = false,
                b"minorFont" => in_minor_font = false,
                _ => {},
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {},
        }
    }

    Ok(theme)
}

fn assign_slot(colors: &mut ColorScheme, slot: &str, color: RGBColor) {
    match slot {
        "dk1" => colors.dk1 = color,
        "lt1" => colors.lt1 = color,
        "dk2" => colors.dk2 = color,
        "lt2" => colors.lt2 = color,
        "accent1" => colors.accent1 = color,
        "accent2" => colors.accent2 = color,
        "accent3" => colors.accent3 = color,
        "accent4" => colors.accent4 = color,
        "accent5" => colors.accent5 = color,
        "accent6" => colors.accent6 = color,
        "hlink" => colors.hlink = color,
        "folHlink" => colors.folhlink = color,
        _ => {},
    }
}
