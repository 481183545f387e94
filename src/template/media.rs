use crate::opc::package::OpcPackage;
use crate::opc::part::Part;
use crate::template::model::{ImageAsset, Rect};
/// Slide image cataloging.
///
/// Walks the template's slides for `<p:pic>` shapes and records each
/// referenced image with the slide it sits on and its frame, so generation
/// can place the same assets into picture placeholders. Pixel dimensions
/// are sniffed from format headers where the format allows; images whose
/// headers cannot be read are still cataloged, just without dimensions.
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashSet;

/// A picture shape found on a slide: its blip relationship and frame.
#[derive(Debug, PartialEq)]
struct PictureShape {
    embed_rid: String,
    frame: Option<Rect>,
}

/// Catalog the images placed on the template's slides, in slide order.
///
/// An image referenced from several slides is recorded once, against the
/// first slide that shows it. Unreadable slide XML drops that slide's
/// pictures with a warning rather than failing analysis.
pub(crate) fn catalog_images(
    pkg: &OpcPackage,
    main_part: &Part,
    slide_rids: &[String],
) -> Vec<ImageAsset> {
    let mut images = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (slide_index, rid) in slide_rids.iter().enumerate() {
        let slide_partname = match main_part.rel(rid).and_then(|r| r.target_partname().ok()) {
            Some(partname) => partname,
            None => continue,
        };
        let slide_part = match pkg.get_part(&slide_partname) {
            Some(part) => part,
            None => continue,
        };

        let pics = match parse_picture_shapes(slide_part.blob()) {
            Ok(pics) => pics,
            Err(detail) => {
                log::warn!("skipping pictures on {}: {}", slide_partname, detail);
                continue;
            },
        };

        for pic in pics {
            let image_partname = match slide_part
                .rel(&pic.embed_rid)
                .and_then(|r| r.target_partname().ok())
            {
                Some(partname) => partname,
                None => continue,
            };
            if !seen.insert(image_partname.as_str().to_string()) {
                continue;
            }
            let image_part = match pkg.get_part(&image_partname) {
                Some(part) => part,
                None => continue,
            };
            if !image_part.content_type().starts_with("image/") {
                continue;
            }

            let dims = sniff_dimensions(image_part.blob());
            images.push(ImageAsset {
                partname: image_partname,
                content_type: image_part.content_type().to_string(),
                byte_size: image_part.blob().len(),
                source_slide: slide_index,
                frame: pic.frame,
                width_px: dims.map(|(w, _)| w),
                height_px: dims.map(|(_, h)| h),
            });
        }
    }

    images
}

/// Collect `<p:pic>` shapes from a slide: the `a:blip` embed rId and the
/// `a:xfrm` frame.
fn parse_picture_shapes(xml: &[u8]) -> Result<Vec<PictureShape>, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut pics = Vec::new();

    let mut in_pic = false;
    let mut embed_rid: Option<String> = None;
    let mut in_xfrm = false;
    let mut off: Option<(i64, i64)> = None;
    let mut ext: Option<(i64, i64)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"pic" => {
                        in_pic = true;
                        embed_rid = None;
                        off = None;
                        ext = None;
                    },
                    b"blip" if in_pic => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"embed" {
                                embed_rid = std::str::from_utf8(&attr.value)
                                    .ok()
                                    .map(|s| s.to_string());
                            }
                        }
                    },
                    b"xfrm" if in_pic => in_xfrm = true,
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
                    _ => {},
                }
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"pic" => {
                    if let Some(rid) = embed_rid.take() {
                        let frame = match (off, ext) {
                            (Some((x, y)), Some((cx, cy))) => Some(Rect { x, y, cx, cy }),
                            _ => None,
                        };
                        pics.push(PictureShape {
                            embed_rid: rid,
                            frame,
                        });
                    }
                    in_pic = false;
                },
                b"xfrm" => in_xfrm = false,
                _ => {},
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {},
        }
    }

    Ok(pics)
}

/// Read pixel dimensions from an image header.
///
/// Handles PNG, JPEG, GIF and BMP. Vector formats (EMF, WMF) and anything
/// unrecognized return None.
pub(crate) fn sniff_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    // PNG: signature then IHDR, dimensions big-endian at offset 16
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        if data.len() >= 24 {
            let w = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
            let h = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
            return Some((w, h));
        }
        return None;
    }

    // JPEG: FFD8FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return jpeg_dimensions(data);
    }

    // GIF: dimensions little-endian right after the signature
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        if data.len() >= 10 {
            let w = u16::from_le_bytes([data[6], data[7]]) as u32;
            let h = u16::from_le_bytes([data[8], data[9]]) as u32;
            return Some((w, h));
        }
        return None;
    }

    // BMP: "BM", signed dimensions in the info header
    if data.starts_with(&[0x42, 0x4D]) {
        if data.len() >= 26 {
            let w = i32::from_le_bytes([data[18], data[19], data[20], data[21]]);
            let h = i32::from_le_bytes([data[22], data[23], data[24], data[25]]);
            return Some((w.unsigned_abs(), h.unsigned_abs()));
        }
        return None;
    }

    None
}

/// Scan JPEG segments for the first frame header.
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2usize;
    while i + 9 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];

        // Fill bytes before a marker
        if marker == 0xFF {
            i += 1;
            continue;
        }
        // Standalone markers carry no length field
        if (0xD0..=0xD9).contains(&marker) || marker == 0x01 {
            i += 2;
            continue;
        }

        // SOF markers hold the frame dimensions; C4, C8 and CC are not SOFs
        if (0xC0..=0xCF).contains(&marker) && marker != 0xC4 && marker != 0xC8 && marker != 0xCC {
            let h = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let w = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Some((w, h));
        }

        let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + seg_len;
    }
    None
}
