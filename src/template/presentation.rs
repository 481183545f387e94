use crate::template::layout::read_r_id;
/// Presentation part parsing.
///
/// Pulls the slide size, the slide list, and the master references out of
/// `/ppt/presentation.xml` in a single pass.
use quick_xml::Reader;
use quick_xml::events::Event;

/// Presentation-level facts needed for analysis and assembly.
#[derive(Debug, Default)]
pub(crate) struct PresentationInfo {
    /// Slide width in EMU, when `<p:sldSz>` is present
    pub(crate) slide_width: Option<i64>,
    /// Slide height in EMU
    pub(crate) slide_height: Option<i64>,
    /// rIds of existing slides, in `<p:sldIdLst>` order
    pub(crate) slide_rids: Vec<String>,
    /// rIds of slide masters, in `<p:sldMasterIdLst>` order
    pub(crate) master_rids: Vec<String>,
    /// rId of the notes master, when the presentation carries one
    pub(crate) notes_master_rid: Option<String>,
}

pub(crate) fn parse_presentation(xml: &[u8]) -> Result<PresentationInfo, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut info = PresentationInfo::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"sldSz" => {
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"cx" => {
                                    info.slide_width = atoi_simd::parse::<i64>(&attr.value).ok();
                                },
                                b"cy" => {
                                    info.slide_height = atoi_simd::parse::<i64>(&attr.value).ok();
                                },
                                _ => {},
                            }
                        }
                    },
                    b"sldId" => {
                        if let Some(rid) = read_r_id(e) {
                            info.slide_rids.push(rid);
                        }
                    },
                    b"sldMasterId" => {
                        if let Some(rid) = read_r_id(e) {
                            info.master_rids.push(rid);
                        }
                    },
                    b"notesMasterId" => {
                        info.notes_master_rid = read_r_id(e);
                    },
                    _ => {},
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {},
        }
    }

    Ok(info)
}
