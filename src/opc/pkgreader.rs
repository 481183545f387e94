use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
/// Package reader for OPC packages.
///
/// Reads the ZIP container, parses `[Content_Types].xml` and the `.rels`
/// parts, and walks the relationship graph starting from the package rels.
/// Only parts reachable through that graph are loaded; stray archive members
/// are ignored.
use quick_xml::Reader;
use quick_xml::events::Event;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Read;

/// Relationships that typically fit inline for a single part.
pub(crate) type SerializedRels = SmallVec<[SerializedRelationship; 8]>;

/// A relationship as read from a `.rels` part, before resolution.
#[derive(Debug, Clone)]
pub(crate) struct SerializedRelationship {
    pub(crate) r_id: String,
    pub(crate) reltype: String,
    pub(crate) target_ref: String,
    pub(crate) is_external: bool,
}

/// A part as read from the package, with its relationships still serialized.
#[derive(Debug)]
pub(crate) struct SerializedPart {
    pub(crate) partname: PackURI,
    pub(crate) content_type: String,
    pub(crate) blob: Vec<u8>,
    pub(crate) srels: SerializedRels,
}

/// Content type lookup built from `[Content_Types].xml`.
///
/// Holds `Default` mappings keyed by lowercase extension and `Override`
/// mappings keyed by partname.
#[derive(Debug, Default)]
pub(crate) struct ContentTypeMap {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypeMap {
    /// Parse a content type map from `[Content_Types].xml` content.
    pub(crate) fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self::default();

        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    match e.local_name().as_ref() {
                        b"Default" => {
                            let mut extension = None;
                            let mut ct = None;
                            for attr in e.attributes().flatten() {
                                match attr.key.as_ref() {
                                    b"Extension" => {
                                        extension =
                                            Some(attr.unescape_value()?.to_ascii_lowercase());
                                    },
                                    b"ContentType" => {
                                        ct = Some(attr.unescape_value()?.into_owned());
                                    },
                                    _ => {},
                                }
                            }
                            if let (Some(extension), Some(ct)) = (extension, ct) {
                                map.defaults.insert(extension, ct);
                            }
                        },
                        b"Override" => {
                            let mut partname = None;
                            let mut ct = None;
                            for attr in e.attributes().flatten() {
                                match attr.key.as_ref() {
                                    b"PartName" => {
                                        partname = Some(attr.unescape_value()?.into_owned());
                                    },
                                    b"ContentType" => {
                                        ct = Some(attr.unescape_value()?.into_owned());
                                    },
                                    _ => {},
                                }
                            }
                            if let (Some(partname), Some(ct)) = (partname, ct) {
                                map.overrides.insert(partname, ct);
                            }
                        },
                        _ => {},
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::XmlError(e.to_string())),
                _ => {},
            }
        }

        Ok(map)
    }

    /// Resolve the content type for a partname.
    ///
    /// Overrides take precedence over extension defaults.
    pub(crate) fn content_type_for(&self, partname: &PackURI) -> Result<&str> {
        if let Some(ct) = self.overrides.get(partname.as_str()) {
            return Ok(ct);
        }
        let ext = partname.ext().to_ascii_lowercase();
        if let Some(ct) = self.defaults.get(&ext) {
            return Ok(ct);
        }
        Err(OpcError::ContentTypeNotFound(partname.as_str().to_string()))
    }
}

/// Parse a `.rels` part into serialized relationships.
pub(crate) fn parse_rels_xml(xml: &[u8]) -> Result<SerializedRels> {
    let mut srels = SerializedRels::new();

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut r_id = None;
                    let mut reltype = None;
                    let mut target_ref = None;
                    let mut is_external = false;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => r_id = Some(attr.unescape_value()?.into_owned()),
                            b"Type" => reltype = Some(attr.unescape_value()?.into_owned()),
                            b"Target" => target_ref = Some(attr.unescape_value()?.into_owned()),
                            b"TargetMode" => {
                                is_external = attr.value.as_ref() == b"External";
                            },
                            _ => {},
                        }
                    }
                    if let (Some(r_id), Some(reltype), Some(target_ref)) =
                        (r_id, reltype, target_ref)
                    {
                        srels.push(SerializedRelationship {
                            r_id,
                            reltype,
                            target_ref,
                            is_external,
                        });
                    }
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpcError::XmlError(e.to_string())),
            _ => {},
        }
    }

    Ok(srels)
}

/// Reads an OPC package into serialized parts.
#[derive(Debug)]
pub(crate) struct PackageReader {
    pkg_srels: SerializedRels,
    sparts: Vec<SerializedPart>,
}

impl PackageReader {
    /// Read a package from its ZIP container bytes.
    pub(crate) fn from_bytes(pkg_bytes: &[u8]) -> Result<Self> {
        let mut blobs = read_zip_members(pkg_bytes)?;

        let content_types_member = CONTENT_TYPES_URI.trim_start_matches('/');
        let ct_xml = blobs
            .remove(content_types_member)
            .ok_or_else(|| OpcError::PartNotFound(CONTENT_TYPES_URI.to_string()))?;
        let content_types = ContentTypeMap::from_xml(&ct_xml)?;

        let pkg_rels_member = "_rels/.rels";
        let pkg_srels = match blobs.remove(pkg_rels_member) {
            Some(xml) => parse_rels_xml(&xml)?,
            None => SerializedRels::new(),
        };

        let sparts = walk_parts(&mut blobs, &content_types, &pkg_srels)?;

        Ok(Self { pkg_srels, sparts })
    }

    /// Consume the reader, yielding the package rels and all reachable parts.
    pub(crate) fn into_inner(self) -> (SerializedRels, Vec<SerializedPart>) {
        (self.pkg_srels, self.sparts)
    }
}

/// Read every archive member into a membername-keyed map.
fn read_zip_members(pkg_bytes: &[u8]) -> Result<HashMap<String, Vec<u8>>> {
    let cursor = std::io::Cursor::new(pkg_bytes);
    let mut archive = zip::ZipArchive::new(cursor)?;

    let mut blobs = HashMap::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)?;
        blobs.insert(file.name().to_string(), content);
    }

    Ok(blobs)
}

/// Walk the relationship graph breadth-first, loading each reachable part once.
///
/// Blobs are moved out of the member map rather than copied. External
/// relationships are recorded on their source part but never followed.
fn walk_parts(
    blobs: &mut HashMap<String, Vec<u8>>,
    content_types: &ContentTypeMap,
    pkg_srels: &SerializedRels,
) -> Result<Vec<SerializedPart>> {
    let mut sparts = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, SerializedRelationship)> = VecDeque::new();

    for srel in pkg_srels {
        queue.push_back((PACKAGE_URI.to_string(), srel.clone()));
    }

    while let Some((base_uri, srel)) = queue.pop_front() {
        if srel.is_external {
            continue;
        }

        let partname =
            PackURI::from_rel_ref(&base_uri, &srel.target_ref).map_err(OpcError::InvalidPackUri)?;
        if !visited.insert(partname.as_str().to_string()) {
            continue;
        }

        let blob = blobs
            .remove(partname.membername())
            .ok_or_else(|| OpcError::PartNotFound(partname.as_str().to_string()))?;
        let ct = content_types.content_type_for(&partname)?.to_string();

        let rels_member = partname.rels_uri();
        let srels = match blobs.remove(rels_member.membername()) {
            Some(xml) => parse_rels_xml(&xml)?,
            None => SerializedRels::new(),
        };

        let part_base_uri = partname.base_uri().to_string();
        for child in &srels {
            queue.push_back((part_base_uri.clone(), child.clone()));
        }

        sparts.push(SerializedPart {
            partname,
            content_type: ct,
            blob,
            srels,
        });
    }

    Ok(sparts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Default Extension="PNG" ContentType="image/png"/>
  <Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>
</Types>"#;

    #[test]
    fn test_content_type_map_override_wins() {
        let map = ContentTypeMap::from_xml(CT_XML.as_bytes()).unwrap();

        let presentation = PackURI::new("/ppt/presentation.xml").unwrap();
        assert_eq!(
            map.content_type_for(&presentation).unwrap(),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"
        );

        // Falls back to the extension default, case-insensitively
        let image = PackURI::new("/ppt/media/image1.png").unwrap();
        assert_eq!(map.content_type_for(&image).unwrap(), "image/png");

        let unknown = PackURI::new("/ppt/media/movie1.mp4").unwrap();
        assert!(matches!(
            map.content_type_for(&unknown),
            Err(OpcError::ContentTypeNotFound(_))
        ));
    }

    #[test]
    fn test_parse_rels_xml() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/>
</Relationships>"#;

        let srels = parse_rels_xml(xml.as_bytes()).unwrap();
        assert_eq!(srels.len(), 2);
        assert_eq!(srels[0].r_id, "rId1");
        assert_eq!(srels[0].target_ref, "ppt/presentation.xml");
        assert!(!srels[0].is_external);
        assert!(srels[1].is_external);
    }

    #[test]
    fn test_rels_attributes_are_unescaped() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://example.com/rel?a=1&amp;b=2" Target="ppt/a&amp;b.xml"/>
</Relationships>"#;

        let srels = parse_rels_xml(xml.as_bytes()).unwrap();
        assert_eq!(srels[0].reltype, "http://example.com/rel?a=1&b=2");
        assert_eq!(srels[0].target_ref, "ppt/a&b.xml");

        // A broken entity surfaces as an error, not a panic
        let bad = br#"<Relationships><Relationship Id="rId1" Type="t" Target="x&#xZZ;y"/></Relationships>"#;
        assert!(parse_rels_xml(bad).is_err());
    }

    #[test]
    fn test_walk_skips_unreachable_members() {
        let mut blobs = HashMap::new();
        blobs.insert("ppt/presentation.xml".to_string(), b"<p:presentation/>".to_vec());
        blobs.insert("ppt/orphan.xml".to_string(), b"<orphan/>".to_vec());

        let content_types = ContentTypeMap::from_xml(CT_XML.as_bytes()).unwrap();
        let mut pkg_srels = SerializedRels::new();
        pkg_srels.push(SerializedRelationship {
            r_id: "rId1".to_string(),
            reltype: "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument"
                .to_string(),
            target_ref: "ppt/presentation.xml".to_string(),
            is_external: false,
        });

        let sparts = walk_parts(&mut blobs, &content_types, &pkg_srels).unwrap();
        assert_eq!(sparts.len(), 1);
        assert_eq!(sparts[0].partname.as_str(), "/ppt/presentation.xml");
        // The orphan stays behind in the member map
        assert!(blobs.contains_key("ppt/orphan.xml"));
    }

    #[test]
    fn test_missing_target_part_is_an_error() {
        let mut blobs = HashMap::new();
        let content_types = ContentTypeMap::from_xml(CT_XML.as_bytes()).unwrap();
        let mut pkg_srels = SerializedRels::new();
        pkg_srels.push(SerializedRelationship {
            r_id: "rId1".to_string(),
            reltype: "t".to_string(),
            target_ref: "ppt/presentation.xml".to_string(),
            is_external: false,
        });

        let result = walk_parts(&mut blobs, &content_types, &pkg_srels);
        assert!(matches!(result, Err(OpcError::PartNotFound(_))));
    }
}
