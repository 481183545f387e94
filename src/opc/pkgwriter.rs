use crate::common::xml::escape_xml;
use crate::opc::constants::content_type;
use crate::opc::error::{OpcError, Result};
use crate::opc::package::OpcPackage;
use crate::opc::packuri::{CONTENT_TYPES_URI, PackURI};
/// Package writer for OPC packages.
///
/// Serializes a package back to ZIP container bytes. Output is
/// deterministic: parts are written in partname order, content type and
/// relationship entries are sorted, and only parts reachable through the
/// relationship graph are written.
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io::{Cursor, Write};
use zip::write::{SimpleFileOptions, ZipWriter};

/// Accumulates `[Content_Types].xml` entries for the parts being written.
///
/// Extensions with a well-known content type become `Default` entries;
/// everything else gets a per-part `Override`.
#[derive(Debug)]
struct ContentTypesItem {
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
}

impl ContentTypesItem {
    fn new() -> Self {
        let mut defaults = BTreeMap::new();
        // Every package carries .rels parts, and plain .xml is common enough
        // that both defaults are always emitted.
        defaults.insert("rels".to_string(), content_type::OPC_RELATIONSHIPS.to_string());
        defaults.insert("xml".to_string(), content_type::XML.to_string());
        Self {
            defaults,
            overrides: BTreeMap::new(),
        }
    }

    fn add(&mut self, partname: &PackURI, ct: &str) {
        let ext = partname.ext().to_ascii_lowercase();
        if is_default_content_type(&ext, ct) {
            self.defaults.insert(ext, ct.to_string());
        } else {
            self.overrides
                .insert(partname.as_str().to_string(), ct.to_string());
        }
    }

    fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push('\n');

        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                r#"  <Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(ct)
            ));
            xml.push('\n');
        }
        for (partname, ct) in &self.overrides {
            xml.push_str(&format!(
                r#"  <Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(partname),
                escape_xml(ct)
            ));
            xml.push('\n');
        }

        xml.push_str("</Types>");

        xml
    }
}

/// Content types representable as an extension `Default` entry.
fn is_default_content_type(ext: &str, ct: &str) -> bool {
    matches!(
        (ext, ct),
        ("xml", content_type::XML)
            | ("rels", content_type::OPC_RELATIONSHIPS)
            | ("png", content_type::PNG)
            | ("jpg", content_type::JPEG)
            | ("jpeg", content_type::JPEG)
            | ("gif", content_type::GIF)
            | ("bmp", content_type::BMP)
            | ("tif", content_type::TIFF)
            | ("tiff", content_type::TIFF)
            | ("emf", content_type::X_EMF)
            | ("wmf", content_type::X_WMF)
    )
}

/// Writes an OPC package to ZIP container bytes.
pub(crate) struct PackageWriter;

impl PackageWriter {
    /// Serialize the package.
    ///
    /// Parts no longer reachable from the package relationships are dropped,
    /// so callers can detach a part by removing the relationships that point
    /// to it.
    pub(crate) fn write(pkg: &OpcPackage) -> Result<Vec<u8>> {
        let reachable = reachable_partnames(pkg)?;

        let dropped = pkg.part_count() - reachable.len();
        if dropped > 0 {
            log::debug!("dropping {} unreachable part(s) on write", dropped);
        }

        let mut partnames: Vec<&PackURI> = pkg
            .iter_parts()
            .map(|part| part.partname())
            .filter(|partname| reachable.contains(partname.as_str()))
            .collect();
        partnames.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let mut content_types = ContentTypesItem::new();
        for partname in &partnames {
            if let Some(part) = pkg.get_part(partname) {
                content_types.add(partname, part.content_type());
            }
        }

        let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip_writer.start_file(CONTENT_TYPES_URI.trim_start_matches('/'), options)?;
        zip_writer.write_all(content_types.to_xml().as_bytes())?;

        zip_writer.start_file("_rels/.rels", options)?;
        zip_writer.write_all(pkg.rels().to_xml().as_bytes())?;

        for partname in &partnames {
            let part = match pkg.get_part(partname) {
                Some(part) => part,
                None => continue,
            };

            zip_writer.start_file(partname.membername(), options)?;
            zip_writer.write_all(part.blob())?;

            if !part.rels().is_empty() {
                zip_writer.start_file(partname.rels_uri().membername(), options)?;
                zip_writer.write_all(part.rels().to_xml().as_bytes())?;
            }
        }

        let cursor = zip_writer.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Collect the partnames reachable from the package relationships.
///
/// A relationship to a part that does not exist is reported as an error
/// rather than silently written out.
fn reachable_partnames(pkg: &OpcPackage) -> Result<HashSet<String>> {
    let mut reachable: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<PackURI> = VecDeque::new();

    for rel in pkg.rels().iter() {
        if !rel.is_external() {
            queue.push_back(rel.target_partname()?);
        }
    }

    while let Some(partname) = queue.pop_front() {
        if !reachable.insert(partname.as_str().to_string()) {
            continue;
        }
        let part = pkg
            .get_part(&partname)
            .ok_or_else(|| OpcError::PartNotFound(partname.as_str().to_string()))?;
        for rel in part.rels().iter() {
            if !rel.is_external() {
                queue.push_back(rel.target_partname()?);
            }
        }
    }

    Ok(reachable)
}
