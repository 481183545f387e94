use crate::opc::packuri::PackURI;
use crate::opc::rel::{Relationship, Relationships};
/// Part object for OPC packages.
///
/// A part is a named blob with a content type and its own relationship
/// collection. XML parts (slides, layouts, themes) and binary parts (images)
/// are both represented by the same struct; the content type tells them
/// apart.
use bytes::Bytes;

/// A single part within an OPC package.
#[derive(Debug)]
pub struct Part {
    /// Absolute pack URI of this part (e.g., "/ppt/slides/slide1.xml")
    partname: PackURI,

    /// MIME content type
    content_type: String,

    /// Raw part content
    blob: Bytes,

    /// Relationships sourced from this part
    rels: Relationships,
}

impl Part {
    /// Create a new part.
    pub fn new(partname: PackURI, content_type: String, blob: impl Into<Bytes>) -> Self {
        let base_uri = partname.base_uri().to_string();
        Self {
            partname,
            content_type,
            blob: blob.into(),
            rels: Relationships::new(base_uri),
        }
    }

    /// Get the pack URI of this part.
    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    /// Get the content type of this part.
    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Get the raw content of this part.
    #[inline]
    pub fn blob(&self) -> &Bytes {
        &self.blob
    }

    /// Replace the content of this part.
    pub fn set_blob(&mut self, blob: impl Into<Bytes>) {
        self.blob = blob.into();
    }

    /// Get the relationships sourced from this part.
    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    /// Get mutable access to the relationships sourced from this part.
    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// Relate this part to a target part, returning the rId.
    ///
    /// Reuses an existing relationship of the same type to the same target
    /// when one is present.
    pub fn relate_to(&mut self, target_partname: &PackURI, reltype: &str) -> String {
        let target_ref = target_partname.relative_ref(&self.partname.base_uri());
        self.rels.get_or_add(reltype, &target_ref).r_id().to_string()
    }

    /// Look up the relationship a given rId refers to.
    #[inline]
    pub fn rel(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.get(r_id)
    }

    /// Check whether this part holds XML content.
    #[inline]
    pub fn is_xml(&self) -> bool {
        self.content_type.ends_with("+xml") || self.content_type == crate::opc::constants::content_type::XML
    }
}
