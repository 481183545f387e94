use crate::opc::constants::relationship_type;
use crate::opc::error::Result;
use crate::opc::packuri::{PACKAGE_URI, PackURI};
use crate::opc::part::Part;
use crate::opc::pkgreader::PackageReader;
use crate::opc::pkgwriter::PackageWriter;
use crate::opc::rel::Relationships;
/// Main API for OPC packages.
///
/// `OpcPackage` holds the part graph in memory. Parts keep their original
/// blobs untouched unless explicitly replaced, so loading a package and
/// serializing it again preserves the parts byte for byte.
use std::collections::HashMap;

/// An OPC package: package-level relationships plus a partname-keyed
/// collection of parts.
#[derive(Debug)]
pub struct OpcPackage {
    /// Package-level relationships (from "/_rels/.rels")
    rels: Relationships,

    /// All parts in the package, keyed by partname
    parts: HashMap<String, Part>,
}

impl OpcPackage {
    /// Create a new empty package.
    pub fn new() -> Self {
        Self {
            rels: Relationships::new(PACKAGE_URI.to_string()),
            parts: HashMap::new(),
        }
    }

    /// Load a package from ZIP container bytes.
    pub fn from_bytes(pkg_bytes: &[u8]) -> Result<Self> {
        let reader = PackageReader::from_bytes(pkg_bytes)?;
        Self::unmarshal(reader)
    }

    /// Build the in-memory part graph from serialized parts.
    ///
    /// Parts are created first, then relationships are wired, so rels can
    /// point at parts regardless of archive ordering.
    fn unmarshal(reader: PackageReader) -> Result<Self> {
        let (pkg_srels, sparts) = reader.into_inner();
        let mut pkg = Self::new();

        let mut part_srels = Vec::with_capacity(sparts.len());
        for spart in sparts {
            let partname = spart.partname.clone();
            let part = Part::new(partname.clone(), spart.content_type, spart.blob);
            pkg.parts.insert(partname.as_str().to_string(), part);
            part_srels.push((partname, spart.srels));
        }

        for srel in pkg_srels {
            pkg.rels
                .add_relationship(srel.reltype, srel.target_ref, srel.r_id, srel.is_external);
        }
        for (partname, srels) in part_srels {
            if let Some(part) = pkg.parts.get_mut(partname.as_str()) {
                for srel in srels {
                    part.rels_mut().add_relationship(
                        srel.reltype,
                        srel.target_ref,
                        srel.r_id,
                        srel.is_external,
                    );
                }
            }
        }

        Ok(pkg)
    }

    /// Serialize the package to ZIP container bytes.
    ///
    /// Parts that are no longer reachable from the package relationships
    /// are not written.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        PackageWriter::write(self)
    }

    /// Get the partname of the main document part.
    ///
    /// For a presentation this is "/ppt/presentation.xml" (whatever the
    /// officeDocument relationship points at).
    pub fn main_document_partname(&self) -> Result<PackURI> {
        self.rels
            .part_with_reltype(relationship_type::OFFICE_DOCUMENT)?
            .target_partname()
    }

    /// Get a part by its partname.
    #[inline]
    pub fn get_part(&self, partname: &PackURI) -> Option<&Part> {
        self.parts.get(partname.as_str())
    }

    /// Get mutable access to a part by its partname.
    #[inline]
    pub fn get_part_mut(&mut self, partname: &PackURI) -> Option<&mut Part> {
        self.parts.get_mut(partname.as_str())
    }

    /// Add a part to the package, replacing any existing part with the same
    /// partname.
    pub fn add_part(&mut self, part: Part) {
        self.parts
            .insert(part.partname().as_str().to_string(), part);
    }

    /// Remove a part from the package.
    pub fn remove_part(&mut self, partname: &PackURI) -> Option<Part> {
        self.parts.remove(partname.as_str())
    }

    /// Check whether a part exists.
    #[inline]
    pub fn contains_part(&self, partname: &PackURI) -> bool {
        self.parts.contains_key(partname.as_str())
    }

    /// Iterate over all parts.
    #[inline]
    pub fn iter_parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Get the number of parts in the package.
    #[inline]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Get the package-level relationships.
    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    /// Get mutable access to the package-level relationships.
    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// Find the first unused partname matching a template.
    ///
    /// The template contains a single "%d" which is replaced with candidate
    /// numbers starting from 1 (e.g., "/ppt/slides/slide%d.xml").
    pub fn next_partname(&self, template: &str) -> Option<PackURI> {
        // Bounded search; packages never approach this many parts
        for n in 1..10_000u32 {
            let candidate = template.replace("%d", &n.to_string());
            if !self.parts.contains_key(candidate.as_str()) {
                return PackURI::new(&candidate).ok();
            }
        }
        None
    }
}

impl Default for OpcPackage {
    fn default() -> Self {
        Self::new()
    }
}
