//! Open Packaging Conventions (OPC) container plumbing.
//!
//! A presentation template is a ZIP archive of parts addressed by pack URIs,
//! typed through `[Content_Types].xml`, and wired together by `.rels`
//! relationship parts. This module reads such a container into an in-memory
//! [`OpcPackage`](package::OpcPackage), lets the pipeline add, patch, and drop
//! parts, and serializes the result back out while leaving untouched parts
//! byte-for-byte intact.

pub mod constants;
pub mod error;
pub mod package;
pub mod packuri;
pub mod part;
pub mod pkgreader;
pub mod pkgwriter;
pub mod rel;

pub use error::{OpcError, Result};
pub use package::OpcPackage;
pub use packuri::PackURI;
pub use part::Part;
