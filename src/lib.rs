//! Deckforge - template-preserving presentation generation
//!
//! This library analyzes the visual identity of a PowerPoint template
//! (.pptx or .potx) and generates new presentations that keep that
//! identity: theme colors and fonts, layout geometry, and reusable image
//! assets all come from the template, while the slide content comes from a
//! structured content plan or plain text.
//!
//! # Features
//!
//! - **Template analysis**: Extract slide geometry, theme palette and
//!   fonts, layout placeholder inventories, and image assets
//! - **Content planning**: Accept structured content blocks or fall back
//!   to segmenting raw text into slide-sized chunks
//! - **Layout matching**: Score each template layout against each block of
//!   content and pick the best fit
//! - **Style application**: Resolve fonts and colors through the
//!   placeholder, master and theme tiers; shrink or truncate overflowing
//!   text; keep text readable against its background
//! - **Byte-preserving output**: Parts the generator does not touch are
//!   carried into the output unchanged
//!
//! # Example - Analyzing a template
//!
//! ```no_run
//! use deckforge::Engine;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new();
//! let template_bytes = std::fs::read("template.pptx")?;
//!
//! let model = engine.analyze_template(&template_bytes)?;
//! println!(
//!     "{} layouts, {} images, theme '{}'",
//!     model.layouts.len(),
//!     model.images.len(),
//!     model.theme.name
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Generating a presentation
//!
//! ```no_run
//! use deckforge::{Engine, GenerateRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new();
//! let template_bytes = std::fs::read("template.pptx")?;
//!
//! let request = GenerateRequest::from_raw_text(
//!     "Quarterly review. Revenue grew in all regions. \
//!      Churn fell for the third quarter in a row.",
//! );
//! let result = engine.generate_presentation(&template_bytes, request)?;
//!
//! std::fs::write("deck.pptx", &result.bytes)?;
//! println!(
//!     "{} slides, {} warnings",
//!     result.summary.slide_count,
//!     result.warnings.len()
//! );
//! # Ok(())
//! # }
//! ```

/// Model cache keyed by template content hash
///
/// Repeated operations against the same template bytes reuse the analysis
/// result instead of re-parsing the container.
pub mod cache;

/// Shared value types and helpers: EMU conversions, RGB colors, XML escaping
pub mod common;

/// Presentation composition: layout matching, text fitting, style
/// application and slide assembly
pub mod compose;

/// Content plans and the raw-text fallback segmenter
pub mod content;

/// The engine facade tying analysis, planning and assembly together
pub mod engine;

/// OPC (Open Packaging Conventions) package reading and writing
///
/// This module handles the ZIP container, part graph and relationship
/// plumbing shared by all OOXML documents.
pub mod opc;

/// Template analysis: theme, layouts, placeholders and media
pub mod template;

// Re-export the primary API surface
pub use engine::{
    CancelToken, Engine, GenerateError, GenerateOptions, GenerateRequest, GeneratedPresentation,
    RunSummary, StyleWarning,
};

// Re-export the content plan types used to build requests
pub use content::{BlockKind, ContentBlock, PlanError};

// Re-export the analysis result types
pub use template::{AnalysisSummary, TemplateError, TemplateModel};

#[cfg(test)]
pub(crate) mod fixtures;
