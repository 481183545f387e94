//! Presentation composition.
//!
//! Everything between a parsed template and finished container bytes:
//! layout matching, text-fit estimation, slide XML synthesis, and the
//! assembly loop that stitches new slides into the template package.

mod applier;
mod assembler;
mod fit;
mod matcher;

pub use assembler::{AssembleError, AssembleOutput, CancelToken, RunSummary, assemble};
pub use matcher::{MatchResult, match_block};

use crate::common::RGBColor;
use thiserror::Error;

/// A non-fatal degradation recorded while styling one slide.
///
/// Warnings accumulate across the run and ride along with the output;
/// they never abort assembly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StyleWarning {
    /// A content field had no placeholder to land in and was skipped
    #[error("slide {slide}: no placeholder available for {field}, field skipped")]
    MissingPlaceholder { slide: usize, field: &'static str },

    /// Text exceeded the placeholder even at the minimum font size
    #[error("slide {slide}: {field} text truncated to fit its placeholder")]
    Truncated { slide: usize, field: &'static str },

    /// Resolved text color failed the contrast check and was substituted
    #[error("slide {slide}: text color {original} contrasts poorly, using {substituted}")]
    LowContrast {
        slide: usize,
        original: RGBColor,
        substituted: RGBColor,
    },
}

impl StyleWarning {
    /// 1-based output slide the warning applies to.
    pub fn slide(&self) -> usize {
        match self {
            StyleWarning::MissingPlaceholder { slide, .. }
            | StyleWarning::Truncated { slide, .. }
            | StyleWarning::LowContrast { slide, .. } => *slide,
        }
    }
}
