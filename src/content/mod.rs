//! Content plans and the raw-text fallback segmenter.
//!
//! A content plan is an ordered list of [`ContentBlock`]s, one per output
//! slide. Plans normally arrive from an external collaborator as loose
//! JSON; [`parse_plan`] decodes them tolerantly. When no usable plan is
//! available, [`segment`] turns raw text into blocks instead.

mod plan;
mod segment;

pub use plan::{PlanError, parse_plan};
pub use segment::{DEFAULT_MAX_SLIDES, segment};

use serde::{Deserialize, Serialize};

/// Advisory hint for what a block wants to be on the slide.
///
/// Drives which placeholder kinds the matcher treats as required; never
/// authoritative on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Opening slide: prominent title, short supporting text
    TitleSlide,
    /// Title plus a bullet list
    Bulleted,
    /// Title plus flowing paragraphs
    Narrative,
    /// Divider slide carrying only a title
    SectionBreak,
}

impl BlockKind {
    /// Whether a body placeholder is required for this kind of block.
    #[inline]
    pub fn requires_body(&self) -> bool {
        matches!(self, BlockKind::Bulleted | BlockKind::Narrative)
    }
}

/// Body content of a block: a bullet list or flowing narrative text.
///
/// The two shapes are mutually exclusive; every consumer matches both
/// arms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockBody {
    Bullets(Vec<String>),
    Narrative(String),
}

impl BlockBody {
    /// Whether the body carries no renderable text.
    pub fn is_empty(&self) -> bool {
        match self {
            BlockBody::Bullets(items) => items.iter().all(|b| b.trim().is_empty()),
            BlockBody::Narrative(text) => text.trim().is_empty(),
        }
    }

    /// Total word count across the body.
    pub fn word_count(&self) -> usize {
        match self {
            BlockBody::Bullets(items) => {
                items.iter().map(|b| b.split_whitespace().count()).sum()
            },
            BlockBody::Narrative(text) => text.split_whitespace().count(),
        }
    }
}

/// One unit of the content plan; becomes one output slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Slide title; may be empty
    pub title: String,
    pub body: BlockBody,
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_notes: Option<String>,
}

impl ContentBlock {
    /// The body as a list of paragraphs, one per rendered `<a:p>`.
    ///
    /// Bullets map one-to-one; narrative text splits on blank lines. The
    /// matcher's capacity scoring and the applier's fitting both consume
    /// this, so the two always estimate the same text.
    pub fn body_paragraphs(&self) -> Vec<String> {
        match &self.body {
            BlockBody::Bullets(items) => items
                .iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect(),
            BlockBody::Narrative(text) => text
                .split("\n\n")
                .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Whether the block carries neither a title nor body text.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.body.is_empty()
    }
}
