use crate::compose::fit;
use crate::content::ContentBlock;
use crate::template::model::PlaceholderKind;
use crate::template::{LayoutDescriptor, TemplateModel};

/// Layout matching.
///
/// Scores every template layout against a content block and picks the best
/// fit. Matching is total: a model with no usable layout (possible only for
/// hand-built models, since analysis synthesizes one) still yields a result
/// via a synthesized generic layout.

/// Capacity bonus when the body placeholder plausibly holds the text.
const CAPACITY_BONUS: i32 = 1;

/// Score contribution per required field with a matching placeholder.
const COVERAGE_SCORE: i32 = 2;

/// Penalty per required field that cannot be assigned.
const UNASSIGNED_PENALTY: i32 = 1;

/// A block paired with its chosen layout and placeholder assignment.
///
/// Placeholder assignments index into `layout.placeholders`; `None` is an
/// explicit left-blank decision.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// The chosen layout; owned so synthesized fallbacks carry their
    /// own geometry
    pub layout: LayoutDescriptor,
    pub title_ph: Option<usize>,
    pub body_ph: Option<usize>,
    pub score: i32,
}

/// Pick the best-fitting layout for a block. Never fails.
pub fn match_block(model: &TemplateModel, block: &ContentBlock) -> MatchResult {
    let needs_body = block.kind.requires_body() && !block.body.is_empty();

    let mut best: Option<(i32, usize, usize)> = None; // (score, unused, index)
    for layout in &model.layouts {
        let score = score_layout(model, layout, block, needs_body);
        let unused = unused_placeholders(layout, needs_body);
        let candidate = (score, unused, layout.index);
        // Highest score wins; ties break on fewest unused placeholders,
        // then lowest index, for reproducible output.
        let better = match best {
            None => true,
            Some((s, u, i)) => {
                score > s || (score == s && (unused < u || (unused == u && layout.index < i)))
            },
        };
        if better {
            best = Some(candidate);
        }
    }

    // The winner must actually cover the required fields: a title slot,
    // and a body slot when the block needs one. Anything less falls back
    // to the generic layout so no content is ever dropped for want of a
    // placeholder.
    let chosen = best
        .map(|(score, _, index)| (score, model.layouts[index_position(model, index)].clone()))
        .filter(|(_, layout)| {
            layout.has_kind(PlaceholderKind::Title)
                && (!needs_body || layout.has_kind(PlaceholderKind::Body))
        });

    let (score, layout) = match chosen {
        Some(pair) => pair,
        None => {
            log::debug!("no layout covers the required fields, using the generic fallback");
            let layout = crate::template::synthesize_generic_layout(
                model.master_partname.clone(),
                model.layouts.len(),
                model.slide_width,
                model.slide_height,
            );
            (0, layout)
        },
    };

    let title_ph = layout
        .placeholders
        .iter()
        .position(|ph| ph.kind == PlaceholderKind::Title);
    let body_ph = if needs_body || !block.body.is_empty() {
        pick_body_placeholder(&layout)
    } else {
        None
    };

    MatchResult {
        layout,
        title_ph,
        body_ph,
        score,
    }
}

/// Body candidates in preference order: a Body-kind placeholder, then any
/// non-title text slot. Exhausting the chain leaves the body unassigned
/// and the applier records the warning.
fn pick_body_placeholder(layout: &LayoutDescriptor) -> Option<usize> {
    layout
        .placeholders
        .iter()
        .position(|ph| ph.kind == PlaceholderKind::Body)
        .or_else(|| {
            layout
                .placeholders
                .iter()
                .position(|ph| ph.kind != PlaceholderKind::Title && ph.kind.is_textual())
        })
}

fn score_layout(
    model: &TemplateModel,
    layout: &LayoutDescriptor,
    block: &ContentBlock,
    needs_body: bool,
) -> i32 {
    let mut score = 0;

    if layout.has_kind(PlaceholderKind::Title) {
        score += COVERAGE_SCORE;
    } else {
        score -= UNASSIGNED_PENALTY;
    }

    if needs_body {
        match layout.body_placeholders().next() {
            Some(body) => {
                score += COVERAGE_SCORE;
                if let Some(frame) = body.frame {
                    let size = model.resolve_style(body).size_centipt;
                    if fit::fits(&block.body_paragraphs(), frame, size) {
                        score += CAPACITY_BONUS;
                    }
                }
            },
            None => score -= UNASSIGNED_PENALTY,
        }
    }

    score
}

/// Placeholders the block leaves empty; the structural-fit tie-break.
fn unused_placeholders(layout: &LayoutDescriptor, needs_body: bool) -> usize {
    let mut used = 0usize;
    if layout.has_kind(PlaceholderKind::Title) {
        used += 1;
    }
    if needs_body && layout.has_kind(PlaceholderKind::Body) {
        used += 1;
    }
    layout.placeholders.len().saturating_sub(used)
}

/// Position of a layout in the model by its stable index.
fn index_position(model: &TemplateModel, index: usize) -> usize {
    model
        .layouts
        .iter()
        .position(|l| l.index == index)
        .unwrap_or(0)
}
