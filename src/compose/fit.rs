use crate::common::unit::centipt_to_emu;
use crate::template::Rect;

/// Text-fit estimation.
///
/// Line counts are estimated from frame geometry and font size, never from
/// real glyph metrics: an average glyph is assumed half an em wide and a
/// line 1.2 em tall. The matcher's capacity scoring and the applier's
/// shrink-and-truncate pass share this estimator so they always agree on
/// whether text fits.

/// Assumed average glyph width as a fraction of the font size.
pub(crate) const GLYPH_WIDTH_RATIO: f64 = 0.5;

/// Assumed line pitch as a fraction of the font size.
pub(crate) const LINE_PITCH_RATIO: f64 = 1.2;

/// Font scale steps tried before truncating, in percent.
pub(crate) const SHRINK_STEPS_PCT: [u32; 3] = [100, 90, 80];

/// Absolute font-size floor in centipoints (10 pt).
pub(crate) const MIN_FONT_CENTIPT: u32 = 1000;

/// Estimated characters per rendered line at a font size.
fn chars_per_line(frame_width: i64, size_centipt: u32) -> usize {
    let glyph_emu = centipt_to_emu(size_centipt) as f64 * GLYPH_WIDTH_RATIO;
    if glyph_emu <= 0.0 {
        return 1;
    }
    ((frame_width as f64 / glyph_emu) as usize).max(1)
}

/// Lines the frame can hold at a font size.
pub(crate) fn capacity_lines(frame: Rect, size_centipt: u32) -> usize {
    let pitch_emu = centipt_to_emu(size_centipt) as f64 * LINE_PITCH_RATIO;
    if pitch_emu <= 0.0 {
        return 1;
    }
    ((frame.cy as f64 / pitch_emu) as usize).max(1)
}

/// Estimated rendered line count for a paragraph at a font size.
fn paragraph_lines(paragraph: &str, frame: Rect, size_centipt: u32) -> usize {
    let per_line = chars_per_line(frame.cx, size_centipt);
    paragraph.chars().count().div_ceil(per_line).max(1)
}

/// Estimated rendered line count for a paragraph list.
pub(crate) fn estimate_lines(paragraphs: &[String], frame: Rect, size_centipt: u32) -> usize {
    paragraphs
        .iter()
        .map(|p| paragraph_lines(p, frame, size_centipt))
        .sum()
}

/// Whether the paragraphs plausibly fit the frame at the nominal size.
pub(crate) fn fits(paragraphs: &[String], frame: Rect, size_centipt: u32) -> bool {
    estimate_lines(paragraphs, frame, size_centipt) <= capacity_lines(frame, size_centipt)
}

/// Outcome of the shrink-and-truncate pass for one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FitPlan {
    /// Size to render at, after any shrink steps
    pub(crate) size_centipt: u32,
    /// Paragraphs to render; the last one carries the ellipsis when
    /// truncation was needed
    pub(crate) paragraphs: Vec<String>,
    pub(crate) truncated: bool,
}

/// Fit paragraphs into a frame, shrinking in fixed steps and truncating
/// with a visible ellipsis as the last resort.
///
/// Without a frame the text is taken as-is at the nominal size.
pub(crate) fn plan_fit(paragraphs: Vec<String>, frame: Option<Rect>, nominal_centipt: u32) -> FitPlan {
    let Some(frame) = frame else {
        return FitPlan {
            size_centipt: nominal_centipt,
            paragraphs,
            truncated: false,
        };
    };

    let mut last_size = nominal_centipt;
    for pct in SHRINK_STEPS_PCT {
        let size = (nominal_centipt * pct / 100).max(MIN_FONT_CENTIPT);
        last_size = size;
        if fits(&paragraphs, frame, size) {
            return FitPlan {
                size_centipt: size,
                paragraphs,
                truncated: false,
            };
        }
    }

    FitPlan {
        size_centipt: last_size,
        paragraphs: truncate_to_capacity(paragraphs, frame, last_size),
        truncated: true,
    }
}

/// Keep whole paragraphs while they fit, then cut the first overflowing
/// paragraph down to its remaining line budget and mark the cut.
fn truncate_to_capacity(paragraphs: Vec<String>, frame: Rect, size_centipt: u32) -> Vec<String> {
    let capacity = capacity_lines(frame, size_centipt);
    let per_line = chars_per_line(frame.cx, size_centipt);

    let mut kept = Vec::new();
    let mut used_lines = 0usize;
    for paragraph in paragraphs {
        let lines = paragraph_lines(&paragraph, frame, size_centipt);
        if used_lines + lines <= capacity {
            used_lines += lines;
            kept.push(paragraph);
            continue;
        }

        let budget_lines = capacity.saturating_sub(used_lines);
        if budget_lines > 0 {
            let budget_chars = (budget_lines * per_line).saturating_sub(1);
            let cut: String = paragraph.chars().take(budget_chars).collect();
            let cut = cut.trim_end().to_string();
            if !cut.is_empty() {
                kept.push(format!("{}…", cut));
                break;
            }
        }
        // No room left at all; still show that content was dropped
        match kept.last_mut() {
            Some(last) if !last.ends_with('…') => last.push('…'),
            Some(_) => {},
            None => kept.push("…".to_string()),
        }
        break;
    }
    kept
}
