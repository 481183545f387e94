use crate::content::{BlockBody, BlockKind, ContentBlock};
/// Tolerant decoding of externally produced content plans.
///
/// The collaborator that writes plans emits loose JSON: the body may be a
/// string or an array of strings, the kind arrives as a free-form `type`
/// hint, and unknown fields come and go. Decoding accepts all of that and
/// only reports [`PlanError`] when nothing usable remains; the caller then
/// falls back to the segmenter.
use serde_json::Value;
use thiserror::Error;

/// Why a content plan could not be used.
///
/// Never surfaced to callers of the engine; an invalid plan reroutes to
/// the fallback segmenter.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("plan JSON is not an array of slides")]
    NotAPlan,

    #[error("plan contains no usable slides")]
    Empty,
}

/// Decode a JSON content plan into blocks.
///
/// Accepts either a top-level array or an object with a `slides` array.
/// Slides with neither title nor content are dropped; a plan where every
/// slide drops is an error.
pub fn parse_plan(json: &str) -> Result<Vec<ContentBlock>, PlanError> {
    let value: Value = serde_json::from_str(json)?;

    let slides = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("slides") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => return Err(PlanError::NotAPlan),
        },
        _ => return Err(PlanError::NotAPlan),
    };

    let mut blocks = Vec::with_capacity(slides.len());
    for (i, slide) in slides.iter().enumerate() {
        let Value::Object(fields) = slide else {
            log::debug!("plan slide {} is not an object, dropping it", i);
            continue;
        };

        let title = fields
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let body = fields
            .get("content")
            .or_else(|| fields.get("body"))
            .map(decode_body)
            .unwrap_or_else(|| BlockBody::Narrative(String::new()));

        let kind = fields
            .get("type")
            .or_else(|| fields.get("kind"))
            .and_then(Value::as_str)
            .and_then(kind_from_hint)
            .unwrap_or_else(|| infer_kind(i, &body));

        let speaker_notes = fields
            .get("speaker_notes")
            .or_else(|| fields.get("notes"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let block = ContentBlock {
            title,
            body,
            kind,
            speaker_notes,
        };
        if block.is_blank() {
            log::debug!("plan slide {} has neither title nor content, dropping it", i);
            continue;
        }
        blocks.push(block);
    }

    if blocks.is_empty() {
        return Err(PlanError::Empty);
    }
    Ok(blocks)
}

/// A string becomes narrative; an array becomes bullets (non-string items
/// are stringified numbers/bools, anything else is skipped).
fn decode_body(value: &Value) -> BlockBody {
    match value {
        Value::String(s) => BlockBody::Narrative(s.trim().to_string()),
        Value::Array(items) => BlockBody::Bullets(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        _ => BlockBody::Narrative(String::new()),
    }
}

/// Map the collaborator's `type` vocabulary onto [`BlockKind`].
fn kind_from_hint(hint: &str) -> Option<BlockKind> {
    match hint {
        "title_slide" | "title" => Some(BlockKind::TitleSlide),
        "bullet_points" | "bullets" | "bulleted" => Some(BlockKind::Bulleted),
        "content" | "conclusion" | "narrative" => Some(BlockKind::Narrative),
        "section_header" | "section_break" => Some(BlockKind::SectionBreak),
        _ => None,
    }
}

/// Kind inference for slides without a usable `type` hint.
fn infer_kind(index: usize, body: &BlockBody) -> BlockKind {
    if index == 0 && body.is_empty() {
        return BlockKind::TitleSlide;
    }
    match body {
        BlockBody::Bullets(_) => BlockKind::Bulleted,
        BlockBody::Narrative(_) => BlockKind::Narrative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typical_plan() {
        let json = r#"{"slides": [
            {"title": "Intro", "type": "title_slide", "content": ""},
            {"title": "Findings", "type": "bullet_points",
             "content": ["First point", "Second point"],
             "speaker_notes": "linger here"},
            {"title": "Outlook", "type": "conclusion", "content": "Steady growth."}
        ]}"#;

        let blocks = parse_plan(json).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind, BlockKind::TitleSlide);
        assert_eq!(blocks[1].kind, BlockKind::Bulleted);
        assert_eq!(
            blocks[1].body,
            BlockBody::Bullets(vec!["First point".to_string(), "Second point".to_string()])
        );
        assert_eq!(blocks[1].speaker_notes.as_deref(), Some("linger here"));
        assert_eq!(blocks[2].kind, BlockKind::Narrative);
    }

    #[test]
    fn test_parse_top_level_array_and_inference() {
        let json = r#"[
            {"title": "Opening"},
            {"title": "List", "body": ["a", "b"]},
            {"title": "Prose", "content": "Some text."}
        ]"#;

        let blocks = parse_plan(json).unwrap();
        assert_eq!(blocks.len(), 3);
        // First block with an empty body infers a title slide
        assert_eq!(blocks[0].kind, BlockKind::TitleSlide);
        assert_eq!(blocks[1].kind, BlockKind::Bulleted);
        assert_eq!(blocks[2].kind, BlockKind::Narrative);
    }

    #[test]
    fn test_blank_slides_dropped() {
        let json = r#"[
            {"title": "", "content": ""},
            {"title": "Kept", "content": "text"},
            {"notes": "only notes"}
        ]"#;

        let blocks = parse_plan(json).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].title, "Kept");
    }

    #[test]
    fn test_invalid_plans() {
        assert!(matches!(parse_plan("not json"), Err(PlanError::Decode(_))));
        assert!(matches!(parse_plan(r#""a string""#), Err(PlanError::NotAPlan)));
        assert!(matches!(parse_plan(r#"{"other": 1}"#), Err(PlanError::NotAPlan)));
        assert!(matches!(parse_plan("[]"), Err(PlanError::Empty)));
        // All slides blank collapses to an empty plan
        assert!(matches!(
            parse_plan(r#"[{"title": ""}]"#),
            Err(PlanError::Empty)
        ));
    }

    #[test]
    fn test_loose_body_items() {
        let json = r#"[{"title": "Mixed", "content": ["text", 42, true, {"nested": 1}]}]"#;
        let blocks = parse_plan(json).unwrap();
        assert_eq!(
            blocks[0].body,
            BlockBody::Bullets(vec![
                "text".to_string(),
                "42".to_string(),
                "true".to_string()
            ])
        );
    }
}
