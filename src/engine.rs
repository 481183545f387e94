//! Engine facade.
//!
//! One entry point over the whole pipeline: hash and analyze (or re-use) the
//! template, resolve the request's content into blocks, then assemble the
//! output container. The engine holds only the model cache and is cheap to
//! share behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{self, ModelCache};
use crate::compose::{AssembleError, assemble};
use crate::content::{ContentBlock, parse_plan, segment};
use crate::opc::{OpcError, OpcPackage};
use crate::template::{self, TemplateError, TemplateModel};

pub use crate::compose::{CancelToken, RunSummary, StyleWarning};

/// Errors from a generation run.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The template could not be analyzed
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The request carried no usable content
    #[error("request contains no content to place on slides")]
    MissingContent,

    /// The cancel token fired mid-run
    #[error("generation aborted by caller")]
    Aborted,

    /// The output container could not be written
    #[error("output container could not be written: {0}")]
    Output(#[from] OpcError),
}

impl From<AssembleError> for GenerateError {
    fn from(err: AssembleError) -> Self {
        match err {
            AssembleError::Aborted => GenerateError::Aborted,
            AssembleError::Output(e) => GenerateError::Output(e),
        }
    }
}

/// Knobs for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Emit notes parts for blocks that carry speaker notes
    pub include_speaker_notes: bool,
    /// Upper bound on slides produced by the raw-text segmenter; explicit
    /// plans and prepared blocks pass through uncapped
    pub max_slides: usize,
    /// Optional cooperative cancellation handle
    pub cancel: Option<CancelToken>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            include_speaker_notes: false,
            max_slides: crate::content::DEFAULT_MAX_SLIDES,
            cancel: None,
        }
    }
}

/// One generation request.
///
/// Content sources are consulted in order: prepared blocks, then the JSON
/// plan, then raw text for the fallback segmenter. A malformed or empty plan
/// drops through to the raw text when one is attached.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub blocks: Option<Vec<ContentBlock>>,
    pub plan_json: Option<String>,
    pub raw_text: Option<String>,
    pub options: GenerateOptions,
}

impl GenerateRequest {
    /// Use an already-built block list.
    pub fn from_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            blocks: Some(blocks),
            ..Self::default()
        }
    }

    /// Use a JSON content plan.
    pub fn from_plan_json(json: impl Into<String>) -> Self {
        Self {
            plan_json: Some(json.into()),
            ..Self::default()
        }
    }

    /// Segment raw prose into slide-sized blocks.
    pub fn from_raw_text(text: impl Into<String>) -> Self {
        Self {
            raw_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Attach raw text as the fallback for an unusable plan.
    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = Some(text.into());
        self
    }

    /// Replace the default options.
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }
}

/// A finished deck plus the run's bookkeeping.
#[derive(Debug)]
pub struct GeneratedPresentation {
    /// The output .pptx container
    pub bytes: Vec<u8>,
    pub summary: RunSummary,
    /// Non-fatal degradations, in slide order
    pub warnings: Vec<StyleWarning>,
}

/// Facade over analysis, content resolution and assembly.
pub struct Engine {
    cache: ModelCache,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            cache: ModelCache::default(),
        }
    }

    /// Use a custom cache TTL instead of [`cache::DEFAULT_TTL`].
    pub fn with_cache_ttl(ttl: Duration) -> Self {
        Self {
            cache: ModelCache::new(ttl),
        }
    }

    /// Analyze a template container, reusing a cached model when the same
    /// bytes were analyzed recently.
    pub fn analyze_template(&self, template_bytes: &[u8]) -> Result<Arc<TemplateModel>, TemplateError> {
        let key = cache::template_key(template_bytes);
        self.cache.get_or_try_insert_with(key, || {
            let pkg = OpcPackage::from_bytes(template_bytes).map_err(TemplateError::Container)?;
            template::analyze(&pkg)
        })
    }

    /// Generate a presentation from `request` in the visual identity of the
    /// template.
    pub fn generate_presentation(
        &self,
        template_bytes: &[u8],
        request: GenerateRequest,
    ) -> Result<GeneratedPresentation, GenerateError> {
        let options = request.options.clone();
        if options.cancel.as_ref().map(CancelToken::is_cancelled).unwrap_or(false) {
            return Err(GenerateError::Aborted);
        }

        let model = self.analyze_template(template_bytes)?;
        let (blocks, used_fallback) = resolve_content(request, options.max_slides)?;

        // Assembly rewires the part graph in place, so each run gets its own
        // package instance while the analyzed model is shared.
        let mut pkg = OpcPackage::from_bytes(template_bytes).map_err(TemplateError::Container)?;
        let output = assemble(
            &mut pkg,
            &model,
            &blocks,
            options.include_speaker_notes,
            options.cancel.as_ref(),
        )?;

        let mut summary = output.summary;
        summary.used_fallback_segmenter = used_fallback;
        for warning in &output.warnings {
            log::warn!("{warning}");
        }
        Ok(GeneratedPresentation {
            bytes: output.bytes,
            summary,
            warnings: output.warnings,
        })
    }
}

/// Turn a request's content sources into the block list to assemble. The
/// second return says whether the raw-text segmenter produced the blocks.
fn resolve_content(
    request: GenerateRequest,
    max_slides: usize,
) -> Result<(Vec<ContentBlock>, bool), GenerateError> {
    if let Some(blocks) = request.blocks {
        let blocks = drop_blank_blocks(blocks);
        if !blocks.is_empty() {
            return Ok((blocks, false));
        }
        log::warn!("request block list is empty, trying the other sources");
    }

    if let Some(json) = &request.plan_json {
        match parse_plan(json) {
            Ok(blocks) => {
                let blocks = drop_blank_blocks(blocks);
                if !blocks.is_empty() {
                    return Ok((blocks, false));
                }
            },
            Err(err) => {
                log::warn!("content plan rejected: {err}");
            },
        }
    }

    if let Some(text) = &request.raw_text {
        let blocks = segment(text, max_slides);
        if !blocks.is_empty() {
            return Ok((blocks, true));
        }
    }

    Err(GenerateError::MissingContent)
}

fn drop_blank_blocks(mut blocks: Vec<ContentBlock>) -> Vec<ContentBlock> {
    blocks.retain(|block| !block.is_blank());
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{BlockBody, BlockKind};
    use crate::fixtures;
    use crate::opc::constants::content_type;

    fn slide_count(bytes: &[u8]) -> usize {
        let pkg = OpcPackage::from_bytes(bytes).unwrap();
        pkg.iter_parts()
            .filter(|p| p.content_type() == content_type::PML_SLIDE)
            .count()
    }

    #[test]
    fn test_generate_from_plan_json() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();
        let plan = r#"[
            {"title": "Launch Review", "type": "title_slide", "speaker_notes": "Welcome."},
            {"title": "Wins", "content": ["Shipped on time", "Zero rollbacks"], "type": "bullet_points"},
            {"title": "Lessons", "content": "Staging caught the regression early, and the dry run paid off."}
        ]"#;

        let mut options = GenerateOptions::default();
        options.include_speaker_notes = true;
        let request = GenerateRequest::from_plan_json(plan).with_options(options);
        let result = engine.generate_presentation(&template, request).unwrap();

        assert_eq!(result.summary.slide_count, 3);
        assert!(!result.summary.used_fallback_segmenter);
        assert_eq!(result.summary.slides_with_notes, 1);
        assert_eq!(slide_count(&result.bytes), 3);
    }

    #[test]
    fn test_notes_are_opt_in() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();
        let plan = r#"[{"title": "T", "content": ["a"], "speaker_notes": "hidden by default"}]"#;

        let result = engine
            .generate_presentation(&template, GenerateRequest::from_plan_json(plan))
            .unwrap();
        assert_eq!(result.summary.slides_with_notes, 0);
    }

    #[test]
    fn test_malformed_plan_falls_back_to_raw_text() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();

        let request = GenerateRequest::from_plan_json("{not valid json")
            .with_raw_text("Prose about a product launch. It shipped. People liked it.");
        let result = engine.generate_presentation(&template, request).unwrap();

        assert!(result.summary.used_fallback_segmenter);
        assert!(result.summary.slide_count >= 3);
    }

    #[test]
    fn test_malformed_plan_without_raw_text_is_rejected() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();

        let err = engine
            .generate_presentation(&template, GenerateRequest::from_plan_json("{not valid json"))
            .unwrap_err();
        assert!(matches!(err, GenerateError::MissingContent));
    }

    #[test]
    fn test_generate_from_raw_text_bounds_slide_count() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();
        let text = "One short announcement about the roadmap.";

        let result = engine
            .generate_presentation(&template, GenerateRequest::from_raw_text(text))
            .unwrap();

        assert!(result.summary.used_fallback_segmenter);
        assert!(result.summary.slide_count >= 3);
        assert!(result.summary.slide_count <= crate::content::DEFAULT_MAX_SLIDES);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();

        let err = engine
            .generate_presentation(&template, GenerateRequest::from_raw_text("   \n  "))
            .unwrap_err();
        assert!(matches!(err, GenerateError::MissingContent));

        let err = engine
            .generate_presentation(&template, GenerateRequest::from_blocks(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, GenerateError::MissingContent));
    }

    #[test]
    fn test_max_slides_bounds_segmenter_only() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();
        let blocks: Vec<ContentBlock> = (0..10)
            .map(|i| ContentBlock {
                title: format!("Topic {i}"),
                body: BlockBody::Bullets(vec!["point".to_string()]),
                kind: BlockKind::Bulleted,
                speaker_notes: None,
            })
            .collect();

        let mut options = GenerateOptions::default();
        options.max_slides = 4;

        // Explicit blocks pass through uncapped
        let request = GenerateRequest::from_blocks(blocks).with_options(options.clone());
        let result = engine.generate_presentation(&template, request).unwrap();
        assert_eq!(result.summary.slide_count, 10);

        // The raw-text segmenter honors the lowered bound
        let text = (0..20)
            .map(|i| format!("Paragraph {i} covers a separate planning topic in some detail."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let request = GenerateRequest::from_raw_text(text).with_options(options);
        let result = engine.generate_presentation(&template, request).unwrap();
        assert!(result.summary.used_fallback_segmenter);
        assert!(result.summary.slide_count <= 4);
    }

    #[test]
    fn test_pre_cancelled_request_aborts() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();
        let token = CancelToken::new();
        token.cancel();

        let mut options = GenerateOptions::default();
        options.cancel = Some(token);
        let request = GenerateRequest::from_raw_text("Some text.").with_options(options);

        let err = engine.generate_presentation(&template, request).unwrap_err();
        assert!(matches!(err, GenerateError::Aborted));
    }

    #[test]
    fn test_analysis_is_cached_across_runs() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();

        let first = engine.analyze_template(&template).unwrap();
        let second = engine.analyze_template(&template).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_output_survives_a_disk_round_trip() {
        let _ = env_logger::builder().is_test(true).try_init();
        let engine = Engine::new();
        let template = fixtures::template_pptx();

        let result = engine
            .generate_presentation(
                &template,
                GenerateRequest::from_plan_json(r#"[{"title": "Only Slide", "content": ["a", "b"]}]"#),
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        std::fs::write(&path, &result.bytes).unwrap();

        let reloaded = std::fs::read(&path).unwrap();
        assert_eq!(slide_count(&reloaded), 1);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let engine = Engine::new();
        let template = fixtures::template_pptx();
        let plan = r#"{"slides": [
            {"title": "Alpha", "content": ["one", "two"]},
            {"title": "Beta", "content": "A narrative paragraph."}
        ]}"#;

        let a = engine
            .generate_presentation(&template, GenerateRequest::from_plan_json(plan))
            .unwrap();
        let b = engine
            .generate_presentation(&template, GenerateRequest::from_plan_json(plan))
            .unwrap();
        assert_eq!(a.summary, b.summary);
        assert_eq!(slide_count(&a.bytes), slide_count(&b.bytes));
    }
}
