//! One generation run: normalize, load references, dispatch, write.
//!
//! The run is a linear state machine. Every transition is recorded and
//! logged; the first failure moves it to `Failed` and ends the run.

use std::fmt;
use std::path::PathBuf;

use promptforge_contracts::schema::Resolution;
use promptforge_contracts::{normalize, render_prompt, ErrorKind, PipelineError};
use serde_json::Value;

use crate::images::load_reference_images;
use crate::output::{extension_for_mime, OutputWriter, DEFAULT_OUTPUT_DIR};
use crate::providers::{DispatchRequest, ImageProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Normalized,
    ImagesLoaded,
    Dispatched,
    WrittenToDisk,
    Done,
    Failed(ErrorKind),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => f.write_str("received"),
            Self::Normalized => f.write_str("normalized"),
            Self::ImagesLoaded => f.write_str("images_loaded"),
            Self::Dispatched => f.write_str("dispatched"),
            Self::WrittenToDisk => f.write_str("written_to_disk"),
            Self::Done => f.write_str("done"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: Value,
    pub input_images: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub model: String,
}

impl GenerationRequest {
    pub fn new(prompt: Value, model: impl Into<String>) -> Self {
        Self {
            prompt,
            input_images: Vec::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            model: model.into(),
        }
    }
}

/// A request that passed every local check and is ready to send.
#[derive(Debug, Clone)]
pub struct PreparedDispatch {
    pub request: DispatchRequest,
    pub output_dir: PathBuf,
    /// Single-image references combined with a base image or reference set.
    pub hybrid: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub image_path: PathBuf,
    pub prompt_text: String,
    pub model_text: Option<String>,
    pub resolution: Option<Resolution>,
    pub hybrid: bool,
    pub warnings: Vec<String>,
}

pub struct Pipeline<'a> {
    provider: &'a dyn ImageProvider,
    stages: Vec<Stage>,
}

impl<'a> Pipeline<'a> {
    pub fn new(provider: &'a dyn ImageProvider) -> Self {
        Self {
            provider,
            stages: Vec::new(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn run(&mut self, request: &GenerationRequest) -> Result<GenerationOutcome, PipelineError> {
        let prepared = self.prepare(request)?;
        self.execute(prepared)
    }

    /// Everything up to the network call. Any failure here happens before a
    /// single byte is sent upstream.
    pub fn prepare(
        &mut self,
        request: &GenerationRequest,
    ) -> Result<PreparedDispatch, PipelineError> {
        self.enter(Stage::Received);

        let normalized = normalize(request.prompt.clone()).map_err(|err| self.fail(err))?;
        self.enter(Stage::Normalized);

        let images = if normalized.images.is_empty() && request.input_images.is_empty() {
            Vec::new()
        } else {
            let loaded = load_reference_images(&normalized.images, &request.input_images)
                .map_err(|err| self.fail(err))?;
            self.enter(Stage::ImagesLoaded);
            loaded
        };
        let hybrid = normalized.document.is_hybrid();
        if hybrid {
            tracing::info!(
                images = images.len(),
                "hybrid request: references with base or reference set"
            );
        }

        let rendered = render_prompt(&normalized.document);
        let mut warnings = normalized.warnings;
        warnings.extend(rendered.warnings);
        for warning in &warnings {
            tracing::warn!("{warning}");
        }

        let meta = &normalized.document.meta;
        Ok(PreparedDispatch {
            request: DispatchRequest {
                model: request.model.clone(),
                prompt_text: rendered.text,
                document: normalized.payload,
                images,
                aspect_ratio: meta.aspect_ratio,
                image_size: meta.image_size(),
                resolution: normalized.resolution,
                seed: meta.seed,
                safety_filter: meta.safety_filter,
            },
            output_dir: request.output_dir.clone(),
            hybrid,
            warnings,
        })
    }

    pub fn execute(
        &mut self,
        prepared: PreparedDispatch,
    ) -> Result<GenerationOutcome, PipelineError> {
        let PreparedDispatch {
            request,
            output_dir,
            hybrid,
            warnings,
        } = prepared;

        let generated = self
            .provider
            .generate(&request)
            .map_err(|err| self.fail(err))?;
        self.enter(Stage::Dispatched);

        let ext = extension_for_mime(generated.mime_type.as_deref());
        let image_path = OutputWriter::new(output_dir)
            .write(&generated.bytes, ext)
            .map_err(|err| self.fail(err))?;
        self.enter(Stage::WrittenToDisk);

        tracing::info!(
            provider = self.provider.name(),
            path = %image_path.display(),
            "generation complete"
        );
        self.enter(Stage::Done);

        Ok(GenerationOutcome {
            image_path,
            prompt_text: request.prompt_text,
            model_text: generated.model_text,
            resolution: request.resolution,
            hybrid,
            warnings,
        })
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(stage = %stage, "pipeline transition");
        self.stages.push(stage);
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        let stage = Stage::Failed(err.kind());
        tracing::error!(stage = %stage, error = %err, "pipeline failed");
        self.stages.push(stage);
        err
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;
    use std::time::Duration;

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
    use promptforge_contracts::ErrorKind;
    use secrecy::SecretString;
    use serde_json::json;

    use super::{GenerationRequest, Pipeline, Stage};
    use crate::providers::{DryrunProvider, GeminiProvider};

    const MODEL: &str = "gemini-test-image";
    const PATH: &str = "/models/gemini-test-image:generateContent";

    fn png_bytes(width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        Ok(out)
    }

    fn gemini(base: &str) -> GeminiProvider {
        GeminiProvider::new(
            base,
            Some(SecretString::from("test-key".to_string())),
            Duration::from_secs(5),
        )
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[test]
    fn dry_run_walks_every_stage() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut request = GenerationRequest::new(
            json!({ "user_intent": "a red kite", "meta": { "aspect_ratio": "1:1" } }),
            "dryrun",
        );
        request.output_dir = temp.path().join("generation-image");

        let provider = DryrunProvider;
        let mut pipeline = Pipeline::new(&provider);
        let outcome = pipeline.run(&request)?;

        assert_eq!(
            pipeline.stages(),
            &[
                Stage::Received,
                Stage::Normalized,
                Stage::Dispatched,
                Stage::WrittenToDisk,
                Stage::Done
            ]
        );
        let written = image::open(&outcome.image_path)?;
        assert_eq!(written.dimensions(), (1024, 1024));
        assert!(outcome.prompt_text.starts_with("a red kite"));
        Ok(())
    }

    #[test]
    fn outcome_reports_hybrid_mode_resolution_and_warnings() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let face = temp.path().join("face.png");
        let style = temp.path().join("style.png");
        std::fs::write(&face, png_bytes(2, 2)?)?;
        std::fs::write(&style, png_bytes(2, 2)?)?;

        let mut request = GenerationRequest::new(
            json!({
                "user_intent": "portrait in watercolor",
                "meta": { "aspect_ratio": "3:4" },
                "input_image": { "path": "face.png", "usage_type": "identity", "strength": 0.2 },
                "reference_images": [{ "path": "style.png", "usage_type": "style" }]
            }),
            "dryrun",
        );
        request.input_images = vec![face, style];
        request.output_dir = temp.path().join("out");

        let provider = DryrunProvider;
        let mut pipeline = Pipeline::new(&provider);
        let outcome = pipeline.run(&request)?;

        assert!(outcome.hybrid);
        assert_eq!(outcome.resolution.map(|res| res.to_string()), Some("896x1200".to_string()));
        assert!(outcome.prompt_text.contains("Image 2: style reference"));
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("input_image"));

        let mut plain = GenerationRequest::new(json!({ "user_intent": "fog" }), "dryrun");
        plain.output_dir = temp.path().join("out");
        assert!(!Pipeline::new(&provider).run(&plain)?.hybrid);
        Ok(())
    }

    #[test]
    fn gemini_round_trip_writes_one_file_with_response_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let reference = temp.path().join("face.png");
        std::fs::write(&reference, png_bytes(3, 3)?)?;
        let returned = png_bytes(4, 4)?;

        let mut server = mockito::Server::new();
        let body = json!({ "candidates": [{ "content": { "parts": [
            { "inlineData": { "mimeType": "image/jpeg", "data": BASE64.encode(&returned) } }
        ] } }] });
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "generationConfig": { "imageConfig": { "aspectRatio": "4:5", "imageSize": "1K" } }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(1)
            .create();

        let mut request = GenerationRequest::new(
            json!({
                "meta": { "aspect_ratio": "4:5" },
                "subject": [{ "input_image": { "path": "face.png", "usage_type": "identity", "strength": 0.9 } }]
            }),
            MODEL,
        );
        request.input_images = vec![reference];
        request.output_dir = temp.path().join("out");

        let provider = gemini(&server.url());
        let mut pipeline = Pipeline::new(&provider);
        let outcome = pipeline.run(&request)?;

        mock.assert();
        assert!(pipeline.stages().contains(&Stage::ImagesLoaded));
        assert_eq!(
            outcome.image_path.extension().and_then(|ext| ext.to_str()),
            Some("jpg")
        );
        assert_eq!(std::fs::read(&outcome.image_path)?, returned);
        assert_eq!(files_in(&temp.path().join("out")), 1);
        Ok(())
    }

    #[test]
    fn schema_failure_sends_nothing() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", PATH).expect(0).create();

        let mut request =
            GenerationRequest::new(json!({ "meta": { "aspect_ratio": "5:3" } }), MODEL);
        request.output_dir = temp.path().join("out");
        let provider = gemini(&server.url());
        let mut pipeline = Pipeline::new(&provider);
        let kind = pipeline.run(&request).err().map(|err| err.kind());

        mock.assert();
        assert_eq!(kind, Some(ErrorKind::Schema));
        assert_eq!(
            pipeline.stages(),
            &[Stage::Received, Stage::Failed(ErrorKind::Schema)]
        );
        assert!(!temp.path().join("out").exists());
        Ok(())
    }

    #[test]
    fn missing_reference_file_sends_nothing() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let supplied = temp.path().join("only.png");
        std::fs::write(&supplied, png_bytes(2, 2)?)?;
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", PATH).expect(0).create();

        let mut request = GenerationRequest::new(
            json!({
                "input_image": "first.png",
                "reference_images": [{ "path": "second.png", "usage_type": "style" }]
            }),
            MODEL,
        );
        request.input_images = vec![supplied];
        request.output_dir = temp.path().join("out");
        let provider = gemini(&server.url());
        let mut pipeline = Pipeline::new(&provider);
        let kind = pipeline.run(&request).err().map(|err| err.kind());

        mock.assert();
        assert_eq!(kind, Some(ErrorKind::MissingFile));
        assert_eq!(
            pipeline.stages().last(),
            Some(&Stage::Failed(ErrorKind::MissingFile))
        );
        Ok(())
    }

    #[test]
    fn missing_credential_fails_after_prepare_without_network() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", PATH).expect(0).create();

        let mut request = GenerationRequest::new(json!({ "user_intent": "fog" }), MODEL);
        request.output_dir = temp.path().join("out");
        let provider = GeminiProvider::new(&server.url(), None, Duration::from_secs(5));
        let mut pipeline = Pipeline::new(&provider);
        let kind = pipeline.run(&request).err().map(|err| err.kind());

        mock.assert();
        assert_eq!(kind, Some(ErrorKind::Authentication));
        assert_eq!(
            pipeline.stages(),
            &[
                Stage::Received,
                Stage::Normalized,
                Stage::Failed(ErrorKind::Authentication)
            ]
        );
        Ok(())
    }

    #[test]
    fn upstream_rejection_leaves_no_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create();

        let mut request = GenerationRequest::new(json!({ "user_intent": "storm" }), MODEL);
        request.output_dir = temp.path().join("out");
        let provider = gemini(&server.url());
        let mut pipeline = Pipeline::new(&provider);
        let kind = pipeline.run(&request).err().map(|err| err.kind());

        assert_eq!(kind, Some(ErrorKind::Upstream));
        assert_eq!(files_in(&temp.path().join("out")), 0);
        Ok(())
    }
}
