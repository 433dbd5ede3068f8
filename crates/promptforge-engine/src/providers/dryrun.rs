use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use promptforge_contracts::PipelineError;
use sha2::{Digest, Sha256};

use super::{DispatchRequest, GeneratedImage, ImageProvider};

const FALLBACK_SIDE: u32 = 256;

/// Local placeholder renderer: a solid PNG whose color is a stable hash of
/// the prompt and seed. Needs no credential and never touches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunProvider;

impl ImageProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &DispatchRequest) -> Result<GeneratedImage, PipelineError> {
        let (width, height) = request
            .resolution
            .map(|resolution| (resolution.width, resolution.height))
            .unwrap_or((FALLBACK_SIDE, FALLBACK_SIDE));
        let (r, g, b) = color_from_prompt(&request.prompt_text, request.seed.unwrap_or_default());
        tracing::info!(width, height, "rendering dry-run placeholder");

        let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|err| PipelineError::Upstream(format!("dry-run encode failed: {err}")))?;

        Ok(GeneratedImage {
            bytes,
            mime_type: Some("image/png".to_string()),
            model_text: None,
        })
    }
}

fn color_from_prompt(prompt: &str, seed: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
