use std::collections::BTreeMap;

use promptforge_contracts::schema::{AspectRatio, ImageSize, Resolution, SafetyFilter};
use promptforge_contracts::PipelineError;
use serde_json::Value;

use crate::images::LoadedImage;

mod dryrun;
mod gemini;

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;

/// Everything one upstream call needs, already validated and loaded.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub model: String,
    pub prompt_text: String,
    pub document: Value,
    pub images: Vec<LoadedImage>,
    pub aspect_ratio: Option<AspectRatio>,
    pub image_size: ImageSize,
    pub resolution: Option<Resolution>,
    pub seed: Option<u64>,
    pub safety_filter: Option<SafetyFilter>,
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
    /// Text parts the model returned next to the image.
    pub model_text: Option<String>,
}

pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &DispatchRequest) -> Result<GeneratedImage, PipelineError>;
}

#[derive(Default)]
pub struct ImageProviderRegistry {
    providers: BTreeMap<String, Box<dyn ImageProvider>>,
}

impl ImageProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ImageProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ImageProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
