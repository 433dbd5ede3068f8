use serde_json::Value;

use crate::errors::PipelineError;
use crate::schema::{resolution, DeclaredImage, Domain, PromptDocument, Resolution};

/// A validated document ready for dispatch.
#[derive(Debug, Clone)]
pub struct NormalizedPrompt {
    pub document: PromptDocument,
    /// The document re-serialized with image shorthands expanded and
    /// unknown fields preserved. This is what travels upstream.
    pub payload: Value,
    pub images: Vec<DeclaredImage>,
    pub resolution: Option<Resolution>,
    pub warnings: Vec<String>,
}

pub fn normalize_str(raw: &str) -> Result<NormalizedPrompt, PipelineError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| PipelineError::schema(format!("prompt is not valid JSON: {err}")))?;
    normalize(value)
}

pub fn normalize(raw: Value) -> Result<NormalizedPrompt, PipelineError> {
    if !raw.is_object() {
        return Err(PipelineError::schema(format!(
            "prompt document must be a JSON object, got {}",
            json_kind(&raw)
        )));
    }

    let document: PromptDocument = serde_json::from_value(raw)
        .map_err(|err| PipelineError::schema(format!("prompt document: {err}")))?;
    document.meta.validate().map_err(PipelineError::Schema)?;

    let images = document.declared_images();
    let resolution = document
        .meta
        .aspect_ratio
        .map(|ratio| resolution(ratio, document.meta.image_size()));

    let mut warnings = Vec::new();
    for declared in &images {
        if declared.image.path.trim().is_empty() {
            return Err(PipelineError::schema(format!(
                "{} has an empty path",
                declared.origin
            )));
        }
        if let Some(note) = declared.image.strength_advisory() {
            warnings.push(format!("{}: {note}", declared.origin));
        }
    }
    let domain = document.meta.domain();
    if document.graphic_design.is_some() && domain != Domain::GraphicDesign {
        warnings.push(format!(
            "graphic_design section ignored for domain {domain}"
        ));
    }
    if document.ui_design.is_some() && domain != Domain::UiDesign {
        warnings.push(format!("ui_design section ignored for domain {domain}"));
    }

    let payload = serde_json::to_value(&document)
        .map_err(|err| PipelineError::schema(format!("prompt document: {err}")))?;

    Ok(NormalizedPrompt {
        document,
        payload,
        images,
        resolution,
        warnings,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
