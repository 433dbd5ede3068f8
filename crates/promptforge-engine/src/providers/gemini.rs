use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use promptforge_contracts::PipelineError;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};

use super::{truncate_text, DispatchRequest, GeneratedImage, ImageProvider};
use crate::config::{Settings, ENV_API_KEY, ENV_API_KEY_ALIAS};

const API_KEY_HEADER: &str = "x-goog-api-key";
const STRUCTURED_PROMPT_PREFIX: &str = "STRUCTURED_PROMPT_JSON:\n";
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiProvider {
    api_base: String,
    api_key: Option<SecretString>,
    timeout: Duration,
    http: HttpClient,
}

struct ResponseParts {
    images: Vec<(Vec<u8>, Option<String>)>,
    texts: Vec<String>,
}

impl GeminiProvider {
    pub fn new(api_base: &str, api_key: Option<SecretString>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key,
            timeout,
            http: HttpClient::new(),
        }
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self::new(&settings.base_url, settings.api_key, settings.timeout)
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_parts(request: &DispatchRequest) -> Vec<Value> {
        let mut parts: Vec<Value> = request
            .images
            .iter()
            .map(|image| {
                json!({
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": BASE64.encode(&image.bytes),
                    }
                })
            })
            .collect();
        parts.push(json!({ "text": request.prompt_text }));
        let structured =
            serde_json::to_string_pretty(&request.document).unwrap_or_else(|_| "{}".to_string());
        parts.push(json!({ "text": format!("{STRUCTURED_PROMPT_PREFIX}{structured}") }));
        parts
    }

    pub fn build_payload(request: &DispatchRequest) -> Value {
        let mut image_config = Map::new();
        if let Some(ratio) = request.aspect_ratio {
            image_config.insert("aspectRatio".to_string(), json!(ratio.as_str()));
        }
        image_config.insert("imageSize".to_string(), json!(request.image_size.as_str()));

        let mut generation_config = Map::new();
        generation_config.insert("responseModalities".to_string(), json!(["TEXT", "IMAGE"]));
        generation_config.insert("imageConfig".to_string(), Value::Object(image_config));
        if let Some(seed) = request.seed {
            generation_config.insert("seed".to_string(), json!(seed));
        }

        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            json!([{ "role": "user", "parts": Self::build_parts(request) }]),
        );
        payload.insert(
            "generationConfig".to_string(),
            Value::Object(generation_config),
        );
        payload.insert("tools".to_string(), json!([{ "google_search": {} }]));
        if let Some(filter) = request.safety_filter {
            let settings: Vec<Value> = HARM_CATEGORIES
                .into_iter()
                .map(|category| {
                    json!({
                        "category": category,
                        "threshold": filter.upstream_threshold(),
                    })
                })
                .collect();
            payload.insert("safetySettings".to_string(), Value::Array(settings));
        }
        Value::Object(payload)
    }

    fn extract_parts(response_payload: &Value) -> Result<ResponseParts, PipelineError> {
        let mut out = ResponseParts {
            images: Vec::new(),
            texts: Vec::new(),
        };
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for candidate in candidates {
            let parts = candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for part in parts {
                if part.get("thought").and_then(Value::as_bool) == Some(true) {
                    continue;
                }
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    if !text.trim().is_empty() {
                        out.texts.push(text.trim().to_string());
                    }
                }
                let Some(inline) = part
                    .get("inlineData")
                    .or_else(|| part.get("inline_data"))
                    .and_then(Value::as_object)
                else {
                    continue;
                };
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
                    PipelineError::Upstream(format!("Gemini image base64 decode failed: {err}"))
                })?;
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                out.images.push((bytes, mime_type));
            }
        }
        Ok(out)
    }

    /// Why a response carried no image, in the service's own words.
    fn no_image_reason(response_payload: &Value, texts: &[String]) -> String {
        let mut reasons = Vec::new();
        if let Some(feedback) = response_payload.get("promptFeedback") {
            if let Some(reason) = feedback.get("blockReason").and_then(Value::as_str) {
                reasons.push(format!("prompt blocked: {reason}"));
            }
            if let Some(message) = feedback.get("blockReasonMessage").and_then(Value::as_str) {
                reasons.push(message.to_string());
            }
        }
        let finish_reasons = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|candidate| candidate.get("finishReason").and_then(Value::as_str));
        for reason in finish_reasons {
            reasons.push(format!("finish reason: {reason}"));
        }
        if !texts.is_empty() {
            reasons.push(format!("model said: {}", truncate_text(&texts.join(" "), 512)));
        }
        if reasons.is_empty() {
            return "Gemini returned no image".to_string();
        }
        format!("Gemini returned no image ({})", reasons.join("; "))
    }
}

fn response_json_or_error(response: HttpResponse) -> Result<Value, PipelineError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| PipelineError::Transport(format!("Gemini response body read failed: {err}")))?;
    if !status.is_success() {
        let message = upstream_message(&body);
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PipelineError::Authentication(format!(
                "Gemini rejected the credential ({code}): {message}"
            )));
        }
        return Err(PipelineError::Upstream(format!(
            "Gemini request failed ({code}): {message}"
        )));
    }
    serde_json::from_str(&body).map_err(|err| {
        PipelineError::Upstream(format!(
            "Gemini returned invalid JSON payload ({err}): {}",
            truncate_text(&body, 256)
        ))
    })
}

fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), 512))
}

impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &DispatchRequest) -> Result<GeneratedImage, PipelineError> {
        let Some(api_key) = self.api_key.as_ref() else {
            return Err(PipelineError::Authentication(format!(
                "{ENV_API_KEY} or {ENV_API_KEY_ALIAS} not set"
            )));
        };
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = Self::build_payload(request);
        tracing::info!(
            model = %request.model,
            images = request.images.len(),
            timeout_s = self.timeout.as_secs(),
            "dispatching to Gemini"
        );

        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key.expose_secret())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .map_err(|err| {
                PipelineError::Transport(format!("Gemini request failed ({endpoint}): {err}"))
            })?;
        let response_payload = response_json_or_error(response)?;
        let ResponseParts { mut images, texts } = Self::extract_parts(&response_payload)?;
        let model_text = (!texts.is_empty()).then(|| texts.join("\n"));
        if let Some(text) = model_text.as_deref() {
            tracing::info!(text = %truncate_text(text, 200), "Gemini returned text");
        }

        match images.len() {
            0 => Err(PipelineError::Upstream(Self::no_image_reason(
                &response_payload,
                &texts,
            ))),
            1 => {
                let (bytes, mime_type) = images.remove(0);
                Ok(GeneratedImage {
                    bytes,
                    mime_type,
                    model_text,
                })
            }
            count => Err(PipelineError::Upstream(format!(
                "Gemini returned {count} images; expected exactly one"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::time::Duration;

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use mockito::Matcher;
    use promptforge_contracts::schema::{AspectRatio, ImageSize, SafetyFilter};
    use promptforge_contracts::ErrorKind;
    use secrecy::SecretString;
    use serde_json::json;

    use super::GeminiProvider;
    use crate::images::LoadedImage;
    use crate::providers::{DispatchRequest, ImageProvider};

    const MODEL: &str = "gemini-test-image";
    const PATH: &str = "/models/gemini-test-image:generateContent";

    fn png_bytes() -> anyhow::Result<Vec<u8>> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(2, 2))
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        Ok(out)
    }

    fn request() -> DispatchRequest {
        DispatchRequest {
            model: MODEL.to_string(),
            prompt_text: "a lighthouse at dusk".to_string(),
            document: json!({ "user_intent": "a lighthouse at dusk" }),
            images: Vec::new(),
            aspect_ratio: Some(AspectRatio::Landscape16x9),
            image_size: ImageSize::TwoK,
            resolution: None,
            seed: Some(7),
            safety_filter: None,
        }
    }

    fn provider(base: &str) -> GeminiProvider {
        GeminiProvider::new(
            base,
            Some(SecretString::from("test-key".to_string())),
            Duration::from_secs(5),
        )
    }

    fn image_response(count: usize) -> anyhow::Result<String> {
        let data = BASE64.encode(png_bytes()?);
        let mut parts = vec![json!({ "text": "Here is your lighthouse." })];
        for _ in 0..count {
            parts.push(json!({ "inlineData": { "mimeType": "image/png", "data": data } }));
        }
        Ok(json!({ "candidates": [{ "content": { "parts": parts }, "finishReason": "STOP" }] })
            .to_string())
    }

    #[test]
    fn payload_carries_parts_config_and_tools() -> anyhow::Result<()> {
        let mut request = request();
        request.images.push(LoadedImage {
            path: PathBuf::from("ref.png"),
            declared_as: Some("input_image".to_string()),
            mime_type: "image/png",
            width: 2,
            height: 2,
            bytes: png_bytes()?,
        });
        request.safety_filter = Some(SafetyFilter::BlockOnlyHigh);
        let payload = GeminiProvider::build_payload(&request);

        let parts = payload["contents"][0]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[1]["text"], json!("a lighthouse at dusk"));
        assert!(parts[2]["text"]
            .as_str()
            .unwrap_or_default()
            .starts_with("STRUCTURED_PROMPT_JSON:\n"));

        let config = &payload["generationConfig"];
        assert_eq!(config["responseModalities"], json!(["TEXT", "IMAGE"]));
        assert_eq!(config["imageConfig"], json!({ "aspectRatio": "16:9", "imageSize": "2K" }));
        assert_eq!(config["seed"], json!(7));
        assert_eq!(payload["tools"], json!([{ "google_search": {} }]));
        assert_eq!(payload["safetySettings"][0]["threshold"], json!("BLOCK_ONLY_HIGH"));
        Ok(())
    }

    #[test]
    fn payload_defaults_image_size_and_omits_optional_fields() {
        let mut request = request();
        request.aspect_ratio = None;
        request.image_size = ImageSize::default();
        request.seed = None;
        let payload = GeminiProvider::build_payload(&request);
        assert_eq!(
            payload["generationConfig"]["imageConfig"],
            json!({ "imageSize": "1K" })
        );
        assert!(payload["generationConfig"].get("seed").is_none());
        assert!(payload.get("safetySettings").is_none());
    }

    #[test]
    fn single_image_response_is_returned_with_model_text() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "generationConfig": { "imageConfig": { "aspectRatio": "16:9" } }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(image_response(1)?)
            .expect(1)
            .create();

        let generated = provider(&server.url()).generate(&request())?;
        mock.assert();
        assert_eq!(generated.bytes, png_bytes()?);
        assert_eq!(generated.mime_type.as_deref(), Some("image/png"));
        assert_eq!(generated.model_text.as_deref(), Some("Here is your lighthouse."));
        Ok(())
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", PATH).expect(0).create();
        let provider = GeminiProvider::new(&server.url(), None, Duration::from_secs(5));
        let kind = provider.generate(&request()).err().map(|err| err.kind());
        assert_eq!(kind, Some(ErrorKind::Authentication));
        mock.assert();
    }

    #[test]
    fn rejected_credential_maps_to_authentication() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", PATH)
            .with_status(401)
            .with_body(r#"{"error":{"code":401,"message":"API key not valid."}}"#)
            .create();
        let err = provider(&server.url()).generate(&request()).err();
        assert_eq!(err.as_ref().map(|err| err.kind()), Some(ErrorKind::Authentication));
        assert!(err
            .map(|err| err.to_string())
            .unwrap_or_default()
            .contains("API key not valid."));
    }

    #[test]
    fn server_errors_surface_upstream_message() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", PATH)
            .with_status(503)
            .with_body(r#"{"error":{"code":503,"message":"The model is overloaded."}}"#)
            .create();
        let err = provider(&server.url()).generate(&request()).err();
        assert_eq!(err.as_ref().map(|err| err.kind()), Some(ErrorKind::Upstream));
        let text = err.map(|err| err.to_string()).unwrap_or_default();
        assert!(text.contains("503"));
        assert!(text.contains("The model is overloaded."));
    }

    #[test]
    fn safety_block_is_upstream_with_reason() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create();
        let err = provider(&server.url()).generate(&request()).err();
        assert_eq!(err.as_ref().map(|err| err.kind()), Some(ErrorKind::Upstream));
        assert!(err
            .map(|err| err.to_string())
            .unwrap_or_default()
            .contains("prompt blocked: SAFETY"));
    }

    #[test]
    fn text_only_and_multi_image_responses_are_upstream_errors() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let _text_only = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(image_response(0)?)
            .create();
        let err = provider(&server.url()).generate(&request()).err();
        let text = err.as_ref().map(|err| err.to_string()).unwrap_or_default();
        assert_eq!(err.map(|err| err.kind()), Some(ErrorKind::Upstream));
        assert!(text.contains("Here is your lighthouse."));
        assert!(text.contains("finish reason: STOP"));

        let mut server = mockito::Server::new();
        let _two = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(image_response(2)?)
            .create();
        let err = provider(&server.url()).generate(&request()).err();
        assert!(err
            .map(|err| err.to_string())
            .unwrap_or_default()
            .contains("2 images"));
        Ok(())
    }

    #[test]
    fn thought_parts_are_ignored() -> anyhow::Result<()> {
        let data = BASE64.encode(png_bytes()?);
        let body = json!({ "candidates": [{ "content": { "parts": [
            { "thought": true, "inlineData": { "mimeType": "image/png", "data": data } },
            { "inlineData": { "mimeType": "image/jpeg", "data": data } }
        ] } }] });
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(body.to_string())
            .create();
        let generated = provider(&server.url()).generate(&request())?;
        assert_eq!(generated.mime_type.as_deref(), Some("image/jpeg"));
        assert!(generated.model_text.is_none());
        Ok(())
    }

    #[test]
    fn non_json_body_is_upstream_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create();
        let kind = provider(&server.url())
            .generate(&request())
            .err()
            .map(|err| err.kind());
        assert_eq!(kind, Some(ErrorKind::Upstream));
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let provider = provider("http://127.0.0.1:9/v1beta");
        let err = provider.generate(&request()).err();
        assert_eq!(err.as_ref().map(|err| err.kind()), Some(ErrorKind::Transport));
        assert!(!err
            .map(|err| err.to_string())
            .unwrap_or_default()
            .contains("test-key"));
    }
}
