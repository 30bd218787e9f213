use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{ensure_success, require_credential, HttpRequest, HttpTransport, ImageProvider};
use crate::{
    config::{GeminiConfig, GenerationConfig},
    dimensions::nearest_named_ratio,
    error::{ProviderError, Result},
    logger::log_request,
    models::{
        sniff_mime, strip_data_url, GeneratedImage, GenerationRequest, ModelVariant, ProviderId,
    },
    prompt::{compose, PromptStyle},
};

/// Ratio labels accepted by `imageConfig.aspectRatio`.
const SUPPORTED_RATIOS: [&str; 10] = [
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];

pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    config: GenerationConfig,
    transport: Arc<dyn HttpTransport>,
}

impl GeminiProvider {
    pub fn new(
        gemini: &GeminiConfig,
        config: GenerationConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let api_key = require_credential(ProviderId::Gemini, "API key", &gemini.api_key)?;
        Ok(Self {
            api_key,
            base_url: gemini.resolved_base_url(),
            config,
            transport,
        })
    }

    pub fn model_id(variant: ModelVariant) -> &'static str {
        match variant {
            ModelVariant::Standard => "gemini-2.5-flash-image",
            ModelVariant::Pro => "gemini-3-pro-image-preview",
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    pub fn build_body(request: &GenerationRequest) -> Value {
        let mut parts = vec![json!({ "text": compose(request, PromptStyle::English) })];
        for image in request.attached_images() {
            parts.push(json!({
                "inlineData": {
                    "mimeType": sniff_mime(image),
                    "data": strip_data_url(image.trim()),
                }
            }));
        }

        let mut image_config = json!({
            "aspectRatio": nearest_named_ratio(&request.aspect_ratio, &SUPPORTED_RATIOS),
        });
        // only the Pro model accepts an explicit output resolution
        if request.model_variant == ModelVariant::Pro {
            image_config["imageSize"] = json!(request.quality_tier.as_str());
        }

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": image_config,
            }
        })
    }

    fn error_message(body: &Value) -> Option<String> {
        let error = body.get("error")?;
        let message = error.get("message")?.as_str()?;
        match error.get("status").and_then(Value::as_str) {
            Some(status) => Some(format!("{} ({})", message, status)),
            None => Some(message.to_string()),
        }
    }

    fn extract_image(response: GenerateContentResponse) -> Result<GeneratedImage> {
        let mut notes = Vec::new();
        for candidate in response.candidates {
            if let Some(reason) = candidate.finish_reason {
                notes.push(format!("finish reason {}", reason));
            }
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            for part in parts {
                if let Some(inline) = part.inline_data {
                    if !inline.data.is_empty() {
                        return GeneratedImage::from_base64(&inline.data);
                    }
                }
                if let Some(text) = part.text {
                    notes.push(format!("model said: {}", text.trim()));
                }
            }
        }
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            notes.push(format!("prompt blocked: {}", reason));
        }

        let detail = if notes.is_empty() {
            "response contained no image data".to_string()
        } else {
            notes.join("; ")
        };
        Err(ProviderError::EmptyResult(detail))
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn generation_config(&self) -> &GenerationConfig {
        &self.config
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let url = self.endpoint(Self::model_id(request.model_variant));
        log_request(self.id().as_str(), &url, &self.api_key);

        let http_request = HttpRequest::json(&url, &Self::build_body(request))?
            .with_header("x-goog-api-key", &self.api_key);
        let response = self.transport.post(http_request).await?;
        ensure_success(self.id(), &response, Self::error_message)?;

        Self::extract_image(response.json()?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    #[serde(default)]
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectRatio, QualityTier};
    use crate::providers::testing::{png_base64, MockTransport};

    fn provider(transport: Arc<MockTransport>, gemini: GeminiConfig) -> GeminiProvider {
        GeminiProvider::new(&gemini, GenerationConfig::default(), transport).unwrap()
    }

    fn image_response() -> Value {
        json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here is your background." },
                    { "inlineData": { "mimeType": "image/png", "data": png_base64() } }
                ]},
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_image_and_request_shape() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, image_response());
        let gemini = provider(transport.clone(), GeminiConfig::new().with_credentials("g-key"));

        let request = GenerationRequest::new("Roadmap")
            .with_model(ModelVariant::Pro)
            .with_quality(QualityTier::FourK)
            .with_aspect_ratio(AspectRatio::Custom("2:1".into()))
            .with_reference_image(png_base64());
        let image = gemini.generate_one(&request).await.unwrap();
        assert_eq!(image.to_base64(), png_base64());

        let sent = transport.last_request();
        assert_eq!(
            sent.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
        assert_eq!(sent.header("x-goog-api-key"), Some("g-key"));

        let body = sent.body_json().unwrap();
        let image_config = &body["generationConfig"]["imageConfig"];
        assert_eq!(image_config["aspectRatio"], "16:9");
        assert_eq!(image_config["imageSize"], "4K");
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    }

    #[tokio::test(start_paused = true)]
    async fn test_proxy_base_url() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, image_response());
        let gemini = provider(
            transport.clone(),
            GeminiConfig::new()
                .with_credentials("g-key")
                .with_proxy("https://relay.example.com/gemini/"),
        );

        let request = GenerationRequest::new("Agenda");
        gemini.generate_one(&request).await.unwrap();

        let sent = transport.last_request();
        assert_eq!(
            sent.url,
            "https://relay.example.com/gemini/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        let body = sent.body_json().unwrap();
        assert!(body["generationConfig"]["imageConfig"].get("imageSize").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overloaded_is_retried() {
        let transport = Arc::new(MockTransport::new());
        let overloaded = json!({
            "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" }
        });
        transport.push_json(503, overloaded.clone());
        transport.push_json(503, overloaded);
        transport.push_json(200, image_response());
        let gemini = provider(transport.clone(), GeminiConfig::new().with_credentials("k"));

        gemini.generate_one(&GenerationRequest::new("x")).await.unwrap();
        assert_eq!(transport.post_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_request_is_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            400,
            json!({ "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" } }),
        );
        let gemini = provider(transport.clone(), GeminiConfig::new().with_credentials("k"));

        let err = gemini.generate_one(&GenerationRequest::new("x")).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::request_failed(Some(400), "API key not valid. (INVALID_ARGUMENT)")
        );
        assert_eq!(transport.post_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_only_response_is_empty_result() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            200,
            json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "I cannot draw that." }] },
                    "finishReason": "STOP"
                }]
            }),
        );
        let gemini = provider(transport.clone(), GeminiConfig::new().with_credentials("k"));

        let err = gemini.generate_one(&GenerationRequest::new("x")).await.unwrap_err();
        match err {
            ProviderError::EmptyResult(detail) => assert!(detail.contains("I cannot draw that.")),
            other => panic!("unexpected error {}", other),
        }
        assert_eq!(transport.post_count(), 1);
    }
}
