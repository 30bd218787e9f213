use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{
    ensure_success, fetch_image, require_credential, HttpRequest, HttpTransport, ImageProvider,
};
use crate::{
    config::{DashScopeConfig, GenerationConfig},
    dimensions::{lookup_bucket, ResolvedSize},
    error::{ProviderError, Result},
    logger::log_request,
    models::{to_data_url, GeneratedImage, GenerationRequest, ModelVariant, ProviderId},
    prompt::{compose, PromptStyle},
};

/// Output sizes Qwen-Image accepts, keyed by ratio label.
pub const SIZE_BUCKETS: [(&str, ResolvedSize); 5] = [
    ("16:9", ResolvedSize::new(1664, 928)),
    ("4:3", ResolvedSize::new(1472, 1140)),
    ("1:1", ResolvedSize::new(1328, 1328)),
    ("3:4", ResolvedSize::new(1140, 1472)),
    ("9:16", ResolvedSize::new(928, 1664)),
];
pub const DEFAULT_SIZE: ResolvedSize = ResolvedSize::new(1664, 928);

const EDIT_MODEL: &str = "qwen-image-edit";

pub struct DashScopeProvider {
    api_key: String,
    endpoint: String,
    config: GenerationConfig,
    transport: Arc<dyn HttpTransport>,
}

impl DashScopeProvider {
    pub fn new(
        dashscope: &DashScopeConfig,
        config: GenerationConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let api_key = require_credential(ProviderId::DashScope, "API key", &dashscope.api_key)?;
        Ok(Self {
            api_key,
            endpoint: dashscope.resolved_endpoint(),
            config,
            transport,
        })
    }

    /// The edit model is used whenever the request carries images, since the
    /// text-to-image models ignore them.
    pub fn model_id(request: &GenerationRequest) -> &'static str {
        if !request.attached_images().is_empty() {
            return EDIT_MODEL;
        }
        match request.model_variant {
            ModelVariant::Standard => "qwen-image",
            ModelVariant::Pro => "qwen-image-plus",
        }
    }

    pub fn build_body(request: &GenerationRequest) -> Value {
        let model = Self::model_id(request);
        let mut content: Vec<Value> = request
            .attached_images()
            .into_iter()
            .map(|image| json!({ "image": to_data_url(image) }))
            .collect();
        content.push(json!({ "text": compose(request, PromptStyle::Bilingual) }));

        let mut parameters = json!({
            "negative_prompt": "",
            "prompt_extend": true,
            "watermark": false,
        });
        // the edit model derives its size from the input image
        if model != EDIT_MODEL {
            let size = lookup_bucket(&request.aspect_ratio, &SIZE_BUCKETS, DEFAULT_SIZE);
            parameters["size"] = json!(size.to_string_with("*"));
        }

        json!({
            "model": model,
            "input": {
                "messages": [{ "role": "user", "content": content }]
            },
            "parameters": parameters,
        })
    }

    fn error_message(body: &Value) -> Option<String> {
        let message = body.get("message")?.as_str()?;
        match body.get("code").and_then(Value::as_str) {
            Some(code) if !code.is_empty() => Some(format!("{}: {}", code, message)),
            _ => Some(message.to_string()),
        }
    }
}

#[async_trait]
impl ImageProvider for DashScopeProvider {
    fn id(&self) -> ProviderId {
        ProviderId::DashScope
    }

    fn generation_config(&self) -> &GenerationConfig {
        &self.config
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let url = format!(
            "{}/api/v1/services/aigc/multimodal-generation/generation",
            self.endpoint
        );
        log_request(self.id().as_str(), &url, &self.api_key);

        let http_request = HttpRequest::json(&url, &Self::build_body(request))?
            .with_header("Authorization", format!("Bearer {}", self.api_key));
        let response = self.transport.post(http_request).await?;
        ensure_success(self.id(), &response, Self::error_message)?;

        let parsed: GenerationResponse = response.json()?;
        if let Some(code) = parsed.code.filter(|c| !c.is_empty()) {
            return Err(ProviderError::request_failed(
                None,
                format!("{}: {}", code, parsed.message.unwrap_or_default()),
            ));
        }

        let image_url = parsed
            .output
            .into_iter()
            .flat_map(|output| output.choices)
            .flat_map(|choice| choice.message.content)
            .find_map(|item| item.image.filter(|url| !url.is_empty()))
            .ok_or_else(|| ProviderError::EmptyResult("response contained no image URL".into()))?;

        fetch_image(self.transport.as_ref(), &image_url).await
    }
}

#[derive(Deserialize)]
struct GenerationResponse {
    output: Option<Output>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct Output {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Vec<ContentItem>,
}

#[derive(Deserialize)]
struct ContentItem {
    image: Option<String>,
}
