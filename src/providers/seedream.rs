use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{
    ensure_success, fetch_image, require_credential, HttpRequest, HttpTransport, ImageProvider,
};
use crate::{
    config::{GenerationConfig, SeedreamConfig},
    dimensions::{resolve, ResolvedSize, SizeConstraints},
    error::{ProviderError, Result},
    logger::log_request,
    models::{to_data_url, GeneratedImage, GenerationRequest, ModelVariant, ProviderId},
    prompt::{compose, PromptStyle},
};

pub const STANDARD_SIZES: SizeConstraints = SizeConstraints::new(921_600, 16_777_216, 32);
pub const PRO_SIZES: SizeConstraints = SizeConstraints::new(3_686_400, 16_777_216, 32);

/// Seedream models on Volcengine Ark.
pub struct SeedreamProvider {
    api_key: String,
    endpoint: String,
    config: GenerationConfig,
    transport: Arc<dyn HttpTransport>,
}

impl SeedreamProvider {
    pub fn new(
        seedream: &SeedreamConfig,
        config: GenerationConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let api_key = require_credential(ProviderId::Seedream, "API key", &seedream.api_key)?;
        Ok(Self {
            api_key,
            endpoint: seedream.resolved_endpoint(),
            config,
            transport,
        })
    }

    pub fn model_id(variant: ModelVariant) -> &'static str {
        match variant {
            ModelVariant::Standard => "doubao-seedream-4-0-250828",
            ModelVariant::Pro => "doubao-seedream-4-5-251128",
        }
    }

    pub fn size_for(request: &GenerationRequest) -> ResolvedSize {
        let constraints = match request.model_variant {
            ModelVariant::Standard => STANDARD_SIZES,
            ModelVariant::Pro => PRO_SIZES,
        };
        resolve(request.quality_tier, &request.aspect_ratio, constraints)
    }

    pub fn build_body(request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": Self::model_id(request.model_variant),
            "prompt": compose(request, PromptStyle::Bilingual),
            "size": Self::size_for(request).to_string(),
            "response_format": "url",
            "sequential_image_generation": "disabled",
            "watermark": false,
        });

        let images: Vec<String> = request
            .attached_images()
            .into_iter()
            .map(to_data_url)
            .collect();
        if !images.is_empty() {
            body["image"] = json!(images);
        }
        body
    }

    fn error_message(body: &Value) -> Option<String> {
        let error = body.get("error")?;
        let message = error.get("message")?.as_str()?;
        match error.get("code").and_then(Value::as_str) {
            Some(code) => Some(format!("{}: {}", code, message)),
            None => Some(message.to_string()),
        }
    }
}

#[async_trait]
impl ImageProvider for SeedreamProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Seedream
    }

    fn generation_config(&self) -> &GenerationConfig {
        &self.config
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let url = format!("{}/api/v3/images/generations", self.endpoint);
        log_request(self.id().as_str(), &url, &self.api_key);

        let http_request = HttpRequest::json(&url, &Self::build_body(request))?
            .with_header("Authorization", format!("Bearer {}", self.api_key));
        let response = self.transport.post(http_request).await?;
        ensure_success(self.id(), &response, Self::error_message)?;

        let parsed: ImagesResponse = response.json()?;
        if let Some(error) = parsed.error {
            return Err(ProviderError::request_failed(None, error.message));
        }

        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmptyResult("response contained no images".into()))?;
        match (first.b64_json, first.url) {
            (Some(encoded), _) if !encoded.is_empty() => GeneratedImage::from_base64(&encoded),
            (_, Some(image_url)) if !image_url.is_empty() => {
                fetch_image(self.transport.as_ref(), &image_url).await
            }
            _ => Err(ProviderError::EmptyResult(
                "image entry had neither url nor b64_json".into(),
            )),
        }
    }
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageEntry>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ImageEntry {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectRatio, QualityTier};
    use crate::providers::testing::{png_base64, MockTransport};
    use crate::providers::HttpResponse;

    fn provider(transport: Arc<MockTransport>) -> SeedreamProvider {
        SeedreamProvider::new(
            &SeedreamConfig::new().with_credentials("ark-key"),
            GenerationConfig::default(),
            transport,
        )
        .unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        GeneratedImage::from_base64(png_base64()).unwrap().into_bytes()
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_and_inline_paths_yield_same_bytes() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "data": [{ "url": "https://cdn.example.com/out.png" }] }));
        transport.push_get(Ok(HttpResponse::new(200, png_bytes())));
        transport.push_json(200, json!({ "data": [{ "b64_json": png_base64() }] }));
        let seedream = provider(transport.clone());
        let request = GenerationRequest::new("Quarterly results");

        let fetched = seedream.generate_one(&request).await.unwrap();
        let inline = seedream.generate_one(&request).await.unwrap();
        assert_eq!(fetched, inline);
        assert_eq!(transport.fetched_urls(), vec!["https://cdn.example.com/out.png"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_shape() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "data": [{ "b64_json": png_base64() }] }));
        let seedream = provider(transport.clone());

        let request = GenerationRequest::new("Team intro")
            .with_quality(QualityTier::OneK)
            .with_aspect_ratio(AspectRatio::Widescreen)
            .with_model(ModelVariant::Pro)
            .with_reference_image(png_base64());
        seedream.generate_one(&request).await.unwrap();

        let sent = transport.last_request();
        assert_eq!(sent.url, "https://ark.cn-beijing.volces.com/api/v3/images/generations");
        assert_eq!(sent.header("authorization"), Some("Bearer ark-key"));
        let body = sent.body_json().unwrap();
        assert_eq!(body["model"], "doubao-seedream-4-5-251128");
        assert_eq!(body["size"], "2560x1440");
        assert_eq!(
            body["image"][0],
            format!("data:image/png;base64,{}", png_base64())
        );
        assert!(body["prompt"].as_str().unwrap().contains("Team intro"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success() {
        let transport = Arc::new(MockTransport::new());
        let limited = json!({ "error": { "code": "RateLimitExceeded", "message": "Too many requests" } });
        transport.push_json(429, limited.clone());
        transport.push_json(429, limited);
        transport.push_json(200, json!({ "data": [{ "b64_json": png_base64() }] }));
        let seedream = provider(transport.clone());

        let started = tokio::time::Instant::now();
        seedream
            .generate_one(&GenerationRequest::new("x"))
            .await
            .unwrap();
        assert_eq!(transport.post_count(), 3);
        assert!(started.elapsed() >= std::time::Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensitive_content_is_permanent() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            400,
            json!({ "error": { "code": "InputTextSensitiveContentDetected", "message": "The request failed" } }),
        );
        let seedream = provider(transport.clone());

        let err = seedream
            .generate_one(&GenerationRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RequestFailed);
        assert!(err.to_string().contains("InputTextSensitiveContentDetected"));
        assert_eq!(transport.post_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_data_and_failed_download() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "data": [] }));
        transport.push_json(200, json!({ "data": [{ "url": "https://cdn.example.com/gone.png" }] }));
        transport.push_get(Ok(HttpResponse::new(403, "expired")));
        let seedream = provider(transport.clone());
        let request = GenerationRequest::new("x");

        let err = seedream.generate_one(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResult(_)));
        let err = seedream.generate_one(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::DownloadFailed(_)));
        assert_eq!(transport.post_count(), 2);
    }
}
