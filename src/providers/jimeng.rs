use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{
    ensure_success, fetch_image, require_credential, signer::V4Signer, HttpRequest,
    HttpResponse, HttpTransport, ImageProvider,
};
use crate::{
    config::{GenerationConfig, JimengConfig},
    dimensions::{resolve, ResolvedSize, SizeConstraints},
    error::{ProviderError, Result},
    logger::log_request,
    models::{strip_data_url, GeneratedImage, GenerationRequest, ModelVariant, ProviderId},
    prompt::{compose, PromptStyle},
};

pub const SIZES: SizeConstraints = SizeConstraints::new(1_048_576, 16_777_216, 32);

const SERVICE: &str = "cv";
const ACTION_QUERY: &str = "Action=CVProcess&Version=2022-08-31";
const SUCCESS_CODE: i64 = 10000;

/// Jimeng text-to-image on the Volcengine visual API, authenticated with a
/// signed access key / secret key pair.
pub struct JimengProvider {
    access_key: String,
    endpoint: String,
    signer: V4Signer,
    config: GenerationConfig,
    transport: Arc<dyn HttpTransport>,
}

impl JimengProvider {
    pub fn new(
        jimeng: &JimengConfig,
        config: GenerationConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let access_key = require_credential(ProviderId::Jimeng, "access key", &jimeng.access_key)?;
        let secret_key = require_credential(ProviderId::Jimeng, "secret key", &jimeng.secret_key)?;
        let signer = V4Signer::new(
            access_key.clone(),
            secret_key,
            jimeng.resolved_region(),
            SERVICE,
        );
        Ok(Self {
            access_key,
            endpoint: jimeng.resolved_endpoint(),
            signer,
            config,
            transport,
        })
    }

    pub fn req_key(variant: ModelVariant) -> &'static str {
        match variant {
            ModelVariant::Standard => "jimeng_t2i_v31",
            ModelVariant::Pro => "jimeng_t2i_v40",
        }
    }

    pub fn size_for(request: &GenerationRequest) -> ResolvedSize {
        resolve(request.quality_tier, &request.aspect_ratio, SIZES)
    }

    pub fn build_body(request: &GenerationRequest) -> Value {
        let size = Self::size_for(request);
        let mut body = json!({
            "req_key": Self::req_key(request.model_variant),
            "prompt": compose(request, PromptStyle::Bilingual),
            "width": size.width,
            "height": size.height,
            "return_url": false,
        });

        let images: Vec<&str> = request
            .attached_images()
            .into_iter()
            .map(|image| strip_data_url(image.trim()))
            .collect();
        if !images.is_empty() {
            body["binary_data_base64"] = json!(images);
        }
        body
    }
}

/// Gateway failures (bad signature, unknown key) use the
/// `ResponseMetadata.Error` envelope instead of a business code.
fn error_message(body: &Value) -> Option<String> {
    let error = body.get("ResponseMetadata")?.get("Error")?;
    let message = error.get("Message").and_then(Value::as_str).unwrap_or_default();
    match error.get("Code").and_then(Value::as_str) {
        Some(code) if !message.is_empty() => Some(format!("{}: {}", code, message)),
        Some(code) => Some(code.to_string()),
        None if !message.is_empty() => Some(message.to_string()),
        None => None,
    }
}

/// Maps a business error code to an HTTP-like status so throttling and server
/// faults classify as transient.
fn code_status(code: i64) -> Option<u16> {
    match code {
        50429 | 50430 => Some(429),
        50500..=50599 => Some(500),
        _ => None,
    }
}

#[async_trait]
impl ImageProvider for JimengProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Jimeng
    }

    fn generation_config(&self) -> &GenerationConfig {
        &self.config
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let url = format!("{}?{}", self.endpoint, ACTION_QUERY);
        log_request(self.id().as_str(), &url, &self.access_key);

        let unsigned = HttpRequest::json(&url, &Self::build_body(request))?;
        let signed = self.signer.sign(unsigned, Utc::now())?;
        let response = self.transport.post(signed).await?;

        let parsed = serde_json::from_slice::<VisualResponse>(&response.body).ok();
        if let Some(error) = parsed.as_ref().and_then(|p| p.api_error(&response)) {
            log::error!("{} returned {}", self.name(), error);
            return Err(error);
        }
        ensure_success(self.id(), &response, error_message)?;

        let data = parsed
            .and_then(|p| p.data)
            .ok_or_else(|| ProviderError::EmptyResult("response contained no data".into()))?;
        if let Some(encoded) = data.binary_data_base64.iter().find(|b| !b.is_empty()) {
            return GeneratedImage::from_base64(encoded);
        }
        match data.image_urls.iter().find(|u| !u.is_empty()) {
            Some(image_url) => fetch_image(self.transport.as_ref(), image_url).await,
            None => Err(ProviderError::EmptyResult(
                "response contained neither image data nor URLs".into(),
            )),
        }
    }
}

#[derive(Deserialize)]
struct VisualResponse {
    code: Option<i64>,
    #[serde(default)]
    message: String,
    data: Option<VisualData>,
}

impl VisualResponse {
    /// A non-success business code. Codes without their own mapping keep the
    /// HTTP status when that was an error too.
    fn api_error(&self, response: &HttpResponse) -> Option<ProviderError> {
        let code = self.code.filter(|c| *c != SUCCESS_CODE)?;
        let status =
            code_status(code).or_else(|| (!response.is_success()).then_some(response.status));
        Some(ProviderError::request_failed(
            status,
            format!("code {}: {}", code, self.message),
        ))
    }
}

#[derive(Deserialize, Default)]
struct VisualData {
    #[serde(default)]
    binary_data_base64: Vec<String>,
    #[serde(default)]
    image_urls: Vec<String>,
}
