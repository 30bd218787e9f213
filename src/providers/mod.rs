pub mod dashscope;
pub mod gemini;
pub mod jimeng;
pub mod seedream;
pub mod signer;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    config::{Credentials, GenerationConfig},
    error::{ProviderError, Result},
    fanout,
    logger::log_response,
    models::{GeneratedImage, GenerationRequest, ProviderId, VariationResult},
    retry::with_retry,
};

pub use dashscope::DashScopeProvider;
pub use gemini::GeminiProvider;
pub use jimeng::JimengProvider;
pub use seedream::SeedreamProvider;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Uniform contract over every image backend.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn name(&self) -> &str {
        self.id().display_name()
    }

    fn generation_config(&self) -> &GenerationConfig;

    /// A single request/response exchange, without retries.
    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage>;

    /// One image, retrying transient failures per the configured policy.
    async fn generate_one(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let policy = self.generation_config().retry;
        with_retry(&policy, |_| self.attempt(request)).await
    }

    /// `count` independent images from concurrent, staggered calls.
    async fn generate_variations(
        &self,
        request: &GenerationRequest,
        count: usize,
    ) -> Result<VariationResult> {
        let stagger = self.generation_config().stagger;
        fanout::generate_variations(count, stagger, |_| self.generate_one(request)).await
    }
}

/// Builds the adapter for `id`. Fails with `Unauthenticated` before any
/// network activity when the provider's credentials are missing.
pub fn select_provider(
    id: ProviderId,
    credentials: &Credentials,
    config: &GenerationConfig,
) -> Result<Arc<dyn ImageProvider>> {
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(config.request_timeout)?);
    select_provider_with_transport(id, credentials, config, transport)
}

/// Like [`select_provider`] but resolves a textual identifier; unknown names
/// get the default provider.
pub fn select_provider_by_name(
    name: &str,
    credentials: &Credentials,
    config: &GenerationConfig,
) -> Result<Arc<dyn ImageProvider>> {
    select_provider(ProviderId::parse_or_default(name), credentials, config)
}

pub fn select_provider_with_transport(
    id: ProviderId,
    credentials: &Credentials,
    config: &GenerationConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<Arc<dyn ImageProvider>> {
    let config = config.clone();
    let provider: Arc<dyn ImageProvider> = match id {
        ProviderId::Gemini => Arc::new(GeminiProvider::new(
            &credentials.gemini,
            config,
            transport,
        )?),
        ProviderId::Seedream => Arc::new(SeedreamProvider::new(
            &credentials.seedream,
            config,
            transport,
        )?),
        ProviderId::DashScope => Arc::new(DashScopeProvider::new(
            &credentials.dashscope,
            config,
            transport,
        )?),
        ProviderId::Jimeng => Arc::new(JimengProvider::new(
            &credentials.jimeng,
            config,
            transport,
        )?),
    };
    log::debug!("Selected provider {}", provider.name());
    Ok(provider)
}

/// Returns the trimmed credential or `Unauthenticated` when it is absent or
/// blank.
pub(crate) fn require_credential(
    provider: ProviderId,
    field: &str,
    value: &Option<String>,
) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => {
            log::error!("{} {} is not configured", provider.display_name(), field);
            Err(ProviderError::unauthenticated(
                provider,
                format!("{} is not configured", field),
            ))
        }
    }
}

/// Maps a non-2xx response to `RequestFailed`, preferring the provider's own
/// error text when `extract` finds one in the JSON body.
pub(crate) fn ensure_success(
    provider: ProviderId,
    response: &HttpResponse,
    extract: fn(&serde_json::Value) -> Option<String>,
) -> Result<()> {
    log_response(provider.as_str(), response.status, response.body.len());
    if response.is_success() {
        return Ok(());
    }

    let message = serde_json::from_slice::<serde_json::Value>(&response.body)
        .ok()
        .as_ref()
        .and_then(extract)
        .unwrap_or_else(|| format!("HTTP {} from {}", response.status, provider.display_name()));

    log::error!(
        "{} request failed with status {}: {}",
        provider.display_name(),
        response.status,
        message
    );
    Err(ProviderError::request_failed(Some(response.status), message))
}

/// Downloads an image the provider returned by URL.
pub(crate) async fn fetch_image(
    transport: &dyn HttpTransport,
    url: &str,
) -> Result<GeneratedImage> {
    log::debug!("Fetching generated image from {}", url);
    let response = transport
        .get(url)
        .await
        .map_err(|e| ProviderError::DownloadFailed(format!("{}: {}", url, e)))?;

    if !response.is_success() {
        return Err(ProviderError::DownloadFailed(format!(
            "{} returned HTTP {}",
            url, response.status
        )));
    }
    if response.body.is_empty() {
        return Err(ProviderError::DownloadFailed(format!("{} returned no data", url)));
    }
    Ok(GeneratedImage::from_bytes(response.body))
}

#[cfg(test)]
mod tests {
    use super::testing::{png_base64, MockTransport};
    use super::*;
    use crate::config::{DashScopeConfig, GeminiConfig, JimengConfig, SeedreamConfig};

    #[test]
    fn test_missing_credentials_never_touch_network() {
        let transport = Arc::new(MockTransport::new());
        let credentials = Credentials::new()
            .with_gemini(GeminiConfig::new().with_credentials(""))
            .with_seedream(SeedreamConfig::new().with_credentials("   "))
            .with_jimeng(JimengConfig::new().with_credentials("ak", ""));

        for id in ProviderId::ALL {
            let result = select_provider_with_transport(
                id,
                &credentials,
                &GenerationConfig::default(),
                transport.clone(),
            );
            match result {
                Err(ProviderError::Unauthenticated { provider, .. }) => assert_eq!(provider, id),
                Err(other) => panic!("unexpected error for {}: {}", id, other),
                Ok(_) => panic!("{} constructed without credentials", id),
            }
        }
        assert_eq!(transport.post_count(), 0);
        assert_eq!(transport.get_count(), 0);
    }

    #[test]
    fn test_selects_matching_adapter() {
        let transport = Arc::new(MockTransport::new());
        let credentials = Credentials::new()
            .with_gemini(GeminiConfig::new().with_credentials("g"))
            .with_seedream(SeedreamConfig::new().with_credentials("s"))
            .with_dashscope(DashScopeConfig::new().with_credentials("d"))
            .with_jimeng(JimengConfig::new().with_credentials("ak", "sk"));

        for id in ProviderId::ALL {
            let provider = select_provider_with_transport(
                id,
                &credentials,
                &GenerationConfig::default(),
                transport.clone(),
            )
            .unwrap();
            assert_eq!(provider.id(), id);
        }
    }

    #[test]
    fn test_unknown_name_uses_default_provider() {
        let credentials =
            Credentials::new().with_gemini(GeminiConfig::new().with_credentials("g"));
        let provider =
            select_provider_by_name("dall-e", &credentials, &GenerationConfig::default())
                .unwrap();
        assert_eq!(provider.id(), ProviderId::Gemini);
    }

    #[test]
    fn test_ensure_success_uses_extracted_message() {
        let response = HttpResponse::new(400, r#"{"detail":"prompt rejected"}"#);
        let err = ensure_success(ProviderId::Seedream, &response, |body| {
            body["detail"].as_str().map(String::from)
        })
        .unwrap_err();
        assert_eq!(err, ProviderError::request_failed(Some(400), "prompt rejected"));

        let response = HttpResponse::new(502, "<html>bad gateway</html>");
        let err = ensure_success(ProviderId::Seedream, &response, |_| None).unwrap_err();
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[tokio::test]
    async fn test_fetch_image_failures() {
        let transport = MockTransport::new();
        transport.push_get(Ok(HttpResponse::new(404, "missing")));
        let err = fetch_image(&transport, "https://cdn.example.com/a.png")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::DownloadFailed(_)));

        // queue exhausted: the transport reports a network failure
        let err = fetch_image(&transport, "https://cdn.example.com/b.png")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::DownloadFailed(_)));

        let bytes = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            png_base64(),
        )
        .unwrap();
        transport.push_get(Ok(HttpResponse::new(200, bytes.clone())));
        let image = fetch_image(&transport, "https://cdn.example.com/c.png")
            .await
            .unwrap();
        assert_eq!(image.bytes(), bytes.as_slice());
    }
}
