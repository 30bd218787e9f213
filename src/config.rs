use std::env;
use std::time::Duration;

use crate::fanout::DEFAULT_STAGGER;
use crate::retry::RetryPolicy;

pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const ARK_DEFAULT_ENDPOINT: &str = "https://ark.cn-beijing.volces.com";
pub const DASHSCOPE_DEFAULT_ENDPOINT: &str = "https://dashscope.aliyuncs.com";
pub const JIMENG_DEFAULT_ENDPOINT: &str = "https://visual.volcengineapi.com";
pub const JIMENG_DEFAULT_REGION: &str = "cn-north-1";

fn env_flag(name: &str) -> bool {
    env::var(name)
        .ok()
        .map_or(false, |val| matches!(val.trim(), "true" | "1" | "yes"))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Routed base URL used instead of the direct endpoint when `use_proxy`
    /// is set.
    pub proxy_base_url: Option<String>,
    pub use_proxy: bool,
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        GeminiConfig {
            api_key: env::var("GEMINI_API_KEY").ok(),
            base_url: env::var("GEMINI_BASE_URL").ok(),
            proxy_base_url: env::var("GEMINI_PROXY_URL").ok(),
            use_proxy: env_flag("GEMINI_USE_PROXY"),
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_proxy(mut self, proxy_base_url: impl Into<String>) -> Self {
        self.proxy_base_url = Some(proxy_base_url.into());
        self.use_proxy = true;
        self
    }

    /// Base URL requests go to: the proxy when enabled and set, otherwise the
    /// configured or default direct endpoint.
    pub fn resolved_base_url(&self) -> String {
        let direct = non_empty(&self.base_url).unwrap_or(GEMINI_DEFAULT_BASE_URL);
        let base = match non_empty(&self.proxy_base_url) {
            Some(proxy) if self.use_proxy => proxy,
            _ => direct,
        };
        base.trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeedreamConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

impl SeedreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        SeedreamConfig {
            api_key: env::var("ARK_API_KEY").ok(),
            endpoint: env::var("ARK_ENDPOINT").ok(),
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn resolved_endpoint(&self) -> String {
        non_empty(&self.endpoint)
            .unwrap_or(ARK_DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashScopeConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

impl DashScopeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        DashScopeConfig {
            api_key: env::var("DASHSCOPE_API_KEY").ok(),
            endpoint: env::var("DASHSCOPE_ENDPOINT").ok(),
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn resolved_endpoint(&self) -> String {
        non_empty(&self.endpoint)
            .unwrap_or(DASHSCOPE_DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct JimengConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
}

impl JimengConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        JimengConfig {
            access_key: env::var("JIMENG_ACCESS_KEY").ok(),
            secret_key: env::var("JIMENG_SECRET_KEY").ok(),
            endpoint: env::var("JIMENG_ENDPOINT").ok(),
            region: env::var("JIMENG_REGION").ok(),
        }
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn resolved_endpoint(&self) -> String {
        non_empty(&self.endpoint)
            .unwrap_or(JIMENG_DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn resolved_region(&self) -> String {
        non_empty(&self.region)
            .unwrap_or(JIMENG_DEFAULT_REGION)
            .to_string()
    }
}

/// Credential bundle for every provider. Passed explicitly to the provider
/// selector; nothing is read from global state.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub gemini: GeminiConfig,
    pub seedream: SeedreamConfig,
    pub dashscope: DashScopeConfig,
    pub jimeng: JimengConfig,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Credentials {
            gemini: GeminiConfig::from_env(),
            seedream: SeedreamConfig::from_env(),
            dashscope: DashScopeConfig::from_env(),
            jimeng: JimengConfig::from_env(),
        }
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn with_seedream(mut self, config: SeedreamConfig) -> Self {
        self.seedream = config;
        self
    }

    pub fn with_dashscope(mut self, config: DashScopeConfig) -> Self {
        self.dashscope = config;
        self
    }

    pub fn with_jimeng(mut self, config: JimengConfig) -> Self {
        self.jimeng = config;
        self
    }
}

/// Tuning knobs shared by all providers.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub retry: RetryPolicy,
    /// Gap between the starts of consecutive variant calls.
    pub stagger: Duration,
    /// Upper bound for one HTTP exchange. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            retry: RetryPolicy::default(),
            stagger: DEFAULT_STAGGER,
            request_timeout: Some(Duration::from_secs(180)),
        }
    }
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(attempts) = env::var("SLIDEGEN_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            config.retry = config.retry.with_max_attempts(attempts);
        }
        if let Some(ms) = env::var("SLIDEGEN_STAGGER_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.stagger = Duration::from_millis(ms);
        }
        if let Some(secs) = env::var("SLIDEGEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.request_timeout = if secs == 0 {
                None
            } else {
                Some(Duration::from_secs(secs))
            };
        }
        config
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}
