use serde::{Deserialize, Serialize};
use std::fmt;

/// The image backends a request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[default]
    Gemini,
    Seedream,
    DashScope,
    Jimeng,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Gemini,
        ProviderId::Seedream,
        ProviderId::DashScope,
        ProviderId::Jimeng,
    ];

    /// Maps a provider identifier to a variant. Unknown identifiers resolve to
    /// the default provider instead of failing.
    pub fn parse_or_default(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" | "nano-banana" => ProviderId::Gemini,
            "seedream" | "doubao" | "ark" => ProviderId::Seedream,
            "dashscope" | "qwen" | "qwen-image" => ProviderId::DashScope,
            "jimeng" | "volcengine" => ProviderId::Jimeng,
            other => {
                log::warn!(
                    "Unknown provider '{}', falling back to {}",
                    other,
                    ProviderId::default()
                );
                ProviderId::default()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::Seedream => "seedream",
            ProviderId::DashScope => "dashscope",
            ProviderId::Jimeng => "jimeng",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "Google Gemini",
            ProviderId::Seedream => "Doubao Seedream",
            ProviderId::DashScope => "Qwen Image (DashScope)",
            ProviderId::Jimeng => "Jimeng (Volcengine)",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QualityTier {
    #[serde(rename = "1K")]
    OneK,
    #[default]
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl QualityTier {
    /// Side length of the nominal square pixel budget for this tier.
    pub fn nominal_side(&self) -> u32 {
        match self {
            QualityTier::OneK => 1024,
            QualityTier::TwoK => 2048,
            QualityTier::FourK => 4096,
        }
    }

    pub fn nominal_pixels(&self) -> u64 {
        let side = self.nominal_side() as u64;
        side * side
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::OneK => "1K",
            QualityTier::TwoK => "2K",
            QualityTier::FourK => "4K",
        }
    }
}

/// Which model family of a provider to use. Each provider maps the variant to
/// its own model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    #[default]
    Standard,
    Pro,
}

/// Requested aspect ratio: one of the named ratios or a raw `"W:H"` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[default]
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "3:2")]
    Photo,
    #[serde(rename = "2:3")]
    PhotoPortrait,
    #[serde(rename = "21:9")]
    Ultrawide,
    #[serde(rename = "custom")]
    Custom(String),
}

impl AspectRatio {
    pub const NAMED: [AspectRatio; 8] = [
        AspectRatio::Square,
        AspectRatio::Widescreen,
        AspectRatio::Vertical,
        AspectRatio::Standard,
        AspectRatio::Portrait,
        AspectRatio::Photo,
        AspectRatio::PhotoPortrait,
        AspectRatio::Ultrawide,
    ];

    /// Never fails: known labels map to named variants, everything else is
    /// kept verbatim as a custom ratio.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        Self::NAMED
            .iter()
            .find(|named| named.label() == trimmed)
            .cloned()
            .unwrap_or_else(|| AspectRatio::Custom(trimmed.to_string()))
    }

    /// Label as sent to providers, e.g. `"16:9"`. Custom ratios return the
    /// raw string the caller supplied.
    pub fn label(&self) -> &str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Standard => "4:3",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Photo => "3:2",
            AspectRatio::PhotoPortrait => "2:3",
            AspectRatio::Ultrawide => "21:9",
            AspectRatio::Custom(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything a provider needs to render one slide background.
///
/// Images are base64 strings already encoded by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub style_description: String,
    pub color_scheme: String,
    pub design_requirements: String,
    pub slide_content: String,
    pub reference_image: Option<String>,
    pub slide_image: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub quality_tier: QualityTier,
    pub model_variant: ModelVariant,
    pub provider_id: ProviderId,
}

impl GenerationRequest {
    pub fn new(slide_content: impl Into<String>) -> Self {
        Self {
            slide_content: slide_content.into(),
            ..Default::default()
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style_description = style.into();
        self
    }

    pub fn with_color_scheme(mut self, colors: impl Into<String>) -> Self {
        self.color_scheme = colors.into();
        self
    }

    pub fn with_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.design_requirements = requirements.into();
        self
    }

    pub fn with_reference_image(mut self, base64: impl Into<String>) -> Self {
        self.reference_image = Some(base64.into());
        self
    }

    pub fn with_slide_image(mut self, base64: impl Into<String>) -> Self {
        self.slide_image = Some(base64.into());
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_quality(mut self, tier: QualityTier) -> Self {
        self.quality_tier = tier;
        self
    }

    pub fn with_model(mut self, variant: ModelVariant) -> Self {
        self.model_variant = variant;
        self
    }

    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.provider_id = provider;
        self
    }

    /// Reference and slide images that are present and non-empty, in that
    /// order.
    pub fn attached_images(&self) -> Vec<&str> {
        [&self.reference_image, &self.slide_image]
            .into_iter()
            .filter_map(|image| image.as_deref())
            .filter(|image| !image.trim().is_empty())
            .collect()
    }
}
