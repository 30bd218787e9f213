use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProviderError, Result};

/// Encoded image bytes as returned by a provider. No metadata is attached.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    bytes: Vec<u8>,
}

impl GeneratedImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Decodes a base64 payload. Data-URL prefixes (`data:image/png;base64,`)
    /// are accepted and stripped.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let payload = strip_data_url(encoded.trim());
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| ProviderError::EmptyResult(format!("invalid base64 image data: {}", e)))?;
        if bytes.is_empty() {
            return Err(ProviderError::EmptyResult("image payload is empty".into()));
        }
        Ok(Self { bytes })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Sniffs the container format from the leading magic bytes.
    pub fn format(&self) -> ImageFormat {
        match self.bytes.as_slice() {
            [0x89, b'P', b'N', b'G', ..] => ImageFormat::Png,
            [0xFF, 0xD8, 0xFF, ..] => ImageFormat::Jpeg,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => ImageFormat::Webp,
            _ => ImageFormat::Unknown,
        }
    }
}

impl fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("len", &self.bytes.len())
            .field("format", &self.format())
            .finish()
    }
}

/// Drops a `data:<mime>;base64,` prefix if present.
pub fn strip_data_url(value: &str) -> &str {
    if value.starts_with("data:") {
        if let Some((_, payload)) = value.split_once(',') {
            return payload;
        }
    }
    value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
    Unknown,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
            ImageFormat::Unknown => "bin",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Unknown => "application/octet-stream",
        }
    }
}

/// Outcome of a multi-variant generation. Both lists keep the launch order of
/// the calls that produced them.
#[derive(Debug, Clone, Default)]
pub struct VariationResult {
    pub images: Vec<GeneratedImage>,
    pub errors: Vec<ProviderError>,
}

impl VariationResult {
    pub fn is_success(&self) -> bool {
        !self.images.is_empty()
    }
}

/// Guesses the mime type of a base64 payload from its first decoded bytes,
/// defaulting to PNG.
pub fn sniff_mime(base64_payload: &str) -> &'static str {
    let payload = strip_data_url(base64_payload.trim());
    let format = match payload.get(..16).map(|head| STANDARD.decode(head)) {
        Some(Ok(prefix)) => GeneratedImage::from_bytes(prefix).format(),
        _ => ImageFormat::Unknown,
    };
    match format {
        ImageFormat::Unknown => ImageFormat::Png.mime_type(),
        known => known.mime_type(),
    }
}

/// Wraps a base64 payload as a data URL. Used for providers that take
/// reference images as URLs.
pub fn to_data_url(base64_payload: &str) -> String {
    let trimmed = base64_payload.trim();
    if trimmed.starts_with("data:") {
        return trimmed.to_string();
    }
    format!("data:{};base64,{}", sniff_mime(trimmed), trimmed)
}
