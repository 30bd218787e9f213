use std::fmt;
use thiserror::Error;

use crate::models::ProviderId;

/// Coarse classification of a [`ProviderError`], useful for callers that only
/// need to branch on the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    RequestFailed,
    EmptyResult,
    NetworkUnavailable,
    DownloadFailed,
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::RequestFailed => "request_failed",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::NetworkUnavailable => "network_unavailable",
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("{provider} credentials missing: {message}")]
    Unauthenticated {
        provider: ProviderId,
        message: String,
    },

    #[error("{}", format_request_failed(.status, .message))]
    RequestFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("No image returned: {0}")]
    EmptyResult(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Image download failed: {0}")]
    DownloadFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn format_request_failed(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Request failed ({}): {}", code, message),
        None => format!("Request failed: {}", message),
    }
}

/// Message fragments that providers use for overload / throttling responses.
const TRANSIENT_MARKERS: &[&str] = &[
    "overloaded",
    "unavailable",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "throttl",
];

impl ProviderError {
    pub fn unauthenticated(provider: ProviderId, message: impl Into<String>) -> Self {
        ProviderError::Unauthenticated {
            provider,
            message: message.into(),
        }
    }

    pub fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        ProviderError::RequestFailed {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            ProviderError::RequestFailed { .. } => ErrorKind::RequestFailed,
            ProviderError::EmptyResult(_) => ErrorKind::EmptyResult,
            ProviderError::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            ProviderError::DownloadFailed(_) => ErrorKind::DownloadFailed,
            ProviderError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether another attempt has a reasonable chance of succeeding.
    ///
    /// Server overload (500/503), throttling (429 or a rate-limit message) and
    /// transport failures are transient. Credential, validation and payload
    /// problems are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RequestFailed { status, message } => {
                matches!(status, Some(429) | Some(500) | Some(503))
                    || has_transient_marker(message)
            }
            ProviderError::NetworkUnavailable(_) => true,
            ProviderError::Unauthenticated { .. }
            | ProviderError::EmptyResult(_)
            | ProviderError::DownloadFailed(_)
            | ProviderError::Serialization(_) => false,
        }
    }

    /// Short text for end users: missing credentials ask for configuration,
    /// anything else reads as a failed generation.
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::Unauthenticated { provider, .. } => format!(
                "Credentials for {} are missing. Add them in settings and try again.",
                provider.display_name()
            ),
            other => format!("Image generation failed: {}", other),
        }
    }
}

fn has_transient_marker(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
