//! Slide background generation across several image providers.
//!
//! A [`GenerationRequest`] describes one slide. [`select_provider`] turns a
//! [`ProviderId`] into an [`ImageProvider`], which produces one image with
//! retries or several variations concurrently. [`SlideGenerator`] runs a whole
//! deck of [`SlideJob`]s one after another.

pub mod batch;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod fanout;
pub mod logger;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod retry;

pub use batch::{run_batch, BatchMode, BatchSummary, SlideGenerator};
pub use config::{
    Credentials, DashScopeConfig, GeminiConfig, GenerationConfig, JimengConfig, SeedreamConfig,
};
pub use error::{ErrorKind, ProviderError, Result};
pub use models::{
    AspectRatio, GeneratedImage, GenerationRequest, ImageFormat, JobStatus, JobUpdate,
    ModelVariant, ProviderId, QualityTier, SlideJob, VariationResult,
};
pub use providers::{select_provider, select_provider_by_name, ImageProvider};
pub use retry::RetryPolicy;
