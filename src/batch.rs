//! Sequential generation over a deck of slides.

use std::future::Future;
use std::sync::Arc;

use crate::{
    config::{Credentials, GenerationConfig},
    error::{ProviderError, Result},
    logger::Timer,
    models::{JobUpdate, ProviderId, SlideJob, VariationResult},
    providers::{
        select_provider_with_transport, HttpTransport, ImageProvider, ReqwestTransport,
    },
};

/// What to do with the remaining jobs once one has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    #[default]
    ContinueOnError,
    StopOnError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs that were not pending, plus those left untouched after a stop.
    pub skipped: usize,
}

/// Runs every pending job strictly one after another.
///
/// For each job `on_update` receives `Generating` and then either
/// `Succeeded` or `Failed`. The caller owns the job list and applies the
/// updates itself.
pub async fn run_batch<G, Fut, U>(
    jobs: &[SlideJob],
    mode: BatchMode,
    mut generate: G,
    mut on_update: U,
) -> BatchSummary
where
    G: FnMut(SlideJob) -> Fut,
    Fut: Future<Output = Result<VariationResult>>,
    U: FnMut(&str, JobUpdate),
{
    let _timer = Timer::new("batch");
    let mut summary = BatchSummary::default();
    let mut stopped = false;

    for job in jobs {
        if stopped || !job.is_pending() {
            summary.skipped += 1;
            continue;
        }

        summary.attempted += 1;
        log::info!(
            "Generating {} variant(s) for slide {} ({}/{})",
            job.variant_count,
            job.id,
            summary.attempted,
            jobs.len()
        );
        on_update(&job.id, JobUpdate::Generating);

        match generate(job.clone()).await {
            Ok(result) if result.is_success() => {
                if !result.errors.is_empty() {
                    log::warn!(
                        "Slide {}: {} of {} variant(s) failed",
                        job.id,
                        result.errors.len(),
                        result.errors.len() + result.images.len()
                    );
                }
                summary.succeeded += 1;
                on_update(&job.id, JobUpdate::Succeeded(result.images));
            }
            outcome => {
                let error = match outcome {
                    Err(error) => error,
                    Ok(_) => ProviderError::EmptyResult("no variants were produced".into()),
                };
                log::error!("Slide {} failed: {}", job.id, error);
                summary.failed += 1;
                on_update(&job.id, JobUpdate::Failed(error.user_message()));
                if mode == BatchMode::StopOnError {
                    log::warn!("Stopping batch after failure of slide {}", job.id);
                    stopped = true;
                }
            }
        }
    }

    log::info!(
        "Batch finished: {} succeeded, {} failed, {} skipped",
        summary.succeeded,
        summary.failed,
        summary.skipped
    );
    summary
}

/// Picks the provider named by each job and runs its variations through one
/// shared HTTP transport.
pub struct SlideGenerator {
    credentials: Credentials,
    config: GenerationConfig,
    transport: Arc<dyn HttpTransport>,
}

impl SlideGenerator {
    pub fn new(credentials: Credentials, config: GenerationConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        Ok(Self::with_transport(credentials, config, transport))
    }

    pub fn with_transport(
        credentials: Credentials,
        config: GenerationConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            credentials,
            config,
            transport,
        }
    }

    pub fn provider(&self, id: ProviderId) -> Result<Arc<dyn ImageProvider>> {
        select_provider_with_transport(id, &self.credentials, &self.config, self.transport.clone())
    }

    pub async fn generate_for_job(&self, job: &SlideJob) -> Result<VariationResult> {
        let provider = self.provider(job.request.provider_id)?;
        provider
            .generate_variations(&job.request, job.variant_count)
            .await
    }

    pub async fn run<U>(&self, jobs: &[SlideJob], mode: BatchMode, on_update: U) -> BatchSummary
    where
        U: FnMut(&str, JobUpdate),
    {
        run_batch(
            jobs,
            mode,
            |job| async move { self.generate_for_job(&job).await },
            on_update,
        )
        .await
    }
}
