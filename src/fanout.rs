//! Issues several single-image calls concurrently and aggregates the results.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

use crate::error::{ProviderError, Result};
use crate::logger::Timer;
use crate::models::{GeneratedImage, VariationResult};

/// Default gap between the starts of consecutive variant calls.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(300);

/// Launches `count` calls of `generate_one`, call `i` starting after
/// `stagger * i`. All calls are in flight together and results are collected
/// in launch order.
///
/// Succeeds when at least one image came back. If every call failed, the
/// error of the first launched call is returned.
pub async fn generate_variations<F, Fut>(
    count: usize,
    stagger: Duration,
    generate_one: F,
) -> Result<VariationResult>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<GeneratedImage>>,
{
    if count == 0 {
        return Err(ProviderError::EmptyResult("no variations requested".into()));
    }

    let _timer = Timer::new(&format!("{} variation(s)", count));
    let generate_one = &generate_one;

    let calls = (0..count).map(|index| async move {
        let offset = launch_offset(stagger, index);
        if !offset.is_zero() {
            tokio::time::sleep(offset).await;
        }
        log::debug!("Starting variation {}/{}", index + 1, count);
        let outcome = generate_one(index).await;
        if let Err(e) = &outcome {
            log::warn!("Variation {}/{} failed: {}", index + 1, count, e);
        }
        outcome
    });

    let mut result = VariationResult::default();
    for outcome in join_all(calls).await {
        match outcome {
            Ok(image) => result.images.push(image),
            Err(e) => result.errors.push(e),
        }
    }

    log::info!(
        "Variations finished: {} succeeded, {} failed",
        result.images.len(),
        result.errors.len()
    );

    if result.images.is_empty() {
        return Err(result
            .errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ProviderError::EmptyResult("no images generated".into())));
    }
    Ok(result)
}

/// Delay before call `index` starts. Saturates instead of wrapping.
fn launch_offset(stagger: Duration, index: usize) -> Duration {
    stagger.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
}
