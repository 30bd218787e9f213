use slidegen::logger::{self, LoggerConfig};
use slidegen::{
    AspectRatio, BatchMode, Credentials, GenerationConfig, GenerationRequest, JobStatus,
    ProviderId, QualityTier, SlideGenerator, SlideJob,
};
use std::env;
use std::fs;
use std::path::Path;

const OUTPUT_DIR: &str = "output";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded successfully"),
        Err(_) => log::warn!("⚠️  No .env file found, using system environment variables"),
    }

    logger::init_with_config(LoggerConfig::from_env())?;

    let provider = env::var("SLIDEGEN_PROVIDER")
        .map(|name| ProviderId::parse_or_default(&name))
        .unwrap_or_default();
    let aspect = AspectRatio::parse(&env::var("SLIDEGEN_ASPECT").unwrap_or_else(|_| "16:9".into()));
    let variants: usize = env::var("SLIDEGEN_VARIANTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2);

    let slides: Vec<String> = env::args().skip(1).collect();
    let slides = if slides.is_empty() {
        vec![
            "Welcome: product roadmap for the next quarter".to_string(),
            "Key metrics and growth highlights".to_string(),
        ]
    } else {
        slides
    };

    log::info!(
        "🖼️  Generating backgrounds for {} slide(s) with {} ({} variant(s) each, {})",
        slides.len(),
        provider.display_name(),
        variants,
        aspect
    );

    let mut jobs: Vec<SlideJob> = slides
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let request = GenerationRequest::new(content)
                .with_style("Clean corporate, soft gradients, generous negative space")
                .with_provider(provider)
                .with_aspect_ratio(aspect.clone())
                .with_quality(QualityTier::TwoK);
            SlideJob::new(request, variants).with_id(format!("slide-{}", i + 1))
        })
        .collect();

    let generator = SlideGenerator::new(Credentials::from_env(), GenerationConfig::from_env())?;
    let input = jobs.clone();
    let summary = generator
        .run(&input, BatchMode::ContinueOnError, |id, update| {
            if let Some(job) = jobs.iter_mut().find(|job| job.id == id) {
                job.apply(update);
            }
        })
        .await;

    fs::create_dir_all(OUTPUT_DIR)?;
    for job in &jobs {
        match job.status {
            JobStatus::Success => {
                for (i, image) in job.results.iter().enumerate() {
                    let path = Path::new(OUTPUT_DIR).join(format!(
                        "{}-{}.{}",
                        job.id,
                        i + 1,
                        image.format().extension()
                    ));
                    fs::write(&path, image.bytes())?;
                    log::info!("💾 Saved {} ({} bytes)", path.display(), image.len());
                }
            }
            _ => log::error!(
                "❌ {}: {}",
                job.id,
                job.error_message.as_deref().unwrap_or("not generated")
            ),
        }
    }

    log::info!(
        "🎉 Done: {} succeeded, {} failed, {} skipped",
        summary.succeeded,
        summary.failed,
        summary.skipped
    );
    Ok(())
}
