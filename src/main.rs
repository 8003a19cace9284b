use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gesture_jump::{
    Config, FistClassifier, FrameProcessor, GestureService, ProviderPool,
    model_download::{ModelKind, ensure_model_ready},
    pipeline::create_ort_provider,
    server,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let provider_config = config.provider_config();

    for (kind, path) in [
        (
            ModelKind::HandposeEstimator,
            &provider_config.handpose_model_path,
        ),
        (
            ModelKind::PalmDetector,
            &provider_config.palm_detector_model_path,
        ),
    ] {
        ensure_model_ready(kind, path, |evt| log::debug!("model store: {evt:?}"))
            .with_context(|| format!("failed to prepare {} model", kind.label()))?;
    }

    let providers = (0..config.providers)
        .map(|_| create_ort_provider(&provider_config))
        .collect::<Result<Vec<_>>>()?;
    let pool = ProviderPool::new(providers, config.checkout_timeout());
    log::info!(
        "{} landmark provider(s) ready, fist thresholds {:?}",
        pool.size(),
        config.thresholds()
    );

    let processor = FrameProcessor::new(pool, FistClassifier::new(config.thresholds()));
    let service = Arc::new(GestureService::new(processor, &config.static_dir));

    log::info!("starting gesture jump server");
    server::serve(service, &config.bind, config.workers as usize)?;

    log::info!("server stopped, releasing landmark providers");
    Ok(())
}
