//! Application entry point — real-time vowel detector.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Pick the model loader: [`SafetensorsLoader`] when learned mode has a
//!    model file, [`NoModelLoader`] otherwise so startup reports a clean
//!    error instead of panicking.
//! 5. Build the [`VowelDetector`] on the default microphone and subscribe
//!    console callbacks.
//! 6. Start listening and tick until Ctrl-C.
//! 7. Optionally print the diagnostics snapshot as JSON.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use vowel_detect::{
    audio::CpalSource,
    config::{AppConfig, DetectorMode},
    model::{ModelLoader, NoModelLoader, SafetensorsLoader},
    pipeline::VowelDetector,
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("vowel detector starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let detector_cfg = config.detector.clone();

    // 3. Tokio runtime (the detector owns a !Send cpal stream, so it is
    //    driven with block_on on this thread)
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Model loader
    let loader: Arc<dyn ModelLoader> = match detector_cfg.mode {
        DetectorMode::Learned => {
            let path = detector_cfg.resolved_model_path();
            if path.exists() {
                Arc::new(SafetensorsLoader)
            } else {
                log::warn!("Model file {} not found", path.display());
                Arc::new(NoModelLoader)
            }
        }
        DetectorMode::Spectral => Arc::new(NoModelLoader),
    };

    // 5. Detector + subscribers
    let source = CpalSource::new(Some(detector_cfg.sample_rate));
    let mut detector = VowelDetector::new(detector_cfg, Box::new(source), loader)
        .context("invalid detector settings")?;

    detector.on_vowel_detected(|vowel, result| {
        println!(
            "{vowel}  conf {:.2}  F1 {:>4.0} Hz  F2 {:>4.0} Hz  {:>6.1} dB",
            result.confidence, result.formants.f1, result.formants.f2, result.volume
        );
        let _ = std::io::stdout().flush();
    });
    detector.on_silence(|elapsed| log::debug!("silence for {} ms", elapsed.as_millis()));
    detector.on_silence_timeout(|elapsed| {
        println!("-- silence ({:.1} s) --", elapsed.as_secs_f32());
    });
    detector.on_error(|e| log::error!("{e}"));

    // 6. Listen until Ctrl-C
    rt.block_on(detector.start())
        .context("could not start the vowel detector")?;
    println!("Listening ({} mode). Press Ctrl-C to stop.", detector.config().mode.as_str());

    rt.block_on(detector.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    }));

    // 7. Diagnostics
    if config.diagnostics_on_exit {
        let json = serde_json::to_string_pretty(&detector.diagnostics())?;
        println!("{json}");
    }

    detector.reset();
    log::info!("vowel detector shut down");
    Ok(())
}
