use anyhow::{bail, Result};
use gate_service::channel::spawn_channel;
use gate_service::config::GateConfig;
use gate_service::reporter::{HttpLedgerReporter, LedgerReporter, LogReporter};
use gate_service::source::HttpSnapshotSource;
use plate_engine::arbiter::{Arbiter, ArbiterConfig};
use plate_engine::debounce::DebounceGate;
use plate_engine::detector::HttpDetector;
use plate_engine::ocr::{HttpVisionBackend, OcrBackend, OcrChain, TesseractBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::logging::init_with_service("gate-service");

    info!("Starting gate service...");

    let config = GateConfig::from_env()?;
    info!(
        "Gate configuration: detector={}, backends={:?}, channels={}",
        config.detector_url,
        config.ocr_backends,
        config.channels.len()
    );

    let detector = HttpDetector::new(
        config.detector_url.clone(),
        config.detector_conf_floor,
        config.detector_retry_scale,
        HTTP_TIMEOUT,
    )?;

    let mut backends: Vec<Box<dyn OcrBackend>> = Vec::new();
    for name in &config.ocr_backends {
        match name.as_str() {
            "http-vision" => {
                let url = config
                    .vision_ocr_url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("VISION_OCR_URL not set"))?;
                backends.push(Box::new(HttpVisionBackend::new(url, config.ocr_timeout)?));
            }
            "tesseract" => {
                backends.push(Box::new(TesseractBackend::new(
                    config.tesseract_bin.clone(),
                )));
            }
            other => bail!("unknown OCR backend '{other}'"),
        }
    }
    let chain = OcrChain::new(backends, config.ocr_min_conf, config.ocr_timeout);

    let arbiter = Arc::new(Arbiter::new(
        Box::new(detector),
        chain,
        config.normalize_rules.clone(),
        ArbiterConfig {
            min_composite_score: config.min_composite_score,
            early_exit_ceiling: config.early_exit_ceiling,
            min_crop_dim: config.min_crop_dim,
        },
    ));
    let debounce = Arc::new(DebounceGate::new(config.debounce_cooldown));

    let reporter: Arc<dyn LedgerReporter> = match &config.ledger_url {
        Some(url) => {
            info!("Reporting plate events to ledger at {}", url);
            Arc::new(HttpLedgerReporter::new(
                url,
                config.ledger_token.clone(),
                HTTP_TIMEOUT,
            )?)
        }
        None => {
            info!("No LEDGER_URL configured, events will only be logged");
            Arc::new(LogReporter)
        }
    };

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();
    for channel in &config.channels {
        info!(channel = %channel.id, url = %channel.snapshot_url, "starting channel");
        let source = Arc::new(HttpSnapshotSource::new(
            channel.id.clone(),
            channel.snapshot_url.clone(),
            HTTP_TIMEOUT,
        )?);
        handles.push(spawn_channel(
            channel.id.clone(),
            source,
            arbiter.clone(),
            debounce.clone(),
            reporter.clone(),
            config.capture_interval,
            shutdown.clone(),
        ));
    }

    shutdown_signal().await;
    info!("Shutting down gracefully...");
    shutdown.cancel();
    for handle in handles {
        let _ = handle.producer.await;
        let _ = handle.worker.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
