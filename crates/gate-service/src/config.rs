use anyhow::{bail, Context, Result};
use plate_engine::debounce::DEFAULT_COOLDOWN;
use plate_engine::normalize::NormalizeRules;
use plate_engine::preprocess::DEFAULT_MIN_CROP_DIM;
use std::env;
use std::time::Duration;

/// One capture channel (a camera pointing at a gate lane).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Logical channel name, e.g. "entry" or "exit"
    pub id: String,

    /// Snapshot endpoint returning one JPEG per request
    pub snapshot_url: String,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Detection inference service endpoint
    pub detector_url: String,

    /// Detector confidence floor
    pub detector_conf_floor: f32,

    /// Relaxed-floor multiplier applied when the floor filters out every box
    pub detector_retry_scale: Option<f32>,

    /// OCR backends in priority order, e.g. ["http-vision", "tesseract"]
    pub ocr_backends: Vec<String>,

    /// OCR confidence floor
    pub ocr_min_conf: f32,

    /// Per-backend OCR call timeout
    pub ocr_timeout: Duration,

    /// Hosted vision OCR endpoint (required when that backend is enabled)
    pub vision_ocr_url: Option<String>,

    /// Tesseract executable path
    pub tesseract_bin: String,

    /// Grammar bounds plus the confusion table
    pub normalize_rules: NormalizeRules,

    /// Composite score a candidate must reach to become a Match
    pub min_composite_score: f64,

    /// Optional early-exit composite ceiling
    pub early_exit_ceiling: Option<f64>,

    /// Crops below this on their larger side get upscaled
    pub min_crop_dim: u32,

    /// Same-plate cooldown per channel
    pub debounce_cooldown: Duration,

    /// Ledger service base URL (events are POSTed to {base}/anpr/result)
    pub ledger_url: Option<String>,

    /// Bearer token for the ledger service
    pub ledger_token: Option<String>,

    /// Capture channels
    pub channels: Vec<ChannelConfig>,

    /// Delay between snapshot requests per channel
    pub capture_interval: Duration,
}

impl GateConfig {
    pub fn from_env() -> Result<Self> {
        let detector_url = env::var("DETECTOR_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8090/detect".to_string());

        let detector_conf_floor = parse_var("DETECTOR_CONF_FLOOR", 0.45f32)?;
        let detector_retry_scale = env::var("DETECTOR_RETRY_SCALE")
            .ok()
            .map(|s| s.parse::<f32>().context("Invalid DETECTOR_RETRY_SCALE"))
            .transpose()?;

        let ocr_backends: Vec<String> = env::var("OCR_BACKENDS")
            .unwrap_or_else(|_| "http-vision,tesseract".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if ocr_backends.is_empty() {
            bail!("OCR_BACKENDS must name at least one backend");
        }

        let ocr_min_conf = parse_var("OCR_MIN_CONF", 0.0f32)?;
        let ocr_timeout = Duration::from_secs(parse_var("OCR_TIMEOUT_SECS", 10u64)?);
        let vision_ocr_url = env::var("VISION_OCR_URL").ok();
        if ocr_backends.iter().any(|b| b == "http-vision") && vision_ocr_url.is_none() {
            bail!("VISION_OCR_URL is required when the http-vision backend is enabled");
        }
        let tesseract_bin =
            env::var("TESSERACT_BIN").unwrap_or_else(|_| "tesseract".to_string());

        // Grammar bounds as "REGION,NUMBER,SUFFIX" max lengths, e.g. "2,4,3"
        let (region_len, number_len, suffix_len) = match env::var("PLATE_GRAMMAR") {
            Ok(spec) => parse_grammar(&spec).context("Invalid PLATE_GRAMMAR")?,
            Err(_) => (2, 4, 3),
        };
        let normalize_rules = match env::var("CONFUSION_TABLE") {
            Ok(spec) => {
                NormalizeRules::with_confusion_spec(region_len, number_len, suffix_len, &spec)
                    .context("Invalid CONFUSION_TABLE")?
            }
            Err(_) => NormalizeRules::new(
                region_len,
                number_len,
                suffix_len,
                plate_engine::normalize::DEFAULT_CONFUSIONS,
            ),
        };

        let min_composite_score = parse_var("MIN_COMPOSITE_SCORE", 1.0f64)?;
        let early_exit_ceiling = env::var("EARLY_EXIT_CEILING")
            .ok()
            .map(|s| s.parse::<f64>().context("Invalid EARLY_EXIT_CEILING"))
            .transpose()?;
        let min_crop_dim = parse_var("MIN_CROP_DIM", DEFAULT_MIN_CROP_DIM)?;

        let debounce_cooldown = match env::var("DEBOUNCE_COOLDOWN_SECS") {
            Ok(s) => Duration::from_secs(
                s.parse::<u64>().context("Invalid DEBOUNCE_COOLDOWN_SECS")?,
            ),
            Err(_) => DEFAULT_COOLDOWN,
        };

        let ledger_url = env::var("LEDGER_URL").ok();
        let ledger_token = env::var("LEDGER_TOKEN").ok();

        let channel_ids: Vec<String> = env::var("CHANNELS")
            .unwrap_or_else(|_| "entry".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let mut channels = Vec::with_capacity(channel_ids.len());
        for id in channel_ids {
            let var = format!("SNAPSHOT_URL_{}", id.to_uppercase());
            let snapshot_url =
                env::var(&var).with_context(|| format!("{var} is required for channel '{id}'"))?;
            channels.push(ChannelConfig { id, snapshot_url });
        }

        let capture_interval = Duration::from_secs(parse_var("CAPTURE_INTERVAL_SECS", 1u64)?);

        Ok(Self {
            detector_url,
            detector_conf_floor,
            detector_retry_scale,
            ocr_backends,
            ocr_min_conf,
            ocr_timeout,
            vision_ocr_url,
            tesseract_bin,
            normalize_rules,
            min_composite_score,
            early_exit_ceiling,
            min_crop_dim,
            debounce_cooldown,
            ledger_url,
            ledger_token,
            channels,
            capture_interval,
        })
    }
}

fn parse_grammar(spec: &str) -> Result<(usize, usize, usize)> {
    let parts: Vec<usize> = spec
        .split(',')
        .map(|p| p.trim().parse::<usize>().context("grammar bound is not a number"))
        .collect::<Result<_>>()?;
    let &[region, number, suffix] = parts.as_slice() else {
        bail!("expected three comma-separated bounds, got {}", parts.len());
    };
    if region == 0 || number == 0 {
        bail!("REGION and NUMBER bounds must be at least 1");
    }
    Ok((region, number, suffix))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(s) => s.parse::<T>().with_context(|| format!("Invalid {name}")),
        Err(_) => Ok(default),
    }
}
