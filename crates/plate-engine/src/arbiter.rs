//! Per-frame candidate arbitration.
//!
//! Fans out detector regions through the preprocessing ensemble and the OCR
//! chain, scores every resulting hypothesis, and converges on at most one
//! plate string per frame.

use common::plates::{Frame, NormalizedPlate, RecognitionResult, ScoredCandidate};
use common::EngineError;
use image::imageops;
use tracing::{debug, info, warn};

use crate::detector::PlateDetector;
use crate::normalize::{normalize, NormalizeRules};
use crate::ocr::OcrChain;
use crate::preprocess;
use crate::score::PatternScorer;

#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Composite scores below this never produce a Match.
    pub min_composite_score: f64,

    /// When set, a candidate at or above this composite score stops the
    /// remaining region/variant work for the frame.
    pub early_exit_ceiling: Option<f64>,

    /// Crops with a larger side below this are upscaled before preprocessing.
    pub min_crop_dim: u32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            min_composite_score: 1.0,
            early_exit_ceiling: None,
            min_crop_dim: preprocess::DEFAULT_MIN_CROP_DIM,
        }
    }
}

pub struct Arbiter {
    detector: Box<dyn PlateDetector>,
    chain: OcrChain,
    rules: NormalizeRules,
    scorer: PatternScorer,
    config: ArbiterConfig,
}

impl Arbiter {
    pub fn new(
        detector: Box<dyn PlateDetector>,
        chain: OcrChain,
        rules: NormalizeRules,
        config: ArbiterConfig,
    ) -> Self {
        let scorer = PatternScorer::new(&rules);
        Self {
            detector,
            chain,
            rules,
            scorer,
            config,
        }
    }

    /// Run one full recognition cycle over a decoded frame.
    ///
    /// A detector outage degrades to `NoMatch` rather than an error; the
    /// frame is simply unrecognizable right now and the capture loop should
    /// keep going.
    pub async fn select(&self, frame: &Frame) -> Result<RecognitionResult, EngineError> {
        let regions = match self.detector.detect(frame).await {
            Ok(regions) => regions,
            Err(e @ EngineError::BackendUnavailable { .. }) => {
                warn!(channel = %frame.channel_id, error = %e, "detector unavailable");
                return Ok(RecognitionResult::NoMatch { attempted: vec![] });
            }
            Err(e) => return Err(e),
        };

        if regions.is_empty() {
            debug!(channel = %frame.channel_id, sequence = frame.sequence, "no candidate regions");
            return Ok(RecognitionResult::NoMatch { attempted: vec![] });
        }

        let mut best: Option<ScoredCandidate> = None;
        let mut attempted: Vec<String> = Vec::new();

        'regions: for region in &regions {
            let crop = imageops::crop_imm(
                &frame.image,
                region.bbox.x1,
                region.bbox.y1,
                region.bbox.width(),
                region.bbox.height(),
            )
            .to_image();
            let crop = preprocess::upscale(crop, self.config.min_crop_dim);

            for variant in preprocess::expand(&crop) {
                let outcome = self.chain.recognize(&variant).await;
                attempted.extend(outcome.attempted);
                let Some(hypothesis) = outcome.accepted else {
                    continue;
                };

                let canonical = normalize(&hypothesis.raw_text, &self.rules);
                if canonical.is_empty() {
                    continue;
                }
                let pattern_score = self.scorer.score(&canonical);
                let composite = f64::from(region.detection_confidence)
                    * f64::from(hypothesis.ocr_confidence)
                    * pattern_score;

                debug!(
                    channel = %frame.channel_id,
                    plate = %canonical,
                    variant = variant.name,
                    backend = %hypothesis.backend_name,
                    composite,
                    "scored hypothesis"
                );

                if best
                    .as_ref()
                    .map_or(true, |b| composite > b.composite_score)
                {
                    best = Some(ScoredCandidate {
                        normalized: NormalizedPlate {
                            canonical_text: canonical,
                            pattern_score,
                        },
                        composite_score: composite,
                        bbox: region.bbox,
                        detection_confidence: region.detection_confidence,
                        ocr_confidence: hypothesis.ocr_confidence,
                        backend_name: hypothesis.backend_name,
                        preprocessing_name: hypothesis.preprocessing,
                    });
                }

                if let Some(ceiling) = self.config.early_exit_ceiling {
                    if composite >= ceiling {
                        debug!(channel = %frame.channel_id, composite, "early exit");
                        break 'regions;
                    }
                }
            }
        }

        match best {
            Some(candidate) if candidate.composite_score >= self.config.min_composite_score => {
                info!(
                    channel = %frame.channel_id,
                    plate = %candidate.normalized.canonical_text,
                    composite = candidate.composite_score,
                    "plate recognized"
                );
                Ok(RecognitionResult::Match {
                    plate: candidate.normalized.canonical_text.clone(),
                    confidence: candidate.composite_score,
                    evidence: candidate,
                })
            }
            _ => {
                debug!(
                    channel = %frame.channel_id,
                    attempts = attempted.len(),
                    "no hypothesis cleared the acceptance floor"
                );
                Ok(RecognitionResult::NoMatch { attempted })
            }
        }
    }
}
