//! Region detector boundary.
//!
//! Detection runs in a separate inference service; this module owns only the
//! trait and the candidate ordering shared by every implementation.

pub mod http;

use async_trait::async_trait;
use common::plates::{CandidateRegion, Frame};
use common::EngineError;

pub use http::HttpDetector;

/// Finds candidate plate regions in a full frame.
///
/// Implementations return regions already clipped to the frame bounds, with
/// zero-area boxes discarded. An empty vec is a valid answer, not an error.
#[async_trait]
pub trait PlateDetector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn detect(&self, frame: &Frame) -> Result<Vec<CandidateRegion>, EngineError>;
}

/// Fix the processing order for a detection batch: confidence descending,
/// ties broken by smaller area first (tighter boxes crop less background).
pub fn order_candidates(candidates: &mut [CandidateRegion]) {
    candidates.sort_by(|a, b| {
        b.detection_confidence
            .total_cmp(&a.detection_confidence)
            .then_with(|| a.bbox.area().cmp(&b.bbox.area()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::plates::BoundingBox;

    fn region(conf: f32, x2: u32, y2: u32) -> CandidateRegion {
        CandidateRegion {
            bbox: BoundingBox {
                x1: 0,
                y1: 0,
                x2,
                y2,
            },
            detection_confidence: conf,
        }
    }

    #[test]
    fn test_order_by_confidence_desc() {
        let mut candidates = vec![region(0.5, 10, 10), region(0.9, 10, 10), region(0.7, 10, 10)];
        order_candidates(&mut candidates);
        let confs: Vec<f32> = candidates.iter().map(|c| c.detection_confidence).collect();
        assert_eq!(confs, vec![0.9, 0.7, 0.5]);
    }

    #[test]
    fn test_ties_prefer_smaller_area() {
        let mut candidates = vec![region(0.8, 100, 40), region(0.8, 50, 20)];
        order_candidates(&mut candidates);
        assert_eq!(candidates[0].bbox.area(), 1000);
        assert_eq!(candidates[1].bbox.area(), 4000);
    }
}
