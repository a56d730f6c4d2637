//! Shared contracts for the plate recognition pipeline.
//!
//! Everything that crosses a component boundary lives here: decoded frames,
//! detector candidates, OCR hypotheses, scored candidates and the final
//! per-frame recognition result.

use crate::error::EngineError;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

/// A decoded raster image for one recognition cycle.
///
/// Produced by an external capture collaborator and owned transiently; the
/// engine never mutates it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Logical gate/channel this frame came from (e.g. "entry", "exit")
    pub channel_id: String,

    /// Monotonic per-channel frame sequence number
    pub sequence: u64,

    /// Capture timestamp (Unix timestamp in milliseconds)
    pub timestamp_ms: u64,

    /// Decoded pixel data
    pub image: RgbImage,
}

impl Frame {
    /// Decode raw image bytes (JPEG/PNG) into a frame.
    ///
    /// Undecodable input is a `Decode` error, distinct from "no candidates".
    pub fn decode(
        channel_id: impl Into<String>,
        sequence: u64,
        timestamp_ms: u64,
        bytes: &[u8],
    ) -> Result<Self, EngineError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| EngineError::Decode(e.to_string()))?
            .to_rgb8();
        Ok(Self {
            channel_id: channel_id.into(),
            sequence,
            timestamp_ms,
            image,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Axis-aligned box in corner form, clipped to frame bounds.
///
/// Invariant: x2 > x1 and y2 > y1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Clip to the given frame extent, discarding degenerate boxes.
    pub fn clip(x1: i64, y1: i64, x2: i64, y2: i64, width: u32, height: u32) -> Option<Self> {
        let x1 = x1.clamp(0, width as i64) as u32;
        let y1 = y1.clamp(0, height as i64) as u32;
        let x2 = x2.clamp(0, width as i64) as u32;
        let y2 = y2.clamp(0, height as i64) as u32;
        if x2 > x1 && y2 > y1 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// One candidate plate region reported by the detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRegion {
    pub bbox: BoundingBox,

    /// Detector confidence (0.0 to 1.0)
    pub detection_confidence: f32,
}

/// A named deterministic transform of a candidate crop, fed to OCR.
///
/// Reproducible from the source crop plus the transform name; owned for the
/// duration of one OCR attempt.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Transform identity (e.g. "gray-otsu", "original")
    pub name: &'static str,

    pub image: DynamicImage,
}

/// Raw text produced by one OCR backend for one processed image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrHypothesis {
    pub raw_text: String,

    /// Backend confidence (0.0 to 1.0)
    pub ocr_confidence: f32,

    /// Which backend produced the text
    pub backend_name: String,

    /// Which preprocessing variant the backend saw
    pub preprocessing: String,
}

/// Canonicalized plate text plus its grammar score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPlate {
    /// "REGION NUMBER SUFFIX" on a grammar match, cleaned verbatim text
    /// otherwise
    pub canonical_text: String,

    /// Pattern scorer output (>= 0)
    pub pattern_score: f64,
}

/// The unit ranked by the arbiter: one fully-scored hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub normalized: NormalizedPlate,

    /// detection_confidence x ocr_confidence x pattern_score
    pub composite_score: f64,

    pub bbox: BoundingBox,
    pub detection_confidence: f32,
    pub ocr_confidence: f32,
    pub backend_name: String,
    pub preprocessing_name: String,
}

/// Final engine output for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecognitionResult {
    /// A single best hypothesis cleared the acceptance floor.
    Match {
        plate: String,
        confidence: f64,
        evidence: ScoredCandidate,
    },

    /// No hypothesis cleared the floor. Carries every raw text the OCR
    /// chain produced, for operator diagnosis.
    NoMatch { attempted: Vec<String> },
}

impl RecognitionResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }
}

/// Payload delivered to the external ledger service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateEvent {
    pub plate: String,
    pub channel_id: String,

    /// Unix timestamp in milliseconds
    pub timestamp_ms: u64,

    /// Optional JPEG evidence, base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_clip_to_frame() {
        let bbox = BoundingBox::clip(-10, -5, 120, 60, 100, 50).unwrap();
        assert_eq!(bbox, BoundingBox { x1: 0, y1: 0, x2: 100, y2: 50 });
        assert_eq!(bbox.area(), 5000);
    }

    #[test]
    fn test_bbox_clip_rejects_degenerate() {
        // Fully outside the frame collapses to a zero-width box
        assert!(BoundingBox::clip(200, 10, 300, 20, 100, 50).is_none());
        // Inverted corners
        assert!(BoundingBox::clip(50, 10, 40, 20, 100, 50).is_none());
    }

    #[test]
    fn test_frame_decode_rejects_garbage() {
        let err = Frame::decode("entry", 1, 0, b"not an image").unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[test]
    fn test_frame_decode_valid_png() {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();

        let frame = Frame::decode("entry", 7, 123, bytes.get_ref()).unwrap();
        assert_eq!(frame.width(), 8);
        assert_eq!(frame.sequence, 7);
    }

    #[test]
    fn test_recognition_result_serialization() {
        let result = RecognitionResult::NoMatch {
            attempted: vec!["B I387".to_string()],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("no_match"));

        let back: RecognitionResult = serde_json::from_str(&json).unwrap();
        assert!(!back.is_match());
    }

    #[test]
    fn test_plate_event_omits_empty_image() {
        let event = PlateEvent {
            plate: "B 1387 DKC".to_string(),
            channel_id: "entry".to_string(),
            timestamp_ms: 1700000000000,
            image_base64: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("image_base64"));
    }
}
