//! Plate recognition and normalization engine.
//!
//! Takes candidate plate regions from a detector, runs each through a set of
//! deterministic preprocessing variants and an ordered chain of OCR backends,
//! normalizes and scores every text hypothesis against the plate grammar, and
//! converges on a single best plate string per frame. Also owns per-channel
//! debouncing so one lingering vehicle does not produce duplicate events.

pub mod arbiter;
pub mod debounce;
pub mod detector;
pub mod normalize;
pub mod ocr;
pub mod preprocess;
pub mod score;

pub use arbiter::{Arbiter, ArbiterConfig};
pub use debounce::DebounceGate;
pub use detector::PlateDetector;
pub use normalize::{normalize, NormalizeRules};
pub use ocr::{OcrBackend, OcrChain};
pub use score::PatternScorer;
