use thiserror::Error;

/// Failure modes of a single recognition cycle.
///
/// Zero detected candidates and unparseable OCR text are *not* errors: they
/// resolve to a `NoMatch` result or a low-scoring fallback candidate. Only
/// the cases below abort or degrade a cycle, and none of them may terminate
/// the enclosing process.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The input frame could not be decoded. Fatal for this cycle only; no
    /// further pipeline stages run.
    #[error("failed to decode input frame: {0}")]
    Decode(String),

    /// A detector or OCR backend could not be reached or invoked. Recovered
    /// locally by the fallback chain; a cycle where every backend is
    /// unavailable yields `NoMatch` rather than an error.
    #[error("backend '{name}' unavailable: {reason}")]
    BackendUnavailable { name: String, reason: String },
}

impl EngineError {
    pub fn unavailable(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::BackendUnavailable {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
