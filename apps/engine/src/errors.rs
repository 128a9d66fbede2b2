use thiserror::Error;

/// Router-level error. Ordinary backend failures never surface here — the
/// router walks its candidate list and only reports when nothing is left.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("No generation backends are configured")]
    NoBackends,

    #[error("All providers exhausted: {last_error}")]
    Exhausted { last_error: String },
}

/// Text extraction error. Raised only when both the model-assisted path and
/// the local extraction library fail.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Document is not valid UTF-8 and not a recognized binary format")]
    UnrecognizedFormat,

    #[error("PDF text extraction failed: {0}")]
    Pdf(String),
}
