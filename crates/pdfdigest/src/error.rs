/// Failures of the individual stages.
///
/// Page and image failures are collected into a `StageReport` and logged;
/// only a failure to create the report file ends the run.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Cannot open {0}")]
    Open(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
