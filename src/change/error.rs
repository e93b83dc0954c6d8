use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChangeError {
    #[error("Malformed operation: {0}")]
    MalformedOperation(String),

    #[error("Unsupported operation kind: {0}")]
    UnsupportedOperationKind(String),

    #[error("Unsupported change record version: {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Extraction re-entry: {0}")]
    ExtractionReentry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CBOR error: {0}")]
    Cbor(String),
}
