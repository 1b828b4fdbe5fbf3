//! Error types for the offbook core crate.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("PDF ingest error: {0}")]
    Ingest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<pdf::error::PdfError> for CoreError {
    fn from(err: pdf::error::PdfError) -> Self {
        CoreError::Ingest(err.to_string())
    }
}
