use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create PDF: {0}")]
    PdfError(String),
    #[error("Failed to load background template: {0}")]
    TemplateError(String),
    #[error("Failed to decode image: {0}")]
    DecodeError(String),
    #[error("Failed to load font: {0}")]
    FontError(String),
    #[error("Failed to compose page: {0}")]
    ComposeError(String),
    #[error("Storage error: {0}")]
    StoreError(String),
    #[error("Reorder rejected: {0}")]
    ReorderRejected(String),
    #[error("Unknown form field: {0}")]
    UnknownField(String),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("No images in the album to generate a PDF.")]
    EmptyAlbum,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
