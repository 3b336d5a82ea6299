use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinwizzError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FinwizzError>;
