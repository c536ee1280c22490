use thiserror::Error;

/// Error taxonomy for the PDV core.
///
/// Variants map to how the failure is surfaced: `Auth` inline on the login
/// form, `Fetch`/`Sale`/`StoreNotFound` through the alert dialog, the rest
/// are infrastructure failures wrapped at the async boundary.
#[derive(Error, Debug)]
pub enum PdvError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("failed to load data: {0}")]
    Fetch(String),
    #[error("sale could not be created: {0}")]
    Sale(String),
    #[error("no store is associated with the current user")]
    StoreNotFound,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PdvError>;
