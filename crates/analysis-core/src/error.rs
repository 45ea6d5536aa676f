use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Model call failed: {0}")]
    ModelUnavailable(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Market data error: {0}")]
    MarketDataError(String),

    #[error("Invalid news item: {0}")]
    InvalidNews(String),
}

impl From<serde_json::Error> for AnalysisError {
    fn from(e: serde_json::Error) -> Self {
        AnalysisError::MalformedOutput(e.to_string())
    }
}
