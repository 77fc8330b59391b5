use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Upstream credentials rejected: {0}")]
    CredentialsInvalid(String),

    #[error("Upstream request failed (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AnalyticsError {
    /// Failures that originate on the upstream side. The pipeline masks these
    /// with the deterministic sample dataset; everything else surfaces to the
    /// caller unchanged.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            AnalyticsError::CredentialsInvalid(_)
                | AnalyticsError::Upstream { .. }
                | AnalyticsError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
