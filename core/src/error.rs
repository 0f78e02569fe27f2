use thiserror::Error;

/// Domain errors callers need to tell apart. Carried inside `anyhow::Error`
/// and recovered with `downcast_ref` at the front ends.
#[derive(Debug, Error)]
pub enum MealPlanError {
    /// Bad input, rejected before any network call or write.
    #[error("{0}")]
    Validation(String),

    /// The recipe extraction service failed or returned a failure status.
    #[error("{0}")]
    Extraction(String),

    #[error("{0}")]
    NotFound(String),
}

impl MealPlanError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
