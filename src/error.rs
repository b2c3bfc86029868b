use thiserror::Error;

/// Engine failure taxonomy. A request either fails validation up front,
/// or fails while querying the historical data provider; absence of data
/// is never an error because the backoff ladder always terminates at a
/// prior model.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid field `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("historical data query failed: {0}")]
    UpstreamData(String),
}

impl EngineError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            field,
            reason: reason.into(),
        }
    }
}
