//! Errors surfaced to summarization callers.
//!
//! Ungrounded model output is not an error: it is recovered by the fallback
//! synthesizer and reported through
//! [`ValidationOutcome`](crate::validate::ValidationOutcome).

use crate::model::ModelError;

/// Why a summarization call could not produce an answer.
#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    /// No generative backend is bound to the summarizer.
    #[error("no model runner is configured")]
    CollaboratorUnavailable,
    /// The backend failed while generating.
    #[error(transparent)]
    CollaboratorFailure(#[from] ModelError),
    /// The caller cancelled a non-streaming request.
    #[error("summarization cancelled")]
    Cancelled,
    /// The request could not be parsed or failed schema validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, SummarizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_convert_and_display_transparently() {
        let err: SummarizeError = ModelError::Unavailable("HTTP 503".into()).into();
        assert!(matches!(err, SummarizeError::CollaboratorFailure(_)));
        assert_eq!(err.to_string(), "model unavailable: HTTP 503");
    }
}
