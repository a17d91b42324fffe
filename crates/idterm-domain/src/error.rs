use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("duration {0:?} must be greater than zero")]
    NonPositiveDuration(String),

    #[error("duration {0:?} is below the millisecond resolution of credential timestamps")]
    DurationTooShort(String),

    #[error("duration {0:?} does not fit in a timestamp")]
    DurationOutOfRange(String),

    #[error("missing identifier: {0}")]
    MissingIdentifier(&'static str),
}
