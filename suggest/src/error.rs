use crate::backend::BackendError;
use crate::producers::ProducerKind;
use thiserror::Error;

/// Why a single producer returned no suggestions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,

    /// The query is not something this producer can work with.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Backend(String),
}

impl From<BackendError> for ProducerError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeadlineExceeded => ProducerError::DeadlineExceeded,
            BackendError::InvalidInput(message) => ProducerError::InvalidInput(message),
            BackendError::Unavailable(message) => ProducerError::Backend(message),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuggestError {
    #[error("{producer} suggestions failed: {source}")]
    Producer {
        producer: ProducerKind,
        #[source]
        source: ProducerError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SuggestError>;
