//! Centralized error taxonomy for the orchestration core.
//!
//! Every fallible operation in this crate returns [`Result<T>`], a thin alias
//! over [`Error`]. Variants map directly onto the error-kind table the bus and
//! handlers are specified against: an unknown event type or a saturated
//! subscriber queue are rejections at the bus boundary; model failures are
//! split into the four kinds the retry policy distinguishes between; handler
//! failures are split into timeout vs. raised so the supervisor can tell a
//! stuck handler from a crashed one.

use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("rejected: unknown event type `{0}`")]
    UnknownEventType(String),

    #[error("rejected: backpressure on topic `{topic}` after {waited:?}")]
    Backpressure { topic: String, waited: Duration },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("model throttled: {0}")]
    ModelThrottled(String),

    #[error("model rejected request: {0}")]
    ModelRejected(String),

    #[error("model returned invalid response: {0}")]
    ModelInvalid(String),

    #[error("handler `{handler}` timed out after {elapsed:?}")]
    HandlerTimeout { handler: String, elapsed: Duration },

    #[error("handler `{handler}` raised: {message}")]
    HandlerRaised { handler: String, message: String },

    #[error("retrieval index error: {0}")]
    Retrieval(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Only transient model failures and bus backpressure ever get a second try.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ModelUnavailable(_) | Error::ModelThrottled(_) | Error::Backpressure { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Retrieval(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Configuration(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::ModelUnavailable(e.to_string())
        } else if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                Error::ModelThrottled(e.to_string())
            } else if status.is_client_error() {
                Error::ModelRejected(e.to_string())
            } else {
                Error::ModelUnavailable(e.to_string())
            }
        } else {
            Error::ModelUnavailable(e.to_string())
        }
    }
}
