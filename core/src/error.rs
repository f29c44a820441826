//! Error types for every stage of a request.
//!
//! # Design
//! Each layer owns a small enum: URL conversion, parameter encoding,
//! transport, validation and decoding. `Error` wraps them all so a
//! `Response` can carry any of them in its failed `Completion`.
//!
//! Build-time failures (`Url`, `Encoding`) come back synchronously from
//! `Request::build` / `Request::run`. Everything that happens after dispatch
//! reaches the caller only through the response callback.

use crate::encoding::Parameters;

/// A value could not be turned into a URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlConversionError {
    #[error("{0} cannot be converted into a URL")]
    NotConvertible(String),
}

/// A `ParameterEncoding` could not embed its parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    /// URL encoding produced (or started from) something that is not a URL.
    #[error("the request does not contain a valid URL: {0}")]
    InvalidUrl(String),

    /// The parameters could not be serialized into a JSON body.
    #[error("the parameters cannot be encoded as JSON data: {0:?}")]
    InvalidParameters(Parameters),

    /// The encoding does not apply to this request, e.g. a JSON body on GET.
    #[error("invalid encoding usage: {0}")]
    InvalidUsage(String),
}

/// Errors reported by the network transport itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No network path to the host.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// The exchange was cancelled before it completed.
    #[error("the exchange was cancelled")]
    Cancelled,

    /// Any other transport failure, including timeouts.
    #[error("transport failed: {0}")]
    Failed(String),
}

impl TransportError {
    /// Connectivity-class errors skip validation and decoding entirely.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, TransportError::NotConnected(_) | TransportError::Cancelled)
    }
}

/// Errors raised by a `ResponseValidator`.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("the response is not an HTTP response")]
    InvalidHttpResponse,

    #[error("invalid status code received ({0})")]
    InvalidStatusCode(u16),

    /// Raised by user-defined validators.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl ValidationError {
    pub fn custom<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        ValidationError::Custom(error.into())
    }
}

/// The response body could not be turned into a JSON value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodingError {
    #[error("the data retrieved is not convertible to a JSON value")]
    InvalidJsonData,

    #[error("the request did not fail, but no data was retrieved")]
    EmptyResponse,
}

/// Top-level error carried by `Request` operations and failed responses.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Url(#[from] UrlConversionError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("the operation failed because there is no internet connection")]
    NoInternetConnection,

    #[error("the operation was cancelled")]
    OperationCancelled,

    /// A non-connectivity transport failure, such as a timeout.
    #[error(transparent)]
    Transport(TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Decoding(#[from] DecodingError),

    /// The operation is not allowed in the request's current state.
    #[error("operation refused: {0}")]
    OperationRefused(String),

    /// `run` was called while the previous exchange is still in flight.
    #[error("the request is already running")]
    AlreadyRunning,
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::NotConnected(_) => Error::NoInternetConnection,
            TransportError::Cancelled => Error::OperationCancelled,
            other => Error::Transport(other),
        }
    }
}
