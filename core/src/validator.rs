//! Response validators.
//!
//! Validators run in registration order once the transport has finished and
//! before the body is decoded. The first failure stops the chain.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{TransportError, ValidationError};
use crate::http::HttpResponse;

/// Inspects a raw transport result and rejects it with a typed error.
pub trait ResponseValidator: Send + Sync {
    fn validate(
        &self,
        response: Option<&HttpResponse>,
        body: Option<&[u8]>,
        error: Option<&TransportError>,
    ) -> Result<(), ValidationError>;
}

impl<V: ResponseValidator + ?Sized> ResponseValidator for Arc<V> {
    fn validate(
        &self,
        response: Option<&HttpResponse>,
        body: Option<&[u8]>,
        error: Option<&TransportError>,
    ) -> Result<(), ValidationError> {
        (**self).validate(response, body, error)
    }
}

/// A validator backed by a closure. Built with [`from_fn`].
#[derive(Clone)]
pub struct FnValidator<F> {
    f: F,
}

/// Wrap a closure as a `ResponseValidator`.
pub fn from_fn<F>(f: F) -> FnValidator<F>
where
    F: Fn(Option<&HttpResponse>, Option<&[u8]>, Option<&TransportError>) -> Result<(), ValidationError> + Send + Sync,
{
    FnValidator { f }
}

impl<F> ResponseValidator for FnValidator<F>
where
    F: Fn(Option<&HttpResponse>, Option<&[u8]>, Option<&TransportError>) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(
        &self,
        response: Option<&HttpResponse>,
        body: Option<&[u8]>,
        error: Option<&TransportError>,
    ) -> Result<(), ValidationError> {
        (self.f)(response, body, error)
    }
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator").finish_non_exhaustive()
    }
}

/// Accepts responses whose status code lies in a half-open range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCodeValidator {
    valid_range: Range<u16>,
}

impl StatusCodeValidator {
    pub fn new(valid_range: Range<u16>) -> Self {
        Self { valid_range }
    }

    pub fn valid_range(&self) -> &Range<u16> {
        &self.valid_range
    }
}

impl Default for StatusCodeValidator {
    fn default() -> Self {
        Self::new(200..300)
    }
}

impl ResponseValidator for StatusCodeValidator {
    fn validate(
        &self,
        response: Option<&HttpResponse>,
        _body: Option<&[u8]>,
        _error: Option<&TransportError>,
    ) -> Result<(), ValidationError> {
        let response = response.ok_or(ValidationError::InvalidHttpResponse)?;
        if !self.valid_range.contains(&response.status) {
            return Err(ValidationError::InvalidStatusCode(response.status));
        }
        Ok(())
    }
}
