//! Snapshot of a completed exchange.

use serde_json::Value;

use crate::completion::Completion;
use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};

/// Everything known about one finished exchange.
///
/// Created once by the `Connector` and handed to the response callback by
/// value. `request` is `None` only when no wire request was ever built.
#[derive(Debug)]
pub struct Response<V = Value> {
    pub request: Option<HttpRequest>,
    pub response: Option<HttpResponse>,
    pub data: Option<Vec<u8>>,
    pub result: Completion<V, Error>,
}

impl<V> Response<V> {
    /// Status code of the raw response, if one arrived.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    pub fn value(&self) -> Option<&V> {
        self.result.value()
    }

    pub fn error(&self) -> Option<&Error> {
        self.result.error()
    }
}
