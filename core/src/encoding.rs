//! Parameter encodings.
//!
//! # Design
//! A `ParameterEncoding` receives a draft `HttpRequest` and returns a new one
//! with the parameters embedded. Two strategies ship with the crate:
//!
//! - `UrlEncoding` appends `key=value` pairs to the query string, using the
//!   form serializer from the `url` crate so separators and percent-encoding
//!   are always correct, even when the URL already has a query.
//! - `JsonEncoding` serializes the parameters as a JSON document into the
//!   body. Using it on a GET request is reported as `InvalidUsage`.
//!
//! Parameters are a `serde_json::Map`, which iterates in key order, so the
//! encoded output is deterministic.

use serde_json::{Map, Value};

use crate::error::EncodingError;
use crate::http::{HttpMethod, HttpRequest};

/// Parameter names mapped to arbitrary JSON values.
pub type Parameters = Map<String, Value>;

/// Embeds a set of parameters into a request.
pub trait ParameterEncoding: Send + Sync {
    fn encode(&self, parameters: &Parameters, request: HttpRequest) -> Result<HttpRequest, EncodingError>;
}

/// Encodes parameters into the URL query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlEncoding;

impl ParameterEncoding for UrlEncoding {
    fn encode(&self, parameters: &Parameters, mut request: HttpRequest) -> Result<HttpRequest, EncodingError> {
        if request.url.cannot_be_a_base() {
            return Err(EncodingError::InvalidUrl(request.url.to_string()));
        }
        if parameters.is_empty() {
            return Ok(request);
        }

        {
            let mut pairs = request.url.query_pairs_mut();
            for (key, value) in parameters {
                pairs.append_pair(key, &query_value(value));
            }
        }
        Ok(request)
    }
}

/// Render a parameter value for the query string.
///
/// Strings are used verbatim, `null` becomes an empty value and everything
/// else is written as compact JSON.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Encodes parameters as a JSON document in the request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonEncoding;

impl ParameterEncoding for JsonEncoding {
    fn encode(&self, parameters: &Parameters, mut request: HttpRequest) -> Result<HttpRequest, EncodingError> {
        if request.method == HttpMethod::Get {
            return Err(EncodingError::InvalidUsage(
                "cannot encode a JSON body in a GET request".to_string(),
            ));
        }

        let body = serde_json::to_vec(parameters).map_err(|_| EncodingError::InvalidParameters(parameters.clone()))?;
        request.body = Some(body);
        Ok(request)
    }
}
