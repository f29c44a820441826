//! Small client-side HTTP request library.
//!
//! # Overview
//! A `Request` collects a URL, method, parameters and headers, encodes the
//! parameters with a `ParameterEncoding`, and hands the resulting
//! `HttpRequest` to a `Connector`. The connector runs the exchange on a
//! `Transport`, applies the `ResponseValidator` chain, decodes the body as
//! JSON and calls the registered callback exactly once with a `Response`.
//!
//! ```no_run
//! use request_core::{Request, StatusCodeValidator};
//! use serde_json::json;
//!
//! let mut request = Request::get("http://localhost:3000/echo")
//!     .with_parameters(json!({"q": "hello"}).as_object().cloned().unwrap_or_default())
//!     .validate(StatusCodeValidator::default())
//!     .response_json(|response| println!("{:?}", response.result));
//! request.run().unwrap();
//! ```
//!
//! # Design
//! - Build-time failures (URL conversion, encoding) are returned from
//!   `Request::build` / `Request::run`. Everything after dispatch arrives
//!   through the callback as a failed `Completion`.
//! - The callback runs on a per-exchange delivery thread, never on the
//!   caller's stack.
//! - `Transport` is the I/O seam. `UreqTransport` is the default; tests swap
//!   in stubs to get deterministic exchanges.

pub mod completion;
pub mod connector;
pub mod encoding;
pub mod error;
pub mod http;
pub mod request;
pub mod response;
pub mod transport;
pub mod url_convertible;
pub mod validator;

pub use completion::Completion;
pub use connector::{Connector, ResponseCallback};
pub use encoding::{JsonEncoding, ParameterEncoding, Parameters, UrlEncoding};
pub use error::{DecodingError, EncodingError, Error, TransportError, UrlConversionError, ValidationError};
pub use http::{CachePolicy, HttpMethod, HttpRequest, HttpResponse};
pub use request::Request;
pub use response::Response;
pub use transport::{Transport, TransportConfig, TransportOutcome, UreqTransport};
pub use url_convertible::UrlConvertible;
pub use validator::{from_fn, FnValidator, ResponseValidator, StatusCodeValidator};
