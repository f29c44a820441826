//! Network transport seam.
//!
//! # Design
//! A `Transport` executes one `HttpRequest` and reports what happened as a
//! `TransportOutcome`: the raw response, the body bytes and the transport
//! error, each optional. It never interprets status codes or bodies; that is
//! the `Connector`'s job.
//!
//! `execute` blocks. The `Connector` runs it on a worker thread, so an
//! implementation is free to do plain synchronous I/O.
//!
//! `UreqTransport` is the default. It builds a fresh agent per exchange with
//! the request's timeout and with `http_status_as_error(false)`, so 4xx/5xx
//! responses come back as data for the validators to judge.

use std::io;

use log::{debug, trace};
use ureq::http;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// What a transport observed for one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOutcome {
    pub response: Option<HttpResponse>,
    pub data: Option<Vec<u8>>,
    pub error: Option<TransportError>,
}

impl TransportOutcome {
    pub fn completed(response: HttpResponse, data: Option<Vec<u8>>) -> Self {
        Self {
            response: Some(response),
            data,
            error: None,
        }
    }

    pub fn failed(error: TransportError) -> Self {
        Self {
            response: None,
            data: None,
            error: Some(error),
        }
    }
}

/// Executes wire requests.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> TransportOutcome;
}

/// Settings shared by every exchange of a `UreqTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub user_agent: Option<String>,
    pub max_redirects: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            max_redirects: 10,
        }
    }
}

/// Blocking transport backed by `ureq`.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport {
    config: TransportConfig,
}

impl UreqTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    fn agent(&self, request: &HttpRequest) -> ureq::Agent {
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(self.config.max_redirects)
            .timeout_global(Some(request.timeout));
        if let Some(user_agent) = &self.config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        builder.build().new_agent()
    }

    fn send(&self, request: &HttpRequest) -> Result<http::Response<ureq::Body>, TransportError> {
        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(directive) = request.cache_policy.cache_control() {
            if request.header("Cache-Control").is_none() {
                builder = builder.header("Cache-Control", directive);
            }
        }

        let agent = self.agent(request);
        let result = match &request.body {
            Some(body) => {
                let req = builder.body(body.clone()).map_err(|e| TransportError::Failed(e.to_string()))?;
                agent.run(req)
            }
            None => {
                let req = builder.body(()).map_err(|e| TransportError::Failed(e.to_string()))?;
                agent.run(req)
            }
        };
        result.map_err(classify)
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> TransportOutcome {
        debug!("{} {}", request.method, request.url);

        let mut response = match self.send(request) {
            Ok(response) => response,
            Err(error) => {
                debug!("{} {} failed: {error}", request.method, request.url);
                return TransportOutcome::failed(error);
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let raw = HttpResponse { status, headers };

        match response.body_mut().read_to_vec() {
            Ok(body) => {
                trace!("{} {} -> {status}, {} bytes", request.method, request.url, body.len());
                let data = if body.is_empty() { None } else { Some(body) };
                TransportOutcome::completed(raw, data)
            }
            Err(error) => TransportOutcome {
                response: Some(raw),
                data: None,
                error: Some(classify(error)),
            },
        }
    }
}

/// Map a ureq failure onto the transport taxonomy.
fn classify(error: ureq::Error) -> TransportError {
    match &error {
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => TransportError::NotConnected(error.to_string()),
        ureq::Error::Io(io) if is_unreachable(io.kind()) => TransportError::NotConnected(error.to_string()),
        _ => TransportError::Failed(error.to_string()),
    }
}

fn is_unreachable(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotConnected | io::ErrorKind::AddrNotAvailable
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_constructors() {
        let ok = TransportOutcome::completed(HttpResponse::new(204), None);
        assert_eq!(ok.response.map(|r| r.status), Some(204));
        assert!(ok.error.is_none());

        let failed = TransportOutcome::failed(TransportError::Cancelled);
        assert!(failed.response.is_none());
        assert_eq!(failed.error, Some(TransportError::Cancelled));
    }

    #[test]
    fn refused_connections_are_unreachable() {
        assert!(is_unreachable(io::ErrorKind::ConnectionRefused));
        assert!(!is_unreachable(io::ErrorKind::TimedOut));
    }

    #[test]
    fn host_not_found_is_connectivity() {
        assert!(classify(ureq::Error::HostNotFound).is_connectivity());
        let io = ureq::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(classify(io).is_connectivity());
        let timeout = ureq::Error::Io(io::Error::from(io::ErrorKind::TimedOut));
        assert!(!classify(timeout).is_connectivity());
    }

    #[test]
    fn default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.max_redirects, 10);
        assert!(config.user_agent.is_none());
    }
}
