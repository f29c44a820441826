//! The request builder.
//!
//! # Design
//! `Request` is a consuming builder: every configuration call takes `self`
//! and returns the updated value. Once configured it becomes the handle for
//! running the exchange:
//!
//! - `build` turns the configuration into an `HttpRequest` without touching
//!   the network. It is pure and can be called any number of times.
//! - `run` builds, creates a fresh `Connector` and starts it. It refuses to
//!   start while the previous exchange has not delivered yet.
//! - `cancel` forwards to the live `Connector`. It is refused if there is
//!   nothing in flight or a cancel is already pending. The request keeps
//!   counting as running until the cancelled exchange's callback returns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;

use crate::connector::{Connector, ResponseCallback};
use crate::encoding::{JsonEncoding, ParameterEncoding, Parameters, UrlEncoding};
use crate::error::Error;
use crate::http::{CachePolicy, HttpMethod, HttpRequest, DEFAULT_TIMEOUT};
use crate::response::Response;
use crate::transport::{Transport, UreqTransport};
use crate::url_convertible::UrlConvertible;
use crate::validator::ResponseValidator;

const CONTENT_TYPE: &str = "Content-Type";
const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// An HTTP request: its configuration, validators, callback and, once
/// running, the connector that executes it.
pub struct Request {
    url: Box<dyn UrlConvertible + Send + Sync>,
    method: HttpMethod,
    encoding: Arc<dyn ParameterEncoding>,
    parameters: Option<Parameters>,
    headers: Option<BTreeMap<String, String>>,
    timeout: Duration,
    cache_policy: CachePolicy,
    validators: Vec<Arc<dyn ResponseValidator>>,
    callback: Option<ResponseCallback>,
    transport: Arc<dyn Transport>,
    connector: Option<Connector>,
}

impl Request {
    pub fn new<U, E>(
        url: U,
        method: HttpMethod,
        parameters: Option<Parameters>,
        headers: Option<BTreeMap<String, String>>,
        encoding: E,
    ) -> Self
    where
        U: UrlConvertible + Send + Sync + 'static,
        E: ParameterEncoding + 'static,
    {
        Self {
            url: Box::new(url),
            method,
            encoding: Arc::new(encoding),
            parameters,
            headers,
            timeout: DEFAULT_TIMEOUT,
            cache_policy: CachePolicy::default(),
            validators: Vec::new(),
            callback: None,
            transport: Arc::new(UreqTransport::default()),
            connector: None,
        }
    }

    pub fn get<U: UrlConvertible + Send + Sync + 'static>(url: U) -> Self {
        Self::new(url, HttpMethod::Get, None, None, UrlEncoding)
    }

    pub fn delete<U: UrlConvertible + Send + Sync + 'static>(url: U) -> Self {
        Self::new(url, HttpMethod::Delete, None, None, UrlEncoding)
    }

    pub fn post<U: UrlConvertible + Send + Sync + 'static>(url: U) -> Self {
        Self::new(url, HttpMethod::Post, None, None, JsonEncoding)
    }

    pub fn put<U: UrlConvertible + Send + Sync + 'static>(url: U) -> Self {
        Self::new(url, HttpMethod::Put, None, None, JsonEncoding)
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    pub fn headers(&self) -> Option<&BTreeMap<String, String>> {
        self.headers.as_ref()
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_encoding<E: ParameterEncoding + 'static>(mut self, encoding: E) -> Self {
        self.encoding = Arc::new(encoding);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }

    /// Replace the transport used by subsequent runs.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Append a validator. Validators run in the order they were added.
    pub fn validate<V: ResponseValidator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Append several validators, keeping their order.
    pub fn validate_all<I>(mut self, validators: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ResponseValidator>>,
    {
        self.validators.extend(validators);
        self
    }

    /// Register the callback that receives the decoded JSON response,
    /// replacing any earlier one.
    pub fn response_json<F>(mut self, callback: F) -> Self
    where
        F: Fn(Response<Value>) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Build the wire request without sending it.
    pub fn build(&self) -> Result<HttpRequest, Error> {
        let url = self.url.to_url()?;
        let mut request = HttpRequest::new(self.method, url);
        request.timeout = self.timeout;
        request.cache_policy = self.cache_policy;

        if let Some(headers) = &self.headers {
            for (name, value) in headers {
                request.add_header(name.as_str(), value.as_str());
            }
        }
        if request.header(CONTENT_TYPE).is_none() {
            request.add_header(CONTENT_TYPE, DEFAULT_CONTENT_TYPE);
        }

        if let Some(parameters) = &self.parameters {
            request = self.encoding.encode(parameters, request)?;
        }

        debug!("built {} {}", request.method, request.url);
        Ok(request)
    }

    /// True until the last run's callback has returned.
    pub fn is_running(&self) -> bool {
        self.connector.as_ref().is_some_and(Connector::is_active)
    }

    /// Build the request and start the exchange.
    pub fn run(&mut self) -> Result<&mut Self, Error> {
        if self.is_running() {
            warn!("refusing to run {:?}: previous exchange still in flight", self);
            return Err(Error::AlreadyRunning);
        }

        let request = self.build()?;
        let mut connector = Connector::new(
            request,
            self.validators.clone(),
            self.callback.clone(),
            Arc::clone(&self.transport),
        );
        connector.connect();
        self.connector = Some(connector);
        Ok(self)
    }

    /// Cancel the running exchange. Its callback still fires once, carrying
    /// `Error::OperationCancelled`.
    pub fn cancel(&mut self) -> Result<&mut Self, Error> {
        if !self.is_running() {
            warn!("refusing to cancel {:?}: nothing in flight", self);
            return Err(Error::OperationRefused(format!(
                "cannot cancel the request, no exchange in flight: {self:?}"
            )));
        }
        if self.connector.as_ref().is_some_and(Connector::is_cancelling) {
            warn!("refusing to cancel {:?}: cancel already pending", self);
            return Err(Error::OperationRefused(format!(
                "cannot cancel the request, cancellation already pending: {self:?}"
            )));
        }
        if let Some(connector) = self.connector.as_mut() {
            connector.cancel();
        }
        Ok(self)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url.describe())
            .field("method", &self.method)
            .field("parameters", &self.parameters)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodingError, EncodingError, TransportError, UrlConversionError, ValidationError};
    use crate::http::HttpResponse;
    use crate::transport::TransportOutcome;
    use crate::validator::{from_fn, StatusCodeValidator};
    use serde_json::json;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::thread;

    /// Records the request it was asked to send and replies with a canned
    /// outcome after an optional delay.
    #[derive(Clone)]
    struct StubTransport {
        outcome: TransportOutcome,
        delay: Duration,
        sent: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl StubTransport {
        fn replying(outcome: TransportOutcome) -> Self {
            Self {
                outcome,
                delay: Duration::ZERO,
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl Transport for StubTransport {
        fn execute(&self, request: &HttpRequest) -> TransportOutcome {
            self.sent.lock().unwrap().push(request.clone());
            thread::sleep(self.delay);
            self.outcome.clone()
        }
    }

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    fn reply(status: u16, body: &str) -> TransportOutcome {
        let data = if body.is_empty() { None } else { Some(body.as_bytes().to_vec()) };
        TransportOutcome::completed(HttpResponse::new(status), data)
    }

    /// Run `request` and wait for its single response.
    fn run_and_wait(request: Request) -> (Request, Response<Value>) {
        let (tx, rx) = mpsc::channel();
        let mut request = request.response_json(move |response| {
            tx.send(response).unwrap();
        });
        request.run().unwrap();
        let response = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        (request, response)
    }

    /// The running flag clears just after the callback returns.
    fn wait_until_idle(request: &Request) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while request.is_running() {
            assert!(std::time::Instant::now() < deadline, "request never went idle");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn search(transport: StubTransport) -> Request {
        Request::new(
            "http://localhost:3000/search",
            HttpMethod::Get,
            Some(params(json!({"q": "hello"}))),
            None,
            UrlEncoding,
        )
        .validate(StatusCodeValidator::default())
        .transport(transport)
    }

    #[test]
    fn build_injects_default_content_type() {
        let req = Request::get("http://localhost/").build().unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
    }

    #[test]
    fn build_keeps_caller_content_type() {
        let req = Request::post("http://localhost/")
            .with_header("content-type", "text/plain")
            .build()
            .unwrap();
        let content_types: Vec<_> = req
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(req.header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn build_applies_timeout_and_cache_policy() {
        let req = Request::get("http://localhost/")
            .timeout(Duration::from_secs(5))
            .cache_policy(CachePolicy::ReloadIgnoringCache)
            .build()
            .unwrap();
        assert_eq!(req.timeout, Duration::from_secs(5));
        assert_eq!(req.cache_policy, CachePolicy::ReloadIgnoringCache);
    }

    #[test]
    fn build_is_idempotent() {
        let request = Request::get("http://localhost/search").with_parameters(params(json!({"a": 1, "b": "x"})));
        let first = request.build().unwrap();
        let second = request.build().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.url.query(), Some("a=1&b=x"));
    }

    #[test]
    fn build_encodes_json_body_for_post() {
        let input = params(json!({"title": "Buy milk"}));
        let req = Request::post("http://localhost/todos")
            .with_parameters(input.clone())
            .build()
            .unwrap();
        let body: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, Value::Object(input));
    }

    #[test]
    fn build_rejects_json_on_get() {
        let err = Request::get("http://localhost/")
            .with_encoding(JsonEncoding)
            .with_parameters(params(json!({"a": 1})))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(EncodingError::InvalidUsage(_))));
    }

    #[test]
    fn build_reports_unconvertible_url() {
        let err = Request::get("::nope::").build().unwrap_err();
        assert!(matches!(err, Error::Url(UrlConversionError::NotConvertible(_))));
    }

    #[test]
    fn run_propagates_build_errors() {
        let transport = StubTransport::replying(reply(200, "{}"));
        let sent = Arc::clone(&transport.sent);
        let mut request = Request::get("::nope::").transport(transport);
        assert!(request.run().is_err());
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_without_run_is_refused() {
        let mut request = Request::get("http://localhost/");
        let err = request.cancel().unwrap_err();
        assert!(matches!(err, Error::OperationRefused(_)));
    }

    #[test]
    fn refusal_names_the_url() {
        let mut request = Request::get("http://localhost/refused");
        let message = request.cancel().unwrap_err().to_string();
        assert!(message.contains("http://localhost/refused"), "{message}");
        assert!(format!("{request:?}").contains("http://localhost/refused"));
    }

    #[test]
    fn cancel_after_delivery_is_refused() {
        let (mut request, _) = run_and_wait(search(StubTransport::replying(reply(200, "{}"))));
        wait_until_idle(&request);
        assert!(matches!(request.cancel(), Err(Error::OperationRefused(_))));
    }

    #[test]
    fn cancelled_request_stays_running_until_callback_returns() {
        let transport = StubTransport::replying(reply(200, "{}")).delayed(Duration::from_millis(400));
        let sent = Arc::clone(&transport.sent);
        let (tx, rx) = mpsc::channel();
        let mut request = search(transport).response_json(move |response| {
            tx.send(response).unwrap();
            thread::sleep(Duration::from_millis(200));
        });
        request.run().unwrap();
        thread::sleep(Duration::from_millis(50));
        request.cancel().unwrap();

        assert!(request.is_running());
        assert!(matches!(request.run(), Err(Error::AlreadyRunning)));
        assert!(matches!(request.cancel(), Err(Error::OperationRefused(_))));

        let response = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(response.error(), Some(Error::OperationCancelled)));
        assert!(matches!(request.run(), Err(Error::AlreadyRunning)));

        wait_until_idle(&request);
        request.run().unwrap();
        let response = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(response.result.is_success());
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn cancel_delivers_operation_cancelled() {
        let transport = StubTransport::replying(reply(200, "{}")).delayed(Duration::from_millis(300));
        let (tx, rx) = mpsc::channel();
        let mut request = search(transport).response_json(move |response| {
            tx.send(response).unwrap();
        });
        request.run().unwrap();
        request.cancel().unwrap();

        let response = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(response.error(), Some(Error::OperationCancelled)));
        assert!(rx.recv_timeout(Duration::from_millis(600)).is_err());
    }

    #[test]
    fn run_while_in_flight_is_refused() {
        let transport = StubTransport::replying(reply(200, "{}")).delayed(Duration::from_millis(300));
        let mut request = search(transport);
        request.run().unwrap();
        assert!(request.is_running());
        assert!(matches!(request.run(), Err(Error::AlreadyRunning)));
    }

    #[test]
    fn request_can_run_again_after_delivery() {
        let transport = StubTransport::replying(reply(200, r#"{"n":1}"#));
        let sent = Arc::clone(&transport.sent);
        let (tx, rx) = mpsc::channel();
        let mut request = search(transport).response_json(move |response| {
            tx.send(response).unwrap();
        });

        request.run().unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        wait_until_idle(&request);
        request.run().unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn last_registered_callback_wins() {
        let (first_tx, first_rx) = mpsc::channel::<()>();
        let (second_tx, second_rx) = mpsc::channel::<()>();
        let mut request = search(StubTransport::replying(reply(200, "{}")))
            .response_json(move |_| {
                first_tx.send(()).unwrap();
            })
            .response_json(move |_| {
                second_tx.send(()).unwrap();
            });
        request.run().unwrap();
        second_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(first_rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn validators_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let tracker = |label: &'static str, order: Arc<Mutex<Vec<&'static str>>>| {
            Arc::new(from_fn(move |_: Option<&HttpResponse>, _: Option<&[u8]>, _: Option<&TransportError>| {
                order.lock().unwrap().push(label);
                Ok::<(), ValidationError>(())
            })) as Arc<dyn ResponseValidator>
        };
        let request = search(StubTransport::replying(reply(200, "{}")))
            .validate_all(vec![tracker("first", Arc::clone(&order)), tracker("second", Arc::clone(&order))])
            .validate(tracker("third", Arc::clone(&order)));
        let (_, response) = run_and_wait(request);
        assert!(response.result.is_success());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn get_with_query_parameters_succeeds() {
        let transport = StubTransport::replying(reply(200, r#"{"ok":true}"#));
        let sent = Arc::clone(&transport.sent);
        let (_, response) = run_and_wait(search(transport));

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].url.query(), Some("q=hello"));
        assert_eq!(response.value(), Some(&json!({"ok": true})));
        assert_eq!(response.request.as_ref().map(|r| r.url.query()), Some(Some("q=hello")));
    }

    #[test]
    fn not_found_fails_validation() {
        let (_, response) = run_and_wait(search(StubTransport::replying(reply(404, "{\"ok\":false}"))));
        assert!(matches!(
            response.error(),
            Some(Error::Validation(ValidationError::InvalidStatusCode(404)))
        ));
        assert!(response.value().is_none());
    }

    #[test]
    fn no_connectivity_is_reported() {
        let outcome = TransportOutcome::failed(TransportError::NotConnected("offline".to_string()));
        let (_, response) = run_and_wait(search(StubTransport::replying(outcome)));
        assert!(matches!(response.error(), Some(Error::NoInternetConnection)));
    }

    #[test]
    fn empty_success_is_empty_response() {
        let (_, response) = run_and_wait(search(StubTransport::replying(reply(200, ""))));
        assert!(matches!(response.error(), Some(Error::Decoding(DecodingError::EmptyResponse))));
    }
}
