//! Execution of a single network exchange.
//!
//! # Design
//! `connect` starts two threads. A worker runs the blocking `Transport` and
//! pushes its `TransportOutcome` into a channel. A delivery thread takes the
//! first outcome from that channel, classifies it, runs the validators,
//! decodes the body and invokes the callback.
//!
//! `cancel` pushes a `Cancelled` outcome into the same channel. Whichever
//! outcome arrives first is delivered and the other is discarded, so the
//! callback fires exactly once per `connect`, always on the delivery thread,
//! and a cancelled exchange still reports `OperationCancelled`.
//!
//! The exchange stays active until its callback has returned, including
//! after a cancel request.
//!
//! Cancellation is cooperative: the worker is not interrupted and its late
//! outcome is dropped when it eventually arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use log::{debug, trace, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::completion::Completion;
use crate::error::{DecodingError, Error, TransportError};
use crate::http::{HttpRequest, HttpResponse};
use crate::response::Response;
use crate::transport::{Transport, TransportOutcome};
use crate::validator::ResponseValidator;

/// Receives the response of a finished exchange.
pub type ResponseCallback = Arc<dyn Fn(Response<Value>) + Send + Sync + 'static>;

/// Sends one request, validates the result and reports it to the callback.
pub struct Connector {
    id: Uuid,
    request: HttpRequest,
    validators: Arc<[Arc<dyn ResponseValidator>]>,
    callback: Option<ResponseCallback>,
    transport: Arc<dyn Transport>,
    exchange: Option<Exchange>,
}

/// Flags the exchange as delivered when dropped, after the callback has
/// returned or unwound.
struct MarkDelivered(Arc<AtomicBool>);

impl Drop for MarkDelivered {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Handle on the in-flight exchange.
struct Exchange {
    outcomes: mpsc::Sender<TransportOutcome>,
    delivered: Arc<AtomicBool>,
    cancel_requested: bool,
}

impl Connector {
    pub fn new(
        request: HttpRequest,
        validators: Vec<Arc<dyn ResponseValidator>>,
        callback: Option<ResponseCallback>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            validators: validators.into(),
            callback,
            transport,
            exchange: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// True from `connect` until the callback has returned.
    pub fn is_active(&self) -> bool {
        self.exchange
            .as_ref()
            .is_some_and(|exchange| !exchange.delivered.load(Ordering::SeqCst))
    }

    /// True once `cancel` has been requested for the active exchange.
    pub fn is_cancelling(&self) -> bool {
        self.is_active() && self.exchange.as_ref().is_some_and(|exchange| exchange.cancel_requested)
    }

    /// Start the exchange. Returns immediately; the callback fires later on
    /// the exchange's delivery thread.
    pub fn connect(&mut self) {
        let (tx, rx) = mpsc::channel::<TransportOutcome>();
        let delivered = Arc::new(AtomicBool::new(false));
        let id = self.id;

        debug!("exchange {id}: dispatching {} {}", self.request.method, self.request.url);

        let deliver = {
            let request = self.request.clone();
            let validators = Arc::clone(&self.validators);
            let callback = self.callback.clone();
            let delivered = Arc::clone(&delivered);
            move || {
                let _delivered = MarkDelivered(delivered);
                let outcome = rx.recv().unwrap_or_else(|_| {
                    TransportOutcome::failed(TransportError::Failed(
                        "exchange ended without an outcome".to_string(),
                    ))
                });
                let response = resolve(request, outcome, &validators);
                debug!(
                    "exchange {id}: delivering {}",
                    if response.result.is_success() { "success" } else { "failure" }
                );
                if let Some(callback) = callback {
                    callback(response);
                }
            }
        };

        // The delivery thread owns the receiver; if it cannot start, deliver
        // here so the callback still fires once.
        let delivery = thread::Builder::new().name(format!("request-exchange-{id}"));
        if let Err(error) = delivery.spawn(deliver) {
            warn!("exchange {id}: could not start delivery thread: {error}");
            if let Some(callback) = &self.callback {
                callback(Response {
                    request: Some(self.request.clone()),
                    response: None,
                    data: None,
                    result: Completion::Failed(Error::Transport(TransportError::Failed(error.to_string()))),
                });
            }
            delivered.store(true, Ordering::SeqCst);
            self.exchange = Some(Exchange {
                outcomes: tx,
                delivered,
                cancel_requested: false,
            });
            return;
        }

        let worker = {
            let request = self.request.clone();
            let transport = Arc::clone(&self.transport);
            let tx = tx.clone();
            move || {
                let outcome = transport.execute(&request);
                if tx.send(outcome).is_err() {
                    trace!("exchange {id}: discarded late transport outcome");
                }
            }
        };
        if let Err(error) = thread::Builder::new().name(format!("request-worker-{id}")).spawn(worker) {
            let _ = tx.send(TransportOutcome::failed(TransportError::Failed(error.to_string())));
        }

        self.exchange = Some(Exchange {
            outcomes: tx,
            delivered,
            cancel_requested: false,
        });
    }

    /// Request cancellation of the in-flight exchange, if any. The exchange
    /// stays active until its callback has run.
    pub fn cancel(&mut self) {
        let id = self.id;
        let Some(exchange) = self.exchange.as_mut() else {
            return;
        };
        if exchange.delivered.load(Ordering::SeqCst) {
            trace!("exchange {id}: cancel after delivery ignored");
            return;
        }
        if exchange.cancel_requested {
            trace!("exchange {id}: cancel already requested");
            return;
        }
        debug!("exchange {id}: cancelling");
        exchange.cancel_requested = true;
        if exchange.outcomes.send(TransportOutcome::failed(TransportError::Cancelled)).is_err() {
            trace!("exchange {id}: already delivered");
        }
    }
}

/// Turn a transport outcome into the response handed to the callback.
fn resolve(
    request: HttpRequest,
    outcome: TransportOutcome,
    validators: &[Arc<dyn ResponseValidator>],
) -> Response<Value> {
    let TransportOutcome { response, data, error } = outcome;

    let result = match error {
        Some(error) if error.is_connectivity() => Completion::Failed(Error::from(error)),
        error => match run_validators(validators, &response, &data, &error) {
            Err(failure) => Completion::Failed(failure),
            Ok(()) => decode(data.as_deref(), error),
        },
    };

    Response {
        request: Some(request),
        response,
        data,
        result,
    }
}

fn run_validators(
    validators: &[Arc<dyn ResponseValidator>],
    response: &Option<HttpResponse>,
    data: &Option<Vec<u8>>,
    error: &Option<TransportError>,
) -> Result<(), Error> {
    for (index, validator) in validators.iter().enumerate() {
        trace!("running validator {index}");
        validator.validate(response.as_ref(), data.as_deref(), error.as_ref())?;
    }
    Ok(())
}

fn decode(data: Option<&[u8]>, error: Option<TransportError>) -> Completion<Value, Error> {
    if let Some(error) = error {
        return Completion::Failed(Error::from(error));
    }
    match data {
        Some(bytes) if !bytes.is_empty() => serde_json::from_slice::<Value>(bytes)
            .map_err(|_| Error::from(DecodingError::InvalidJsonData))
            .into(),
        _ => Completion::Failed(DecodingError::EmptyResponse.into()),
    }
}
