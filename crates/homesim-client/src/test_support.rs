//! In-process transports for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;

use homesim_protocol::{Envelope, ProtocolError, ProtocolResult, Request, Response, Status};
use homesim_server::{DeviceStore, Lifecycle};

use crate::transport::Transport;

/// Acknowledges every call with `OK {}` and counts exchanges.
#[derive(Clone, Default)]
pub struct CountingTransport {
    exchanges: Arc<AtomicUsize>,
}

impl CountingTransport {
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

impl Transport for CountingTransport {
    fn exchange(&mut self, request: &Envelope<Request>) -> ProtocolResult<Envelope<Response>> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(Envelope::response(
            &request.request_id,
            Response::reply(Status::Ok, json!({})),
        ))
    }

    fn disconnect(&mut self) {}
}

/// Answers every call with `OK` and the call's own argument, like a backend
/// that acknowledges a write with the written state.
#[derive(Clone, Default)]
pub struct EchoTransport {
    reply: Option<serde_json::Value>,
}

impl EchoTransport {
    /// Answers every call with `reply` instead of the argument.
    pub fn replying(reply: serde_json::Value) -> Self {
        Self { reply: Some(reply) }
    }
}

impl Transport for EchoTransport {
    fn exchange(&mut self, request: &Envelope<Request>) -> ProtocolResult<Envelope<Response>> {
        let payload = match &request.payload {
            Request::Ping => Response::Pong,
            Request::Call { arg, .. } => {
                let reply = self.reply.clone().unwrap_or_else(|| arg.clone());
                Response::reply(Status::Ok, reply)
            }
        };
        Ok(Envelope::response(&request.request_id, payload))
    }

    fn disconnect(&mut self) {}
}

/// Fails every exchange as if the connection was reset.
#[derive(Clone, Default)]
pub struct FailingTransport {
    attempts: Arc<AtomicUsize>,
}

impl FailingTransport {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Transport for FailingTransport {
    fn exchange(&mut self, _request: &Envelope<Request>) -> ProtocolResult<Envelope<Response>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }

    fn disconnect(&mut self) {}
}

/// Serves calls from an in-memory [`DeviceStore`] and records when each
/// exchange started and finished.
#[derive(Clone)]
pub struct StoreTransport {
    store: Arc<Mutex<DeviceStore>>,
    delay: Duration,
    wrong_ids: bool,
    version: Option<String>,
    pongs: bool,
    started: Arc<AtomicUsize>,
    intervals: Arc<Mutex<Vec<(Instant, Instant)>>>,
}

impl Default for StoreTransport {
    fn default() -> Self {
        let mut store = DeviceStore::new();
        store.set_lifecycle(Lifecycle::Running);
        Self {
            store: Arc::new(Mutex::new(store)),
            delay: Duration::ZERO,
            wrong_ids: false,
            version: None,
            pongs: false,
            started: Arc::new(AtomicUsize::new(0)),
            intervals: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl StoreTransport {
    /// Holds every exchange open for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answers with a request id that never matches.
    pub fn with_wrong_ids(mut self) -> Self {
        self.wrong_ids = true;
        self
    }

    /// Stamps replies with another protocol version.
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Answers calls with a pong.
    pub fn with_pongs(mut self) -> Self {
        self.pongs = true;
        self
    }

    pub fn store(&self) -> &Arc<Mutex<DeviceStore>> {
        &self.store
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// `(start, end)` of every completed exchange, in completion order.
    pub fn intervals(&self) -> Vec<(Instant, Instant)> {
        self.intervals.lock().clone()
    }
}

impl Transport for StoreTransport {
    fn exchange(&mut self, request: &Envelope<Request>) -> ProtocolResult<Envelope<Response>> {
        let start = Instant::now();
        self.started.fetch_add(1, Ordering::SeqCst);

        let response = match &request.payload {
            Request::Ping => Response::Pong,
            Request::Call { .. } if self.pongs => Response::Pong,
            Request::Call {
                service,
                method,
                arg,
            } => self.store.lock().dispatch(service, method, arg),
        };
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let request_id = if self.wrong_ids {
            format!("not-{}", request.request_id)
        } else {
            request.request_id.clone()
        };
        self.intervals.lock().push((start, Instant::now()));
        let mut envelope = Envelope::response(request_id, response);
        if let Some(version) = &self.version {
            envelope.protocol_version = version.clone();
        }
        Ok(envelope)
    }

    fn disconnect(&mut self) {}
}
