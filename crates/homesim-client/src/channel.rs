//! RPC channel: `(service, method, arg) -> (status, reply)`.
//!
//! Transport failures never escape a call. They come back as
//! [`Status::RpcError`] with an empty reply, and the caller retries on its
//! own schedule.

use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use homesim_protocol::{
    Endpoint, Envelope, ProtocolError, ProtocolResult, Request, Response, Status,
};

use crate::error::{ClientError, ClientResult};
use crate::transport::{RpcTimeouts, TcpTransport, Transport};

/// A request/reply channel to one backend.
///
/// Not synchronized: callers serialize access (see
/// [`crate::device::DeviceClient`]).
pub struct RpcChannel<T: Transport = TcpTransport> {
    transport: T,
    closed: bool,
    calls: u64,
}

impl RpcChannel<TcpTransport> {
    /// Opens a channel, failing if the endpoint does not accept a TCP
    /// connection within the connect timeout.
    pub fn open(endpoint: &Endpoint, timeouts: RpcTimeouts) -> ClientResult<Self> {
        let transport = TcpTransport::connect(endpoint, timeouts).map_err(|e| {
            ClientError::Connection(format!("failed to connect to {}: {}", endpoint, e))
        })?;
        debug!(endpoint = %endpoint, "channel open");
        Ok(Self::with_transport(transport))
    }
}

impl<T: Transport> RpcChannel<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            closed: false,
            calls: 0,
        }
    }

    /// Performs one call. Blocks until the reply arrives or the transport
    /// gives up; never retries.
    ///
    /// The reply is an empty object unless the status is `OK`.
    pub fn call(&mut self, service: &str, method: &str, arg: Value) -> (Status, Value) {
        if self.closed {
            return (Status::Cancelled, empty());
        }
        self.calls += 1;

        let request_id = Uuid::new_v4().to_string();
        let envelope = Envelope::request(&request_id, Request::call(service, method, arg));
        match self.exchange(&envelope) {
            Ok((status, reply)) if status.is_ok() => {
                debug!(service, method, request_id = %request_id, "call ok");
                (status, reply)
            }
            Ok((status, _)) => {
                debug!(service, method, request_id = %request_id, %status, "call rejected");
                (status, empty())
            }
            Err(e) => {
                warn!(service, method, request_id = %request_id, error = %e, "call failed");
                (Status::RpcError, empty())
            }
        }
    }

    /// Sends one call envelope and checks that the reply answers it.
    ///
    /// A reply for another request or from another protocol version leaves
    /// the stream in an unknown state, so the connection is dropped.
    fn exchange(&mut self, envelope: &Envelope<Request>) -> ProtocolResult<(Status, Value)> {
        let response = self.transport.exchange(envelope)?;
        let mismatch = if response.request_id != envelope.request_id {
            Some(ProtocolError::RequestIdMismatch {
                expected: envelope.request_id.clone(),
                actual: response.request_id,
            })
        } else if !response.is_compatible() {
            Some(ProtocolError::UnsupportedVersion(response.protocol_version))
        } else {
            None
        };
        if let Some(e) = mismatch {
            self.transport.disconnect();
            return Err(e);
        }

        match response.payload {
            Response::Reply { status, reply } => Ok((status, reply)),
            Response::Pong => Err(ProtocolError::UnexpectedReply(
                "pong in reply to a call".to_string(),
            )),
        }
    }

    /// Checks that the backend answers. Always false once closed.
    pub fn ping(&mut self) -> bool {
        if self.closed {
            return false;
        }
        let request_id = Uuid::new_v4().to_string();
        matches!(
            self.transport.exchange(&Envelope::request(&request_id, Request::Ping)),
            Ok(Envelope { request_id: id, payload: Response::Pong, .. }) if id == request_id
        )
    }

    /// Closes the channel. Idempotent; later calls return `CANCELLED`.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.disconnect();
            debug!(calls = self.calls, "channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of calls that reached the transport.
    pub fn call_count(&self) -> u64 {
        self.calls
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Drop for RpcChannel<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}
