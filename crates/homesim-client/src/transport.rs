//! Blocking request/reply transport under the RPC channel.

use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, warn};

use homesim_protocol::{
    Endpoint, Envelope, FrameReader, FrameWriter, ProtocolError, ProtocolResult, Request, Response,
};

/// Connect and per-call timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcTimeouts {
    pub connect: Duration,
    pub call: Duration,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            call: Duration::from_secs(5),
        }
    }
}

/// Moves one request envelope to the backend and brings its reply back.
///
/// Implementations do not retry. A failed exchange leaves the transport
/// able to try again on the next call.
pub trait Transport: Send {
    fn exchange(&mut self, request: &Envelope<Request>) -> ProtocolResult<Envelope<Response>>;

    /// Drops the current connection, if any.
    fn disconnect(&mut self);
}

/// TCP transport with length-prefixed JSON frames.
///
/// After a failed exchange, or when the backend closed the connection while
/// it sat idle, the connection is dropped and the next exchange makes a
/// single fresh connect attempt.
pub struct TcpTransport {
    endpoint: Endpoint,
    timeouts: RpcTimeouts,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Connects eagerly so that an unreachable endpoint fails here.
    pub fn connect(endpoint: &Endpoint, timeouts: RpcTimeouts) -> io::Result<Self> {
        let stream = open_stream(endpoint, timeouts)?;
        Ok(Self {
            endpoint: endpoint.clone(),
            timeouts,
            stream: Some(stream),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> ProtocolResult<&TcpStream> {
        if let Some(stream) = &self.stream
            && !is_open(stream)
        {
            debug!(endpoint = %self.endpoint, "backend closed the idle connection");
            self.disconnect();
        }
        if self.stream.is_none() {
            debug!(endpoint = %self.endpoint, "reconnecting");
            let stream = open_stream(&self.endpoint, self.timeouts)
                .map_err(|e| ProtocolError::from_io(e, "connect"))?;
            self.stream = Some(stream);
        }
        self.stream.as_ref().ok_or(ProtocolError::ConnectionClosed)
    }
}

impl Transport for TcpTransport {
    fn exchange(&mut self, request: &Envelope<Request>) -> ProtocolResult<Envelope<Response>> {
        let result = self.stream().and_then(|stream| {
            FrameWriter::new(stream).write_message(request)?;
            FrameReader::new(stream)
                .read_message()?
                .ok_or(ProtocolError::ConnectionClosed)
        });

        if let Err(e) = &result {
            warn!(
                endpoint = %self.endpoint,
                request_id = %request.request_id,
                error = %e,
                "exchange failed, dropping connection"
            );
            self.disconnect();
        }
        result
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Whether an idle connection is still usable: the peer has not closed it
/// and no unsolicited bytes are waiting.
fn is_open(stream: &TcpStream) -> bool {
    if stream.set_nonblocking(true).is_err() {
        return false;
    }
    let mut byte = [0u8; 1];
    let idle = matches!(stream.peek(&mut byte), Err(e) if e.kind() == io::ErrorKind::WouldBlock);
    stream.set_nonblocking(false).is_ok() && idle
}

fn open_stream(endpoint: &Endpoint, timeouts: RpcTimeouts) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in (endpoint.host.as_str(), endpoint.port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeouts.connect) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeouts.call))?;
                stream.set_write_timeout(Some(timeouts.call))?;
                stream.set_nodelay(true)?;
                debug!(endpoint = %endpoint, %addr, "connected");
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{endpoint} did not resolve to any address"),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use homesim_server::{BackgroundServer, ServerConfig};
    use std::net::TcpListener;

    fn unused_endpoint() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Endpoint::new("127.0.0.1", port)
    }

    #[test]
    fn connect_to_closed_port_fails() {
        let result = TcpTransport::connect(&unused_endpoint(), RpcTimeouts::default());
        assert!(result.is_err());
    }

    #[test]
    fn ping_roundtrip() {
        let server = BackgroundServer::start(ServerConfig::ephemeral()).unwrap();
        let mut transport =
            TcpTransport::connect(&server.endpoint(), RpcTimeouts::default()).unwrap();

        let reply = transport.exchange(&Envelope::request("p-1", Request::Ping)).unwrap();
        assert_eq!(reply.request_id, "p-1");
        assert_eq!(reply.payload, Response::Pong);
    }

    #[test]
    fn survives_the_backend_closing_an_idle_connection() {
        let config = ServerConfig::ephemeral().with_connection_timeout(Duration::from_millis(100));
        let server = BackgroundServer::start(config).unwrap();
        let mut transport =
            TcpTransport::connect(&server.endpoint(), RpcTimeouts::default()).unwrap();
        let reply = transport.exchange(&Envelope::request("1", Request::Ping)).unwrap();
        assert_eq!(reply.payload, Response::Pong);

        std::thread::sleep(Duration::from_millis(400));

        let reply = transport.exchange(&Envelope::request("2", Request::Ping)).unwrap();
        assert_eq!(reply.request_id, "2");
        assert_eq!(reply.payload, Response::Pong);
    }

    #[test]
    fn reconnects_once_after_backend_restart() {
        let server = BackgroundServer::start(ServerConfig::ephemeral()).unwrap();
        let addr = server.local_addr();
        let mut transport =
            TcpTransport::connect(&server.endpoint(), RpcTimeouts::default()).unwrap();
        server.shutdown().unwrap();

        let failed = transport.exchange(&Envelope::request("a", Request::Ping));
        assert!(failed.is_err());
        assert!(!transport.is_connected());

        let _restarted = BackgroundServer::start(ServerConfig::new(addr)).unwrap();
        let reply = transport.exchange(&Envelope::request("b", Request::Ping)).unwrap();
        assert_eq!(reply.payload, Response::Pong);
        assert!(transport.is_connected());
    }
}
