//! Wire protocol between device clients and the simulation backend.
//!
//! Messages are sent as length-prefixed JSON:
//! - 4 bytes: payload length (u32, big-endian)
//! - N bytes: JSON payload
//!
//! Every message is wrapped in an [`Envelope`] carrying the protocol version
//! and a request id used to pair replies with calls. A call names a service
//! and a method and carries the argument message; the reply carries a
//! [`Status`] and the reply message.
//!
//! ```rust
//! use homesim_protocol::{Envelope, Request, decode_message, encode_message};
//! use serde_json::json;
//!
//! let call = Request::call("AirPurifier", "GetAirPurifierSensor", json!({}));
//! let bytes = encode_message(&Envelope::request("req-1", call)).unwrap();
//! let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded.request_id, "req-1");
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameReader, FrameWriter, decode_message, encode_message, payload_len};
pub use types::{CallResult, Endpoint, Envelope, ParseEndpointError, Request, Response, Status};

/// Protocol version constant.
pub const PROTOCOL_VERSION: &str = "1";

/// Maximum payload size (1 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

/// Port the backend listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 33000;
