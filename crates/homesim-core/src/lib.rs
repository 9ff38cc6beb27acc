//! Core types: message schemas, codec, device capabilities

pub mod codec;
pub mod devices;
pub mod schema;
pub mod service;
pub mod tracing;

pub use codec::{
    Message, SchemaViolation, decode, decode_value, encode, encode_value, from_wire, to_wire,
};
pub use devices::{AirPurifier, RoomAirConditioner, Window};
pub use schema::{EnumVariant, FieldSpec, FieldType, MessageSchema, StateMap};
pub use service::{Capability, MethodDescriptor, MethodKind, ServiceDescriptor};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
