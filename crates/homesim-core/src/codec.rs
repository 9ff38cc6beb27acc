//! Conversion between state mappings and typed messages.
//!
//! [`encode`] turns a caller-supplied (possibly partial) [`StateMap`] into a
//! typed message, rejecting anything the message schema does not declare.
//! [`decode`] turns a typed message back into a mapping in which every
//! schema field is present, unset fields carrying their type default.
//!
//! Decoding a freshly encoded mapping gives back the original values:
//!
//! ```rust
//! use homesim_core::codec::{decode, encode};
//! use homesim_core::devices::AirPurifierState;
//! use serde_json::json;
//!
//! let mapping = json!({"OnOff": {"OnOff": true}});
//! let message: AirPurifierState = encode(mapping.as_object().unwrap()).unwrap();
//! let decoded = decode(&message);
//! assert_eq!(decoded["OnOff"]["OnOff"], json!(true));
//! assert_eq!(decoded["Fancontrol"]["FanMode"], json!(0));
//! ```

use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::schema::{MessageSchema, StateMap};

/// A typed wire message with a static schema.
///
/// Implementors are plain serde structs whose optional fields mirror the
/// schema table returned by [`Message::schema`].
pub trait Message:
    Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync + 'static
{
    /// The static schema of this message type.
    fn schema() -> &'static MessageSchema;
}

/// A mapping does not fit the schema it is encoded against.
///
/// This is a programming error on the caller's side (wrong field name, wrong
/// value type or schema version mismatch), never a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// The mapping names a field the schema does not declare.
    #[error("{message}: unknown field `{path}`")]
    UnknownField { message: &'static str, path: String },

    /// A value has the wrong JSON type for its field.
    #[error("{message}: field `{path}` expects {expected}, got {found}")]
    TypeMismatch {
        message: &'static str,
        path: String,
        expected: &'static str,
        found: String,
    },

    /// A value has the right type but is outside the field's domain.
    #[error("{message}: value {value} of field `{path}` is not a valid {expected}")]
    OutOfRange {
        message: &'static str,
        path: String,
        expected: &'static str,
        value: String,
    },

    /// The mapping passed validation but could not be built into the message.
    #[error("{message}: {detail}")]
    Malformed { message: &'static str, detail: String },
}

impl SchemaViolation {
    /// Name of the message the violation was detected against.
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::UnknownField { message, .. }
            | Self::TypeMismatch { message, .. }
            | Self::OutOfRange { message, .. }
            | Self::Malformed { message, .. } => message,
        }
    }
}

/// Encodes a mapping into a typed message.
///
/// The mapping is validated against `M::schema()` first, so a bad field is
/// reported before anything is sent anywhere.
pub fn encode<M: Message>(mapping: &StateMap) -> Result<M, SchemaViolation> {
    let schema = M::schema();
    schema.validate(mapping)?;
    serde_json::from_value(Value::Object(mapping.clone())).map_err(|e| {
        SchemaViolation::Malformed {
            message: schema.name,
            detail: e.to_string(),
        }
    })
}

/// Decodes a typed message into a mapping with every schema field present.
pub fn decode<M: Message>(message: &M) -> StateMap {
    let mut mapping = match serde_json::to_value(message) {
        Ok(Value::Object(map)) => map,
        _ => StateMap::new(),
    };
    M::schema().fill_defaults(&mut mapping);
    mapping
}

/// Parses a wire value as message `M`.
///
/// Used for replies, where a value that does not match the expected message
/// means the peer sent something malformed.
pub fn from_wire<M: Message>(value: Value) -> Result<M, SchemaViolation> {
    let value = match value {
        Value::Null => Value::Object(StateMap::new()),
        other => other,
    };
    serde_json::from_value(value).map_err(|e| SchemaViolation::Malformed {
        message: M::schema().name,
        detail: e.to_string(),
    })
}

/// Serializes a message for the wire. Unset fields are omitted.
pub fn to_wire<M: Message>(message: &M) -> Value {
    serde_json::to_value(message).unwrap_or_else(|_| Value::Object(StateMap::new()))
}

/// Validates a mapping against a schema known only at runtime and returns
/// it as a wire value. Integers in float fields are sent as floats.
///
/// Counterpart of [`encode`] for callers that pick the method by name, such
/// as the status poller.
pub fn encode_value(schema: &MessageSchema, mapping: &StateMap) -> Result<Value, SchemaViolation> {
    schema.validate(mapping)?;
    let mut mapping = mapping.clone();
    schema.normalize(&mut mapping);
    Ok(Value::Object(mapping))
}

/// Parses a wire value against a schema known only at runtime, filling in
/// defaults like [`decode`].
pub fn decode_value(schema: &MessageSchema, value: Value) -> Result<StateMap, SchemaViolation> {
    let mut mapping = match value {
        Value::Null => StateMap::new(),
        Value::Object(map) => map,
        other => {
            return Err(SchemaViolation::Malformed {
                message: schema.name,
                detail: format!("expected an object, got {other}"),
            });
        }
    };
    schema.validate(&mapping)?;
    schema.normalize(&mut mapping);
    schema.fill_defaults(&mut mapping);
    Ok(mapping)
}
