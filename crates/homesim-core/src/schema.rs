//! Static message schemas.
//!
//! Every message exchanged with the backend has a fixed, hand-written schema
//! describing its fields and their wire types. Schemas are `'static` tables:
//! they are defined once next to the message structs and never change at
//! runtime.
//!
//! A message is a set of named fields. Device state messages are keyed by
//! cluster name at the top level, with each cluster holding its attributes:
//!
//! ```text
//! RoomAirConditionerState
//! ├── OnOff        { OnOff: bool }
//! ├── Thermostat   { systemMode: enum, OccupiedHeatingSetpoint: int32, ... }
//! └── Fancontrol   { FanMode: enum, SpeedSetting: uint32 }
//! ```

use serde_json::{Map, Value};

use crate::codec::SchemaViolation;

/// Caller-facing representation of message state: field name to value,
/// nested one level per cluster.
pub type StateMap = Map<String, Value>;

/// One allowed value of an enum field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumVariant {
    pub value: u32,
    pub name: &'static str,
}

impl EnumVariant {
    pub const fn new(value: u32, name: &'static str) -> Self {
        Self { value, name }
    }
}

/// Wire type of a single field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    Bool,
    Int32,
    UInt32,
    Float,
    String,
    /// Integer enum restricted to the listed variants.
    Enum(&'static [EnumVariant]),
    /// Nested message (a cluster inside a device state message).
    Message(&'static MessageSchema),
}

impl FieldType {
    /// Short type name used in violation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Float => "float",
            Self::String => "string",
            Self::Enum(_) => "enum",
            Self::Message(_) => "message",
        }
    }

    /// Value reported for a field that is not present on the wire.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int32 | Self::UInt32 | Self::Enum(_) => Value::from(0),
            Self::Float => Value::from(0.0),
            Self::String => Value::String(String::new()),
            Self::Message(schema) => Value::Object(schema.defaults()),
        }
    }
}

/// A named, typed field of a message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

impl FieldSpec {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty }
    }
}

/// Schema of one message type.
#[derive(Debug, PartialEq)]
pub struct MessageSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl MessageSchema {
    /// Looks up a field by its wire name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns a mapping with every field at its default value.
    pub fn defaults(&self) -> StateMap {
        self.fields
            .iter()
            .map(|f| (f.name.to_string(), f.ty.default_value()))
            .collect()
    }

    /// Checks a (possibly partial) mapping against this schema.
    ///
    /// Absent fields and explicit `null`s are accepted and mean "not set".
    /// Unknown fields and values of the wrong type are rejected.
    pub fn validate(&self, map: &StateMap) -> Result<(), SchemaViolation> {
        self.validate_at(map, "")
    }

    fn validate_at(&self, map: &StateMap, prefix: &str) -> Result<(), SchemaViolation> {
        for (key, value) in map {
            let path = join_path(prefix, key);
            let Some(field) = self.field(key) else {
                return Err(SchemaViolation::UnknownField {
                    message: self.name,
                    path,
                });
            };
            if value.is_null() {
                continue;
            }
            check_value(self.name, &path, &field.ty, value)?;
        }
        Ok(())
    }

    /// Inserts defaults for every field missing from `map`, recursing into
    /// nested messages. Fields not in the schema are left untouched.
    pub fn fill_defaults(&self, map: &mut StateMap) {
        for field in self.fields {
            if matches!(map.get(field.name), None | Some(Value::Null)) {
                map.insert(field.name.to_string(), field.ty.default_value());
                continue;
            }
            if let (FieldType::Message(schema), Some(Value::Object(inner))) =
                (field.ty, map.get_mut(field.name))
            {
                schema.fill_defaults(inner);
            }
        }
    }

    /// Rewrites integers held by `Float` fields as floats, recursing into
    /// nested messages. Other values are left untouched.
    ///
    /// `serde_json` compares `12` and `12.0` as different numbers; after
    /// this call a mapping compares equal to its decoded form.
    pub fn normalize(&self, map: &mut StateMap) {
        for (key, value) in map.iter_mut() {
            match self.field(key).map(|f| f.ty) {
                Some(FieldType::Float) => {
                    let float = match value {
                        Value::Number(n) if !n.is_f64() => n.as_f64(),
                        _ => None,
                    };
                    if let Some(float) = float {
                        *value = Value::from(float);
                    }
                }
                Some(FieldType::Message(schema)) => {
                    if let Value::Object(inner) = value {
                        schema.normalize(inner);
                    }
                }
                _ => {}
            }
        }
    }

    /// Merges the fields present in `update` into `target`.
    ///
    /// Nested messages are merged field by field, so a partial update of one
    /// cluster attribute leaves its siblings alone. `null` values are skipped.
    pub fn merge(&self, target: &mut StateMap, update: &StateMap) {
        for (key, value) in update {
            if value.is_null() {
                continue;
            }
            match (self.field(key).map(|f| f.ty), value) {
                (Some(FieldType::Message(schema)), Value::Object(inner)) => {
                    let slot = target
                        .entry(key.clone())
                        .or_insert_with(|| Value::Object(schema.defaults()));
                    match slot {
                        Value::Object(existing) => schema.merge(existing, inner),
                        other => *other = Value::Object(inner.clone()),
                    }
                }
                _ => {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn check_value(
    message: &'static str,
    path: &str,
    ty: &FieldType,
    value: &Value,
) -> Result<(), SchemaViolation> {
    let mismatch = || SchemaViolation::TypeMismatch {
        message,
        path: path.to_string(),
        expected: ty.type_name(),
        found: describe(value),
    };
    let out_of_range = || SchemaViolation::OutOfRange {
        message,
        path: path.to_string(),
        expected: ty.type_name(),
        value: value.to_string(),
    };

    match ty {
        FieldType::Bool => value.is_boolean().then_some(()).ok_or_else(mismatch),
        FieldType::Int32 => {
            if value.is_f64() || !value.is_number() {
                return Err(mismatch());
            }
            match value.as_i64() {
                Some(n) if i32::try_from(n).is_ok() => Ok(()),
                _ => Err(out_of_range()),
            }
        }
        FieldType::UInt32 => {
            if value.is_f64() || !value.is_number() {
                return Err(mismatch());
            }
            match value.as_u64() {
                Some(n) if u32::try_from(n).is_ok() => Ok(()),
                _ => Err(out_of_range()),
            }
        }
        FieldType::Float => value.is_number().then_some(()).ok_or_else(mismatch),
        FieldType::String => value.is_string().then_some(()).ok_or_else(mismatch),
        FieldType::Enum(variants) => {
            if value.is_f64() || !value.is_number() {
                return Err(mismatch());
            }
            match value.as_u64() {
                Some(n) if variants.iter().any(|v| u64::from(v.value) == n) => Ok(()),
                _ => Err(out_of_range()),
            }
        }
        FieldType::Message(schema) => match value {
            Value::Object(inner) => schema.validate_at(inner, path),
            _ => Err(mismatch()),
        },
    }
}

/// Describes a JSON value for diagnostics, e.g. `string "heat"`.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static MODES: &[EnumVariant] = &[
        EnumVariant::new(0, "Off"),
        EnumVariant::new(1, "Auto"),
        EnumVariant::new(3, "Cool"),
    ];

    static INNER: MessageSchema = MessageSchema {
        name: "Inner",
        fields: &[
            FieldSpec::new("mode", FieldType::Enum(MODES)),
            FieldSpec::new("level", FieldType::Int32),
            FieldSpec::new("count", FieldType::UInt32),
        ],
    };

    static OUTER: MessageSchema = MessageSchema {
        name: "Outer",
        fields: &[
            FieldSpec::new("Inner", FieldType::Message(&INNER)),
            FieldSpec::new("label", FieldType::String),
            FieldSpec::new("ratio", FieldType::Float),
            FieldSpec::new("on", FieldType::Bool),
        ],
    };

    fn map(value: serde_json::Value) -> StateMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn defaults_cover_every_field() {
        let defaults = OUTER.defaults();
        assert_eq!(
            Value::Object(defaults),
            json!({
                "Inner": {"mode": 0, "level": 0, "count": 0},
                "label": "",
                "ratio": 0.0,
                "on": false
            })
        );
    }

    #[test]
    fn validate_accepts_partial_mapping() {
        assert!(OUTER.validate(&map(json!({"Inner": {"level": -5}}))).is_ok());
        assert!(OUTER.validate(&StateMap::new()).is_ok());
    }

    #[test]
    fn validate_treats_null_as_absent() {
        assert!(OUTER.validate(&map(json!({"Inner": null, "label": null}))).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_nested_field() {
        let err = OUTER
            .validate(&map(json!({"Inner": {"speed": 1}})))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::UnknownField {
                message: "Outer",
                path: "Inner.speed".to_string(),
            }
        );
    }

    #[test]
    fn validate_rejects_string_for_enum() {
        let err = OUTER
            .validate(&map(json!({"Inner": {"mode": "Cool"}})))
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaViolation::TypeMismatch { expected: "enum", ref path, .. } if path == "Inner.mode"
        ));
    }

    #[test]
    fn validate_rejects_undeclared_enum_value() {
        let err = OUTER
            .validate(&map(json!({"Inner": {"mode": 2}})))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::OutOfRange { .. }));
    }

    #[test]
    fn validate_checks_integer_ranges() {
        assert!(matches!(
            OUTER.validate(&map(json!({"Inner": {"count": -1}}))),
            Err(SchemaViolation::OutOfRange { .. })
        ));
        assert!(matches!(
            OUTER.validate(&map(json!({"Inner": {"level": 3_000_000_000u64}}))),
            Err(SchemaViolation::OutOfRange { .. })
        ));
        assert!(matches!(
            OUTER.validate(&map(json!({"Inner": {"level": 1.5}}))),
            Err(SchemaViolation::TypeMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_scalar_for_nested_message() {
        assert!(matches!(
            OUTER.validate(&map(json!({"Inner": 7}))),
            Err(SchemaViolation::TypeMismatch { expected: "message", .. })
        ));
    }

    #[test]
    fn fill_defaults_keeps_present_values() {
        let mut state = map(json!({"Inner": {"level": 12}, "on": true}));
        OUTER.fill_defaults(&mut state);
        assert_eq!(state["Inner"], json!({"mode": 0, "level": 12, "count": 0}));
        assert_eq!(state["on"], json!(true));
        assert_eq!(state["label"], json!(""));
    }

    #[test]
    fn merge_is_field_wise() {
        let mut state = OUTER.defaults();
        OUTER.merge(&mut state, &map(json!({"Inner": {"level": 2125, "mode": 3}})));
        OUTER.merge(&mut state, &map(json!({"Inner": {"count": 4}, "label": null})));

        assert_eq!(state["Inner"], json!({"mode": 3, "level": 2125, "count": 4}));
        assert_eq!(state["label"], json!(""));
    }

    #[test]
    fn normalize_turns_integers_in_float_fields_into_floats() {
        let mut state = map(json!({"ratio": 12, "Inner": {"level": 3}, "label": "x"}));
        OUTER.normalize(&mut state);
        assert!(state["ratio"].is_f64());
        assert_eq!(state["ratio"], json!(12.0));
        assert_eq!(state["Inner"]["level"], json!(3));
        assert!(!state["Inner"]["level"].is_f64());
    }
}
