//! Messages shared by several capabilities, and the device-level service.

use serde::{Deserialize, Serialize};

use super::clusters::{
    RELATIVE_HUMIDITY_MEASUREMENT, RelativeHumidityMeasurement, TEMPERATURE_MEASUREMENT,
    TemperatureMeasurement,
};
use crate::codec::Message;
use crate::schema::{EnumVariant, FieldSpec, FieldType, MessageSchema};
use crate::service::{MethodDescriptor, ServiceDescriptor};

pub static EMPTY: MessageSchema = MessageSchema {
    name: "Empty",
    fields: &[],
};

pub static TEMPERATURE_SENSOR: MessageSchema = MessageSchema {
    name: "TemperatureSensor",
    fields: &[FieldSpec::new(
        "TemperatureMeasurement",
        FieldType::Message(&TEMPERATURE_MEASUREMENT),
    )],
};

pub static HUMIDITY_SENSOR: MessageSchema = MessageSchema {
    name: "HumiditySensor",
    fields: &[FieldSpec::new(
        "RelativeHumidityMeasurement",
        FieldType::Message(&RELATIVE_HUMIDITY_MEASUREMENT),
    )],
};

/// Lifecycle states reported by `GetDeviceState`.
pub static DEVICE_LIFECYCLE: &[EnumVariant] = &[
    EnumVariant::new(0, "Uninitialized"),
    EnumVariant::new(1, "Running"),
];

pub static DEVICE_STATUS: MessageSchema = MessageSchema {
    name: "DeviceStatus",
    fields: &[
        FieldSpec::new("state", FieldType::Enum(DEVICE_LIFECYCLE)),
        FieldSpec::new("commissioned", FieldType::Bool),
    ],
};

pub static DEVICE_STATE: MessageSchema = MessageSchema {
    name: "DeviceState",
    fields: &[FieldSpec::new(
        "DeviceState",
        FieldType::Message(&DEVICE_STATUS),
    )],
};

/// Device-level service, available on every backend.
pub static DEVICE_SERVICE: ServiceDescriptor = ServiceDescriptor {
    name: "Device",
    methods: &[MethodDescriptor::get("GetDeviceState", &DEVICE_STATE)],
};

/// Argument of every `Get*` call and reply of every `Set*` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Empty {}

impl Message for Empty {
    fn schema() -> &'static MessageSchema {
        &EMPTY
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemperatureSensor {
    #[serde(
        rename = "TemperatureMeasurement",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature_measurement: Option<TemperatureMeasurement>,
}

impl Message for TemperatureSensor {
    fn schema() -> &'static MessageSchema {
        &TEMPERATURE_SENSOR
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HumiditySensor {
    #[serde(
        rename = "RelativeHumidityMeasurement",
        skip_serializing_if = "Option::is_none"
    )]
    pub relative_humidity_measurement: Option<RelativeHumidityMeasurement>,
}

impl Message for HumiditySensor {
    fn schema() -> &'static MessageSchema {
        &HUMIDITY_SENSOR
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commissioned: Option<bool>,
}

impl Message for DeviceStatus {
    fn schema() -> &'static MessageSchema {
        &DEVICE_STATUS
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceState {
    #[serde(rename = "DeviceState", skip_serializing_if = "Option::is_none")]
    pub device_state: Option<DeviceStatus>,
}

impl Message for DeviceState {
    fn schema() -> &'static MessageSchema {
        &DEVICE_STATE
    }
}
