//! Air purifier capability.

use serde::{Deserialize, Serialize};

use super::clusters::{
    AIR_QUALITY_LEVEL, AirQualityLevel, FAN_CONTROL, FanControl, HEPA_FILTER_MONITORING,
    HepaFilterMonitoring, ON_OFF, OnOff, PM25_CONCENTRATION_MEASUREMENT,
    Pm25ConcentrationMeasurement,
};
use super::common::{HUMIDITY_SENSOR, TEMPERATURE_SENSOR};
use crate::codec::Message;
use crate::schema::{FieldSpec, FieldType, MessageSchema};
use crate::service::{Capability, MethodDescriptor, ServiceDescriptor};

pub static AIR_PURIFIER_STATE: MessageSchema = MessageSchema {
    name: "AirPurifierState",
    fields: &[
        FieldSpec::new("OnOff", FieldType::Message(&ON_OFF)),
        FieldSpec::new("Fancontrol", FieldType::Message(&FAN_CONTROL)),
    ],
};

pub static AIR_QUALITY: MessageSchema = MessageSchema {
    name: "AirQuality",
    fields: &[FieldSpec::new(
        "AirQuality",
        FieldType::Message(&AIR_QUALITY_LEVEL),
    )],
};

pub static HEPA_FILTER: MessageSchema = MessageSchema {
    name: "HepaFilter",
    fields: &[FieldSpec::new(
        "HepaFilterMonitoring",
        FieldType::Message(&HEPA_FILTER_MONITORING),
    )],
};

pub static PM25: MessageSchema = MessageSchema {
    name: "Pm25",
    fields: &[FieldSpec::new(
        "Pm25ConcentrationMeasurement",
        FieldType::Message(&PM25_CONCENTRATION_MEASUREMENT),
    )],
};

pub static AIR_PURIFIER_SERVICE: ServiceDescriptor = ServiceDescriptor {
    name: "AirPurifier",
    methods: &[
        MethodDescriptor::get("GetAirPurifierSensor", &AIR_PURIFIER_STATE),
        MethodDescriptor::set("SetAirPurifierSensor", &AIR_PURIFIER_STATE),
        MethodDescriptor::get("GetFanMode", &AIR_PURIFIER_STATE),
        MethodDescriptor::set("SetFanMode", &AIR_PURIFIER_STATE),
        MethodDescriptor::get("GetMeasuredValue", &TEMPERATURE_SENSOR),
        MethodDescriptor::set("SetMeasuredValue", &TEMPERATURE_SENSOR),
        MethodDescriptor::get("GetHumidityValue", &HUMIDITY_SENSOR),
        MethodDescriptor::set("SetHumidityValue", &HUMIDITY_SENSOR),
        MethodDescriptor::get("GetAirQuality", &AIR_QUALITY),
        MethodDescriptor::set("SetAirQuality", &AIR_QUALITY),
        MethodDescriptor::get("GetCondition", &HEPA_FILTER),
        MethodDescriptor::set("SetCondition", &HEPA_FILTER),
        MethodDescriptor::get("GetPM25", &PM25),
        MethodDescriptor::set("SetPM25", &PM25),
    ],
};

/// Marker for the air purifier capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct AirPurifier;

impl Capability for AirPurifier {
    type State = AirPurifierState;

    const LABEL: &'static str = "air-purifier";
    const GET_STATE: &'static str = "GetAirPurifierSensor";
    const SET_STATE: &'static str = "SetAirPurifierSensor";

    fn service() -> &'static ServiceDescriptor {
        &AIR_PURIFIER_SERVICE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AirPurifierState {
    #[serde(rename = "OnOff", skip_serializing_if = "Option::is_none")]
    pub on_off: Option<OnOff>,
    #[serde(rename = "Fancontrol", skip_serializing_if = "Option::is_none")]
    pub fan_control: Option<FanControl>,
}

impl Message for AirPurifierState {
    fn schema() -> &'static MessageSchema {
        &AIR_PURIFIER_STATE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AirQuality {
    #[serde(rename = "AirQuality", skip_serializing_if = "Option::is_none")]
    pub air_quality: Option<AirQualityLevel>,
}

impl Message for AirQuality {
    fn schema() -> &'static MessageSchema {
        &AIR_QUALITY
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HepaFilter {
    #[serde(
        rename = "HepaFilterMonitoring",
        skip_serializing_if = "Option::is_none"
    )]
    pub hepa_filter_monitoring: Option<HepaFilterMonitoring>,
}

impl Message for HepaFilter {
    fn schema() -> &'static MessageSchema {
        &HEPA_FILTER
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Pm25 {
    #[serde(
        rename = "Pm25ConcentrationMeasurement",
        skip_serializing_if = "Option::is_none"
    )]
    pub pm25_concentration_measurement: Option<Pm25ConcentrationMeasurement>,
}

impl Message for Pm25 {
    fn schema() -> &'static MessageSchema {
        &PM25
    }
}
