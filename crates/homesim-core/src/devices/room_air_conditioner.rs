//! Room air conditioner capability.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::clusters::{
    FAN_CONTROL, FEATURE_MAP, FanControl, FeatureMap, ON_OFF, OnOff, THERMOSTAT, Thermostat,
};
use super::common::{HUMIDITY_SENSOR, TEMPERATURE_SENSOR};
use crate::codec::Message;
use crate::schema::{FieldSpec, FieldType, MessageSchema, StateMap};
use crate::service::{Capability, MethodDescriptor, ServiceDescriptor};

pub static ROOM_AIR_CONDITIONER_STATE: MessageSchema = MessageSchema {
    name: "RoomAirConditionerState",
    fields: &[
        FieldSpec::new("OnOff", FieldType::Message(&ON_OFF)),
        FieldSpec::new("Thermostat", FieldType::Message(&THERMOSTAT)),
        FieldSpec::new("Fancontrol", FieldType::Message(&FAN_CONTROL)),
        FieldSpec::new("FanFeatureMap", FieldType::Message(&FEATURE_MAP)),
        FieldSpec::new("ThermostatFeatureMap", FieldType::Message(&FEATURE_MAP)),
    ],
};

pub static ROOM_AIR_CONDITIONER_SERVICE: ServiceDescriptor = ServiceDescriptor {
    name: "RoomAirConditioner",
    methods: &[
        MethodDescriptor::get("GetRoomAirConditionerSensor", &ROOM_AIR_CONDITIONER_STATE),
        MethodDescriptor::set("SetRoomAirConditionerSensor", &ROOM_AIR_CONDITIONER_STATE),
        MethodDescriptor::get("GetMeasuredValue", &TEMPERATURE_SENSOR),
        MethodDescriptor::set("SetMeasuredValue", &TEMPERATURE_SENSOR),
        MethodDescriptor::get("GetHumiditySensorValue", &HUMIDITY_SENSOR),
        MethodDescriptor::set("SetHumiditySensorValue", &HUMIDITY_SENSOR),
    ],
};

/// Marker for the room air conditioner capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomAirConditioner;

impl Capability for RoomAirConditioner {
    type State = RoomAirConditionerState;

    const LABEL: &'static str = "room-air-conditioner";
    const GET_STATE: &'static str = "GetRoomAirConditionerSensor";
    const SET_STATE: &'static str = "SetRoomAirConditionerSensor";

    fn service() -> &'static ServiceDescriptor {
        &ROOM_AIR_CONDITIONER_SERVICE
    }

    /// Powered on, thermostat off, 21.25 °C heating and 27.76 °C cooling
    /// setpoints, medium fan, 28.34 °C ambient at 96.11 % humidity.
    fn initial_state() -> Vec<(&'static str, StateMap)> {
        let state = json!({
            "OnOff": {"OnOff": true},
            "Thermostat": {
                "OccupiedHeatingSetpoint": 2125,
                "OccupiedCoolingSetpoint": 2776,
                "systemMode": 0
            },
            "Fancontrol": {"FanMode": 2, "SpeedSetting": 100},
            "FanFeatureMap": {"featureMap": 1},
            "ThermostatFeatureMap": {"featureMap": 7}
        });
        let humidity = json!({"RelativeHumidityMeasurement": {"HumidityValue": 9611}});
        let temperature = json!({"TemperatureMeasurement": {"MeasuredValue": 2834}});

        [
            (Self::SET_STATE, state),
            ("SetHumiditySensorValue", humidity),
            ("SetMeasuredValue", temperature),
        ]
        .into_iter()
        .filter_map(|(method, value)| match value {
            serde_json::Value::Object(map) => Some((method, map)),
            _ => None,
        })
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoomAirConditionerState {
    #[serde(rename = "OnOff", skip_serializing_if = "Option::is_none")]
    pub on_off: Option<OnOff>,
    #[serde(rename = "Thermostat", skip_serializing_if = "Option::is_none")]
    pub thermostat: Option<Thermostat>,
    #[serde(rename = "Fancontrol", skip_serializing_if = "Option::is_none")]
    pub fan_control: Option<FanControl>,
    #[serde(rename = "FanFeatureMap", skip_serializing_if = "Option::is_none")]
    pub fan_feature_map: Option<FeatureMap>,
    #[serde(rename = "ThermostatFeatureMap", skip_serializing_if = "Option::is_none")]
    pub thermostat_feature_map: Option<FeatureMap>,
}

impl Message for RoomAirConditionerState {
    fn schema() -> &'static MessageSchema {
        &ROOM_AIR_CONDITIONER_STATE
    }
}
