//! Attribute clusters shared by device state messages.
//!
//! Each cluster is a nested message inside a device state message. All
//! attributes are optional so that a partial update carries only the fields
//! the caller actually set.

use serde::{Deserialize, Serialize};

use crate::codec::Message;
use crate::schema::{EnumVariant, FieldSpec, FieldType, MessageSchema};

/// Thermostat `systemMode` values.
pub static SYSTEM_MODES: &[EnumVariant] = &[
    EnumVariant::new(0, "Off"),
    EnumVariant::new(1, "Auto"),
    EnumVariant::new(3, "Cool"),
    EnumVariant::new(4, "Heat"),
    EnumVariant::new(5, "EmergencyHeat"),
    EnumVariant::new(6, "Precooling"),
    EnumVariant::new(7, "FanOnly"),
    EnumVariant::new(8, "Dry"),
    EnumVariant::new(9, "Sleep"),
];

/// Fan control `FanMode` values.
pub static FAN_MODES: &[EnumVariant] = &[
    EnumVariant::new(0, "Off"),
    EnumVariant::new(1, "Low"),
    EnumVariant::new(2, "Medium"),
    EnumVariant::new(3, "High"),
    EnumVariant::new(4, "On"),
    EnumVariant::new(5, "Auto"),
    EnumVariant::new(6, "Smart"),
];

/// Air quality levels.
pub static AIR_QUALITY_LEVELS: &[EnumVariant] = &[
    EnumVariant::new(0, "Unknown"),
    EnumVariant::new(1, "Good"),
    EnumVariant::new(2, "Fair"),
    EnumVariant::new(3, "Moderate"),
    EnumVariant::new(4, "Poor"),
    EnumVariant::new(5, "VeryPoor"),
    EnumVariant::new(6, "ExtremelyPoor"),
];

/// HEPA filter change indication values.
pub static CHANGE_INDICATIONS: &[EnumVariant] = &[
    EnumVariant::new(0, "Ok"),
    EnumVariant::new(1, "Warning"),
    EnumVariant::new(2, "Critical"),
];

pub static ON_OFF: MessageSchema = MessageSchema {
    name: "OnOff",
    fields: &[FieldSpec::new("OnOff", FieldType::Bool)],
};

pub static THERMOSTAT: MessageSchema = MessageSchema {
    name: "Thermostat",
    fields: &[
        FieldSpec::new("systemMode", FieldType::Enum(SYSTEM_MODES)),
        FieldSpec::new("OccupiedHeatingSetpoint", FieldType::Int32),
        FieldSpec::new("OccupiedCoolingSetpoint", FieldType::Int32),
    ],
};

pub static FAN_CONTROL: MessageSchema = MessageSchema {
    name: "Fancontrol",
    fields: &[
        FieldSpec::new("FanMode", FieldType::Enum(FAN_MODES)),
        FieldSpec::new("SpeedSetting", FieldType::UInt32),
        FieldSpec::new("PercentSetting", FieldType::UInt32),
    ],
};

pub static FEATURE_MAP: MessageSchema = MessageSchema {
    name: "FeatureMap",
    fields: &[FieldSpec::new("featureMap", FieldType::UInt32)],
};

pub static TEMPERATURE_MEASUREMENT: MessageSchema = MessageSchema {
    name: "TemperatureMeasurement",
    fields: &[FieldSpec::new("MeasuredValue", FieldType::Int32)],
};

pub static RELATIVE_HUMIDITY_MEASUREMENT: MessageSchema = MessageSchema {
    name: "RelativeHumidityMeasurement",
    fields: &[FieldSpec::new("HumidityValue", FieldType::UInt32)],
};

pub static AIR_QUALITY_LEVEL: MessageSchema = MessageSchema {
    name: "AirQuality",
    fields: &[FieldSpec::new("AirQuality", FieldType::Enum(AIR_QUALITY_LEVELS))],
};

pub static HEPA_FILTER_MONITORING: MessageSchema = MessageSchema {
    name: "HepaFilterMonitoring",
    fields: &[
        FieldSpec::new("Condition", FieldType::UInt32),
        FieldSpec::new("ChangeIndication", FieldType::Enum(CHANGE_INDICATIONS)),
    ],
};

pub static PM25_CONCENTRATION_MEASUREMENT: MessageSchema = MessageSchema {
    name: "Pm25ConcentrationMeasurement",
    fields: &[FieldSpec::new("MeasuredValue", FieldType::Float)],
};

pub static WINDOW_COVERING: MessageSchema = MessageSchema {
    name: "WindowCovering",
    fields: &[
        FieldSpec::new("CurrentPositionLiftPercent100ths", FieldType::UInt32),
        FieldSpec::new("TargetPositionLiftPercent100ths", FieldType::UInt32),
        FieldSpec::new("CurrentPositionTiltPercent100ths", FieldType::UInt32),
        FieldSpec::new("TargetPositionTiltPercent100ths", FieldType::UInt32),
        FieldSpec::new("OperationalStatus", FieldType::UInt32),
    ],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OnOff {
    #[serde(rename = "OnOff", skip_serializing_if = "Option::is_none")]
    pub on_off: Option<bool>,
}

impl Message for OnOff {
    fn schema() -> &'static MessageSchema {
        &ON_OFF
    }
}

/// Setpoints are in hundredths of a degree Celsius.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thermostat {
    #[serde(rename = "systemMode", skip_serializing_if = "Option::is_none")]
    pub system_mode: Option<u32>,
    #[serde(
        rename = "OccupiedHeatingSetpoint",
        skip_serializing_if = "Option::is_none"
    )]
    pub occupied_heating_setpoint: Option<i32>,
    #[serde(
        rename = "OccupiedCoolingSetpoint",
        skip_serializing_if = "Option::is_none"
    )]
    pub occupied_cooling_setpoint: Option<i32>,
}

impl Message for Thermostat {
    fn schema() -> &'static MessageSchema {
        &THERMOSTAT
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FanControl {
    #[serde(rename = "FanMode", skip_serializing_if = "Option::is_none")]
    pub fan_mode: Option<u32>,
    #[serde(rename = "SpeedSetting", skip_serializing_if = "Option::is_none")]
    pub speed_setting: Option<u32>,
    #[serde(rename = "PercentSetting", skip_serializing_if = "Option::is_none")]
    pub percent_setting: Option<u32>,
}

impl Message for FanControl {
    fn schema() -> &'static MessageSchema {
        &FAN_CONTROL
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureMap {
    #[serde(rename = "featureMap", skip_serializing_if = "Option::is_none")]
    pub feature_map: Option<u32>,
}

impl Message for FeatureMap {
    fn schema() -> &'static MessageSchema {
        &FEATURE_MAP
    }
}

/// Measured temperature in hundredths of a degree Celsius.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemperatureMeasurement {
    #[serde(rename = "MeasuredValue", skip_serializing_if = "Option::is_none")]
    pub measured_value: Option<i32>,
}

impl Message for TemperatureMeasurement {
    fn schema() -> &'static MessageSchema {
        &TEMPERATURE_MEASUREMENT
    }
}

/// Relative humidity in hundredths of a percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelativeHumidityMeasurement {
    #[serde(rename = "HumidityValue", skip_serializing_if = "Option::is_none")]
    pub humidity_value: Option<u32>,
}

impl Message for RelativeHumidityMeasurement {
    fn schema() -> &'static MessageSchema {
        &RELATIVE_HUMIDITY_MEASUREMENT
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AirQualityLevel {
    #[serde(rename = "AirQuality", skip_serializing_if = "Option::is_none")]
    pub air_quality: Option<u32>,
}

impl Message for AirQualityLevel {
    fn schema() -> &'static MessageSchema {
        &AIR_QUALITY_LEVEL
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HepaFilterMonitoring {
    /// Remaining filter life in percent.
    #[serde(rename = "Condition", skip_serializing_if = "Option::is_none")]
    pub condition: Option<u32>,
    #[serde(rename = "ChangeIndication", skip_serializing_if = "Option::is_none")]
    pub change_indication: Option<u32>,
}

impl Message for HepaFilterMonitoring {
    fn schema() -> &'static MessageSchema {
        &HEPA_FILTER_MONITORING
    }
}

/// PM2.5 concentration in µg/m³.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Pm25ConcentrationMeasurement {
    #[serde(rename = "MeasuredValue", skip_serializing_if = "Option::is_none")]
    pub measured_value: Option<f64>,
}

impl Message for Pm25ConcentrationMeasurement {
    fn schema() -> &'static MessageSchema {
        &PM25_CONCENTRATION_MEASUREMENT
    }
}

/// Positions are in hundredths of a percent (0 = fully open).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowCovering {
    #[serde(
        rename = "CurrentPositionLiftPercent100ths",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_position_lift: Option<u32>,
    #[serde(
        rename = "TargetPositionLiftPercent100ths",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_position_lift: Option<u32>,
    #[serde(
        rename = "CurrentPositionTiltPercent100ths",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_position_tilt: Option<u32>,
    #[serde(
        rename = "TargetPositionTiltPercent100ths",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_position_tilt: Option<u32>,
    #[serde(rename = "OperationalStatus", skip_serializing_if = "Option::is_none")]
    pub operational_status: Option<u32>,
}

impl Message for WindowCovering {
    fn schema() -> &'static MessageSchema {
        &WINDOW_COVERING
    }
}
