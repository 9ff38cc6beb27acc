//! Capability-specific accessors.
//!
//! Each accessor is a shortcut over [`DeviceClient::get`] and
//! [`DeviceClient::set`], bound to one RPC method and its message.

use homesim_core::StateMap;
use homesim_core::codec::SchemaViolation;
use homesim_core::devices::{
    AirPurifier, AirPurifierState, AirQuality, HepaFilter, HumiditySensor, Pm25,
    RoomAirConditioner, TemperatureSensor, Window,
};
use homesim_protocol::CallResult;

use crate::device::DeviceClient;
use crate::transport::{TcpTransport, Transport};

pub type AirPurifierClient<T = TcpTransport> = DeviceClient<AirPurifier, T>;
pub type RoomAirConditionerClient<T = TcpTransport> = DeviceClient<RoomAirConditioner, T>;
pub type WindowClient<T = TcpTransport> = DeviceClient<Window, T>;

macro_rules! accessors {
    ($($get:ident, $set:ident => $message:ty, $get_method:literal, $set_method:literal;)*) => {
        $(
            #[doc = concat!("Calls `", $get_method, "`.")]
            pub fn $get(&self) -> CallResult {
                self.get::<$message>($get_method)
            }

            #[doc = concat!("Calls `", $set_method, "` with a partial `", stringify!($message), "`.")]
            pub fn $set(&self, partial: &StateMap) -> Result<CallResult, SchemaViolation> {
                self.set::<$message>($set_method, partial)
            }
        )*
    };
}

impl<T: Transport> DeviceClient<AirPurifier, T> {
    accessors! {
        get_fan_mode, set_fan_mode => AirPurifierState, "GetFanMode", "SetFanMode";
        get_measured_value, set_measured_value => TemperatureSensor, "GetMeasuredValue", "SetMeasuredValue";
        get_humidity_value, set_humidity_value => HumiditySensor, "GetHumidityValue", "SetHumidityValue";
        get_air_quality, set_air_quality => AirQuality, "GetAirQuality", "SetAirQuality";
        get_condition, set_condition => HepaFilter, "GetCondition", "SetCondition";
        get_pm25, set_pm25 => Pm25, "GetPM25", "SetPM25";
    }
}

impl<T: Transport> DeviceClient<RoomAirConditioner, T> {
    accessors! {
        get_measured_value, set_measured_value => TemperatureSensor, "GetMeasuredValue", "SetMeasuredValue";
        get_humidity_sensor_value, set_humidity_sensor_value => HumiditySensor, "GetHumiditySensorValue", "SetHumiditySensorValue";
    }
}
