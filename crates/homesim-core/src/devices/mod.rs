//! Device capabilities, their RPC services and message types.

mod air_purifier;
pub mod clusters;
mod common;
mod room_air_conditioner;
mod window;

pub use air_purifier::{
    AIR_PURIFIER_SERVICE, AIR_PURIFIER_STATE, AIR_QUALITY, AirPurifier, AirPurifierState,
    AirQuality, HEPA_FILTER, HepaFilter, PM25, Pm25,
};
pub use common::{
    DEVICE_SERVICE, DEVICE_STATE, DeviceState, DeviceStatus, EMPTY, Empty, HUMIDITY_SENSOR,
    HumiditySensor, TEMPERATURE_SENSOR, TemperatureSensor,
};
pub use room_air_conditioner::{
    ROOM_AIR_CONDITIONER_SERVICE, ROOM_AIR_CONDITIONER_STATE, RoomAirConditioner,
    RoomAirConditionerState,
};
pub use window::{WINDOW_SERVICE, WINDOW_STATE, Window, WindowState};

use crate::service::ServiceDescriptor;

/// Every service a backend serves.
pub fn services() -> [&'static ServiceDescriptor; 4] {
    [
        &AIR_PURIFIER_SERVICE,
        &ROOM_AIR_CONDITIONER_SERVICE,
        &WINDOW_SERVICE,
        &DEVICE_SERVICE,
    ]
}

/// Looks up a service by name.
pub fn find_service(name: &str) -> Option<&'static ServiceDescriptor> {
    services().into_iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Message, decode, encode};
    use crate::service::{Capability, MethodKind};

    /// The serde struct and the hand-written schema table must describe the
    /// same fields.
    fn assert_struct_matches_schema<M: Message>() {
        let schema = M::schema();
        let defaults = schema.defaults();

        let message: M = encode(&defaults).unwrap_or_else(|e| panic!("{}: {e}", schema.name));
        assert_eq!(decode(&message), defaults, "{}", schema.name);

        let mut keys: Vec<_> = decode(&M::default()).keys().cloned().collect();
        let mut fields: Vec<_> = schema.fields.iter().map(|f| f.name.to_string()).collect();
        keys.sort();
        fields.sort();
        assert_eq!(keys, fields, "{}", schema.name);
    }

    #[test]
    fn structs_match_schemas() {
        assert_struct_matches_schema::<Empty>();
        assert_struct_matches_schema::<TemperatureSensor>();
        assert_struct_matches_schema::<HumiditySensor>();
        assert_struct_matches_schema::<DeviceState>();
        assert_struct_matches_schema::<AirPurifierState>();
        assert_struct_matches_schema::<AirQuality>();
        assert_struct_matches_schema::<HepaFilter>();
        assert_struct_matches_schema::<Pm25>();
        assert_struct_matches_schema::<RoomAirConditionerState>();
        assert_struct_matches_schema::<WindowState>();
    }

    #[test]
    fn every_getter_has_a_setter() {
        for service in services() {
            for method in service.methods.iter().filter(|m| m.kind == MethodKind::Get) {
                let Some(suffix) = method.name.strip_prefix("Get") else {
                    panic!("{}.{} is not named Get*", service.name, method.name);
                };
                if service.name == "Device" {
                    continue;
                }
                let setter = service
                    .method(&format!("Set{suffix}"))
                    .unwrap_or_else(|| panic!("{}.{} has no setter", service.name, method.name));
                assert_eq!(setter.kind, MethodKind::Set);
                assert_eq!(setter.schema, method.schema);
            }
        }
    }

    #[test]
    fn capability_state_methods_exist() {
        fn check<C: Capability>() {
            let service = C::service();
            let get = service.method(C::GET_STATE).unwrap();
            let set = service.method(C::SET_STATE).unwrap();
            assert_eq!(get.schema, C::State::schema());
            assert_eq!(set.schema, C::State::schema());
        }
        check::<AirPurifier>();
        check::<RoomAirConditioner>();
        check::<Window>();
    }

    #[test]
    fn state_getters_skip_duplicate_messages() {
        let names: Vec<_> = AIR_PURIFIER_SERVICE
            .state_getters()
            .iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "GetAirPurifierSensor",
                "GetMeasuredValue",
                "GetHumidityValue",
                "GetAirQuality",
                "GetCondition",
                "GetPM25",
            ]
        );
    }

    #[test]
    fn initial_state_validates() {
        for (method, state) in RoomAirConditioner::initial_state() {
            let descriptor = ROOM_AIR_CONDITIONER_SERVICE.method(method).unwrap();
            assert_eq!(descriptor.kind, MethodKind::Set);
            descriptor.schema.validate(&state).unwrap();
        }
    }

    #[test]
    fn find_service_by_name() {
        assert_eq!(find_service("Window"), Some(&WINDOW_SERVICE));
        assert!(find_service("Toaster").is_none());
    }
}
