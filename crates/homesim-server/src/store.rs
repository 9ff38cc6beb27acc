//! In-memory device state and call dispatch.
//!
//! The store keeps one state mapping per (service, message) pair. Getters
//! that share a message (for example `GetAirPurifierSensor` and
//! `GetFanMode`) therefore read the same state, and a `Set*` call through
//! either of them is visible to both.

use std::collections::HashMap;

use homesim_core::devices::{self, DEVICE_SERVICE};
use homesim_core::{MessageSchema, MethodKind, StateMap};
use homesim_protocol::{Response, Status};
use serde_json::{Value, json};
use tracing::debug;

/// Lifecycle of the simulated device, as reported by `GetDeviceState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized = 0,
    Running = 1,
}

/// State of every simulated device.
#[derive(Debug, Clone)]
pub struct DeviceStore {
    states: HashMap<(&'static str, &'static str), StateMap>,
    lifecycle: Lifecycle,
    commissioned: bool,
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStore {
    /// Creates a store with every message of every service at its defaults.
    pub fn new() -> Self {
        let mut states = HashMap::new();
        for service in devices::services() {
            for method in service.methods {
                states
                    .entry((service.name, method.schema.name))
                    .or_insert_with(|| method.schema.defaults());
            }
        }
        Self {
            states,
            lifecycle: Lifecycle::Uninitialized,
            commissioned: false,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    pub fn set_commissioned(&mut self, commissioned: bool) {
        self.commissioned = commissioned;
    }

    /// Returns the stored state for a message of a service.
    pub fn state(&self, service: &str, schema: &MessageSchema) -> Option<&StateMap> {
        let service = devices::find_service(service)?;
        self.states.get(&(service.name, schema.name))
    }

    /// Executes one call and builds the reply.
    pub fn dispatch(&mut self, service: &str, method: &str, arg: &Value) -> Response {
        let Some(descriptor) = devices::find_service(service) else {
            debug!(service, "unknown service");
            return Response::failure(Status::NotFound);
        };
        let Some(method) = descriptor.method(method) else {
            debug!(service, method, "unknown method");
            return Response::failure(Status::Unimplemented);
        };

        let mut arg = match arg {
            Value::Null => StateMap::new(),
            Value::Object(map) => map.clone(),
            other => {
                debug!(service, method = method.name, %other, "argument is not a message");
                return Response::failure(Status::InvalidArgument);
            }
        };

        match method.kind {
            MethodKind::Get => {
                if !arg.is_empty() {
                    debug!(service, method = method.name, "get with non-empty argument");
                    return Response::failure(Status::InvalidArgument);
                }
                if descriptor.name == DEVICE_SERVICE.name {
                    return Response::reply(Status::Ok, self.device_state());
                }
                match self.states.get(&(descriptor.name, method.schema.name)) {
                    Some(state) => Response::reply(Status::Ok, Value::Object(state.clone())),
                    None => Response::failure(Status::Internal),
                }
            }
            MethodKind::Set => {
                if let Err(violation) = method.schema.validate(&arg) {
                    debug!(service, method = method.name, %violation, "rejected argument");
                    return Response::failure(Status::InvalidArgument);
                }
                method.schema.normalize(&mut arg);
                let state = self
                    .states
                    .entry((descriptor.name, method.schema.name))
                    .or_insert_with(|| method.schema.defaults());
                method.schema.merge(state, &arg);
                Response::reply(Status::Ok, Value::Object(StateMap::new()))
            }
        }
    }

    fn device_state(&self) -> Value {
        json!({
            "DeviceState": {
                "state": self.lifecycle as u32,
                "commissioned": self.commissioned,
            }
        })
    }
}
