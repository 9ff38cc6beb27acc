//! Window covering capability.

use serde::{Deserialize, Serialize};

use super::clusters::{ON_OFF, OnOff, WINDOW_COVERING, WindowCovering};
use crate::codec::Message;
use crate::schema::{FieldSpec, FieldType, MessageSchema};
use crate::service::{Capability, MethodDescriptor, ServiceDescriptor};

pub static WINDOW_STATE: MessageSchema = MessageSchema {
    name: "WindowState",
    fields: &[
        FieldSpec::new("OnOff", FieldType::Message(&ON_OFF)),
        FieldSpec::new("WindowCovering", FieldType::Message(&WINDOW_COVERING)),
    ],
};

pub static WINDOW_SERVICE: ServiceDescriptor = ServiceDescriptor {
    name: "Window",
    methods: &[
        MethodDescriptor::get("Get", &WINDOW_STATE),
        MethodDescriptor::set("Set", &WINDOW_STATE),
    ],
};

/// Marker for the window covering capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct Window;

impl Capability for Window {
    type State = WindowState;

    const LABEL: &'static str = "window";
    const GET_STATE: &'static str = "Get";
    const SET_STATE: &'static str = "Set";

    fn service() -> &'static ServiceDescriptor {
        &WINDOW_SERVICE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowState {
    #[serde(rename = "OnOff", skip_serializing_if = "Option::is_none")]
    pub on_off: Option<OnOff>,
    #[serde(rename = "WindowCovering", skip_serializing_if = "Option::is_none")]
    pub window_covering: Option<WindowCovering>,
}

impl Message for WindowState {
    fn schema() -> &'static MessageSchema {
        &WINDOW_STATE
    }
}
