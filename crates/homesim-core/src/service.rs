//! RPC service descriptors and the device capability trait.
//!
//! A backend exposes one service per device capability. Each service is a
//! list of `Get*`/`Set*` method pairs, and every method is bound to the
//! message schema it reads or writes.

use std::collections::HashSet;

use crate::codec::Message;
use crate::schema::{MessageSchema, StateMap};

/// Whether a method reads or writes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Takes an empty argument and returns the full message.
    Get,
    /// Takes a partial message and returns an empty acknowledgement.
    Set,
}

/// One RPC method of a service.
#[derive(Debug, PartialEq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub kind: MethodKind,
    pub schema: &'static MessageSchema,
}

impl MethodDescriptor {
    pub const fn get(name: &'static str, schema: &'static MessageSchema) -> Self {
        Self {
            name,
            kind: MethodKind::Get,
            schema,
        }
    }

    pub const fn set(name: &'static str, schema: &'static MessageSchema) -> Self {
        Self {
            name,
            kind: MethodKind::Set,
            schema,
        }
    }
}

/// A named RPC service and its methods.
#[derive(Debug, PartialEq)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub methods: &'static [MethodDescriptor],
}

impl ServiceDescriptor {
    /// Looks up a method by name.
    pub fn method(&self, name: &str) -> Option<&'static MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Returns one `Get` method per distinct message schema.
    ///
    /// Several getters may return the same message (for example an aggregate
    /// state getter and a fan mode getter); polling one of them is enough.
    pub fn state_getters(&self) -> Vec<&'static MethodDescriptor> {
        let mut seen = HashSet::new();
        self.methods
            .iter()
            .filter(|m| m.kind == MethodKind::Get && seen.insert(m.schema.name))
            .collect()
    }
}

/// A device capability group exposed over RPC.
///
/// Implemented by zero-sized marker types; device clients are generic over
/// the capability so that capability-specific accessors only exist where
/// they make sense.
pub trait Capability: Send + Sync + 'static {
    /// Aggregate state message read by `get_state` and written by `set_state`.
    type State: Message;

    /// Short kebab-case name used on the command line.
    const LABEL: &'static str;

    /// Method returning the aggregate state.
    const GET_STATE: &'static str;

    /// Method updating the aggregate state.
    const SET_STATE: &'static str;

    /// The RPC service backing this capability.
    fn service() -> &'static ServiceDescriptor;

    /// Initial values pushed to a freshly started backend, as
    /// `(set method, partial state)` pairs.
    fn initial_state() -> Vec<(&'static str, StateMap)> {
        Vec::new()
    }
}
