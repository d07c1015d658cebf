//! The application-level invocation message and the `HubProtocol` interface
//! used to encode it. The broker/transport/handshake layers that actually
//! carry these bytes to a client are external collaborators -- this module
//! only defines the shape the core needs to reason about.

use serde_json::{Map, Value};
use std::sync::Arc;

/// An application-level RPC: a target method name plus an argument array.
///
/// Arguments are opaque to the core -- they are only ever handed to a
/// [`HubProtocol`] for encoding, never inspected.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationMessage {
    pub target: String,
    pub arguments: Vec<Value>,
}

impl InvocationMessage {
    pub fn new(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            arguments,
        }
    }
}

/// The message kinds a [`HubProtocol`] can encode. Only invocations are
/// modeled today; the enum leaves room for the client handshake/ping
/// messages that belong to the out-of-scope client protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation(InvocationMessage),
}

impl HubMessage {
    fn to_json_value(&self, camel_case: bool) -> Value {
        match self {
            HubMessage::Invocation(inv) => {
                let mut obj = Map::new();
                obj.insert("target".to_owned(), Value::String(inv.target.clone()));
                let args: Vec<Value> = inv
                    .arguments
                    .iter()
                    .map(|a| {
                        if camel_case {
                            recase_keys(a)
                        } else {
                            a.clone()
                        }
                    })
                    .collect();
                obj.insert("arguments".to_owned(), Value::Array(args));
                Value::Object(obj)
            }
        }
    }
}

/// Recursively lower-cases the first character of every object key, the way
/// a camelCase JSON contract resolver would. Arrays and scalars pass through
/// unchanged.
fn recase_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(to_camel_case(k), recase_keys(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(recase_keys).collect()),
        other => other.clone(),
    }
}

fn to_camel_case(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A pluggable wire encoding for [`HubMessage`]s, e.g. JSON or MessagePack.
///
/// The core never decodes with a `HubProtocol` -- it only encodes outgoing
/// invocations. Decoding on the client side is entirely out of scope.
pub trait HubProtocol: Send + Sync {
    /// The name used to key this protocol's bytes in the serialization cache
    /// (e.g. `"json"`, `"messagepack"`).
    fn name(&self) -> &str;

    /// Encodes `message` using this protocol's wire format.
    fn encode(&self, message: &HubMessage) -> Vec<u8>;
}

/// A JSON [`HubProtocol`], optionally applying a camelCase key contract the
/// way a JavaScript client's default `HubProtocol` would expect.
pub struct JsonHubProtocol {
    name: String,
    camel_case: bool,
}

impl JsonHubProtocol {
    /// A protocol named `name` that serializes argument object keys as-is.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            camel_case: false,
        }
    }

    /// A protocol named `name` that lower-cases the first letter of every
    /// argument object key before serializing.
    pub fn camel_case(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            camel_case: true,
        }
    }
}

impl HubProtocol for JsonHubProtocol {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, message: &HubMessage) -> Vec<u8> {
        let value = message.to_json_value(self.camel_case);
        serde_json::to_vec(&value).expect("invocation messages always serialize to JSON")
    }
}

/// A shared handle to a configured protocol, as stored in a manager's
/// protocol table.
pub type SharedHubProtocol = Arc<dyn HubProtocol>;
