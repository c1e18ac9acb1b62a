//! Island marker attributes.
//!
//! These attributes are the only channel between server-rendered markup and
//! the client runtime. Every bundle and the runtime must agree on them.
//!
//! ```text
//! <div data-island="Counter"
//!      data-island-id="6f1c…"
//!      data-island-props="{&quot;start&quot;:1}"
//!      style="display:contents">
//!   …static markup…
//! </div>
//! ```

use crate::dom::{Document, NodeId, Selector};
use quick_xml::escape::escape;
use serde::Serialize;
use serde_json::Value;

/// Component name of the island.
pub const ISLAND_ATTR: &str = "data-island";

/// Unique instance id within one document.
pub const ISLAND_ATTR_ID: &str = "data-island-id";

/// JSON-serialized props.
pub const ISLAND_ATTR_PROPS: &str = "data-island-props";

/// Set by the runtime once the island is active.
pub const ISLAND_ATTR_HYDRATED: &str = "data-island-hydrated";

/// Selector matching every island container.
pub fn island_selector() -> Selector {
    Selector {
        attrs: vec![crate::dom::AttrMatch {
            name: ISLAND_ATTR.to_owned(),
            value: None,
        }],
        ..Default::default()
    }
}

/// Fresh random instance id.
pub fn generate_island_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Serialize props to the attribute payload.
///
/// Fails for values JSON cannot carry, e.g. maps with non-string keys.
pub fn serialize_props<P: Serialize + ?Sized>(props: &P) -> serde_json::Result<String> {
    serde_json::to_string(props)
}

/// Parse an attribute payload back into a JSON value.
///
/// An empty payload means "no props" and yields an empty object.
pub fn deserialize_props(payload: &str) -> serde_json::Result<Value> {
    if payload.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(payload)
}

/// Marker data of one island instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandMarker {
    pub component_name: String,
    pub instance_id: String,
    /// Serialized props, not yet parsed.
    pub props: String,
}

impl IslandMarker {
    pub fn new(component_name: impl Into<String>, props: impl Into<String>) -> Self {
        Self {
            component_name: component_name.into(),
            instance_id: generate_island_id(),
            props: props.into(),
        }
    }

    /// Read the marker carried by `node`, if it is an island container.
    pub fn from_element(doc: &Document, node: NodeId) -> Option<Self> {
        let component_name = doc.attr(node, ISLAND_ATTR)?.to_owned();
        Some(Self {
            component_name,
            instance_id: doc.attr(node, ISLAND_ATTR_ID).unwrap_or_default().to_owned(),
            props: doc.attr(node, ISLAND_ATTR_PROPS).unwrap_or_default().to_owned(),
        })
    }

    pub fn to_attrs(&self) -> [(&'static str, &str); 3] {
        [
            (ISLAND_ATTR, self.component_name.as_str()),
            (ISLAND_ATTR_ID, self.instance_id.as_str()),
            (ISLAND_ATTR_PROPS, self.props.as_str()),
        ]
    }

    /// Attribute string with escaped values.
    pub fn to_attr_string(&self) -> String {
        self.to_attrs()
            .iter()
            .map(|(key, value)| format!("{key}=\"{}\"", escape(*value)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
