//! Server-side island protocol.
//!
//! - [`markers`]: the DOM attribute contract shared with the client runtime
//! - [`wrapper`]: wraps statically rendered components into island containers
//! - [`scripts`]: injects bundle `<script>` tags into rendered pages

pub mod markers;
mod scripts;
mod wrapper;

pub use markers::{
    ISLAND_ATTR, ISLAND_ATTR_HYDRATED, ISLAND_ATTR_ID, ISLAND_ATTR_PROPS, IslandMarker,
    deserialize_props, island_selector, serialize_props,
};
pub use scripts::{InjectOptions, inject_island_scripts};
pub use wrapper::{IslandWrapper, Markup, ScriptCollector, ServerComponent, WrapError, module_script};
