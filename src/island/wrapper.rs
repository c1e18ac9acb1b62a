//! Server-side island wrapping.
//!
//! Wraps the static render of a client component in a container carrying
//! its island marker, so the page is complete without any client code and
//! the runtime can later find and activate it.

use super::markers::{ISLAND_ATTR, IslandMarker, serialize_props};
use crate::bundle::Manifest;
use parking_lot::{Mutex, RwLock};
use quick_xml::escape::escape;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::{fmt, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WrapError {
    #[error("props of `{component}` cannot be serialized: {source}")]
    Props {
        component: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{component}` failed to render: {source}")]
    Render {
        component: String,
        #[source]
        source: anyhow::Error,
    },
}

/// The external "render statically" call for one component.
pub trait ServerComponent<P: ?Sized> {
    fn render_static(&self, props: &P) -> anyhow::Result<String>;
}

/// Any closure from props to markup is a server component.
impl<P, F> ServerComponent<P> for F
where
    P: ?Sized,
    F: Fn(&P) -> anyhow::Result<String>,
{
    fn render_static(&self, props: &P) -> anyhow::Result<String> {
        self(props)
    }
}

/// Wrapped island markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type WrapHook = Box<dyn Fn(&str) + Send + Sync>;

/// Produces island containers around statically rendered components.
///
/// Shared across concurrent renders. The only state is a per-name cache of
/// the escaped container prefix.
#[derive(Default)]
pub struct IslandWrapper {
    prefixes: RwLock<FxHashMap<String, Arc<str>>>,
    hook: Option<WrapHook>,
}

impl fmt::Debug for IslandWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IslandWrapper")
            .field("cached", &self.prefixes.read().len())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl IslandWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback notified with the component name on every wrap.
    pub fn on_wrap(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Render `component` and wrap it in a fresh island container.
    pub fn wrap<P, C>(
        &self,
        component: &C,
        component_name: &str,
        props: &P,
    ) -> Result<Markup, WrapError>
    where
        P: Serialize + ?Sized,
        C: ServerComponent<P> + ?Sized,
    {
        let payload = serialize_props(props).map_err(|source| WrapError::Props {
            component: component_name.to_owned(),
            source,
        })?;
        let inner = component
            .render_static(props)
            .map_err(|source| WrapError::Render {
                component: component_name.to_owned(),
                source,
            })?;

        let marker = IslandMarker::new(component_name, payload);
        let prefix = self.prefix_for(component_name);
        let html = format!(
            "{prefix} data-island-id=\"{}\" data-island-props=\"{}\" style=\"display:contents\">{inner}</div>",
            escape(marker.instance_id.as_str()),
            escape(marker.props.as_str()),
        );

        if let Some(hook) = &self.hook {
            hook(component_name);
        }

        Ok(Markup(html))
    }

    /// Number of memoized component names.
    pub fn cached_len(&self) -> usize {
        self.prefixes.read().len()
    }

    fn prefix_for(&self, component_name: &str) -> Arc<str> {
        if let Some(prefix) = self.prefixes.read().get(component_name) {
            return Arc::clone(prefix);
        }

        let prefix: Arc<str> =
            format!("<div {ISLAND_ATTR}=\"{}\"", escape(component_name)).into();
        self.prefixes
            .write()
            .entry(component_name.to_owned())
            .or_insert(prefix)
            .clone()
    }
}

/// Records the islands used while rendering a page.
///
/// Hook it into an [`IslandWrapper`] with [`ScriptCollector::hook`], then emit
/// one module script per distinct component with [`ScriptCollector::scripts`].
#[derive(Debug, Default)]
pub struct ScriptCollector {
    names: Mutex<Vec<String>>,
}

impl ScriptCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Callback suitable for [`IslandWrapper::on_wrap`].
    pub fn hook(self: &Arc<Self>) -> impl Fn(&str) + Send + Sync + 'static {
        let collector = Arc::clone(self);
        move |name: &str| collector.record(name)
    }

    pub fn record(&self, name: &str) {
        let mut names = self.names.lock();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
    }

    /// Component names in order of first use.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().clone()
    }

    /// `<script type="module">` tags for every recorded island with a bundle.
    pub fn scripts(&self, manifest: &Manifest) -> String {
        self.names
            .lock()
            .iter()
            .filter_map(|name| manifest.get(name).map(|src| module_script(name, src)))
            .collect()
    }

    pub fn clear(&self) {
        self.names.lock().clear();
    }
}

/// Module script tag loading one island bundle.
pub fn module_script(name: &str, src: &str) -> String {
    format!(
        "<script type=\"module\" src=\"{}\" data-island-bundle=\"{}\"></script>",
        escape(src),
        escape(name)
    )
}
