//! Explicit component registry populated by the bundle loader.

use super::IslandComponent;
use crate::bundle::Manifest;
use crate::log;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{fmt, sync::Arc};

/// Resolves one manifest entry into a live component.
pub trait BundleLoader {
    fn load(&self, name: &str, src: &str) -> anyhow::Result<Arc<dyn IslandComponent>>;
}

/// Name → live implementation.
///
/// Created once per page session and handed to the runtime. The last
/// registration for a name wins, so a rebuilt bundle replaces the old one.
#[derive(Default)]
pub struct ComponentRegistry {
    components: RwLock<FxHashMap<String, Arc<dyn IslandComponent>>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` under `name`, returning the replaced one.
    pub fn register(
        &self,
        name: impl Into<String>,
        component: Arc<dyn IslandComponent>,
    ) -> Option<Arc<dyn IslandComponent>> {
        self.components.write().insert(name.into(), component)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IslandComponent>> {
        self.components.read().get(name).cloned()
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn IslandComponent>> {
        self.components.write().remove(name)
    }

    pub fn clear(&self) {
        self.components.write().clear();
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.components.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Load every bundle of `manifest` and register what resolves.
    ///
    /// A bundle that fails to load is reported and skipped; its islands stay
    /// static. Returns the number of registered components.
    pub fn load_manifest(&self, manifest: &Manifest, loader: &dyn BundleLoader) -> usize {
        let mut loaded = 0;
        for (name, src) in manifest.iter() {
            match loader.load(name, src) {
                Ok(component) => {
                    self.register(name, component);
                    loaded += 1;
                }
                Err(err) => log!("hydrate"; "bundle {src} for `{name}` failed to load: {err:#}"),
            }
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, NodeId};
    use crate::hydrate::HydrationError;
    use serde_json::Value;

    struct Tagged(&'static str);

    impl IslandComponent for Tagged {
        fn hydrate(&self, doc: &mut Document, node: NodeId, _: &Value) -> Result<(), HydrationError> {
            doc.set_attr(node, "data-by", self.0);
            Ok(())
        }

        fn render(&self, doc: &mut Document, node: NodeId, props: &Value) -> Result<(), HydrationError> {
            self.hydrate(doc, node, props)
        }
    }

    fn tag_of(registry: &ComponentRegistry, name: &str) -> Option<String> {
        let component = registry.get(name)?;
        let mut doc = Document::parse("<div></div>").unwrap();
        let node = doc.children(doc.root())[0];
        component.hydrate(&mut doc, node, &Value::Null).unwrap();
        doc.attr(node, "data-by").map(str::to_owned)
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ComponentRegistry::new();
        assert!(registry.register("Counter", Arc::new(Tagged("v1"))).is_none());
        assert!(registry.register("Counter", Arc::new(Tagged("v2"))).is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(tag_of(&registry, "Counter").as_deref(), Some("v2"));
    }

    #[test]
    fn test_unregister_and_clear() {
        let registry = ComponentRegistry::new();
        registry.register("A", Arc::new(Tagged("a")));
        registry.register("B", Arc::new(Tagged("b")));
        assert_eq!(registry.names(), vec!["A", "B"]);

        assert!(registry.unregister("A").is_some());
        assert!(registry.get("A").is_none());
        registry.clear();
        assert!(registry.is_empty());
    }

    struct Loader;

    impl BundleLoader for Loader {
        fn load(&self, name: &str, src: &str) -> anyhow::Result<Arc<dyn IslandComponent>> {
            if src.contains("404") {
                anyhow::bail!("HTTP 404");
            }
            Ok(Arc::new(Tagged(if name == "Counter" { "counter" } else { "other" })))
        }
    }

    #[test]
    fn test_load_manifest_skips_failing_bundles() {
        let mut manifest = Manifest::default();
        manifest.upsert("Counter", "/islands/Counter.aaaaaaaa.js");
        manifest.upsert("Gone", "/islands/404.js");
        manifest.upsert("Search", "/islands/Search.bbbbbbbb.js");

        let registry = ComponentRegistry::new();
        assert_eq!(registry.load_manifest(&manifest, &Loader), 2);
        assert_eq!(registry.names(), vec!["Counter", "Search"]);
        assert_eq!(tag_of(&registry, "Counter").as_deref(), Some("counter"));
    }
}
