use super::{ComponentRegistry, HydrationError, IslandComponent};
use crate::dom::{Document, NodeId};
use crate::island::{ISLAND_ATTR, ISLAND_ATTR_HYDRATED, IslandMarker, deserialize_props, island_selector};
use crate::log;
use serde_json::Value;
use std::sync::Arc;

/// What one `hydrate_all` pass did, by island instance id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrationReport {
    /// Activated in this pass (by hydrate or by fallback render).
    pub hydrated: Vec<String>,
    /// Subset of `hydrated` that needed a fresh render.
    pub rendered: Vec<String>,
    /// No registered component; static content left in place.
    pub inert: Vec<String>,
    /// Props or activation failed; static content left in place.
    pub failed: Vec<String>,
    /// Already active before this pass.
    pub already_hydrated: usize,
    /// Inside another island, left to the outer component.
    pub nested: usize,
}

impl HydrationReport {
    pub fn is_clean(&self) -> bool {
        self.inert.is_empty() && self.failed.is_empty()
    }
}

enum Activation {
    Hydrated,
    Rendered,
}

/// Activates islands against an explicitly provided registry.
#[derive(Debug, Clone)]
pub struct HydrationRuntime {
    registry: Arc<ComponentRegistry>,
}

impl HydrationRuntime {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Activate every top-level island of `doc` that is not active yet.
    ///
    /// Safe to call repeatedly: containers carry `data-island-hydrated`
    /// once activated and are skipped afterwards.
    pub fn hydrate_all(&self, doc: &mut Document) -> HydrationReport {
        let mut report = HydrationReport::default();

        for node in doc.select_all(&island_selector()) {
            // replaced by an earlier activation in this pass
            if !doc.is_attached(node) {
                continue;
            }
            if self.is_nested(doc, node) {
                report.nested += 1;
                continue;
            }
            if doc.has_attr(node, ISLAND_ATTR_HYDRATED) {
                report.already_hydrated += 1;
                continue;
            }
            let Some(marker) = IslandMarker::from_element(doc, node) else {
                continue;
            };
            let id = marker.instance_id.clone();

            let props = match deserialize_props(&marker.props) {
                Ok(props) => props,
                Err(err) => {
                    log!("error"; "island {} ({id}): invalid props: {err}", marker.component_name);
                    report.failed.push(id);
                    continue;
                }
            };

            let Some(component) = self.registry.get(&marker.component_name) else {
                log!("warn"; "no component registered as `{}`, island {id} stays static",
                     marker.component_name);
                report.inert.push(id);
                continue;
            };

            match activate(doc, node, component.as_ref(), &props) {
                Ok(activation) => {
                    doc.set_attr(node, ISLAND_ATTR_HYDRATED, "");
                    if matches!(activation, Activation::Rendered) {
                        report.rendered.push(id.clone());
                    }
                    report.hydrated.push(id);
                }
                Err(err) => {
                    log!("error"; "island {} ({id}) failed to activate: {err}", marker.component_name);
                    report.failed.push(id);
                }
            }
        }

        report
    }

    fn is_nested(&self, doc: &Document, node: NodeId) -> bool {
        let mut current = doc.parent(node);
        while let Some(id) = current {
            if doc.has_attr(id, ISLAND_ATTR) {
                return true;
            }
            current = doc.parent(id);
        }
        false
    }
}

/// Hydrate, falling back to a fresh render on recoverable errors. Static
/// content is put back when nothing works.
fn activate(
    doc: &mut Document,
    node: NodeId,
    component: &dyn IslandComponent,
    props: &Value,
) -> Result<Activation, HydrationError> {
    let snapshot = doc.inner_html(node);

    let err = match component.hydrate(doc, node, props) {
        Ok(()) => return Ok(Activation::Hydrated),
        Err(err) => err,
    };

    let err = if err.is_recoverable() {
        log!("hydrate"; "{err}, rendering from scratch");
        doc.clear_children(node);
        match component.render(doc, node, props) {
            Ok(()) => return Ok(Activation::Rendered),
            Err(render_err) => render_err,
        }
    } else {
        err
    };

    if let Err(restore_err) = doc.set_inner_html(node, &snapshot) {
        log!("error"; "failed to restore static content: {restore_err}");
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Selector;
    use crate::island::IslandWrapper;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Expects a `<button>` to hydrate; renders one otherwise.
    #[derive(Default)]
    struct Counter {
        hydrations: AtomicUsize,
        renders: AtomicUsize,
    }

    impl IslandComponent for Counter {
        fn hydrate(&self, doc: &mut Document, node: NodeId, props: &Value) -> Result<(), HydrationError> {
            let button = doc
                .children(node)
                .iter()
                .copied()
                .find(|c| doc.tag(*c) == Some("button"))
                .ok_or_else(|| HydrationError::StructureMismatch {
                    expected: "<button>".into(),
                    actual: doc.inner_html(node),
                })?;
            doc.set_attr(button, "data-count", props["start"].to_string());
            self.hydrations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn render(&self, doc: &mut Document, node: NodeId, props: &Value) -> Result<(), HydrationError> {
            doc.set_inner_html(node, &format!("<button data-count=\"{}\">+</button>", props["start"]))
                .map_err(|e| HydrationError::Fatal(e.to_string()))?;
            self.renders.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails everything; the fresh render scribbles first.
    struct Broken {
        recoverable: bool,
    }

    impl IslandComponent for Broken {
        fn hydrate(&self, _: &mut Document, _: NodeId, _: &Value) -> Result<(), HydrationError> {
            if self.recoverable {
                Err(HydrationError::Activation("boom".into()))
            } else {
                Err(HydrationError::Fatal("boom".into()))
            }
        }

        fn render(&self, doc: &mut Document, node: NodeId, _: &Value) -> Result<(), HydrationError> {
            doc.set_inner_html(node, "<em>half</em>").ok();
            Err(HydrationError::Activation("still boom".into()))
        }
    }

    fn island(name: &str, id: &str, props: &str, inner: &str) -> String {
        format!(
            "<div data-island=\"{name}\" data-island-id=\"{id}\" data-island-props=\"{props}\" style=\"display:contents\">{inner}</div>"
        )
    }

    fn runtime_with(name: &str, component: Arc<dyn IslandComponent>) -> HydrationRuntime {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register(name, component);
        HydrationRuntime::new(registry)
    }

    fn node_by_id(doc: &Document, id: &str) -> NodeId {
        let selector: Selector = format!("[data-island-id={id}]").parse().unwrap();
        doc.select_first(&selector).unwrap()
    }

    #[test]
    fn test_hydrates_wrapped_markup() {
        let counter = Arc::new(Counter::default());
        let runtime = runtime_with("Counter", counter.clone());

        let wrapper = IslandWrapper::new();
        let render = |props: &Value| -> anyhow::Result<String> {
            Ok(format!("<button>{}</button>", props["start"]))
        };
        let markup = wrapper.wrap(&render, "Counter", &json!({ "start": 7 })).unwrap();
        let mut doc = Document::parse(&format!("<main>{markup}</main>")).unwrap();

        let report = runtime.hydrate_all(&mut doc);

        assert_eq!(report.hydrated.len(), 1);
        assert!(report.is_clean());
        assert!(doc.to_html().contains("<button data-count=\"7\">7</button>"));
        assert!(doc.to_html().contains("data-island-hydrated"));
    }

    #[test]
    fn test_hydrate_all_is_idempotent() {
        let counter = Arc::new(Counter::default());
        let runtime = runtime_with("Counter", counter.clone());
        let html = island("Counter", "a", "{&quot;start&quot;:1}", "<button>1</button>")
            + &island("Counter", "b", "{&quot;start&quot;:2}", "<button>2</button>");
        let mut doc = Document::parse(&html).unwrap();

        let first = runtime.hydrate_all(&mut doc);
        let second = runtime.hydrate_all(&mut doc);

        assert_eq!(first.hydrated, vec!["a", "b"]);
        assert!(second.hydrated.is_empty());
        assert_eq!(second.already_hydrated, 2);
        assert!(second.is_clean());
        assert_eq!(counter.hydrations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_malformed_props_do_not_affect_other_islands() {
        let counter = Arc::new(Counter::default());
        let runtime = runtime_with("Counter", counter.clone());
        let html = island("Counter", "bad", "{start:", "<button>?</button>")
            + &island("Counter", "good", "{&quot;start&quot;:3}", "<button>3</button>");
        let mut doc = Document::parse(&html).unwrap();

        let report = runtime.hydrate_all(&mut doc);

        assert_eq!(report.failed, vec!["bad"]);
        assert_eq!(report.hydrated, vec!["good"]);
        let good = node_by_id(&doc, "good");
        let bad = node_by_id(&doc, "bad");
        assert!(doc.has_attr(good, ISLAND_ATTR_HYDRATED));
        assert!(!doc.has_attr(bad, ISLAND_ATTR_HYDRATED));
        assert_eq!(doc.inner_html(bad), "<button>?</button>");
    }

    #[test]
    fn test_missing_registration_leaves_island_inert() {
        let runtime = HydrationRuntime::new(Arc::new(ComponentRegistry::new()));
        let mut doc = Document::parse(&island("Ghost", "g", "{}", "<p>static</p>")).unwrap();

        let report = runtime.hydrate_all(&mut doc);

        assert_eq!(report.inert, vec!["g"]);
        assert!(report.hydrated.is_empty());
        let node = node_by_id(&doc, "g");
        assert_eq!(doc.inner_html(node), "<p>static</p>");
        assert!(!doc.has_attr(node, ISLAND_ATTR_HYDRATED));
    }

    #[test]
    fn test_mismatch_falls_back_to_render() {
        let counter = Arc::new(Counter::default());
        let runtime = runtime_with("Counter", counter.clone());
        let mut doc =
            Document::parse(&island("Counter", "c", "{&quot;start&quot;:4}", "<span>drift</span>"))
                .unwrap();

        let report = runtime.hydrate_all(&mut doc);

        assert_eq!(report.rendered, vec!["c"]);
        assert_eq!(report.hydrated, vec!["c"]);
        let node = node_by_id(&doc, "c");
        assert_eq!(doc.inner_html(node), "<button data-count=\"4\">+</button>");
        assert_eq!(counter.renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_render_restores_static_content() {
        let runtime = runtime_with("Broken", Arc::new(Broken { recoverable: true }));
        let mut doc = Document::parse(&island("Broken", "x", "{}", "<p>static</p>")).unwrap();

        let report = runtime.hydrate_all(&mut doc);

        assert_eq!(report.failed, vec!["x"]);
        let node = node_by_id(&doc, "x");
        assert_eq!(doc.inner_html(node), "<p>static</p>");
        assert!(!doc.has_attr(node, ISLAND_ATTR_HYDRATED));
    }

    #[test]
    fn test_fatal_hydrate_error_skips_render() {
        let runtime = runtime_with("Broken", Arc::new(Broken { recoverable: false }));
        let mut doc = Document::parse(&island("Broken", "x", "{}", "<p>static</p>")).unwrap();

        let report = runtime.hydrate_all(&mut doc);

        assert_eq!(report.failed, vec!["x"]);
        assert_eq!(doc.inner_html(node_by_id(&doc, "x")), "<p>static</p>");
    }

    #[test]
    fn test_nested_islands_left_to_outer() {
        let counter = Arc::new(Counter::default());
        let runtime = runtime_with("Counter", counter.clone());
        let inner = island("Counter", "inner", "{&quot;start&quot;:0}", "<button>0</button>");
        let outer = island(
            "Counter",
            "outer",
            "{&quot;start&quot;:1}",
            &format!("<button>1</button>{inner}"),
        );
        let mut doc = Document::parse(&outer).unwrap();

        let report = runtime.hydrate_all(&mut doc);

        assert_eq!(report.hydrated, vec!["outer"]);
        assert_eq!(report.nested, 1);
        assert!(!doc.has_attr(node_by_id(&doc, "inner"), ISLAND_ATTR_HYDRATED));
    }
}
