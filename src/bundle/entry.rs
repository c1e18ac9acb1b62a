//! Entry modules synthesized for each island bundle.
//!
//! The entry imports the component, exports an activation object
//! `{ name, hydrate(el, props), render(el, props) }` and, when loaded in a
//! page, activates every not-yet-hydrated top-level marker of its component.
//! A failed hydrate falls back to a fresh render of that island only.

use crate::config::UiFramework;
use crate::island::{ISLAND_ATTR, ISLAND_ATTR_HYDRATED, ISLAND_ATTR_PROPS};
use std::path::Path;

const REACT_IMPORTS: &str = r#"import { createElement } from "react";
import { hydrateRoot, createRoot } from "react-dom/client";

const hydrate = (el, props) => hydrateRoot(el, createElement(Component, props));
const render = (el, props) => {
  el.replaceChildren();
  createRoot(el).render(createElement(Component, props));
};
"#;

const PREACT_IMPORTS: &str = r#"import { h, hydrate as preactHydrate, render as preactRender } from "preact";

const hydrate = (el, props) => preactHydrate(h(Component, props), el);
const render = (el, props) => {
  el.replaceChildren();
  preactRender(h(Component, props), el);
};
"#;

const ACTIVATION: &str = r#"
const island = { name: __NAME__, hydrate, render };
export default island;

const selector = `[__ATTR__="${island.name}"]:not([__HYDRATED__])`;
for (const el of document.querySelectorAll(selector)) {
  if (el.parentElement && el.parentElement.closest("[__ATTR__]")) continue;
  let props;
  try {
    props = JSON.parse(el.getAttribute("__PROPS__") || "{}");
  } catch (err) {
    console.error(`[atoll] invalid props for ${island.name}`, err);
    continue;
  }
  try {
    island.hydrate(el, props);
  } catch (err) {
    const fallback = el.cloneNode(true);
    try {
      island.render(el, props);
    } catch (renderErr) {
      el.replaceChildren(...fallback.childNodes);
      console.error(`[atoll] ${island.name} failed to activate`, renderErr);
      continue;
    }
  }
  el.setAttribute("__HYDRATED__", "");
}
"#;

/// Source of the entry module for one component.
pub fn entry_source(framework: UiFramework, component_name: &str, component_path: &Path) -> String {
    let import_path = component_path.to_string_lossy().replace('\\', "/");
    let imports = match framework {
        UiFramework::React => REACT_IMPORTS,
        UiFramework::Preact => PREACT_IMPORTS,
    };

    let activation = ACTIVATION
        .replace("__NAME__", &js_string(component_name))
        .replace("__ATTR__", ISLAND_ATTR)
        .replace("__HYDRATED__", ISLAND_ATTR_HYDRATED)
        .replace("__PROPS__", ISLAND_ATTR_PROPS);

    format!(
        "import Component from {};\n{imports}{activation}",
        js_string(&import_path)
    )
}

/// JavaScript string literal (JSON strings are valid JS strings).
fn js_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_react_entry() {
        let src = entry_source(
            UiFramework::React,
            "AboutCounter",
            Path::new("/site/components/about-counter.tsx"),
        );
        assert!(src.starts_with("import Component from \"/site/components/about-counter.tsx\";"));
        assert!(src.contains("from \"react-dom/client\""));
        assert!(src.contains("const island = { name: \"AboutCounter\", hydrate, render };"));
        assert!(src.contains("[data-island=\"${island.name}\"]:not([data-island-hydrated])"));
        assert!(src.contains("getAttribute(\"data-island-props\")"));
        assert!(!src.contains("__"));
    }

    #[test]
    fn test_preact_entry() {
        let src = entry_source(UiFramework::Preact, "Search", Path::new("/c/search.jsx"));
        assert!(src.contains("from \"preact\""));
        assert!(!src.contains("react-dom"));
    }

    #[test]
    fn test_windows_path_normalized() {
        let src = entry_source(UiFramework::React, "A", Path::new(r"C:\site\a.tsx"));
        assert!(src.contains("\"C:/site/a.tsx\""));
    }
}
