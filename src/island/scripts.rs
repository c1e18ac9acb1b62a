//! Island script injection into rendered pages.

use super::markers::{ISLAND_ATTR, island_selector};
use super::wrapper::module_script;
use crate::bundle::Manifest;
use crate::dom::{Document, DomError};
use crate::log;
use quick_xml::escape::escape;

/// Options for [`inject_island_scripts`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectOptions {
    /// Also emit `<link rel="modulepreload">` for every bundle.
    pub modulepreload: bool,
}

/// Insert one module script per distinct island component found in `html`.
///
/// Tags go before `</head>` (or `</body>`, or the end of the page) in order
/// of first appearance. Components without a manifest entry stay static and
/// are reported. Bundles already referenced by the page are not added twice.
pub fn inject_island_scripts(
    html: &str,
    manifest: &Manifest,
    options: InjectOptions,
) -> Result<String, DomError> {
    let doc = Document::parse(html)?;

    let mut names: Vec<&str> = Vec::new();
    for node in doc.select_all(&island_selector()) {
        if let Some(name) = doc.attr(node, ISLAND_ATTR)
            && !names.contains(&name)
        {
            names.push(name);
        }
    }

    let mut tags = String::new();
    for name in names {
        let Some(src) = manifest.get(name) else {
            log!("islands"; "no bundle for `{name}`, island stays static");
            continue;
        };
        if html.contains(&format!("data-island-bundle=\"{}\"", escape(name))) {
            continue;
        }
        if options.modulepreload {
            tags.push_str(&format!(
                "<link rel=\"modulepreload\" href=\"{}\">",
                escape(src)
            ));
        }
        tags.push_str(&module_script(name, src));
    }

    if tags.is_empty() {
        return Ok(html.to_owned());
    }

    let at = find_closing_tag(html, "head")
        .or_else(|| find_closing_tag(html, "body"))
        .unwrap_or(html.len());

    let mut out = String::with_capacity(html.len() + tags.len());
    out.push_str(&html[..at]);
    out.push_str(&tags);
    out.push_str(&html[at..]);
    Ok(out)
}

/// Byte offset of the last `</tag>` in `html`, case-insensitive.
fn find_closing_tag(html: &str, tag: &str) -> Option<usize> {
    html.to_ascii_lowercase().rfind(&format!("</{tag}>"))
}
