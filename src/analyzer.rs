//! Client component detection.
//!
//! A component needs client execution when its source opens with the client
//! directive and it has a default export:
//!
//! ```text
//! "use client";                     <- first statement, after whitespace only
//!
//! export default function Counter() { ... }
//! ```
//!
//! Detection is lexical. Comments and string contents are blanked out before
//! looking for the default export, so `// export default` or a template
//! literal containing it never count.

use crate::{config::SiteConfig, debug, log};
use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use walkdir::WalkDir;

/// Extensions stripped when deriving a component name.
const KNOWN_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "mts", "mjs"];

/// Directories never descended into during a scan.
const SKIPPED_DIRS: &[&str] = &["node_modules"];

static DEFAULT_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*export(?:[ \t]+default\b|[ \t]*\{[^}]*\bas[ \t]+default\b)")
        .expect("default export pattern is valid")
});

/// A component flagged for client execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Absolute path of the component source.
    pub source_path: PathBuf,
    /// Identifier derived from the file name (`about-counter.tsx` → `AboutCounter`).
    pub component_name: String,
    /// Path relative to the scanned source root.
    pub relative_path: PathBuf,
}

/// What the analyzer treats as a client component.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Directive literal, without quotes.
    pub directive: String,
    /// Extensions considered during `scan`.
    pub extensions: Vec<String>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            directive: "use client".into(),
            extensions: KNOWN_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect(),
        }
    }
}

impl From<&SiteConfig> for AnalyzerOptions {
    fn from(config: &SiteConfig) -> Self {
        Self {
            directive: config.island.directive.clone(),
            extensions: config.island.extensions.clone(),
        }
    }
}

/// Scans component sources and caches the verdict per absolute path.
///
/// Sources are assumed immutable for the lifetime of a build or server run;
/// the watcher calls [`ComponentAnalyzer::invalidate`] for changed files.
#[derive(Debug, Default)]
pub struct ComponentAnalyzer {
    options: AnalyzerOptions,
    cache: RwLock<FxHashMap<PathBuf, bool>>,
}

impl ComponentAnalyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self {
            options,
            cache: RwLock::default(),
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Whether the file at `source_path` needs client execution.
    ///
    /// Unreadable files are not client components.
    pub fn is_client_component(&self, source_path: &Path) -> bool {
        let key = absolute(source_path);
        if let Some(&cached) = self.cache.read().get(&key) {
            return cached;
        }

        let verdict = match fs::read_to_string(&key) {
            Ok(source) => analyze_source(&source, &self.options.directive),
            Err(err) => {
                debug!("analyze"; "skipping {}: {err}", key.display());
                false
            }
        };

        self.cache.write().insert(key, verdict);
        verdict
    }

    /// Name under which the component is bundled, wrapped and registered.
    pub fn component_name_for(&self, source_path: &Path) -> String {
        component_name_for(source_path)
    }

    /// Walk `source_root` and return every client component, sorted by path.
    ///
    /// When two files derive the same component name, the first one in path
    /// order wins and the other is reported.
    pub fn scan(&self, source_root: &Path) -> Vec<ComponentDescriptor> {
        let mut seen: FxHashMap<String, PathBuf> = FxHashMap::default();
        let mut found = Vec::new();

        let walker = WalkDir::new(source_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry));

        for entry in walker.filter_map(Result::ok) {
            let path = entry.path();
            if !entry.file_type().is_file() || !self.has_scanned_extension(path) {
                continue;
            }
            if !self.is_client_component(path) {
                continue;
            }

            let component_name = component_name_for(path);
            let relative_path = path
                .strip_prefix(source_root)
                .unwrap_or(path)
                .to_path_buf();

            if let Some(first) = seen.get(&component_name) {
                log!("warn"; "{} and {} are both named `{component_name}`, keeping {}",
                     first.display(), relative_path.display(), first.display());
                continue;
            }
            seen.insert(component_name.clone(), relative_path.clone());

            found.push(ComponentDescriptor {
                source_path: absolute(path),
                component_name,
                relative_path,
            });
        }

        found
    }

    /// Descriptor for a single file below `source_root`, if it is a client
    /// component.
    pub fn describe(&self, source_root: &Path, source_path: &Path) -> Option<ComponentDescriptor> {
        if !self.has_scanned_extension(source_path) || !self.is_client_component(source_path) {
            return None;
        }
        let relative_path = source_path
            .strip_prefix(source_root)
            .unwrap_or(source_path)
            .to_path_buf();
        Some(ComponentDescriptor {
            source_path: absolute(source_path),
            component_name: component_name_for(source_path),
            relative_path,
        })
    }

    /// Drop the cached verdict for a changed file.
    pub fn invalidate(&self, source_path: &Path) {
        self.cache.write().remove(&absolute(source_path));
    }

    /// Drop every cached verdict.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Whether `path` has one of the configured source extensions.
    pub fn has_scanned_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.options.extensions.iter().any(|e| e == ext))
    }
}

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && (name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

// ============================================================================
// Lexical analysis
// ============================================================================

/// Decide from raw source text whether a component is a client component.
pub fn analyze_source(source: &str, directive: &str) -> bool {
    has_leading_directive(source, directive) && has_default_export(source)
}

/// The directive must be the first statement: a quoted literal followed by
/// `;`, a line break, a line comment or end of input.
fn has_leading_directive(source: &str, directive: &str) -> bool {
    let text = source.trim_start_matches('\u{feff}').trim_start();

    ['"', '\''].into_iter().any(|quote| {
        let literal = format!("{quote}{directive}{quote}");
        text.strip_prefix(literal.as_str()).is_some_and(|rest| {
            let rest = rest.trim_start_matches([' ', '\t']);
            rest.is_empty()
                || rest.starts_with(';')
                || rest.starts_with('\n')
                || rest.starts_with("\r\n")
                || rest.starts_with("//")
        })
    })
}

fn has_default_export(source: &str) -> bool {
    DEFAULT_EXPORT.is_match(&blank_comments_and_strings(source))
}

/// Replace comment and string contents with spaces, keeping line breaks so
/// line-anchored patterns still see statement starts.
fn blank_comments_and_strings(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment;
                }
                '"' | '\'' | '`' => {
                    out.push(c);
                    state = State::Str(c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
            State::Str(quote) => {
                if c == '\\' {
                    out.push(' ');
                    if let Some(escaped) = chars.next() {
                        out.push(if escaped == '\n' { '\n' } else { ' ' });
                    }
                } else if c == quote {
                    out.push(c);
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                    // Unterminated single-line string: resync at the line break.
                    if quote != '`' {
                        state = State::Code;
                    }
                } else {
                    out.push(' ');
                }
            }
        }
    }

    out
}

/// Derive the component name from a file name.
///
/// Strips one known extension, splits on `-`, capitalizes each segment.
pub fn component_name_for(source_path: &Path) -> String {
    let file_name = source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stem = match file_name.rsplit_once('.') {
        Some((stem, ext)) if KNOWN_EXTENSIONS.contains(&ext) => stem,
        _ => file_name.as_str(),
    };

    stem.split('-')
        .filter(|segment| !segment.is_empty())
        .map(capitalize)
        .collect()
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DIRECTIVE: &str = "use client";

    #[test]
    fn test_component_name_for() {
        assert_eq!(component_name_for(Path::new("about-counter.tsx")), "AboutCounter");
        assert_eq!(component_name_for(Path::new("/src/ui/nav-menu-toggle.jsx")), "NavMenuToggle");
        assert_eq!(component_name_for(Path::new("counter.js")), "Counter");
        assert_eq!(component_name_for(Path::new("search--box.ts")), "SearchBox");
        assert_eq!(component_name_for(Path::new("Widget")), "Widget");
    }

    #[test]
    fn test_component_name_depends_on_file_name_only() {
        assert_eq!(
            component_name_for(Path::new("/a/about-counter.tsx")),
            component_name_for(Path::new("/b/c/about-counter.tsx"))
        );
    }

    #[test]
    fn test_directive_and_default_export() {
        let src = "\"use client\";\n\nexport default function Counter() {}\n";
        assert!(analyze_source(src, DIRECTIVE));

        let single_quoted = "  \n'use client'\nconst A = () => null;\nexport default A;\n";
        assert!(analyze_source(single_quoted, DIRECTIVE));

        let named_default = "\"use client\"\nfunction A() {}\nexport { A as default };\n";
        assert!(analyze_source(named_default, DIRECTIVE));
    }

    #[test]
    fn test_missing_directive() {
        let src = "export default function Counter() {}\n";
        assert!(!analyze_source(src, DIRECTIVE));
    }

    #[test]
    fn test_directive_must_be_first_statement() {
        let src = "import x from 'y';\n\"use client\";\nexport default x;\n";
        assert!(!analyze_source(src, DIRECTIVE));

        let commented = "// \"use client\"\nexport default 1;\n";
        assert!(!analyze_source(commented, DIRECTIVE));

        let expression = "\"use client\" + suffix;\nexport default 1;\n";
        assert!(!analyze_source(expression, DIRECTIVE));
    }

    #[test]
    fn test_missing_default_export() {
        let src = "\"use client\";\nexport function Counter() {}\n";
        assert!(!analyze_source(src, DIRECTIVE));
    }

    #[test]
    fn test_default_export_in_comment_or_string_ignored() {
        let src = "\"use client\";\n// export default Foo\n/*\nexport default Bar\n*/\nconst s = `\nexport default Baz\n`;\n";
        assert!(!analyze_source(src, DIRECTIVE));
    }

    #[test]
    fn test_byte_order_mark() {
        let src = "\u{feff}\"use client\";\nexport default 1;\n";
        assert!(analyze_source(src, DIRECTIVE));
    }

    #[test]
    fn test_custom_directive() {
        let src = "\"use island\";\nexport default 1;\n";
        assert!(analyze_source(src, "use island"));
        assert!(!analyze_source(src, DIRECTIVE));
    }

    #[test]
    fn test_unreadable_file_is_not_client() {
        let analyzer = ComponentAnalyzer::default();
        assert!(!analyzer.is_client_component(Path::new("/no/such/dir/widget.tsx")));
    }

    #[test]
    fn test_cache_and_invalidate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toggle.tsx");
        fs::write(&path, "export default 1;\n").unwrap();

        let analyzer = ComponentAnalyzer::default();
        assert!(!analyzer.is_client_component(&path));

        fs::write(&path, "\"use client\";\nexport default 1;\n").unwrap();
        // cached verdict survives until invalidated
        assert!(!analyzer.is_client_component(&path));

        analyzer.invalidate(&path);
        assert!(analyzer.is_client_component(&path));
    }

    #[test]
    fn test_scan_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("widgets")).unwrap();
        fs::create_dir_all(root.join("node_modules/lib")).unwrap();

        let client = "\"use client\";\nexport default function C() {}\n";
        fs::write(root.join("widgets/search-box.tsx"), client).unwrap();
        fs::write(root.join("about-counter.tsx"), client).unwrap();
        fs::write(root.join("static-card.tsx"), "export default 1;\n").unwrap();
        fs::write(root.join("notes.md"), client).unwrap();
        fs::write(root.join("node_modules/lib/vendored.js"), client).unwrap();

        let analyzer = ComponentAnalyzer::default();
        let found = analyzer.scan(root);
        let names: Vec<_> = found.iter().map(|d| d.component_name.as_str()).collect();

        assert_eq!(names, vec!["AboutCounter", "SearchBox"]);
        assert_eq!(found[1].relative_path, PathBuf::from("widgets/search-box.tsx"));
        assert!(found[1].source_path.is_absolute());
    }

    #[test]
    fn test_scan_duplicate_names_keep_first() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b")).unwrap();

        let client = "\"use client\";\nexport default 1;\n";
        fs::write(root.join("a-toggle.tsx"), client).unwrap();
        fs::write(root.join("b/a-toggle.jsx"), client).unwrap();

        let found = ComponentAnalyzer::default().scan(root);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relative_path, PathBuf::from("a-toggle.tsx"));
    }
}
