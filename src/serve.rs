//! Development server.
//!
//! Built on `tiny_http`:
//!
//! - Static file serving from the build output directory
//! - Automatic `index.html` resolution for directories
//! - Reduced documents for client-side navigation requests
//! - File watching and island rebuilds (via `watch` module)
//! - Graceful shutdown on Ctrl+C
//!
//! # Navigation requests
//!
//! A request carrying the `[navigation] header` (default
//! `X-Atoll-Navigation: true`) for an HTML page is answered with only the
//! page title and the content region:
//!
//! ```text
//! <!DOCTYPE html><html><head><title>Docs</title></head>
//! <body><main id="atoll-content">…</main></body></html>
//! ```
//!
//! Pages without the region are served whole; the client then falls back
//! to a full navigation. Every HTML response carries `Vary: <header>`.

use crate::{
    config::{SiteConfig, cfg},
    dom::{Document, Selector},
    log,
    watch::watch_for_changes_blocking,
};
use anyhow::{Context, Result};
use quick_xml::escape::partial_escape;
use std::{
    fs,
    io::Cursor,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Start the development server with optional file watching.
///
/// Blocks until Ctrl+C is received.
pub fn serve_site() -> Result<()> {
    let c = cfg();
    let interface: std::net::IpAddr = c.serve.interface.parse()?;
    let base_port = c.serve.port;

    let (server, addr) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if c.serve.watch {
        std::thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking() {
                log!("watch"; "{err}");
            }
        });
    }

    for request in server.incoming_requests() {
        // Re-load config on each request to pick up hot-reloaded changes
        if let Err(e) = handle_request(request, &cfg()) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: std::net::IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Handle a single HTTP request.
///
/// Request resolution order:
/// 1. Exact file match → serve file
/// 2. Directory with index.html → serve index.html
/// 3. Nothing found → 404
fn handle_request(request: Request, config: &SiteConfig) -> Result<()> {
    let Some(local_path) = resolve_path(&config.build.output, request.url()) else {
        return serve_not_found(request);
    };

    let header = config.navigation.header.as_str();
    if !is_html(&local_path) {
        return serve_file(request, &local_path);
    }

    let html = fs::read_to_string(&local_path)
        .with_context(|| format!("Failed to read {}", local_path.display()))?;
    let body = if is_navigation_request(&request, header) {
        let selector = Selector::parse(&config.navigation.content_selector)?;
        navigation_document(&html, &selector).unwrap_or(html)
    } else {
        html
    };
    serve_html(request, body, header)
}

/// Map a request URL onto a file below `serve_root`.
fn resolve_path(serve_root: &Path, url: &str) -> Option<PathBuf> {
    // Decode URL-encoded characters (e.g., %20 → space)
    let url_path = urlencoding::decode(url)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();

    let path_without_query = url_path.split(['?', '#']).next().unwrap_or(&url_path);
    let request_path = path_without_query.trim_matches('/');
    if request_path.split('/').any(|segment| segment == "..") {
        return None;
    }
    let local_path = serve_root.join(request_path);

    if local_path.is_file() {
        return Some(local_path);
    }
    let index_path = local_path.join("index.html");
    index_path.is_file().then_some(index_path)
}

fn is_navigation_request(request: &Request, header: &str) -> bool {
    request.headers().iter().any(|h| {
        h.field.as_str().as_str().eq_ignore_ascii_case(header)
            && h.value.as_str().trim().eq_ignore_ascii_case("true")
    })
}

/// Title and content region of `html` as a minimal document.
///
/// `None` when the page does not parse or has no matching region.
pub fn navigation_document(html: &str, selector: &Selector) -> Option<String> {
    let doc = Document::parse(html).ok()?;
    let region = doc.select_first(selector)?;

    let title = doc
        .title()
        .map(|title| format!("<title>{}</title>", partial_escape(&title)))
        .unwrap_or_default();

    Some(format!(
        "<!DOCTYPE html><html><head>{title}</head><body>{}</body></html>",
        doc.outer_html(region)
    ))
}

fn is_html(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html" | "htm")
    )
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow::anyhow!("invalid header {name}: {value}"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = Response::from_data(content)
        .with_header(header("Content-Type", guess_content_type(path))?)
        .with_header(header("Cache-Control", "no-cache")?);

    request.respond(response)?;
    Ok(())
}

/// Serve an HTML page, varying on the navigation header.
fn serve_html(request: Request, content: String, nav_header: &str) -> Result<()> {
    let response = Response::from_string(content)
        .with_header(header("Content-Type", "text/html; charset=utf-8")?)
        .with_header(header("Vary", nav_header)?);
    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![header("Content-Type", "text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAGE: &str = "<!DOCTYPE html><html><head><title>Docs &amp; Guides</title>\
        <script type=\"module\" src=\"/islands/Counter.0123abcd.js\"></script></head>\
        <body><nav>menu</nav><main id=\"atoll-content\"><p>docs</p></main>\
        <footer>foot</footer></body></html>";

    #[test]
    fn test_navigation_document_keeps_title_and_region() {
        let selector = Selector::parse("#atoll-content").unwrap();
        let reduced = navigation_document(PAGE, &selector).unwrap();

        assert_eq!(
            reduced,
            "<!DOCTYPE html><html><head><title>Docs &amp; Guides</title></head>\
             <body><main id=\"atoll-content\"><p>docs</p></main></body></html>"
        );

        let doc = Document::parse(&reduced).unwrap();
        assert_eq!(doc.title().as_deref(), Some("Docs & Guides"));
    }

    #[test]
    fn test_navigation_document_without_region() {
        let selector = Selector::parse("#missing").unwrap();
        assert!(navigation_document(PAGE, &selector).is_none());
    }

    #[test]
    fn test_navigation_document_without_title() {
        let selector = Selector::parse("main").unwrap();
        let reduced = navigation_document("<main>x</main>", &selector).unwrap();
        assert_eq!(
            reduced,
            "<!DOCTYPE html><html><head></head><body><main>x</main></body></html>"
        );
    }

    #[test]
    fn test_resolve_path() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("index.html"), "").unwrap();
        fs::write(root.join("docs/index.html"), "").unwrap();
        fs::write(root.join("my page.html"), "").unwrap();

        assert_eq!(resolve_path(root, "/"), Some(root.join("index.html")));
        assert_eq!(resolve_path(root, "/docs/?x=1"), Some(root.join("docs/index.html")));
        assert_eq!(resolve_path(root, "/my%20page.html"), Some(root.join("my page.html")));
        assert_eq!(resolve_path(root, "/missing"), None);
        assert_eq!(resolve_path(root, "/../etc/passwd"), None);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(
            guess_content_type(Path::new("islands/Counter.0123abcd.js")),
            "application/javascript; charset=utf-8"
        );
        assert_eq!(
            guess_content_type(Path::new("islands/manifest.json")),
            "application/json; charset=utf-8"
        );
        assert_eq!(guess_content_type(Path::new("blob")), "application/octet-stream");
    }
}
