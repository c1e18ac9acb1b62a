//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn components() -> PathBuf {
        "components".into()
    }

    pub fn pages() -> PathBuf {
        "pages".into()
    }

    pub fn output() -> PathBuf {
        "dist".into()
    }

    pub fn islands() -> PathBuf {
        "islands".into()
    }

    pub fn public_prefix() -> String {
        "/".into()
    }

    pub fn manifest() -> String {
        "manifest.json".into()
    }

    pub mod bundler {
        use super::super::super::UiFramework;

        pub fn command() -> Vec<String> {
            vec!["esbuild".into()]
        }

        pub fn framework() -> UiFramework {
            UiFramework::default()
        }

        pub fn target() -> String {
            "es2020".into()
        }
    }
}

// ============================================================================
// [island] Section Defaults
// ============================================================================

pub mod island {
    pub fn directive() -> String {
        "use client".into()
    }

    pub fn extensions() -> Vec<String> {
        ["tsx", "ts", "jsx", "js", "mts", "mjs"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

// ============================================================================
// [navigation] Section Defaults
// ============================================================================

pub mod navigation {
    pub fn content_selector() -> String {
        "#atoll-content".into()
    }

    pub fn header() -> String {
        "X-Atoll-Navigation".into()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5277
    }
}
