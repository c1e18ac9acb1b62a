//! Global config with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic config replacement, so the
//! watcher can swap in a new `atoll.toml` while the dev server keeps serving.
//!
//! ```text
//!   serve thread ──► cfg() (lock-free load)
//!   watch thread ──► reload_config() (atomic replace)
//! ```

use super::SiteConfig;
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use std::{
    fs,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicU64, Ordering},
    },
};

/// Global config storage with atomic replacement support.
///
/// Initialized with default config, then replaced with loaded config in main.
pub static CONFIG: LazyLock<ArcSwap<SiteConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(SiteConfig::default()));

/// Hash of the config file content last loaded.
static CONFIG_HASH: AtomicU64 = AtomicU64::new(0);

/// Get current config as `Arc<SiteConfig>`.
#[inline]
pub fn cfg() -> Arc<SiteConfig> {
    CONFIG.load_full()
}

/// Initialize global config (called once at startup).
pub fn init_config(config: SiteConfig) {
    if let Ok(content) = fs::read(&config.config_path) {
        CONFIG_HASH.store(content_hash(&content), Ordering::Relaxed);
    }
    CONFIG.store(Arc::new(config));
}

/// Replace config atomically when `atoll.toml` changed on disk.
///
/// Returns `true` if the config was replaced, `false` if the content hash
/// matches the last load.
pub fn reload_config() -> Result<bool> {
    let current = cfg();
    let cli = current
        .cli
        .context("config was not initialized from the command line")?;

    let content = fs::read(&current.config_path)
        .with_context(|| format!("Failed to read {}", current.config_path.display()))?;
    let new_hash = content_hash(&content);
    if new_hash == CONFIG_HASH.load(Ordering::Relaxed) {
        return Ok(false);
    }

    let new_config = SiteConfig::load(cli)?;
    CONFIG.store(Arc::new(new_config));
    CONFIG_HASH.store(new_hash, Ordering::Relaxed);

    Ok(true)
}

/// First 8 bytes of the blake3 digest.
fn content_hash(content: &[u8]) -> u64 {
    let digest = blake3::hash(content);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash(b"[serve]"), content_hash(b"[serve]"));
        assert_ne!(content_hash(b"[serve]"), content_hash(b"[build]"));
    }
}
