//! atoll - island hydration for server-rendered sites.
//!
//! ```text
//! build time    analyzer ──► bundle ──► islands/manifest.json
//!                                 │
//! render time   island::IslandWrapper ──► <div data-island=…>static</div>
//!                                 │         + <script type="module">
//! client        hydrate::HydrationRuntime ◄── nav::NavigationManager
//! ```

pub mod analyzer;
pub mod build;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod dom;
pub mod hydrate;
pub mod island;
pub mod logger;
pub mod nav;
pub mod serve;
pub mod utils;
pub mod watch;
