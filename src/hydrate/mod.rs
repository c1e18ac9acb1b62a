//! Client hydration runtime.
//!
//! Finds island markers in a [`Document`], parses their props, resolves the
//! registered implementation and activates it. Each island fails alone:
//!
//! | Failure                    | Outcome                                     |
//! |----------------------------|---------------------------------------------|
//! | props do not parse         | logged, island skipped (`failed`)           |
//! | no registered component    | warned, static content stays (`inert`)      |
//! | hydrate, recoverable error | children cleared, fresh `render`            |
//! | render fails too           | static content restored (`failed`)          |

mod registry;
mod runtime;

pub use registry::{BundleLoader, ComponentRegistry};
pub use runtime::{HydrationReport, HydrationRuntime};

use crate::dom::{Document, NodeId};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by island components during activation.
#[derive(Debug, Error)]
pub enum HydrationError {
    /// Existing markup does not match what the component expects.
    #[error("markup mismatch: expected {expected}, found {actual}")]
    StructureMismatch { expected: String, actual: String },

    /// The component raised an error while activating.
    #[error("activation failed: {0}")]
    Activation(String),

    /// An error that a fresh render cannot fix.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("invalid props: {0}")]
    InvalidProps(#[from] serde_json::Error),
}

impl HydrationError {
    /// Whether discarding the markup and rendering from scratch may succeed.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::StructureMismatch { .. } | Self::Activation(_))
    }
}

/// A live island implementation, registered by the loader of its bundle.
pub trait IslandComponent: Send + Sync {
    /// Attach to the server-rendered markup already inside `node`.
    fn hydrate(&self, doc: &mut Document, node: NodeId, props: &Value) -> Result<(), HydrationError>;

    /// Render into an empty `node`.
    fn render(&self, doc: &mut Document, node: NodeId, props: &Value) -> Result<(), HydrationError>;
}
