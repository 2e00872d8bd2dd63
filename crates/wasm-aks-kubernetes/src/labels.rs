//! Typed labels and annotations
//!
//! Only the keys wasm-aks actually sets are representable; there is no
//! free-form map to put a typo into.

use std::collections::BTreeMap;

/// Label key identifying the application a pod belongs to
pub const APP_LABEL: &str = "app";

/// Annotation telling the provider not to wait for readiness
pub const SKIP_AWAIT_ANNOTATION: &str = "wasm-aks.io/skip-await";

/// Labels selecting an application's pods
///
/// A Deployment and the Service in front of it share one `Arc<AppLabels>`
/// so the two selectors cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppLabels {
    /// Value of the `app` label
    pub app: String,
}

impl AppLabels {
    /// Labels for application `app`
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }

    /// Wire form
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(APP_LABEL.to_string(), self.app.clone())])
    }
}

/// Annotations wasm-aks understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectAnnotations {
    /// Return as soon as the object is applied
    pub skip_await: bool,
}

impl ObjectAnnotations {
    /// Annotations with skip-await set
    pub fn skip_await() -> Self {
        Self { skip_await: true }
    }

    /// Wire form; `None` when nothing is set so applies don't claim an
    /// empty annotations field
    pub fn to_map(&self) -> Option<BTreeMap<String, String>> {
        if !self.skip_await {
            return None;
        }
        Some(BTreeMap::from([(
            SKIP_AWAIT_ANNOTATION.to_string(),
            "true".to_string(),
        )]))
    }
}
