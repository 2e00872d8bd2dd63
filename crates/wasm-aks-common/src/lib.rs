//! Common types for wasm-aks: errors, secrets, polling and telemetry

#![deny(missing_docs)]

pub mod error;
pub mod poll;
pub mod secret;
pub mod telemetry;

pub use error::Error;
pub use secret::Secret;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used for every server-side apply issued by wasm-aks
pub const FIELD_MANAGER: &str = "wasm-aks";

/// Service name reported in logs and traces
pub const SERVICE_NAME: &str = "wasm-aks";
