//! Error types for wasm-aks
//!
//! Errors are structured with fields to aid debugging. Each variant carries
//! the resource or operation it concerns so the first failing node can be
//! reported as-is. Failures that fan out to several consumers (a memoized
//! derived value, a failed upstream node) travel as `Arc<Error>`.

use std::sync::Arc;

use thiserror::Error;

/// Resource named by validation errors raised outside any one resource
const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for wasm-aks operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Transport-level HTTP error talking to a cloud API
    #[error("http error: {source}")]
    Http {
        /// The underlying reqwest error
        #[from]
        source: reqwest::Error,
    },

    /// Invalid declaration
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Resource the invalid declaration belongs to
        resource: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "properties.workloadRuntime")
        field: Option<String>,
    },

    /// A provider call failed
    #[error("provider error [{provider}] for {resource}: {message}")]
    Provider {
        /// Provider name (azure, docker, kubernetes)
        provider: String,
        /// Resource being provisioned
        resource: String,
        /// Description of what failed
        message: String,
        /// HTTP status returned by the provider API, if any
        status: Option<u16>,
    },

    /// A derived value could not be decoded (e.g. the kubeconfig blob)
    #[error("decode error for {what}: {message}")]
    Decode {
        /// What was being decoded
        what: String,
        /// Description of what failed
        message: String,
    },

    /// A lookup of a well-known or derived value failed
    #[error("lookup error for {what}: {message}")]
    Lookup {
        /// What was being looked up
        what: String,
        /// Description of what failed
        message: String,
    },

    /// An external command failed
    #[error("command `{command}` failed: {message}")]
    Command {
        /// The command that was run
        command: String,
        /// Description of what failed (usually stderr)
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// A node of the graph failed
    #[error("resource {urn} failed: {source}")]
    Resource {
        /// URN of the failing node
        urn: String,
        /// The failure
        #[source]
        source: Arc<Error>,
    },

    /// A value this operation depends on failed to resolve
    #[error("upstream failure: {source}")]
    Upstream {
        /// The upstream failure
        #[source]
        source: Arc<Error>,
    },

    /// A node does not exist (destroy-time refresh)
    #[error("resource {urn} does not exist")]
    Absent {
        /// URN of the missing node
        urn: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with resource context
    pub fn validation_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with resource context and field path
    pub fn validation_for_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a provider error
    pub fn provider(
        provider: impl Into<String>,
        resource: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            resource: resource.into(),
            message: msg.into(),
            status: None,
        }
    }

    /// Create a provider error carrying the HTTP status of the failed call
    pub fn provider_status(
        provider: impl Into<String>,
        resource: impl Into<String>,
        status: u16,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            resource: resource.into(),
            message: msg.into(),
            status: Some(status),
        }
    }

    /// Create a decode error
    pub fn decode(what: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            message: msg.into(),
        }
    }

    /// Create a lookup error
    pub fn lookup(what: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Lookup {
            what: what.into(),
            message: msg.into(),
        }
    }

    /// Create a command error
    pub fn command(command: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Wrap a shared failure observed while resolving an input
    pub fn upstream(source: Arc<Error>) -> Self {
        Self::Upstream { source }
    }

    /// Attribute a failure to the node that produced it
    pub fn resource(urn: impl Into<String>, source: Arc<Error>) -> Self {
        Self::Resource {
            urn: urn.into(),
            source,
        }
    }

    /// The originating failure, looking through node and upstream wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::Resource { source, .. } | Error::Upstream { source } => source.root(),
            other => other,
        }
    }

    /// Whether this failure means "the thing does not exist"
    ///
    /// True for [`Error::Absent`] (directly or behind wrappers) and for
    /// provider errors that carried HTTP 404.
    pub fn is_absent(&self) -> bool {
        match self.root() {
            Error::Absent { .. } => true,
            Error::Provider { status, .. } => *status == Some(404),
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            _ => false,
        }
    }

    /// URN of the first failing node, if the failure was attributed to one
    pub fn urn(&self) -> Option<&str> {
        match self {
            Error::Resource { urn, .. } => Some(urn),
            Error::Absent { urn } => Some(urn),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization {
            message: e.to_string(),
        }
    }
}
