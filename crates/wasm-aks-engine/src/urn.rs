//! Node identity

use std::fmt;

/// Identity of a declared node: stack, type token and logical name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Urn {
    stack: String,
    type_token: String,
    name: String,
}

impl Urn {
    /// Create a new URN
    pub fn new(stack: &str, type_token: &str, name: &str) -> Self {
        Self {
            stack: stack.to_string(),
            type_token: type_token.to_string(),
            name: name.to_string(),
        }
    }

    /// Stack the node belongs to
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Type token (e.g., "azure:containerservice:ManagedCluster")
    pub fn type_token(&self) -> &str {
        &self.type_token
    }

    /// Logical name given at declaration
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "urn:wasm-aks:{}::{}::{}",
            self.stack, self.type_token, self.name
        )
    }
}
