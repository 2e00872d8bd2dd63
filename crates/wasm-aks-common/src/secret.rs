//! Secret values
//!
//! `Secret<T>` wraps sensitive data (kubeconfigs, registry passwords) so it
//! cannot end up in logs by accident: `Debug` and `Display` print a fixed
//! placeholder. Reading the value requires an explicit [`Secret::expose`].

use std::fmt;

/// Placeholder printed instead of a secret value
pub const REDACTED: &str = "[secret]";

/// A value that must never be logged in plaintext
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    /// Wrap a sensitive value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the plaintext value
    pub fn expose(&self) -> &T {
        &self.0
    }

    /// Consume the wrapper and return the plaintext value
    pub fn into_inner(self) -> T {
        self.0
    }

    /// Transform the wrapped value, keeping it secret
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Secret<U> {
        Secret(f(self.0))
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", REDACTED)
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> serde::Serialize for Secret<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}
