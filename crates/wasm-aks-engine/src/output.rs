//! Memoized derived values
//!
//! An [`Output`] is a shared future plus the set of nodes it depends on.
//! Nothing runs until a consumer awaits it; the first poll drives the
//! computation and every clone observes the same result. Failures are shared
//! as `Arc<Error>` and surface to consumers as [`Error::Upstream`].

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use wasm_aks_common::{Error, Result};

use crate::Urn;

pub(crate) type SharedResult<T> = std::result::Result<T, Arc<Error>>;
pub(crate) type SharedFuture<T> = Shared<BoxFuture<'static, SharedResult<T>>>;

/// A value that becomes available during apply
#[derive(Clone)]
pub struct Output<T: Clone> {
    future: SharedFuture<T>,
    known: Option<T>,
    secret: bool,
    deps: BTreeSet<Urn>,
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A value known at declaration time
    pub fn known(value: T) -> Self {
        Self {
            future: future::ready(Ok(value.clone())).boxed().shared(),
            known: Some(value),
            secret: false,
            deps: BTreeSet::new(),
        }
    }

    /// A value computed by `fut`, which must only observe the given nodes
    pub fn from_future<F>(deps: BTreeSet<Urn>, fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self::from_shared(deps, fut.map(|r| r.map_err(Arc::new)).boxed().shared())
    }

    pub(crate) fn from_shared(deps: BTreeSet<Urn>, future: SharedFuture<T>) -> Self {
        Self {
            future,
            known: None,
            secret: false,
            deps,
        }
    }

    /// Mark this value as sensitive; the flag follows every derived value
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Whether this value is sensitive
    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// The value, if it was known at declaration time
    pub fn known_value(&self) -> Option<&T> {
        self.known.as_ref()
    }

    /// Nodes that must be created before this value can resolve
    pub fn dependencies(&self) -> &BTreeSet<Urn> {
        &self.deps
    }

    /// Rendering for previews: the literal if known and not secret,
    /// a placeholder otherwise
    pub fn describe(&self) -> serde_json::Value
    where
        T: serde::Serialize,
    {
        match (&self.known, self.secret) {
            (_, true) => serde_json::Value::from(wasm_aks_common::secret::REDACTED),
            (Some(v), false) => serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
            (None, false) => serde_json::Value::from(crate::COMPUTED),
        }
    }

    /// Derive a new value with a synchronous transformation
    ///
    /// If this value is known at declaration time, `f` runs immediately and
    /// the result stays known.
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        if let Some(value) = self.known.clone() {
            let mut derived = match f(value) {
                Ok(v) => Output::known(v),
                Err(e) => Output::from_future(self.deps.clone(), future::ready(Err(e))),
            };
            derived.secret = self.secret;
            derived.deps = self.deps.clone();
            return derived;
        }

        let source = self.future.clone();
        let fut = async move {
            let value = source.await?;
            f(value).map_err(Arc::new)
        };

        let mut derived = Output::from_shared(self.deps.clone(), fut.boxed().shared());
        derived.secret = self.secret;
        derived
    }

    /// Derive a new value with an asynchronous computation (e.g. a lookup call)
    pub fn apply_async<U, F, Fut>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U>> + Send + 'static,
    {
        let source = self.future.clone();
        let fut = async move {
            let value = source.await?;
            f(value).await.map_err(Arc::new)
        };

        let mut derived = Output::from_shared(self.deps.clone(), fut.boxed().shared());
        derived.secret = self.secret;
        derived
    }

    /// Combine with another value; resolves when both have resolved
    pub fn all<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let deps: BTreeSet<Urn> = self.deps.union(&other.deps).cloned().collect();
        let secret = self.secret || other.secret;

        let mut combined = match (self.known.clone(), other.known.clone()) {
            (Some(a), Some(b)) => Output::known((a, b)),
            _ => {
                let left = self.future.clone();
                let right = other.future.clone();
                Output::from_shared(
                    deps.clone(),
                    future::try_join(left, right).boxed().shared(),
                )
            }
        };
        combined.deps = deps;
        combined.secret = secret;
        combined
    }

    /// Wait for the value
    pub async fn resolve(&self) -> Result<T> {
        self.future.clone().await.map_err(Error::upstream)
    }
}

impl From<&str> for Output<String> {
    fn from(value: &str) -> Self {
        Output::known(value.to_string())
    }
}

impl From<String> for Output<String> {
    fn from(value: String) -> Self {
        Output::known(value)
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Output");
        match (&self.known, self.secret) {
            (Some(_), true) => s.field("known", &wasm_aks_common::secret::REDACTED),
            (Some(v), false) => s.field("known", v),
            (None, _) => s.field("known", &crate::COMPUTED),
        };
        s.field("secret", &self.secret)
            .field("deps", &self.deps)
            .finish()
    }
}
