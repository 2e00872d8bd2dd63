//! Declaration engine for wasm-aks
//!
//! A topology is declared by registering resources on a [`Stack`]. Each
//! registration records its dependency edges (explicit `depends_on` plus the
//! nodes behind every [`Output`] it consumes) and returns typed outputs that
//! resolve once the node has been created.
//!
//! ## Lifecycle
//!
//! ```text
//! declare                   Engine::up                      Engine::destroy
//! ─────────                 ──────────                      ───────────────
//! Stack::register ──┐       every node waits for its        1. refresh every node in
//! Output::apply     ├──►    dependencies, then ensures      dependency order (absent
//! Stack::export   ──┘       desired state; first failure    upstream ⇒ absent)
//!                           aborts the pass; exports are    2. delete present nodes in
//!                           resolved last                   reverse dependency order
//! ```
//!
//! Derived values are shared futures: they run at most once per pass and
//! every consumer observes the same result.

use std::collections::BTreeSet;

mod engine;
mod graph;
mod node;
mod output;
mod resource;
mod sequence;
mod stack;
mod urn;

pub use engine::{DestroySummary, Engine, ExportedValue, Plan, PlanStep, UpSummary};
pub use graph::ResourceGraph;
pub use output::Output;
pub use resource::{Deletion, Resource, ResourceOptions};
pub use sequence::ApplySequence;
pub use stack::{ExportValue, Registered, Stack};
pub use urn::Urn;

/// Placeholder shown in previews for values only known after apply
pub const COMPUTED: &str = "<computed>";

/// Union of the dependency sets of the outputs a resource consumes
pub fn dependencies<'a>(sets: impl IntoIterator<Item = &'a BTreeSet<Urn>>) -> BTreeSet<Urn> {
    sets.into_iter().flatten().cloned().collect()
}
