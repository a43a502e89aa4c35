// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer only needs "something that yields
// labelled examples". ManifestLoader (Layer 4) is the one
// implementation today; a loader for another on-disk layout
// only has to implement this trait.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::example::LabeledExample;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can list labelled training examples.
pub trait ExampleSource {
    /// Return every example this source knows about.
    fn load_all(&self) -> Result<Vec<LabeledExample>>;
}
