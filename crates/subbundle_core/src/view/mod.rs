//! Display surfaces and their attachment to runtime generations.
//!
//! # Responsibility
//! - Model the surface a container hosts in its view tree.
//! - Guard attach/detach against stale or missing runtime generations.
//!
//! # Invariants
//! - Attach happens only after the surface's bundle finished loading.
//! - Detach is safe in every state.

pub mod attach;
pub mod surface;
