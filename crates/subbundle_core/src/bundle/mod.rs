//! Script bundle identity, registry, and loading.
//!
//! # Responsibility
//! - Validate asset ids and derive their load locators.
//! - Track loaded assets per runtime generation.
//! - Run privileged loads in the background with an in-flight guard.
//!
//! # Invariants
//! - Dedup is scoped to one runtime generation, never process-wide.

pub mod asset;
pub mod loader;
pub mod registry;
