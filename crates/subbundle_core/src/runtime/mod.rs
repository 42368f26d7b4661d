//! Boundary to the embedding scripting runtime.
//!
//! # Responsibility
//! - Define the lifecycle and privileged capability contracts the core uses.
//! - Model runtime generations and their lifecycle phases.
//! - Provide `ScriptHost`, an in-process lifecycle manager over a pluggable
//!   `ScriptEngine`.
//!
//! # Invariants
//! - At most one generation is live per lifecycle manager.
//! - Recreate retires the live generation before a new one is published.

pub mod capability;
pub mod generation;
pub mod host;
pub mod lifecycle;
pub mod phase;
