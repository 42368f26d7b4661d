//! Host container glue.
//!
//! # Responsibility
//! - Turn a `ContainerConfig` into a surface plus its load/attach flow.
//! - Provide the manual reload action.
//!
//! # See also
//! - `crate::runtime` for the lifecycle contract the dispatch reads.

pub mod config;
pub mod container;
