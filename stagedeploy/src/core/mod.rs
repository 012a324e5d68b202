//! Core domain model types.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Resource identifiers and observed resource states
//! - Component kinds and stage phases

mod resource;
mod status;

pub use resource::{ResourceId, ResourceKind, ResourceScope, ResourceState};
pub use status::{ComponentKind, StagePhase};
