//! Portal use-case services.
//!
//! # Responsibility
//! - Orchestrate store reads into the projections portal screens render.
//! - Keep screens decoupled from store and auth implementations; both are
//!   injected at construction.

mod catalog;
pub mod error;
pub mod profile_service;
pub mod roster_service;
