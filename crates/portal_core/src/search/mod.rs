//! Roster search entry points.
//!
//! # Responsibility
//! - Project roster students into a lightweight autocomplete index.
//! - Keep search normalization inside core.

pub mod roster_index;
