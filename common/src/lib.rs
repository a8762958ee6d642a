//! Shared types for the append-only storage and executor crates.

pub mod api;
pub mod disk_manager;
pub mod tuple;
