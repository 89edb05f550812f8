//! rusty-kanban/crates/rk-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Rusty-Kanban:
//! models, the storage ports, and the position reindexer that keeps every
//! list's cards (and every board's lists) densely numbered.

pub mod error;
pub mod models;
pub mod reindex;
pub mod service;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use service::BoardService;
pub use traits::*;
