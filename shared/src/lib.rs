//! Shared types for the license gate workspace
//!
//! Error types, response structures and small utilities used by the
//! service crate and its tests.

pub mod error;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
