//! # NLCM Common Library
//!
//! Shared code for the natural language classifier manager modules:
//! - Error and result types
//! - Configuration loading (CLI > ENV > TOML > compiled defaults)
//! - Timestamp normalization for classifier service responses
//! - Lifecycle event types (LifecycleEvent enum) and EventBus
//! - Server-Sent Events helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, LifecycleEvent};
