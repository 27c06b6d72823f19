//! HTTP API handlers for nlcm-lc

pub mod corpus;
pub mod health;
pub mod sse;
pub mod status;

pub use corpus::{append_example, corpus_routes};
pub use health::health_routes;
pub use sse::{event_stream, sse_routes};
pub use status::{get_status, status_routes};
