//! Client for the external detection service.
//!
//! The service owns the model; this server only forwards images and reshapes
//! whatever comes back.

mod client;
pub mod types;

use thiserror::Error;

pub use client::InferenceClient;
pub use types::{RawBox, RawDefect, RawDetection, RawSummary, ServiceHealth};

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("no response within {0}s")]
    Timeout(u64),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Service(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}
