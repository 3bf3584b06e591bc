//! Domain building blocks for the varia music-variation service.
//!
//! Everything in this crate is transport-agnostic: bar-range
//! normalisation, request construction from raw form fields, the progress
//! event protocol, batch outcomes, and the per-user storage layout.

pub mod attributes;
pub mod bars;
pub mod batch;
pub mod error;
pub mod progress;
pub mod request;
pub mod storage;
pub mod types;
