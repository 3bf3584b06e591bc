//! Batch submission and progress delivery.
//!
//! Contains the dispatcher that turns an accepted upload into a queued
//! variation batch, plus the relay that forwards progress events from the
//! local bus to the WebSocket connection owning each session.

pub mod dispatcher;
pub mod progress;
