//! Varia API server library.
//!
//! Exposes the serving layer (config, state, error handling, routes,
//! WebSocket infrastructure, upload dispatch and progress relay) so
//! integration tests and the binary entrypoint can both access them.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
