//! Batch execution for variation requests.
//!
//! A [`WorkerRunner`] claims batches from a [`varia_db::queue::BatchQueue`]
//! and hands each one to a [`JobExecutor`], which runs the repetitions
//! sequentially against the generator and publishes progress for the
//! requesting session.

pub mod config;
pub mod context;
pub mod executor;
pub mod runner;

pub use context::WorkerContext;
pub use executor::{JobError, JobExecutor};
pub use runner::WorkerRunner;
