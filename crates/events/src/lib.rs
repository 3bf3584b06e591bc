//! Progress delivery for variation batches.
//!
//! - [`ProgressPublisher`] -- the fire-and-forget `publish(session, event)`
//!   capability the job executor depends on.
//! - [`ProgressBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`postgres`] -- cross-process transport over Postgres `NOTIFY`, used
//!   when workers and the serving process are separate.

pub mod bus;
pub mod postgres;
pub mod publisher;

pub use bus::ProgressBus;
pub use postgres::{PgNotifyPublisher, PgProgressListener, PROGRESS_CHANNEL};
pub use publisher::ProgressPublisher;
