//! `db` crate — persistence layer for workflow definitions and run history.
//!
//! The engine depends only on the [`WorkflowStore`] and [`RunStore`] traits.
//! Two implementations ship here: [`MemoryStore`] for tests and single-process
//! deployments, and [`PgStore`] backed by Postgres through the repository
//! functions. No business logic lives here.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;
pub mod store;
pub mod memory;
pub mod postgres;

pub use pool::DbPool;
pub use error::DbError;
pub use models::{RunPatch, RunRow, RunStatus, WakeupRow, WorkflowRow, WorkflowStatus};
pub use store::{RunStore, WorkflowStore};
pub use memory::MemoryStore;
pub use postgres::PgStore;
