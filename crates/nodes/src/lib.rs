//! `nodes` crate — the Action Executor contract and built-in executors.
//!
//! The engine never performs side effects itself. Every Action node is handed
//! to an [`ActionExecutor`] together with its configuration and a snapshot of
//! the run context.

pub mod error;
pub mod traits;
pub mod retry;
pub mod logging;
pub mod mock;

pub use error::ActionError;
pub use traits::{ActionExecutor, ActionType, ExecutionContext};
pub use retry::{RetryPolicy, Retrying};
pub use logging::LoggingExecutor;
pub use mock::MockExecutor;
