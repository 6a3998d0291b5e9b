//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

use db::WorkflowStatus;

/// Why a graph cannot be activated.
///
/// Covers both structural problems (bad shape) and configuration problems
/// (unconfigured nodes, bad delay durations). Validation reports the first
/// violation it finds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    // ------ Structural errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// Two or more edges share the same ID.
    #[error("duplicate edge ID: '{0}'")]
    DuplicateEdgeId(String),

    /// An edge references a node ID that doesn't exist in the graph.
    #[error("edge '{edge_id}' references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        edge_id: String,
        node_id: String,
        side: &'static str,
    },

    #[error("workflow has no trigger node")]
    MissingTrigger,

    #[error("trigger node '{0}' has incoming edges")]
    TriggerHasIncomingEdges(String),

    /// A non-trigger node that nothing leads to.
    #[error("node '{0}' has no incoming edges")]
    NoIncomingEdges(String),

    /// Only edges leaving a Condition node may carry a branch label.
    #[error("edge '{edge_id}' has a branch label but its source '{source_id}' is not a condition")]
    UnexpectedBranchLabel { edge_id: String, source_id: String },

    #[error("condition node '{node_id}' {reason}")]
    MalformedCondition { node_id: String, reason: String },

    #[error("delay node '{node_id}' has {count} outgoing edges (at most one allowed)")]
    DelayFanOut { node_id: String, count: usize },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    // ------ Configuration errors ------

    #[error("node '{node_id}' is not configured (missing: {})", .missing.join(", "))]
    Unconfigured {
        node_id: String,
        missing: Vec<&'static str>,
    },

    #[error("delay node '{node_id}' has an invalid duration: {reason}")]
    InvalidDelay { node_id: String, reason: String },
}

/// Errors produced by the workflow manager, engine and dispatcher.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    #[error("run {0} not found")]
    RunNotFound(Uuid),

    /// The requested lifecycle operation is not allowed from the current status.
    #[error("cannot {operation} workflow {id} while it is {status}")]
    InvalidStatus {
        id: Uuid,
        status: WorkflowStatus,
        operation: &'static str,
    },

    /// The caller saved against a version that is no longer current.
    #[error("workflow {id} is at version {actual}, not {expected}")]
    VersionConflict { id: Uuid, expected: i32, actual: i32 },

    /// A run or branch task panicked or was aborted.
    #[error("run task failed: {0}")]
    TaskFailed(String),

    /// A stored record could not be interpreted.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
