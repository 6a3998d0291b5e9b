//! `engine` crate — graph model, validation, templates, workflow lifecycle
//! and the execution engine.

pub mod models;
pub mod config;
pub mod error;
pub mod dag;
pub mod condition;
pub mod plan;
pub mod templates;
pub mod manager;
pub mod executor;
pub mod dispatch;

pub use models::{ActionOutput, Branch, Edge, Graph, Node, NodeKind, Position, WorkflowDefinition, WorkflowExport, WorkflowRun};
pub use config::{ActionConfig, ConditionConfig, DelayConfig, DelayUnit, NodeConfig, Operator, TriggerConfig};
pub use error::{EngineError, ValidationError};
pub use dag::{clone_with_fresh_ids, validate_for_activation, validate_with_limits, ValidationLimits};
pub use plan::ExecutionPlan;
pub use templates::{CategoryFilter, Template, TemplateRegistry};
pub use manager::WorkflowManager;
pub use executor::{ExecutorConfig, RunHandle, WorkflowEngine};
pub use dispatch::Dispatcher;

pub use db::{RunStatus, WorkflowStatus};
pub use queue::TriggerEvent;
