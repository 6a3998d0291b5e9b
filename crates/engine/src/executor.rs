//! Workflow execution engine.
//!
//! `WorkflowEngine` turns one trigger event plus one [`ExecutionPlan`] into
//! exactly one terminal run record:
//! 1. Persists a `running` run with the event and a snapshot of the graph.
//! 2. Seeds the run context from the event payload.
//! 3. Starts one branch per successor of every matching trigger. Each branch
//!    walks its nodes sequentially on its own task; action fan-out forks new
//!    branches, conditions follow one labelled edge, delays park the branch.
//! 4. The first failing branch fails the run at once: the run is marked
//!    `failed`, then the other branches are aborted and their late results
//!    discarded.
//! 5. Once every branch has ended the run is finalised as `completed`,
//!    `failed` or `cancelled`.
//!
//! Delays persist a wake-up record before sleeping so that
//! [`WorkflowEngine::resume_pending`] can continue them after a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use db::{DbError, RunPatch, RunRow, RunStore, WakeupRow};
use nodes::{ActionExecutor, ActionType, ExecutionContext};
use queue::TriggerEvent;

use crate::dag::ValidationLimits;
use crate::models::{ActionOutput, Graph, WorkflowRun};
use crate::plan::{ExecutionPlan, Step};
use crate::{EngineError, RunStatus};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Activation limits, also applied when rebuilding plans on resume.
    pub limits: ValidationLimits,
    /// Number of trigger events buffered before publishers wait.
    pub queue_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            limits: ValidationLimits::default(),
            queue_capacity: queue::DEFAULT_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// A run executing on a background task.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub join: JoinHandle<Result<WorkflowRun, EngineError>>,
}

impl RunHandle {
    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) -> Result<WorkflowRun, EngineError> {
        self.join
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Per-run state
// ---------------------------------------------------------------------------

/// State shared by every branch of one run.
struct ActiveRun {
    id: Uuid,
    plan: Arc<ExecutionPlan>,
    /// Last write wins across branches.
    context: Mutex<Value>,
    cancel: CancellationToken,
    started: Instant,
}

enum BranchStart {
    Node(String),
    /// Continue after a delay persisted by an earlier process.
    Wake {
        wakeup_id: Uuid,
        node_id: String,
        wake_at: DateTime<Utc>,
    },
}

enum BranchEnd {
    /// Reached a node with no successor.
    Done,
    /// Action fan-out: each target becomes its own branch.
    Fork(Vec<String>),
    /// Cancelled before reaching the end.
    Stopped,
}

enum Fault {
    Action { node_id: String, message: String },
    Engine(EngineError),
}

impl From<EngineError> for Fault {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<DbError> for Fault {
    fn from(e: DbError) -> Self {
        Self::Engine(e.into())
    }
}

impl From<serde_json::Error> for Fault {
    fn from(e: serde_json::Error) -> Self {
        Self::Engine(e.into())
    }
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Runs plans against trigger events. Cheap to clone; clones share the
/// in-flight run table.
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn RunStore>,
    actions: Arc<dyn ActionExecutor>,
    config: ExecutorConfig,
    in_flight: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn RunStore>, actions: Arc<dyn ActionExecutor>, config: ExecutorConfig) -> Self {
        Self {
            store,
            actions,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `plan` against `event` and wait for the terminal record.
    ///
    /// # Errors
    /// Only engine faults (store failures, panicked branches). A failing
    /// action produces an `Ok` run with status `failed`.
    #[instrument(skip(self, plan, event), fields(workflow_id = %plan.workflow_id, trigger_type = %event.trigger_type))]
    pub async fn execute(&self, plan: Arc<ExecutionPlan>, event: TriggerEvent) -> Result<WorkflowRun, EngineError> {
        self.spawn(plan, event).await?.wait().await
    }

    /// Persist a new run and start it on a background task.
    pub async fn spawn(&self, plan: Arc<ExecutionPlan>, event: TriggerEvent) -> Result<RunHandle, EngineError> {
        let starts: Vec<BranchStart> = plan
            .entry_targets(&event.trigger_type)
            .into_iter()
            .map(BranchStart::Node)
            .collect();
        if starts.is_empty() {
            warn!(workflow_id = %plan.workflow_id, trigger_type = %event.trigger_type, "no trigger matches event");
        }

        let run = self.start_run(plan, &event).await?;
        Ok(self.launch(run, starts).await)
    }

    /// Request cancellation of an in-flight run.
    ///
    /// Returns `false` if the run is unknown or already finished. A `true`
    /// result guarantees the run ends `cancelled` unless an action has
    /// already failed it. Actions already dispatched are not rolled back.
    pub async fn cancel(&self, run_id: Uuid) -> bool {
        match self.in_flight.lock().await.get(&run_id) {
            Some(token) => {
                info!(%run_id, "cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Continue every run that was parked on a delay when the previous
    /// process stopped.
    ///
    /// Runs that are already terminal, or whose graph snapshot no longer
    /// compiles, are cleaned up instead of resumed.
    #[instrument(skip(self))]
    pub async fn resume_pending(&self) -> Result<Vec<RunHandle>, EngineError> {
        let mut by_run: BTreeMap<Uuid, Vec<WakeupRow>> = BTreeMap::new();
        for wakeup in self.store.list_wakeups().await? {
            by_run.entry(wakeup.run_id).or_default().push(wakeup);
        }

        let mut handles = Vec::new();
        for (run_id, wakeups) in by_run {
            match self.resume_run(run_id, wakeups).await {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {}
                Err(e) => warn!(%run_id, error = %e, "could not resume run"),
            }
        }

        info!(resumed = handles.len(), "pending runs resumed");
        Ok(handles)
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<WorkflowRun, EngineError> {
        let row = self.store.get_run(run_id).await.map_err(|e| match e {
            DbError::NotFound => EngineError::RunNotFound(run_id),
            other => other.into(),
        })?;
        row.try_into()
    }

    /// Runs of one workflow, newest first.
    pub async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<WorkflowRun>, EngineError> {
        self.store
            .list_runs(workflow_id)
            .await?
            .into_iter()
            .map(WorkflowRun::try_from)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Run lifecycle
    // -----------------------------------------------------------------------

    async fn start_run(&self, plan: Arc<ExecutionPlan>, event: &TriggerEvent) -> Result<Arc<ActiveRun>, EngineError> {
        let row = RunRow {
            id: Uuid::new_v4(),
            workflow_id: plan.workflow_id,
            status: RunStatus::Running.to_string(),
            input_data: serde_json::to_value(event)?,
            output_data: Value::Array(Vec::new()),
            error_message: None,
            graph_snapshot: serde_json::to_value(&plan.graph)?,
            started_at: Utc::now(),
            completed_at: None,
            execution_time_ms: None,
        };
        self.store.create_run(&row).await?;
        info!(run_id = %row.id, workflow_id = %plan.workflow_id, "run started");

        Ok(Arc::new(ActiveRun {
            id: row.id,
            plan,
            context: Mutex::new(initial_context(event)),
            cancel: CancellationToken::new(),
            started: Instant::now(),
        }))
    }

    async fn resume_run(&self, run_id: Uuid, wakeups: Vec<WakeupRow>) -> Result<Option<RunHandle>, EngineError> {
        let row = match self.store.get_run(run_id).await {
            Ok(row) => row,
            Err(DbError::NotFound) => {
                warn!(%run_id, "dropping wake-ups of unknown run");
                self.store.delete_wakeups_for_run(run_id).await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if row.run_status().map_err(EngineError::Corrupt)?.is_terminal() {
            self.store.delete_wakeups_for_run(run_id).await?;
            return Ok(None);
        }

        let compiled = serde_json::from_value::<Graph>(row.graph_snapshot.clone())
            .map_err(EngineError::from)
            .and_then(|graph| ExecutionPlan::compile(row.workflow_id, &graph, &self.config.limits));
        let plan = match compiled {
            Ok(plan) => Arc::new(plan),
            Err(e) => {
                warn!(%run_id, error = %e, "graph snapshot no longer compiles");
                self.store.delete_wakeups_for_run(run_id).await?;
                self.store
                    .update_run(
                        run_id,
                        &RunPatch {
                            status: Some(RunStatus::Failed),
                            error_message: Some(format!("cannot resume: {e}")),
                            completed_at: Some(Utc::now()),
                            execution_time_ms: Some(millis_since(row.started_at)),
                        },
                    )
                    .await?;
                return Ok(None);
            }
        };

        let mut context = Map::new();
        for wakeup in &wakeups {
            if let Value::Object(saved) = &wakeup.context {
                context.extend(saved.clone());
            }
        }

        let elapsed = (Utc::now() - row.started_at).to_std().unwrap_or_default();
        let run = Arc::new(ActiveRun {
            id: run_id,
            plan,
            context: Mutex::new(Value::Object(context)),
            cancel: CancellationToken::new(),
            started: Instant::now().checked_sub(elapsed).unwrap_or_else(Instant::now),
        });

        info!(%run_id, branches = wakeups.len(), "resuming run");
        let starts = wakeups
            .into_iter()
            .map(|w| BranchStart::Wake { wakeup_id: w.id, node_id: w.node_id, wake_at: w.wake_at })
            .collect();
        Ok(Some(self.launch(run, starts).await))
    }

    async fn launch(&self, run: Arc<ActiveRun>, starts: Vec<BranchStart>) -> RunHandle {
        let run_id = run.id;
        self.in_flight.lock().await.insert(run_id, run.cancel.clone());

        let engine = self.clone();
        let join = tokio::spawn(
            async move { engine.drive(run, starts).await }.instrument(info_span!("run", %run_id)),
        );
        RunHandle { run_id, join }
    }

    /// Supervise a run's branches until all of them have ended.
    async fn drive(self, run: Arc<ActiveRun>, starts: Vec<BranchStart>) -> Result<WorkflowRun, EngineError> {
        let mut branches = JoinSet::new();
        for start in starts {
            branches.spawn(self.clone().run_branch(run.clone(), start));
        }

        let mut stopped = false;

        while let Some(joined) = branches.join_next().await {
            let outcome = joined.unwrap_or_else(|e| Err(Fault::Engine(EngineError::TaskFailed(e.to_string()))));

            match outcome {
                Ok(BranchEnd::Done) => {}
                Ok(BranchEnd::Fork(targets)) => {
                    if run.cancel.is_cancelled() {
                        stopped = true;
                        continue;
                    }
                    debug!(branches = targets.len(), "fan-out");
                    for target in targets {
                        branches.spawn(self.clone().run_branch(run.clone(), BranchStart::Node(target)));
                    }
                }
                Ok(BranchEnd::Stopped) => stopped = true,
                Err(fault) => {
                    // The run is failed as of now; the other branches are abandoned.
                    run.cancel.cancel();
                    branches.abort_all();
                    self.in_flight.lock().await.remove(&run.id);
                    let result = self.finish(&run, Some(fault), false).await;

                    while branches.join_next().await.is_some() {}
                    // An aborted branch may have parked a wake-up after `finish` cleared them.
                    if let Err(e) = self.store.delete_wakeups_for_run(run.id).await {
                        warn!(run_id = %run.id, error = %e, "could not clear wake-ups");
                    }
                    return result;
                }
            }
        }

        self.in_flight.lock().await.remove(&run.id);
        self.finish(&run, None, stopped).await
    }

    async fn finish(&self, run: &ActiveRun, fault: Option<Fault>, stopped: bool) -> Result<WorkflowRun, EngineError> {
        let (status, error_message, engine_error) = match fault {
            Some(Fault::Action { node_id, message }) => {
                (RunStatus::Failed, Some(format!("action '{node_id}' failed: {message}")), None)
            }
            Some(Fault::Engine(e)) => (RunStatus::Failed, Some(e.to_string()), Some(e)),
            // A cancel accepted before the run left `in_flight` wins over completion.
            None if stopped || run.cancel.is_cancelled() => (RunStatus::Cancelled, None, None),
            None => (RunStatus::Completed, None, None),
        };

        if let Err(e) = self.store.delete_wakeups_for_run(run.id).await {
            warn!(run_id = %run.id, error = %e, "could not clear wake-ups");
        }

        let elapsed_ms = i64::try_from(run.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let patch = RunPatch {
            status: Some(status),
            error_message: error_message.clone(),
            completed_at: Some(Utc::now()),
            execution_time_ms: Some(elapsed_ms),
        };
        let written = self.store.update_run(run.id, &patch).await;

        if let Some(e) = engine_error {
            if let Err(write_err) = written {
                warn!(run_id = %run.id, error = %write_err, "could not record engine fault");
            }
            return Err(e);
        }
        written?;

        match status {
            RunStatus::Failed => warn!(
                run_id = %run.id,
                error = error_message.as_deref().unwrap_or_default(),
                "run failed"
            ),
            _ => info!(run_id = %run.id, %status, elapsed_ms, "run finished"),
        }

        self.get_run(run.id).await
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Walk one branch until it ends, forks or is cancelled.
    async fn run_branch(self, run: Arc<ActiveRun>, start: BranchStart) -> Result<BranchEnd, Fault> {
        let mut current = match start {
            BranchStart::Node(id) => id,
            BranchStart::Wake { wakeup_id, node_id, wake_at } => {
                let remaining = (wake_at - Utc::now()).to_std().unwrap_or_default();
                if !sleep_unless_cancelled(&run.cancel, remaining).await {
                    return Ok(BranchEnd::Stopped);
                }
                self.store.delete_wakeup(wakeup_id).await?;

                let node = plan_node(&run.plan, &node_id)?;
                match node.successors().first() {
                    Some(next) => next.clone(),
                    None => return Ok(BranchEnd::Done),
                }
            }
        };

        loop {
            if run.cancel.is_cancelled() {
                return Ok(BranchEnd::Stopped);
            }

            let node = plan_node(&run.plan, &current)?;

            let mut next: Vec<String> = match &node.step {
                Step::Trigger { .. } => node.successors().to_vec(),

                Step::Action { action_type, config } => {
                    self.dispatch(&run, &node.id, *action_type, config).await?;
                    node.successors().to_vec()
                }

                Step::Condition(spec) => {
                    let outcome = spec.evaluate(&*run.context.lock().await);
                    debug!(node_id = %node.id, outcome, "condition evaluated");
                    node.branch_target(outcome).map(|t| vec![t.to_owned()]).unwrap_or_default()
                }

                Step::Delay { duration } => {
                    let wakeup = WakeupRow {
                        id: Uuid::new_v4(),
                        run_id: run.id,
                        node_id: node.id.clone(),
                        wake_at: Utc::now()
                            + chrono::Duration::from_std(*duration)
                                .map_err(|e| EngineError::Corrupt(format!("delay '{}': {e}", node.id)))?,
                        context: run.context.lock().await.clone(),
                    };
                    self.store.save_wakeup(&wakeup).await?;
                    debug!(node_id = %node.id, wake_at = %wakeup.wake_at, "branch suspended");

                    if !sleep_unless_cancelled(&run.cancel, *duration).await {
                        return Ok(BranchEnd::Stopped);
                    }
                    self.store.delete_wakeup(wakeup.id).await?;
                    node.successors().to_vec()
                }
            };

            if next.len() > 1 {
                return Ok(BranchEnd::Fork(next));
            }
            match next.pop() {
                Some(target) => current = target,
                None => return Ok(BranchEnd::Done),
            }
        }
    }

    /// Invoke the action executor and record its result on the run.
    async fn dispatch(
        &self,
        run: &ActiveRun,
        node_id: &str,
        action_type: ActionType,
        config: &Value,
    ) -> Result<(), Fault> {
        let ctx = ExecutionContext {
            workflow_id: run.plan.workflow_id,
            run_id: run.id,
            node_id: node_id.to_owned(),
            data: run.context.lock().await.clone(),
        };

        debug!(node_id, %action_type, "dispatching action");
        let output = self
            .actions
            .execute(action_type, config, &ctx)
            .await
            .map_err(|e| Fault::Action { node_id: node_id.to_owned(), message: e.to_string() })?;

        merge_output(&mut *run.context.lock().await, node_id, &output);

        let entry = ActionOutput {
            node_id: node_id.to_owned(),
            action_type,
            output,
            completed_at: Utc::now(),
        };
        self.store.append_output(run.id, serde_json::to_value(&entry)?).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn plan_node<'a>(plan: &'a ExecutionPlan, id: &str) -> Result<&'a crate::plan::PlanNode, EngineError> {
    plan.node(id)
        .ok_or_else(|| EngineError::Corrupt(format!("plan has no node '{id}'")))
}

/// Returns `false` if the token fired first.
async fn sleep_unless_cancelled(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Top-level event fields overlaid by the payload's fields. A non-object
/// payload is kept under `payload`.
fn initial_context(event: &TriggerEvent) -> Value {
    let mut context = event.extra.clone();
    match &event.payload {
        Value::Object(fields) => context.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone()))),
        Value::Null => {}
        other => {
            context.insert("payload".into(), other.clone());
        }
    }
    Value::Object(context)
}

/// Object outputs merge key-by-key; other outputs are stored under the node ID.
fn merge_output(context: &mut Value, node_id: &str, output: &Value) {
    let Value::Object(ctx) = context else {
        return;
    };
    match output {
        Value::Object(fields) => ctx.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone()))),
        Value::Null => {}
        other => {
            ctx.insert(node_id.to_owned(), other.clone());
        }
    }
}

fn millis_since(start: DateTime<Utc>) -> i64 {
    (Utc::now() - start).num_milliseconds().max(0)
}
