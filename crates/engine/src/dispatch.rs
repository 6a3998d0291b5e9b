//! Trigger event dispatch: one run per matching active workflow.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use queue::{EventReceiver, TriggerEvent};

use crate::executor::{RunHandle, WorkflowEngine};
use crate::manager::WorkflowManager;
use crate::EngineError;

#[derive(Clone)]
pub struct Dispatcher {
    manager: WorkflowManager,
    engine: WorkflowEngine,
}

impl Dispatcher {
    pub fn new(manager: WorkflowManager, engine: WorkflowEngine) -> Self {
        Self { manager, engine }
    }

    /// Start a run on every active workflow whose trigger matches `event`.
    ///
    /// A workflow that fails to start is logged and skipped; the others
    /// still run.
    #[instrument(skip(self, event), fields(trigger_type = %event.trigger_type))]
    pub async fn handle(&self, event: TriggerEvent) -> Result<Vec<RunHandle>, EngineError> {
        let plans = self.manager.active_plans_for(&event.trigger_type).await?;

        let mut handles = Vec::with_capacity(plans.len());
        for plan in plans {
            let workflow_id = plan.workflow_id;
            match self.engine.spawn(plan, event.clone()).await {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!(%workflow_id, error = %e, "could not start run"),
            }
        }

        info!(runs = handles.len(), "event dispatched");
        Ok(handles)
    }

    /// Consume events until the queue closes or `shutdown` fires.
    pub async fn run(self, mut events: EventReceiver, shutdown: CancellationToken) {
        info!("dispatcher started");
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = events.recv() => match next {
                    Some(event) => event,
                    None => break,
                },
            };

            if let Err(e) = self.handle(event).await {
                error!(error = %e, "event dispatch failed");
            }
        }
        info!("dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use db::MemoryStore;
    use nodes::mock::MockExecutor;
    use nodes::ActionType;

    use super::*;
    use crate::config::{ActionConfig, TriggerConfig};
    use crate::dag::ValidationLimits;
    use crate::executor::ExecutorConfig;
    use crate::models::{Edge, Graph, Node};
    use crate::RunStatus;

    fn graph(trigger_type: &str) -> Graph {
        Graph::new(
            vec![
                Node::new("t", TriggerConfig::new(trigger_type)),
                Node::new("a", ActionConfig::new(ActionType::LogMessage).with_message("hi")),
            ],
            vec![Edge::new("e", "t", "a")],
        )
    }

    fn dispatcher(mock: MockExecutor) -> (Dispatcher, WorkflowManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = WorkflowManager::new(store.clone(), ValidationLimits::default());
        let engine = WorkflowEngine::new(store, Arc::new(mock), ExecutorConfig::default());
        (Dispatcher::new(manager.clone(), engine), manager)
    }

    #[tokio::test]
    async fn starts_one_run_per_matching_active_workflow() {
        let (dispatcher, manager) = dispatcher(MockExecutor::new());
        for name in ["one", "two"] {
            let def = manager.create_draft(name, "", graph("ticket_created")).await.unwrap();
            manager.activate(def.id).await.unwrap();
        }
        let paused = manager.create_draft("paused", "", graph("ticket_created")).await.unwrap();
        manager.activate(paused.id).await.unwrap();
        manager.pause(paused.id).await.unwrap();
        manager.create_draft("draft", "", graph("ticket_created")).await.unwrap();

        let handles = dispatcher
            .handle(TriggerEvent::new("ticket_created", json!({})))
            .await
            .unwrap();
        assert_eq!(handles.len(), 2);
        for h in handles {
            assert_eq!(h.wait().await.unwrap().status, RunStatus::Completed);
        }

        assert!(dispatcher
            .handle(TriggerEvent::new("employee_created", json!({})))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn failing_run_does_not_stop_the_loop() {
        let mock = MockExecutor::new().failing("a", "boom");
        let calls = mock.calls_handle();
        let (dispatcher, manager) = dispatcher(mock);
        let def = manager.create_draft("wf", "", graph("ping")).await.unwrap();
        manager.activate(def.id).await.unwrap();

        let (tx, rx) = queue::channel(8);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(dispatcher.run(rx, shutdown.clone()));

        tx.publish(TriggerEvent::new("ping", json!({}))).await.unwrap();
        tx.publish(TriggerEvent::new("ping", json!({}))).await.unwrap();
        drop(tx);
        task.await.unwrap();

        // Runs were spawned before the loop exited; give them a moment to dispatch.
        for _ in 0..100 {
            if calls.lock().unwrap().len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let (dispatcher, _) = dispatcher(MockExecutor::new());
        let (_tx, rx) = queue::channel(8);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(dispatcher.run(rx, shutdown.clone()));

        shutdown.cancel();
        task.await.unwrap();
    }
}
