//! Plan execution driver
//!
//! Runs a validated task plan in dependency order. Independent tasks within a
//! wave run concurrently; plan validation guarantees their outputs are
//! write-disjoint. A failed task never aborts the pass: its dependents are
//! skipped with a propagated-failure trace entry while unrelated tasks
//! continue.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::{
    ExecutionOutput, Phase, PlanValidationError, Task, TaskPlan, ToolInvocation, TraceEntry,
    VerificationOutput, Workspace,
};
use crate::handler::{HandlerResponse, StageHandler};
use crate::state::{PipelineState, StateDelta};

/// Tool-selection capability consumed per task (out-of-scope internals)
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Pick a tool for the task, run it, and report what happened
    async fn select_and_run(
        &self,
        task: &Task,
        workspace: &Workspace,
    ) -> eyre::Result<ToolInvocation>;
}

/// Executes task plans against a tool runner
pub struct PlanExecutor {
    runner: Arc<dyn ToolRunner>,
}

impl PlanExecutor {
    /// Create an executor delegating tool selection to `runner`
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    /// Run a plan over a seed workspace
    ///
    /// The plan is validated first; an invalid plan is rejected outright with
    /// zero tasks executed. Each completed task writes its result into the
    /// workspace at its `output_id` and appends an invocation trace entry.
    pub async fn run(
        &self,
        plan: &TaskPlan,
        seed: Workspace,
    ) -> Result<ExecutionOutput, PlanValidationError> {
        let order = plan.topological_order()?;
        info!(tasks = order.len(), "executing plan");

        let mut workspace = seed;
        let mut trace = Vec::new();
        let mut done: HashSet<&str> = HashSet::new();
        let mut failed: HashSet<&str> = HashSet::new();
        let mut last_output: Option<&str> = None;
        let mut pending = order;

        while !pending.is_empty() {
            let mut wave: Vec<&Task> = Vec::new();
            let mut later: Vec<&Task> = Vec::new();

            // Topological order guarantees the first pending task is either
            // ready or blocked, so every pass makes progress.
            for task in pending {
                if let Some(dep) = task
                    .dependencies
                    .iter()
                    .find(|d| failed.contains(d.as_str()))
                {
                    warn!(task_id = %task.id, failed_dependency = %dep, "skipping blocked task");
                    trace.push(TraceEntry::BlockedSkipped {
                        task_id: task.id.clone(),
                        failed_dependency: dep.clone(),
                    });
                    failed.insert(task.id.as_str());
                } else if task.dependencies.iter().all(|d| done.contains(d.as_str())) {
                    wave.push(task);
                } else {
                    later.push(task);
                }
            }

            let results = join_all(
                wave.iter()
                    .map(|task| self.runner.select_and_run(task, &workspace)),
            )
            .await;

            for (task, result) in wave.into_iter().zip(results) {
                match result {
                    Ok(invocation) => {
                        debug!(task_id = %task.id, tool = %invocation.tool, "task completed");
                        workspace.insert(task.output_id.clone(), invocation.output.clone());
                        trace.push(TraceEntry::Invocation(invocation));
                        done.insert(task.id.as_str());
                        last_output = Some(task.output_id.as_str());
                    }
                    Err(e) => {
                        warn!(task_id = %task.id, error = %e, "task failed");
                        trace.push(TraceEntry::TaskFailed {
                            task_id: task.id.clone(),
                            error: e.to_string(),
                        });
                        failed.insert(task.id.as_str());
                    }
                }
            }

            pending = later;
        }

        let final_result = plan
            .final_output_id
            .as_deref()
            .or(last_output)
            .and_then(|id| workspace.get(id).cloned());

        info!(
            completed = done.len(),
            failed_or_skipped = failed.len(),
            "plan execution finished"
        );

        Ok(ExecutionOutput {
            workspace,
            trace,
            final_result,
        })
    }
}

/// The provided Execution-phase handler: wires [`PlanExecutor`] into the
/// stage contract
///
/// Reads the validated plan from the snapshot's planning fragment and seeds
/// execution from the accumulated workspace (the engine merges the plan's
/// workspace seed when it accepts the plan).
pub struct PlanExecutionHandler {
    executor: PlanExecutor,
}

impl PlanExecutionHandler {
    /// Create the handler around a tool runner
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            executor: PlanExecutor::new(runner),
        }
    }
}

#[async_trait]
impl StageHandler for PlanExecutionHandler {
    fn phase(&self) -> Phase {
        Phase::Execution
    }

    async fn handle(
        &self,
        snapshot: &PipelineState,
        _feedback: Option<&VerificationOutput>,
    ) -> eyre::Result<HandlerResponse> {
        let planning = snapshot
            .planning
            .as_ref()
            .ok_or_else(|| eyre::eyre!("no plan available for execution"))?;

        let output = self
            .executor
            .run(&planning.plan, snapshot.workspace.clone())
            .await?;

        let workspace = output.workspace.clone();
        Ok(HandlerResponse::delta(
            StateDelta::execution(output).with_workspace(workspace),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use serde_json::json;
    use std::sync::Mutex;

    /// Runner that records calls and fails tasks whose id appears in `fail`
    struct ScriptedRunner {
        calls: Mutex<Vec<String>>,
        fail: HashSet<String>,
    }

    impl ScriptedRunner {
        fn new(fail: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: fail.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        async fn select_and_run(
            &self,
            task: &Task,
            _workspace: &Workspace,
        ) -> eyre::Result<ToolInvocation> {
            self.calls.lock().unwrap().push(task.id.clone());
            if self.fail.contains(&task.id) {
                return Err(eyre::eyre!("scripted failure for {}", task.id));
            }
            Ok(ToolInvocation {
                task_id: task.id.clone(),
                tool: "stub".to_string(),
                input: task.method.clone(),
                output: json!(format!("result of {}", task.id)),
                rationale: "scripted".to_string(),
            })
        }
    }

    fn diamond_plan() -> TaskPlan {
        TaskPlan::new()
            .with_section(
                "solve",
                vec![
                    Task::new("a", "root", "m", "oa"),
                    Task::new("b", "left", "m", "ob").with_dependency("a"),
                    Task::new("c", "right", "m", "oc").with_dependency("a"),
                    Task::new("d", "join", "m", "od")
                        .with_dependency("b")
                        .with_dependency("c"),
                ],
            )
            .with_final_output("od")
    }

    #[tokio::test]
    async fn test_all_tasks_complete() {
        let runner = Arc::new(ScriptedRunner::new(&[]));
        let executor = PlanExecutor::new(runner.clone());

        let output = executor
            .run(&diamond_plan(), Workspace::new())
            .await
            .unwrap();

        assert_eq!(output.completed_count(), 4);
        assert!(output.fully_completed());
        assert_eq!(output.final_result, Some(json!("result of d")));
        assert_eq!(output.workspace.len(), 4);

        // Dependency order respected
        let calls = runner.calls();
        let pos = |id: &str| calls.iter().position(|c| c == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[tokio::test]
    async fn test_failure_skips_dependents_but_not_siblings() {
        let runner = Arc::new(ScriptedRunner::new(&["b"]));
        let executor = PlanExecutor::new(runner.clone());

        let output = executor
            .run(&diamond_plan(), Workspace::new())
            .await
            .unwrap();

        // a and c complete; b fails; d is blocked on b
        assert_eq!(output.completed_count(), 2);
        assert!(output.trace.iter().any(|e| matches!(
            e,
            TraceEntry::TaskFailed { task_id, .. } if task_id == "b"
        )));
        assert!(output.trace.iter().any(|e| matches!(
            e,
            TraceEntry::BlockedSkipped { task_id, failed_dependency }
                if task_id == "d" && failed_dependency == "b"
        )));
        // d never reached the runner
        assert!(!runner.calls().contains(&"d".to_string()));
        // c ran despite b's failure
        assert!(runner.calls().contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn test_skip_propagates_transitively() {
        let plan = TaskPlan::new().with_section(
            "chain",
            vec![
                Task::new("t1", "a", "m", "o1"),
                Task::new("t2", "b", "m", "o2").with_dependency("t1"),
                Task::new("t3", "c", "m", "o3").with_dependency("t2"),
            ],
        );
        let runner = Arc::new(ScriptedRunner::new(&["t1"]));
        let executor = PlanExecutor::new(runner.clone());

        let output = executor.run(&plan, Workspace::new()).await.unwrap();

        assert_eq!(output.completed_count(), 0);
        assert_eq!(runner.calls(), vec!["t1".to_string()]);
        let skipped: Vec<&str> = output
            .trace
            .iter()
            .filter_map(|e| match e {
                TraceEntry::BlockedSkipped { task_id, .. } => Some(task_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(skipped, vec!["t2", "t3"]);
    }

    #[tokio::test]
    async fn test_invalid_plan_executes_nothing() {
        let plan = TaskPlan::new().with_section(
            "s",
            vec![Task::new("t1", "a", "m", "o1").with_dependency("ghost")],
        );
        let runner = Arc::new(ScriptedRunner::new(&[]));
        let executor = PlanExecutor::new(runner.clone());

        let result = executor.run(&plan, Workspace::new()).await;
        assert!(matches!(
            result,
            Err(PlanValidationError::UnknownDependency { .. })
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_seed_workspace_is_visible_and_preserved() {
        let plan = TaskPlan::new().with_section("s", vec![Task::new("t1", "a", "m", "o1")]);
        let mut seed = Workspace::new();
        seed.insert("given_equation".to_string(), json!("2x + 3 = 7"));

        let runner = Arc::new(ScriptedRunner::new(&[]));
        let executor = PlanExecutor::new(runner);

        let output = executor.run(&plan, seed).await.unwrap();
        assert_eq!(output.workspace.get("given_equation"), Some(&json!("2x + 3 = 7")));
        assert!(output.workspace.contains_key("o1"));
    }

    #[tokio::test]
    async fn test_final_result_defaults_to_last_output() {
        let plan = TaskPlan::new().with_section(
            "s",
            vec![
                Task::new("t1", "a", "m", "o1"),
                Task::new("t2", "b", "m", "o2").with_dependency("t1"),
            ],
        );
        let runner = Arc::new(ScriptedRunner::new(&[]));
        let executor = PlanExecutor::new(runner);

        let output = executor.run(&plan, Workspace::new()).await.unwrap();
        assert_eq!(output.final_result, Some(json!("result of t2")));
    }
}
