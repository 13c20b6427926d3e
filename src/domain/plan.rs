//! Task-plan model
//!
//! The dependency graph of atomic tasks produced by the Planning phase and
//! consumed by the execution driver. A plan is validated as a whole before
//! any task executes; a failing plan is rejected outright.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a plan was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanValidationError {
    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("duplicate output id: {0}")]
    DuplicateOutputId(String),
}

/// An atomic unit of work inside a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, pipeline-wide
    pub id: String,

    /// What the task computes
    pub description: String,

    /// Method hint for tool selection
    pub method: String,

    /// Method parameters
    #[serde(default)]
    pub params: BTreeMap<String, Value>,

    /// Ids of tasks that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Workspace key this task writes; unique pipeline-wide
    pub output_id: String,
}

impl Task {
    /// Create a task with no parameters or dependencies
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        method: impl Into<String>,
        output_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            method: method.into(),
            params: BTreeMap::new(),
            dependencies: Vec::new(),
            output_id: output_id.into(),
        }
    }

    /// Builder: add a method parameter
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Builder: add a dependency on another task
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }
}

/// A named, ordered group of tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSection {
    pub name: String,
    pub tasks: Vec<Task>,
}

/// The full task plan: named sections plus an optional final-output reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskPlan {
    pub sections: Vec<PlanSection>,

    /// Workspace key holding the final deliverable; defaults to the last
    /// completed task's output when unset
    #[serde(default)]
    pub final_output_id: Option<String>,
}

impl TaskPlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a section
    pub fn with_section(mut self, name: impl Into<String>, tasks: Vec<Task>) -> Self {
        self.sections.push(PlanSection {
            name: name.into(),
            tasks,
        });
        self
    }

    /// Builder: set the final-output workspace key
    pub fn with_final_output(mut self, output_id: impl Into<String>) -> Self {
        self.final_output_id = Some(output_id.into());
        self
    }

    /// Iterate all tasks in section order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.sections.iter().flat_map(|s| s.tasks.iter())
    }

    /// Total task count across sections
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.tasks.len()).sum()
    }

    /// Check if the plan has no tasks
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate the plan as a whole
    ///
    /// Checks, in order: duplicate task ids, dangling dependency ids,
    /// dependency cycles, duplicate output ids. The first violation is
    /// returned and the plan is rejected without executing anything.
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        let mut ids = HashSet::new();
        for task in self.tasks() {
            if !ids.insert(task.id.as_str()) {
                return Err(PlanValidationError::DuplicateTaskId(task.id.clone()));
            }
        }

        for task in self.tasks() {
            for dep in &task.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(PlanValidationError::UnknownDependency {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        self.check_acyclic()?;

        let mut outputs = HashSet::new();
        for task in self.tasks() {
            if !outputs.insert(task.output_id.as_str()) {
                return Err(PlanValidationError::DuplicateOutputId(task.output_id.clone()));
            }
        }

        Ok(())
    }

    /// Detect dependency cycles via DFS, reporting the offending path
    fn check_acyclic(&self) -> Result<(), PlanValidationError> {
        let graph: HashMap<&str, &Task> = self.tasks().map(|t| (t.id.as_str(), t)).collect();

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut cycle_path = Vec::new();

        for id in graph.keys() {
            if !visited.contains(id)
                && has_cycle_dfs(id, &graph, &mut visited, &mut rec_stack, &mut cycle_path)
            {
                return Err(PlanValidationError::Cycle(cycle_path));
            }
        }

        Ok(())
    }

    /// Tasks in dependency order (dependencies before dependents)
    ///
    /// Validates the plan first; an invalid plan yields its validation error.
    pub fn topological_order(&self) -> Result<Vec<&Task>, PlanValidationError> {
        self.validate()?;

        let tasks: Vec<&Task> = self.tasks().collect();
        let index_map: HashMap<&str, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();

        let mut visited = HashSet::new();
        let mut order = Vec::new();

        for idx in 0..tasks.len() {
            topo_dfs(idx, &tasks, &index_map, &mut visited, &mut order);
        }

        Ok(order.into_iter().map(|i| tasks[i]).collect())
    }
}

/// DFS helper for cycle detection
fn has_cycle_dfs<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a Task>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    cycle_path: &mut Vec<String>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    cycle_path.push(node.to_string());

    if let Some(task) = graph.get(node) {
        for dep in &task.dependencies {
            if !visited.contains(dep.as_str()) {
                if graph.contains_key(dep.as_str())
                    && has_cycle_dfs(dep.as_str(), graph, visited, rec_stack, cycle_path)
                {
                    return true;
                }
            } else if rec_stack.contains(dep.as_str()) {
                cycle_path.push(dep.clone());
                return true;
            }
        }
    }

    rec_stack.remove(node);
    cycle_path.pop();
    false
}

/// DFS helper for topological sort (returns indices, dependencies first)
fn topo_dfs(
    idx: usize,
    tasks: &[&Task],
    index_map: &HashMap<&str, usize>,
    visited: &mut HashSet<usize>,
    order: &mut Vec<usize>,
) {
    if visited.contains(&idx) {
        return;
    }
    visited.insert(idx);

    for dep in &tasks[idx].dependencies {
        if let Some(&dep_idx) = index_map.get(dep.as_str()) {
            topo_dfs(dep_idx, tasks, index_map, visited, order);
        }
    }
    order.push(idx);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_plan() -> TaskPlan {
        TaskPlan::new().with_section(
            "solve",
            vec![
                Task::new("t1", "isolate x", "rearrange", "eq_isolated"),
                Task::new("t2", "solve for x", "solve", "x_value").with_dependency("t1"),
                Task::new("t3", "check solution", "substitute", "checked").with_dependency("t2"),
            ],
        )
    }

    #[test]
    fn test_valid_plan_passes() {
        assert!(linear_plan().validate().is_ok());
    }

    #[test]
    fn test_duplicate_task_id_rejected() {
        let plan = TaskPlan::new().with_section(
            "s",
            vec![
                Task::new("t1", "a", "m", "o1"),
                Task::new("t1", "b", "m", "o2"),
            ],
        );
        assert_eq!(
            plan.validate(),
            Err(PlanValidationError::DuplicateTaskId("t1".to_string()))
        );
    }

    #[test]
    fn test_dangling_dependency_rejected() {
        let plan = TaskPlan::new().with_section(
            "s",
            vec![Task::new("t1", "a", "m", "o1").with_dependency("missing")],
        );
        assert_eq!(
            plan.validate(),
            Err(PlanValidationError::UnknownDependency {
                task: "t1".to_string(),
                dependency: "missing".to_string(),
            })
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let plan = TaskPlan::new().with_section(
            "s",
            vec![
                Task::new("t1", "a", "m", "o1").with_dependency("t3"),
                Task::new("t2", "b", "m", "o2").with_dependency("t1"),
                Task::new("t3", "c", "m", "o3").with_dependency("t2"),
            ],
        );
        assert!(matches!(
            plan.validate(),
            Err(PlanValidationError::Cycle(_))
        ));
    }

    #[test]
    fn test_self_cycle_rejected() {
        let plan = TaskPlan::new().with_section(
            "s",
            vec![Task::new("t1", "a", "m", "o1").with_dependency("t1")],
        );
        assert!(matches!(
            plan.validate(),
            Err(PlanValidationError::Cycle(_))
        ));
    }

    #[test]
    fn test_duplicate_output_id_rejected() {
        let plan = TaskPlan::new().with_section(
            "s",
            vec![
                Task::new("t1", "a", "m", "shared"),
                Task::new("t2", "b", "m", "shared"),
            ],
        );
        assert_eq!(
            plan.validate(),
            Err(PlanValidationError::DuplicateOutputId("shared".to_string()))
        );
    }

    #[test]
    fn test_check_order_duplicate_id_before_cycle() {
        // A plan with both a duplicate id and a cycle reports the duplicate first
        let plan = TaskPlan::new().with_section(
            "s",
            vec![
                Task::new("t1", "a", "m", "o1").with_dependency("t1"),
                Task::new("t1", "b", "m", "o2"),
            ],
        );
        assert_eq!(
            plan.validate(),
            Err(PlanValidationError::DuplicateTaskId("t1".to_string()))
        );
    }

    #[test]
    fn test_topological_order_linear() {
        let plan = linear_plan();
        let order = plan.topological_order().unwrap();
        let ids: Vec<&str> = order.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_topological_order_diamond() {
        let plan = TaskPlan::new().with_section(
            "s",
            vec![
                Task::new("a", "root", "m", "oa"),
                Task::new("b", "left", "m", "ob").with_dependency("a"),
                Task::new("c", "right", "m", "oc").with_dependency("a"),
                Task::new("d", "join", "m", "od")
                    .with_dependency("b")
                    .with_dependency("c"),
            ],
        );
        let order = plan.topological_order().unwrap();
        let pos = |id: &str| order.iter().position(|t| t.id == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn test_tasks_span_sections() {
        let plan = TaskPlan::new()
            .with_section("setup", vec![Task::new("t1", "a", "m", "o1")])
            .with_section("solve", vec![
                Task::new("t2", "b", "m", "o2").with_dependency("t1"),
            ]);
        assert_eq!(plan.len(), 2);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_plan_serde() {
        let plan = linear_plan().with_final_output("checked");
        let json = serde_json::to_string(&plan).unwrap();
        let parsed: TaskPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(plan, parsed);
    }
}
