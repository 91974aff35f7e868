use crate::CoreError;
use serde::{Deserialize, Serialize};

/// Value object: Workflow ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

/// Value object: Step ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

/// Priority class of a workflow definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PriorityClass {
    /// Routine periodic analysis
    #[default]
    Routine,

    /// Elevated priority work
    Elevated,

    /// Critical work submitted on demand
    Critical,
}

/// Represents a step in a workflow, bound to a capability + action pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// ID of the step, unique within a definition
    pub id: String,

    /// Name of the service capability offering the action
    pub capability: String,

    /// Name of the action to invoke on the capability
    pub action: String,

    /// Steps whose results must be recorded before this step runs
    pub depends_on: Vec<String>,
}

/// Represents a validated workflow definition
///
/// Definitions are immutable after registration; the executor iterates
/// steps in declaration order, which validation guarantees is a valid
/// topological order of the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// ID of the workflow
    pub id: WorkflowId,

    /// Human-readable name of the workflow
    pub name: String,

    /// Description of the workflow
    pub description: Option<String>,

    /// Priority class applied to requests without one of their own
    pub priority_class: PriorityClass,

    /// The steps in this workflow
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    /// Validate the workflow definition
    ///
    /// Fails fast at registration time: empty definitions, duplicate
    /// step ids, dangling dependency references, dependency cycles, and
    /// forward references are all configuration errors here, never
    /// run-time surprises.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.steps.is_empty() {
            return Err(CoreError::ValidationError(
                "Workflow must have at least one step".to_string(),
            ));
        }

        // Check for ID uniqueness
        let mut step_ids = std::collections::HashSet::new();
        for step in &self.steps {
            if !step_ids.insert(step.id.as_str()) {
                return Err(CoreError::ValidationError(format!(
                    "Duplicate step ID: {}",
                    step.id
                )));
            }
        }

        // Check for valid depends_on references
        for step in &self.steps {
            for dep in &step.depends_on {
                if !step_ids.contains(dep.as_str()) {
                    return Err(CoreError::ValidationError(format!(
                        "Step {} references non-existent dependency: {}",
                        step.id, dep
                    )));
                }
            }
        }

        // Check for cycles in dependencies
        self.check_for_cycles()?;

        // Declaration order must already respect the dependency graph:
        // the executor records a step's result only after every
        // dependency has one, iterating in declaration order.
        let mut declared = std::collections::HashSet::new();
        for step in &self.steps {
            for dep in &step.depends_on {
                if !declared.contains(dep.as_str()) {
                    return Err(CoreError::ValidationError(format!(
                        "Step {} depends on {} which is declared later",
                        step.id, dep
                    )));
                }
            }
            declared.insert(step.id.as_str());
        }

        Ok(())
    }

    /// Check for cycles in the step dependencies
    fn check_for_cycles(&self) -> Result<(), CoreError> {
        let mut visited = std::collections::HashSet::new();
        let mut rec_stack = std::collections::HashSet::new();

        let mut dep_map = std::collections::HashMap::new();
        for step in &self.steps {
            dep_map.insert(step.id.as_str(), &step.depends_on);
        }

        // DFS for cycle detection
        for step in &self.steps {
            if self.is_cyclic(step.id.as_str(), &dep_map, &mut visited, &mut rec_stack) {
                return Err(CoreError::ValidationError(format!(
                    "Cycle detected in step dependencies involving step: {}",
                    step.id
                )));
            }
        }

        Ok(())
    }

    /// Check if the dependency graph has a cycle
    fn is_cyclic<'a>(
        &self,
        step_id: &'a str,
        dep_map: &std::collections::HashMap<&'a str, &'a Vec<String>>,
        visited: &mut std::collections::HashSet<&'a str>,
        rec_stack: &mut std::collections::HashSet<&'a str>,
    ) -> bool {
        if !visited.contains(step_id) {
            visited.insert(step_id);
            rec_stack.insert(step_id);

            if let Some(deps) = dep_map.get(step_id) {
                for dep in *deps {
                    let dep_str = dep.as_str();
                    if (!visited.contains(dep_str)
                        && self.is_cyclic(dep_str, dep_map, visited, rec_stack))
                        || rec_stack.contains(dep_str)
                    {
                        return true;
                    }
                }
            }
        }

        rec_stack.remove(step_id);
        false
    }
}
