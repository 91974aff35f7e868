use crate::application::capability_registry::CapabilityRegistry;
use crate::domain::workflow::{WorkflowDefinition, WorkflowId};
use crate::CoreError;
use dashmap::DashMap;
use std::sync::Arc;

/// Immutable catalog of validated workflow definitions
///
/// Registration is the only write path and it fails fast: a definition
/// that does not validate, or that references an unregistered
/// capability action, never enters the catalog.
pub struct WorkflowDefinitionStore {
    definitions: DashMap<String, Arc<WorkflowDefinition>>,
}

impl WorkflowDefinitionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            definitions: DashMap::new(),
        }
    }

    /// Validate and register a definition
    pub fn register(
        &self,
        definition: WorkflowDefinition,
        registry: &CapabilityRegistry,
    ) -> Result<(), CoreError> {
        definition.validate()?;

        for step in &definition.steps {
            if !registry.contains(&step.capability, &step.action) {
                return Err(CoreError::ConfigurationError(format!(
                    "Step {} of workflow {} references unregistered capability {}.{}",
                    step.id, definition.id.0, step.capability, step.action
                )));
            }
        }

        if self.definitions.contains_key(&definition.id.0) {
            return Err(CoreError::ValidationError(format!(
                "Workflow already registered: {}",
                definition.id.0
            )));
        }

        tracing::info!(
            workflow_id = %definition.id.0,
            steps = definition.steps.len(),
            "Workflow registered"
        );
        self.definitions
            .insert(definition.id.0.clone(), Arc::new(definition));
        Ok(())
    }

    /// Look up a definition by id
    pub fn get(&self, id: &WorkflowId) -> Option<Arc<WorkflowDefinition>> {
        self.definitions.get(&id.0).map(|entry| entry.clone())
    }

    /// Whether a definition is registered
    pub fn contains(&self, id: &WorkflowId) -> bool {
        self.definitions.contains_key(&id.0)
    }

    /// List registered workflow ids
    pub fn list(&self) -> Vec<WorkflowId> {
        self.definitions
            .iter()
            .map(|entry| entry.value().id.clone())
            .collect()
    }
}

impl Default for WorkflowDefinitionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{PriorityClass, StepDefinition};
    use crate::{ActionContext, ActionOutput, CapabilityAction, DataPacket};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct NoopAction;

    #[async_trait]
    impl CapabilityAction for NoopAction {
        async fn execute(&self, _context: ActionContext) -> Result<ActionOutput, CoreError> {
            Ok(ActionOutput::new(DataPacket::null()))
        }
    }

    fn definition(id: &str) -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId(id.to_string()),
            name: "Test".to_string(),
            description: None,
            priority_class: PriorityClass::Routine,
            steps: vec![StepDefinition {
                id: "scan".to_string(),
                capability: "environment".to_string(),
                action: "scan".to_string(),
                depends_on: vec![],
            }],
        }
    }

    fn registry_with_scan() -> CapabilityRegistry {
        let registry = CapabilityRegistry::new();
        registry.register("environment", "scan", std::sync::Arc::new(NoopAction));
        registry
    }

    #[test]
    fn test_register_and_get() {
        let store = WorkflowDefinitionStore::new();
        let registry = registry_with_scan();

        store.register(definition("daily"), &registry).unwrap();

        assert!(store.contains(&WorkflowId("daily".to_string())));
        let fetched = store.get(&WorkflowId("daily".to_string())).unwrap();
        assert_eq!(fetched.steps.len(), 1);
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_register_rejects_unregistered_capability() {
        let store = WorkflowDefinitionStore::new();
        let registry = CapabilityRegistry::new();

        let result = store.register(definition("daily"), &registry);
        match result {
            Err(CoreError::ConfigurationError(msg)) => {
                assert!(msg.contains("unregistered capability"));
                assert!(msg.contains("environment.scan"));
            }
            other => panic!("Expected ConfigurationError, got {:?}", other),
        }
        assert!(!store.contains(&WorkflowId("daily".to_string())));
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        let store = WorkflowDefinitionStore::new();
        let registry = registry_with_scan();

        store.register(definition("daily"), &registry).unwrap();
        let result = store.register(definition("daily"), &registry);

        match result {
            Err(CoreError::ValidationError(msg)) => {
                assert!(msg.contains("already registered"));
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_register_rejects_invalid_definition() {
        let store = WorkflowDefinitionStore::new();
        let registry = registry_with_scan();

        let mut invalid = definition("daily");
        invalid.steps[0].depends_on = vec!["scan".to_string()]; // self-cycle

        assert!(store.register(invalid, &registry).is_err());
    }
}
