use crate::{CapabilityAction, CoreError};
use dashmap::DashMap;
use std::sync::Arc;

/// Registry mapping `(capability, action)` pairs to their handlers
///
/// Handlers are registered once at startup and resolved when workflow
/// definitions are validated, so a broken reference surfaces at
/// registration time rather than during a run.
pub struct CapabilityRegistry {
    actions: DashMap<(String, String), Arc<dyn CapabilityAction>>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
        }
    }

    /// Register a handler for a capability action, replacing any
    /// previous handler for the same pair
    pub fn register(
        &self,
        capability: impl Into<String>,
        action: impl Into<String>,
        handler: Arc<dyn CapabilityAction>,
    ) {
        let capability = capability.into();
        let action = action.into();
        tracing::debug!(
            capability = %capability,
            action = %action,
            "Registering capability action"
        );
        self.actions.insert((capability, action), handler);
    }

    /// Remove a handler; returns whether one was registered
    pub fn deregister(&self, capability: &str, action: &str) -> bool {
        self.actions
            .remove(&(capability.to_string(), action.to_string()))
            .is_some()
    }

    /// Resolve a handler for the given pair
    pub fn resolve(
        &self,
        capability: &str,
        action: &str,
    ) -> Result<Arc<dyn CapabilityAction>, CoreError> {
        self.actions
            .get(&(capability.to_string(), action.to_string()))
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                CoreError::CapabilityNotFound(format!("{}.{}", capability, action))
            })
    }

    /// Whether a handler is registered for the given pair
    pub fn contains(&self, capability: &str, action: &str) -> bool {
        self.actions
            .contains_key(&(capability.to_string(), action.to_string()))
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
