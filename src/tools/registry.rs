//! Name-keyed tool definition map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use crate::types::ToolName;

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: &Value) -> Result<Value, String>;
    /// Returns true iff `args` conforms to this tool's argument schema.
    fn validate_args(&self, args: &Value) -> bool;
}

pub struct ToolDefinition {
    pub name: ToolName,
    pub description: String,
    pub executor: Arc<dyn ToolExecutor>,
}

/// Read-mostly after warm-up: `register` is the only mutator and it
/// rejects duplicates, so the tool set is effectively fixed once the
/// engine starts serving requests.
pub struct ToolRegistry {
    definitions: parking_lot::RwLock<HashMap<ToolName, ToolDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            definitions: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, definition: ToolDefinition) -> Result<(), ToolError> {
        let mut definitions = self.definitions.write();
        if definitions.contains_key(&definition.name) {
            return Err(ToolError::InvalidArguments(format!(
                "tool {} already registered",
                definition.name
            )));
        }
        definitions.insert(definition.name, definition);
        Ok(())
    }

    pub fn validate(&self, name: ToolName, args: &Value) -> bool {
        self.definitions
            .read()
            .get(&name)
            .map(|def| def.executor.validate_args(args))
            .unwrap_or(false)
    }

    pub fn get(&self, name: ToolName) -> Option<Arc<dyn ToolExecutor>> {
        self.definitions.read().get(&name).map(|def| def.executor.clone())
    }

    pub fn list(&self) -> Vec<ToolName> {
        self.definitions.read().keys().copied().collect()
    }

    pub fn unregister(&self, name: ToolName) -> bool {
        self.definitions.write().remove(&name).is_some()
    }

    pub fn clear(&self) {
        self.definitions.write().clear();
    }

    pub fn count(&self) -> usize {
        self.definitions.read().len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mocks::EchoExecutor;

    fn definition(name: ToolName) -> ToolDefinition {
        ToolDefinition {
            name,
            description: "test tool".to_string(),
            executor: Arc::new(EchoExecutor),
        }
    }

    #[test]
    fn register_then_get_round_trips() {
        let registry = ToolRegistry::new();
        registry.register(definition(ToolName::GoogleSearch)).unwrap();
        assert!(registry.get(ToolName::GoogleSearch).is_some());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let registry = ToolRegistry::new();
        registry.register(definition(ToolName::GoogleSearch)).unwrap();
        assert!(registry.register(definition(ToolName::GoogleSearch)).is_err());
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = ToolRegistry::new();
        registry.register(definition(ToolName::GoogleSearch)).unwrap();
        assert!(registry.unregister(ToolName::GoogleSearch));
        assert!(registry.get(ToolName::GoogleSearch).is_none());
    }
}
