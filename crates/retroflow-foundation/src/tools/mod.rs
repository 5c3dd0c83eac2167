//! In-memory tool registry
//!
//! [`SimpleToolRegistry`] is the concrete implementation of the kernel
//! [`ToolRegistry`] trait: a name-keyed map with idempotent upsert semantics.
//! Builtin ready-made tools live in [`builtin`].

pub mod builtin;

use async_trait::async_trait;
use retroflow_kernel::error::EngineResult;
use retroflow_kernel::tool::{Tool, ToolDescriptor, ToolRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Name-keyed in-memory tool registry.
///
/// Registering a tool under an existing name replaces the previous entry;
/// removing an absent name is a no-op. Listing order is unspecified.
pub struct SimpleToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl SimpleToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry pre-populated with the given tools.
    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> EngineResult<Self> {
        let mut registry = Self::new();
        registry.register_all(tools)?;
        Ok(registry)
    }
}

impl Default for SimpleToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRegistry for SimpleToolRegistry {
    fn register(&mut self, tool: Arc<dyn Tool>) -> EngineResult<()> {
        self.tools.insert(tool.name().to_string(), tool);
        Ok(())
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    fn unregister(&mut self, name: &str) -> EngineResult<bool> {
        Ok(self.tools.remove(name).is_some())
    }

    fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|t| ToolDescriptor::from_tool(t.as_ref()))
            .collect()
    }

    fn list_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    fn count(&self) -> usize {
        self.tools.len()
    }
}
