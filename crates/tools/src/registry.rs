//! Name-indexed tool collection, populated at startup and read-only in
//! steady state.

use std::collections::HashMap;
use std::sync::Arc;

use gc_domain::chat::ToolSpec;

use crate::tool::Tool;

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_owned(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names, sorted for stable prompt rendering.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Projection to the LLM tool-descriptor shape.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|t| ToolSpec {
                name: t.name().to_owned(),
                description: t.description().to_owned(),
                parameters: t.parameters(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct NullTool(&'static str);

    #[async_trait]
    impl Tool for NullTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "does nothing"
        }
        fn parameters(&self) -> Value {
            json!({ "type": "object", "properties": {} })
        }
        async fn execute(&self, _args: Value) -> gc_domain::Result<String> {
            Ok("ok".into())
        }
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NullTool("zeta")));
        registry.register(Arc::new(NullTool("alpha")));
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn get_unknown_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get("ghost").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn specs_project_all_fields() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NullTool("a")));

        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "a");
        assert_eq!(specs[0].description, "does nothing");
        assert_eq!(specs[0].parameters["type"], json!("object"));
    }
}
