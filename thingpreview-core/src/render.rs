//! Named render functions for placeholders.
//!
//! Placeholders name the function that turns a preview into markup. The host
//! registers those functions by value in a [`RenderRegistry`]; nothing is
//! looked up in a global namespace.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;

/// Turns a resolved preview (or `None`) into markup
pub type RenderFn = Arc<dyn Fn(Option<&Entity>) -> String + Send + Sync>;

/// Markup produced for one placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPreview {
    /// Position of the placeholder in discovery order
    pub index: usize,
    /// Key the placeholder asked for
    pub key: String,
    /// Output of the placeholder's render function
    pub markup: String,
}

/// Render functions by name
#[derive(Clone, Default)]
pub struct RenderRegistry {
    renderers: HashMap<String, RenderFn>,
}

impl RenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a render function
    pub fn register<F>(&mut self, name: impl Into<String>, render: F) -> &mut Self
    where
        F: Fn(Option<&Entity>) -> String + Send + Sync + 'static,
    {
        self.renderers.insert(name.into(), Arc::new(render));
        self
    }

    pub fn get(&self, name: &str) -> Option<RenderFn> {
        self.renderers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.renderers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl fmt::Debug for RenderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.renderers.keys().collect();
        names.sort();
        f.debug_struct("RenderRegistry").field("renderers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_render() {
        let mut registry = RenderRegistry::new();
        registry
            .register("title", |e: Option<&Entity>| {
                e.and_then(Entity::title).unwrap_or("?").to_string()
            })
            .register("empty", |_: Option<&Entity>| String::new());

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("title"));

        let entity = Entity::from_value(json!({"key": "/works/OL1W", "title": "Emma"})).unwrap();
        let render = registry.get("title").unwrap();
        assert_eq!(render(Some(&entity)), "Emma");
        assert_eq!(render(None), "?");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_debug_lists_names() {
        let mut registry = RenderRegistry::new();
        registry.register("b", |_: Option<&Entity>| String::new());
        registry.register("a", |_: Option<&Entity>| String::new());
        assert_eq!(format!("{:?}", registry), r#"RenderRegistry { renderers: ["a", "b"] }"#);
    }
}
