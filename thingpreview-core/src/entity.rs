//! Opaque preview records returned by lookups.
//!
//! An [`Entity`] is a JSON object as produced by the search backend. The
//! coalescer only reads a handful of fields from it; everything else is
//! passed through untouched to render callbacks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A work, edition or author projection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    /// Wrap a JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Convert an arbitrary JSON value, returning `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Canonical key (`key` field), e.g. `/works/OL1W`
    pub fn key(&self) -> Option<&str> {
        self.str_field("key")
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.str_field("subtitle")
    }

    /// Title joined with the subtitle, if any
    pub fn full_title(&self) -> Option<String> {
        if let Some(full) = self.str_field("full_title") {
            return Some(full.to_string());
        }
        let title = self.title()?;
        Some(match self.subtitle() {
            Some(sub) if !sub.is_empty() => format!("{}: {}", title, sub),
            _ => title.to_string(),
        })
    }

    pub fn author_names(&self) -> Vec<&str> {
        self.0
            .get("author_name")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn edition_count(&self) -> Option<u64> {
        self.0.get("edition_count").and_then(Value::as_u64)
    }

    /// Raw field access
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// First edition embedded in a work result (`editions.docs[0]`)
    pub fn embedded_edition(&self) -> Option<Entity> {
        self.0
            .get("editions")
            .and_then(|e| e.get("docs"))
            .and_then(Value::as_array)
            .and_then(|docs| docs.first())
            .cloned()
            .and_then(Entity::from_value)
    }

    /// Synthesize the preview record of this work's primary edition.
    ///
    /// The edition inherits the work's author names and edition count and
    /// carries its own `full_title`. Returns `None` when the work has no
    /// embedded edition or the edition has no key.
    pub fn primary_edition(&self) -> Option<Entity> {
        let mut edition = self.embedded_edition()?;
        edition.key()?;

        if let Some(full) = edition.full_title() {
            edition.insert("full_title", full);
        }
        if let Some(authors) = self.0.get("author_name") {
            edition.insert("author_name", authors.clone());
        }
        if let Some(count) = self.0.get("edition_count") {
            edition.insert("edition_count", count.clone());
        }
        Some(edition)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn work() -> Entity {
        Entity::from_value(json!({
            "key": "/works/OL1W",
            "title": "The Hobbit",
            "author_name": ["J.R.R. Tolkien"],
            "edition_count": 120,
            "editions": {
                "numFound": 1,
                "docs": [{
                    "key": "/books/OL2M",
                    "title": "The Hobbit",
                    "subtitle": "or There and Back Again"
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let work = work();
        assert_eq!(work.key(), Some("/works/OL1W"));
        assert_eq!(work.title(), Some("The Hobbit"));
        assert_eq!(work.full_title().as_deref(), Some("The Hobbit"));
        assert_eq!(work.author_names(), vec!["J.R.R. Tolkien"]);
        assert_eq!(work.edition_count(), Some(120));
    }

    #[test]
    fn test_primary_edition_inherits_work_fields() {
        let edition = work().primary_edition().unwrap();
        assert_eq!(edition.key(), Some("/books/OL2M"));
        assert_eq!(
            edition.full_title().as_deref(),
            Some("The Hobbit: or There and Back Again")
        );
        assert_eq!(edition.author_names(), vec!["J.R.R. Tolkien"]);
        assert_eq!(edition.edition_count(), Some(120));
    }

    #[test]
    fn test_primary_edition_missing() {
        let bare = Entity::from_value(json!({"key": "/works/OL9W", "title": "x"})).unwrap();
        assert!(bare.primary_edition().is_none());

        let keyless = Entity::from_value(json!({
            "key": "/works/OL9W",
            "editions": {"docs": [{"title": "no key"}]}
        }))
        .unwrap();
        assert!(keyless.primary_edition().is_none());
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Entity::from_value(json!([1, 2])).is_none());
        assert!(Entity::from_value(json!("text")).is_none());
    }
}
