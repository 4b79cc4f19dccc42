//! In-memory preview cache.
//!
//! Entries live as long as the owning coalescer and are never invalidated.
//! Work results that embed a primary edition also populate that edition's
//! entry, so edition requests can be answered from a work lookup.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::entity::Entity;
use crate::key::Domain;

/// Key → entity map shared by all flushes of one coalescer
#[derive(Debug, Default)]
pub struct PreviewCache {
    entries: RwLock<HashMap<String, Entity>>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached entity
    pub fn get(&self, key: &str) -> Option<Entity> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Store an entity under its canonical key. Entities without a key are
    /// dropped. Returns whether the entity was stored.
    pub fn insert(&self, entity: Entity) -> bool {
        let Some(key) = entity.key().map(str::to_string) else {
            tracing::debug!("Dropping lookup result without a key");
            return false;
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entity);
        true
    }

    /// Merge the results of one domain lookup.
    ///
    /// Returns the number of entries written, synthesized editions included.
    pub fn merge(&self, domain: Domain, entities: Vec<Entity>) -> usize {
        let mut written = 0;
        for entity in entities {
            let edition = match domain {
                Domain::Work => entity.primary_edition(),
                _ => None,
            };
            if self.insert(entity) {
                written += 1;
            }
            if let Some(edition) = edition {
                if self.insert(edition) {
                    written += 1;
                }
            }
        }
        written
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
