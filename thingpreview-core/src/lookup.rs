//! The batched lookup capability the coalescer consumes.

use async_trait::async_trait;

use crate::entity::Entity;
use crate::error::LookupError;
use crate::key::{Domain, ThingKey};

/// Fetch preview entities for many keys of one domain in a single call.
///
/// Implementations receive a non-empty slice of distinct keys, all belonging
/// to `domain`. Returning fewer entities than keys is not an error; keys
/// missing from the result resolve to `None` for their callers. Returned
/// entities are cached under their own `key` field, so implementations must
/// return canonical (prefixed) keys.
#[async_trait]
pub trait ThingLookup: Send + Sync {
    async fn lookup(&self, domain: Domain, keys: &[ThingKey]) -> Result<Vec<Entity>, LookupError>;
}
