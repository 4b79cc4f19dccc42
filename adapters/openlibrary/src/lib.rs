//! Open Library search API lookup for thingpreview.
//!
//! Each batched lookup becomes a single search request whose query ORs the
//! requested keys together:
//!
//! | Domain  | Endpoint               | Query                               |
//! |---------|------------------------|-------------------------------------|
//! | Work    | `/search.json`         | `key:("/works/OL1W" OR …)`          |
//! | Edition | `/search.json`         | `edition_key:(OL2M OR …)`           |
//! | Author  | `/search/authors.json` | `key:(OL3A OR …)`                   |
//!
//! Edition searches return the works containing the editions; each matched
//! edition is projected out of its work's `editions.docs`, inheriting the
//! work's author names and edition count.
//! Several requested editions of one work are all projected, as long as the
//! response embeds each of them. An edition the backend leaves out of
//! `editions.docs` is not returned and resolves to `None`.
//!
//! Reference: https://openlibrary.org/dev/docs/api/search

mod config;

pub use config::OpenLibraryConfig;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thingpreview_core::{Domain, Entity, LookupError, ThingKey, ThingLookup};
use tracing::{debug, info, instrument};

/// Fields requested for work and edition searches
pub const WORK_FIELDS: &str = "key,title,subtitle,author_name,author_key,cover_i,cover_edition_key,\
edition_count,first_publish_year,editions,editions.key,editions.title,editions.subtitle,editions.cover_i";

/// Fields requested for author searches
pub const AUTHOR_FIELDS: &str = "key,name,birth_date,death_date,top_work,work_count";

/// Body of a search response
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default, rename = "numFound")]
    pub num_found: u64,
    #[serde(default)]
    pub docs: Vec<Value>,
}

/// [`ThingLookup`] backed by the Open Library search API
#[derive(Clone)]
pub struct OpenLibraryLookup {
    client: Client,
    base_url: String,
}

impl OpenLibraryLookup {
    /// Create a lookup client from configuration
    pub fn new(config: &OpenLibraryConfig) -> Result<Self, LookupError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!(url = %base_url, "Creating Open Library lookup");

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| LookupError::transport(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL for a domain's search
    pub fn endpoint(&self, domain: Domain) -> String {
        let path = match domain {
            Domain::Work | Domain::Edition => "/search.json",
            Domain::Author => "/search/authors.json",
        };
        format!("{}{}", self.base_url, path)
    }
}

/// Query parameters for one batched search
pub fn search_params(domain: Domain, keys: &[ThingKey]) -> Vec<(&'static str, String)> {
    let (field, terms, fields): (&str, Vec<String>, &str) = match domain {
        Domain::Work => (
            "key",
            keys.iter().map(|k| format!("\"{}\"", k.as_str())).collect(),
            WORK_FIELDS,
        ),
        Domain::Edition => (
            "edition_key",
            keys.iter().map(|k| k.id().to_string()).collect(),
            WORK_FIELDS,
        ),
        Domain::Author => (
            "key",
            keys.iter().map(|k| k.id().to_string()).collect(),
            AUTHOR_FIELDS,
        ),
    };

    vec![
        ("q", format!("{}:({})", field, terms.join(" OR "))),
        ("fields", fields.to_string()),
        ("limit", keys.len().to_string()),
    ]
}

/// Turn search documents into entities keyed by their canonical keys
pub fn project(domain: Domain, docs: Vec<Value>, keys: &[ThingKey]) -> Vec<Entity> {
    let entities = docs.into_iter().filter_map(Entity::from_value);

    match domain {
        Domain::Work => entities.collect(),
        Domain::Edition => entities
            .flat_map(|work| editions_of(&work))
            .filter(|edition| {
                edition
                    .key()
                    .is_some_and(|k| keys.iter().any(|wanted| wanted.as_str() == k))
            })
            .collect(),
        Domain::Author => entities
            .map(|mut author| {
                let bare = author.key().filter(|k| !k.starts_with('/')).map(str::to_string);
                if let Some(id) = bare {
                    author.insert("key", ThingKey::from_id(Domain::Author, &id).to_string());
                }
                author
            })
            .collect(),
    }
}

/// Every edition embedded in a work, with the work's fields inherited
fn editions_of(work: &Entity) -> Vec<Entity> {
    let docs = work
        .get("editions")
        .and_then(|e| e.get("docs"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    docs.into_iter()
        .filter_map(|doc| {
            let mut single = work.clone();
            single.insert("editions", serde_json::json!({ "docs": [doc] }));
            single.primary_edition()
        })
        .collect()
}

#[async_trait]
impl ThingLookup for OpenLibraryLookup {
    #[instrument(skip(self, keys), fields(keys = keys.len()))]
    async fn lookup(&self, domain: Domain, keys: &[ThingKey]) -> Result<Vec<Entity>, LookupError> {
        let url = self.endpoint(domain);
        let params = search_params(domain, keys);
        debug!(url = %url, query = %params[0].1, "Sending search request");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| LookupError::transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::status(status, body));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| LookupError::decode(domain, e.to_string()))?;

        debug!(num_found = body.num_found, docs = body.docs.len(), "Search complete");
        Ok(project(domain, body.docs, keys))
    }
}
