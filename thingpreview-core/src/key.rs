//! Domain-prefixed keys for works, editions and authors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity category a key belongs to, derived from its path prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// `/works/OL…W`
    Work,
    /// `/books/OL…M`
    Edition,
    /// `/authors/OL…A`
    Author,
}

impl Domain {
    /// All domains, in the order lookups are issued
    pub const ALL: [Domain; 3] = [Domain::Work, Domain::Edition, Domain::Author];

    /// Path prefix that identifies keys of this domain
    pub fn prefix(self) -> &'static str {
        match self {
            Domain::Work => "/works/",
            Domain::Edition => "/books/",
            Domain::Author => "/authors/",
        }
    }

    /// Classify a raw key by its prefix
    ///
    /// Returns `None` for keys outside the three supported domains, and for
    /// keys that consist of the prefix alone.
    pub fn of(key: &str) -> Option<Domain> {
        Self::ALL
            .into_iter()
            .find(|d| key.len() > d.prefix().len() && key.starts_with(d.prefix()))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Work => "work",
            Domain::Edition => "edition",
            Domain::Author => "author",
        };
        f.write_str(name)
    }
}

/// A key known to belong to one of the supported domains
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThingKey {
    raw: String,
    domain: Domain,
}

impl ThingKey {
    /// Parse a raw key, returning `None` for unsupported prefixes
    pub fn parse(raw: &str) -> Option<Self> {
        Domain::of(raw).map(|domain| Self { raw: raw.to_string(), domain })
    }

    /// Build a key from a domain and a bare identifier (`OL1W`)
    pub fn from_id(domain: Domain, id: &str) -> Self {
        let id = id.trim_start_matches('/');
        Self { raw: format!("{}{}", domain.prefix(), id), domain }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Full key, e.g. `/works/OL1W`
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Identifier without the domain prefix, e.g. `OL1W`
    pub fn id(&self) -> &str {
        &self.raw[self.domain.prefix().len()..]
    }
}

impl fmt::Display for ThingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for ThingKey {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}
