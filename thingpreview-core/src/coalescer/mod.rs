//! Debounced, batched preview lookups.
//!
//! Many independent requests for previews, scattered across a page and
//! clustered in time, are collected into one batch window and answered with
//! at most one lookup per domain.
//!
//! # Architecture
//!
//! ```text
//! request(key, cb) ──► cache hit? ──yes──► cb(Some(entity))
//!                          │ no
//!                          ▼
//!                  ┌───────────────┐
//!                  │ PendingQueue  │ ← deadline = last request + window
//!                  └───────┬───────┘
//!                          │ deadline passed
//!                          ▼
//!                  ┌───────────────┐
//!                  │     flush     │   works ─► editions (still missing)
//!                  │               │   authors
//!                  └───────┬───────┘
//!                          │ all lookups settled
//!                          ▼
//!                 PreviewCache ──► every cb(cache.get(key))
//! ```
//!
//! # Lifecycle
//!
//! `Idle → Accumulating → Flushing → Idle`. Each request during
//! `Accumulating` pushes the deadline back by a full window. Requests that
//! arrive while a flush is waiting on lookups open a new window; they are
//! never merged into the in-flight batch.
//!
//! Edition lookups are issued after the work lookup of the same flush has
//! settled, and only for editions the work results did not already provide.

mod config;
mod metrics;
mod queue;

pub use config::{CoalescerConfig, RetryPolicy};
pub use metrics::{CoalescerMetrics, MetricsSnapshot};
pub use queue::{partition_by_domain, PendingQueue, PendingRequest, ResolveCallback};

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::PreviewCache;
use crate::entity::Entity;
use crate::error::LookupError;
use crate::key::{Domain, ThingKey};
use crate::lookup::ThingLookup;
use crate::markup::Placeholder;
use crate::render::{RenderRegistry, RenderedPreview};

/// Observable phase of a coalescer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescerState {
    /// Nothing queued, no flush in progress
    Idle,
    /// A batch window is open
    Accumulating,
    /// No window open, but a flush is waiting on lookups
    Flushing,
}

/// Collects preview requests and answers them in batches.
///
/// Cloning is cheap and yields a handle to the same queue and cache. Each
/// independently constructed coalescer has its own cache and lifetime.
///
/// Requests must be made from within a Tokio runtime, which drives the
/// flush timer and the lookups.
#[derive(Clone)]
pub struct RequestCoalescer {
    inner: Arc<Inner>,
}

struct Inner {
    config: CoalescerConfig,
    lookup: Arc<dyn ThingLookup>,
    queue: Mutex<PendingQueue>,
    cache: PreviewCache,
    metrics: CoalescerMetrics,
    flushes_in_flight: AtomicUsize,
}

impl RequestCoalescer {
    /// Create a coalescer backed by `lookup`
    pub fn new(lookup: impl ThingLookup + 'static, config: CoalescerConfig) -> Self {
        Self::with_shared_lookup(Arc::new(lookup), config)
    }

    /// Create a coalescer backed by a lookup shared with other owners
    pub fn with_shared_lookup(lookup: Arc<dyn ThingLookup>, config: CoalescerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                lookup,
                queue: Mutex::new(PendingQueue::new()),
                cache: PreviewCache::new(),
                metrics: CoalescerMetrics::new(),
                flushes_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Request the preview for `key`.
    ///
    /// A cached key is answered immediately, on the calling thread. Anything
    /// else is queued for the next flush. `on_resolved` is invoked exactly
    /// once, with `None` if the key could not be resolved (unsupported
    /// prefix, not found, or the lookup for its domain failed).
    ///
    /// Outside a Tokio runtime a cache miss cannot be scheduled, so it is
    /// answered with `None` immediately.
    pub fn request<F>(&self, key: impl Into<String>, on_resolved: F)
    where
        F: FnOnce(Option<Entity>) + Send + 'static,
    {
        let key = key.into();
        let inner = &self.inner;
        inner.metrics.record_received();

        if let Some(entity) = inner.cache.get(&key) {
            inner.metrics.record_cache_hit();
            inner.metrics.record_dispatched();
            on_resolved(Some(entity));
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(key = %key, "Preview requested outside a Tokio runtime");
            inner.metrics.record_unresolved(1);
            inner.metrics.record_dispatched();
            on_resolved(None);
            return;
        };

        if Domain::of(&key).is_none() {
            debug!(key = %key, "Queued key with unsupported prefix");
        }

        let window = inner.config.debounce_window;
        let (opened, depth) = {
            let mut queue = inner.lock_queue();
            let opened = queue.push(PendingRequest::new(key.clone(), Box::new(on_resolved)), window);
            (opened, queue.len())
        };
        inner.metrics.record_queued();

        debug!(key = %key, queue_depth = depth, "Preview request queued");

        if opened {
            let inner = Arc::clone(inner);
            runtime.spawn(async move { inner.run_window().await });
        }
    }

    /// Request the preview for `key` and wait for it
    pub async fn resolve(&self, key: impl Into<String>) -> Option<Entity> {
        let (tx, rx) = oneshot::channel();
        self.request(key, move |entity| {
            let _ = tx.send(entity);
        });
        rx.await.unwrap_or(None)
    }

    /// Queue every well-formed placeholder, rendering its preview through the
    /// named function in `registry` and handing the markup to `sink`.
    ///
    /// Placeholders with a missing key, a missing render name, or a render
    /// name that is not registered are skipped. Returns the number of
    /// placeholders queued (or answered from the cache).
    pub fn initialize_from_markup<S>(
        &self,
        placeholders: &[Placeholder],
        registry: &RenderRegistry,
        sink: S,
    ) -> usize
    where
        S: Fn(RenderedPreview) + Send + Sync + 'static,
    {
        let sink = Arc::new(sink);
        let mut queued = 0;

        for (index, placeholder) in placeholders.iter().enumerate() {
            let Some((key, render_name)) = placeholder.parts() else {
                warn!(index, ?placeholder, "Skipping malformed preview placeholder");
                continue;
            };
            let Some(render) = registry.get(render_name) else {
                warn!(index, key, render = render_name, "Skipping placeholder with unknown render function");
                continue;
            };

            let sink = Arc::clone(&sink);
            let owned_key = key.to_string();
            self.request(key, move |entity| {
                let markup = render(entity.as_ref());
                sink(RenderedPreview { index, key: owned_key, markup });
            });
            queued += 1;
        }

        info!(found = placeholders.len(), queued, "Initialized previews from markup");
        queued
    }

    /// Cached preview for `key`, without queuing a request
    pub fn cached(&self, key: &str) -> Option<Entity> {
        self.inner.cache.get(key)
    }

    /// Number of cached entries
    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }

    /// Number of requests waiting in the current window
    pub fn pending(&self) -> usize {
        self.inner.lock_queue().len()
    }

    pub fn state(&self) -> CoalescerState {
        if self.inner.lock_queue().deadline().is_some() {
            CoalescerState::Accumulating
        } else if self.inner.flushes_in_flight.load(Ordering::Acquire) > 0 {
            CoalescerState::Flushing
        } else {
            CoalescerState::Idle
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn config(&self) -> &CoalescerConfig {
        &self.inner.config
    }
}

impl Inner {
    fn lock_queue(&self) -> MutexGuard<'_, PendingQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep until the window's deadline stops moving, then flush it
    async fn run_window(self: Arc<Self>) {
        loop {
            let Some(deadline) = self.lock_queue().deadline() else {
                return;
            };
            tokio::time::sleep_until(deadline).await;

            let snapshot = {
                let mut queue = self.lock_queue();
                let snapshot = queue.take_if_due(Instant::now());
                if snapshot.is_some() {
                    self.flushes_in_flight.fetch_add(1, Ordering::AcqRel);
                }
                snapshot
            };

            if let Some(snapshot) = snapshot {
                let _in_flight = InFlight(&self.flushes_in_flight);
                self.flush(snapshot).await;
                return;
            }
        }
    }

    async fn flush(self: &Arc<Self>, snapshot: Vec<PendingRequest>) {
        self.metrics.record_flush(snapshot.len());

        let mut partitions = partition_by_domain(&snapshot);
        for keys in partitions.values_mut() {
            keys.retain(|k| !self.cache.contains(k.as_str()));
        }
        let works = partitions.remove(&Domain::Work).filter(|k| !k.is_empty());
        let editions = partitions.remove(&Domain::Edition).filter(|k| !k.is_empty());
        let authors = partitions.remove(&Domain::Author).filter(|k| !k.is_empty());

        debug!(
            requests = snapshot.len(),
            works = works.as_ref().map_or(0, Vec::len),
            editions = editions.as_ref().map_or(0, Vec::len),
            authors = authors.as_ref().map_or(0, Vec::len),
            "Flushing preview batch"
        );

        let works_then_editions = async {
            if let Some(keys) = works {
                self.fetch(Domain::Work, keys).await;
            }
            if let Some(mut keys) = editions {
                keys.retain(|k| !self.cache.contains(k.as_str()));
                if !keys.is_empty() {
                    self.fetch(Domain::Edition, keys).await;
                }
            }
        };
        let author_lookup = async {
            if let Some(keys) = authors {
                self.fetch(Domain::Author, keys).await;
            }
        };
        futures::join!(works_then_editions, author_lookup);

        let unresolved: BTreeSet<&str> = snapshot
            .iter()
            .map(|r| r.key.as_str())
            .filter(|key| !self.cache.contains(key))
            .collect();
        if !unresolved.is_empty() {
            self.metrics.record_unresolved(unresolved.len());
            warn!(count = unresolved.len(), keys = ?unresolved, "Preview keys could not be resolved");
        }

        self.dispatch(snapshot);
    }

    /// Issue one batched lookup and merge its results into the cache
    async fn fetch(self: &Arc<Self>, domain: Domain, keys: Vec<ThingKey>) {
        self.metrics.record_lookup();

        match self.call_lookup(domain, &keys).await {
            Ok(entities) => {
                let found = entities.len();
                let written = self.cache.merge(domain, entities);
                debug!(%domain, requested = keys.len(), found, written, "Lookup complete");
            }
            Err(e) => {
                self.metrics.record_lookup_failure();
                warn!(%domain, keys = keys.len(), error = %e, "Preview lookup failed");
                if let Some(policy) = self.config.retry {
                    let inner = Arc::clone(self);
                    tokio::spawn(async move { inner.refetch(domain, keys, policy).await });
                }
            }
        }
    }

    /// Run the backend lookup; a panic counts as a failed lookup
    async fn call_lookup(&self, domain: Domain, keys: &[ThingKey]) -> Result<Vec<Entity>, LookupError> {
        AssertUnwindSafe(self.lookup.lookup(domain, keys))
            .catch_unwind()
            .await
            .unwrap_or(Err(LookupError::Panicked { domain }))
    }

    /// Retry a failed lookup in the background to warm the cache
    async fn refetch(self: Arc<Self>, domain: Domain, keys: Vec<ThingKey>, policy: RetryPolicy) {
        for attempt in 1..=policy.max_attempts {
            tokio::time::sleep(policy.backoff).await;
            self.metrics.record_retry();

            match self.call_lookup(domain, &keys).await {
                Ok(entities) => {
                    let written = self.cache.merge(domain, entities);
                    debug!(%domain, attempt, written, "Re-fetch succeeded");
                    return;
                }
                Err(e) => {
                    self.metrics.record_lookup_failure();
                    warn!(%domain, attempt, error = %e, "Re-fetch failed");
                }
            }
        }
    }

    /// Invoke every callback of the snapshot, duplicates included
    fn dispatch(&self, snapshot: Vec<PendingRequest>) {
        for request in snapshot {
            let entity = self.cache.get(&request.key);
            let key = request.key.clone();
            let wait_ms = request.wait_time().as_millis() as u64;
            self.metrics.record_dispatched();

            if panic::catch_unwind(AssertUnwindSafe(|| request.resolve(entity))).is_err() {
                warn!(key = %key, "Preview callback panicked");
            } else {
                debug!(key = %key, wait_ms, "Preview delivered");
            }
        }
    }
}

/// Counts a flush as in flight until dropped, unwinding included
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
