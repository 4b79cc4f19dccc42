//! Pending request queue with a trailing-edge flush deadline.
//!
//! The queue is plain data: the coalescer guards it with a mutex and never
//! holds that mutex across an await point.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::entity::Entity;
use crate::key::{Domain, ThingKey};

/// Callback receiving the resolved entity, or `None` if it could not be found
pub type ResolveCallback = Box<dyn FnOnce(Option<Entity>) + Send + 'static>;

/// A request waiting for the next flush
pub struct PendingRequest {
    /// Requested key, as given by the caller
    pub key: String,
    /// When this request entered the queue
    pub queued_at: Instant,
    on_resolved: ResolveCallback,
}

impl PendingRequest {
    /// Create a new pending request
    pub fn new(key: impl Into<String>, on_resolved: ResolveCallback) -> Self {
        Self {
            key: key.into(),
            queued_at: Instant::now(),
            on_resolved,
        }
    }

    /// Consume the request, invoking its callback
    pub fn resolve(self, entity: Option<Entity>) {
        (self.on_resolved)(entity)
    }

    /// Time spent waiting since the request was queued
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("key", &self.key)
            .field("queued_at", &self.queued_at)
            .finish_non_exhaustive()
    }
}

/// Requests accumulated during the current batch window
#[derive(Debug, Default)]
pub struct PendingQueue {
    requests: Vec<PendingRequest>,
    /// Flush deadline; `None` while idle
    deadline: Option<Instant>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request and push the flush deadline to `now + window`.
    ///
    /// Returns `true` when this request opened a new window, meaning the
    /// caller must schedule a flush timer.
    pub fn push(&mut self, request: PendingRequest, window: Duration) -> bool {
        let opened = self.deadline.is_none();
        self.deadline = Some(Instant::now() + window);
        self.requests.push(request);
        opened
    }

    /// Current flush deadline, if a window is open
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drain the queue if its deadline has passed.
    ///
    /// Returns `None` if the deadline was pushed past `now` by a later
    /// request; the window stays open in that case.
    pub fn take_if_due(&mut self, now: Instant) -> Option<Vec<PendingRequest>> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(std::mem::take(&mut self.requests))
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Distinct supported keys of a snapshot, grouped by domain.
///
/// Keys outside the supported domains are left out; they resolve to `None`
/// once the flush completes.
pub fn partition_by_domain(snapshot: &[PendingRequest]) -> BTreeMap<Domain, Vec<ThingKey>> {
    let mut partitions: BTreeMap<Domain, Vec<ThingKey>> = BTreeMap::new();
    for request in snapshot {
        let Some(key) = ThingKey::parse(&request.key) else {
            continue;
        };
        let keys = partitions.entry(key.domain()).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    partitions
}
