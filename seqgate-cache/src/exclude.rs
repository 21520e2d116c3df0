//! Resend suppression: tracks which blobs each client already has or is
//! currently receiving.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use seqgate_blob::identity::BlobIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDecision {
    /// The caller owns the delivery and must eventually mark it completed or remove it.
    Won,
    /// Another request is delivering this blob to the same client right now.
    AlreadyInFlight,
    /// The blob was delivered `age` ago; resending is allowed after `remaining`.
    RecentlyDelivered { age: Duration, remaining: Duration },
}

#[derive(Debug, Clone, Copy)]
pub struct ExcludeCacheOptions {
    pub resend_timeout: Duration,
    /// Upper bound on tracked (client, blob) pairs; only in-flight claims may exceed it.
    pub max_size: usize,
    pub inactivity_timeout: Duration,
}

impl Default for ExcludeCacheOptions {
    fn default() -> Self {
        Self {
            resend_timeout: Duration::from_millis(200),
            max_size: 1000,
            inactivity_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Delivery {
    InFlight,
    Completed(Instant),
}

#[derive(Debug)]
struct ClientEntries {
    blobs: HashMap<BlobIdentity, Delivery>,
    last_touched: Instant,
}

#[derive(Debug, Default)]
struct ExcludeState {
    clients: HashMap<String, ClientEntries>,
    /// Tracked (client, blob) pairs across all clients.
    pairs: usize,
}

impl ExcludeState {
    fn recount(&mut self) {
        self.clients.retain(|_, entries| !entries.blobs.is_empty());
        self.pairs = self.clients.values().map(|e| e.blobs.len()).sum();
    }

    /// Shrinks the cache to at most `limit` pairs where possible. Completed
    /// entries go first when their resend window is over or their client is
    /// idle, then oldest first. In-flight claims are never dropped: that
    /// would let a second request win.
    fn purge(&mut self, options: &ExcludeCacheOptions, now: Instant, limit: usize) {
        let before = self.pairs;
        for entries in self.clients.values_mut() {
            let idle = now.saturating_duration_since(entries.last_touched) >= options.inactivity_timeout;
            entries.blobs.retain(|_, delivery| match delivery {
                Delivery::InFlight => true,
                Delivery::Completed(at) => {
                    !idle && now.saturating_duration_since(*at) < options.resend_timeout
                }
            });
        }
        self.recount();

        if self.pairs > limit {
            let mut completed: Vec<(Instant, String, BlobIdentity)> = self
                .clients
                .iter()
                .flat_map(|(client, entries)| {
                    entries.blobs.iter().filter_map(move |(blob, delivery)| match delivery {
                        Delivery::Completed(at) => Some((*at, client.clone(), blob.clone())),
                        Delivery::InFlight => None,
                    })
                })
                .collect();
            completed.sort_by_key(|(at, ..)| *at);
            let excess = self.pairs - limit;
            for (_, client, blob) in completed.into_iter().take(excess) {
                if let Some(entries) = self.clients.get_mut(&client) {
                    entries.blobs.remove(&blob);
                }
            }
            self.recount();
        }
        tracing::debug!(before, after = self.pairs, "purged exclude cache entries");
    }
}

#[derive(Debug)]
pub struct ExcludeCache {
    options: ExcludeCacheOptions,
    state: Mutex<ExcludeState>,
}

impl ExcludeCache {
    pub fn new(options: ExcludeCacheOptions) -> Self {
        Self {
            options,
            state: Mutex::new(ExcludeState::default()),
        }
    }

    pub fn try_begin_delivery(&self, client_id: &str, blob: &BlobIdentity) -> DeliveryDecision {
        self.try_begin_delivery_at(client_id, blob, Instant::now())
    }

    /// Atomically claims the delivery of `blob` to `client_id`.
    ///
    /// An empty client id never participates in suppression.
    pub fn try_begin_delivery_at(
        &self,
        client_id: &str,
        blob: &BlobIdentity,
        now: Instant,
    ) -> DeliveryDecision {
        if client_id.is_empty() {
            return DeliveryDecision::Won;
        }

        let mut state = self.state.lock();
        let known = state
            .clients
            .get(client_id)
            .is_some_and(|entries| entries.blobs.contains_key(blob));
        if !known && state.pairs >= self.options.max_size {
            state.purge(&self.options, now, self.options.max_size.saturating_sub(1));
        }

        let ExcludeState { clients, pairs } = &mut *state;
        let entries = clients
            .entry(client_id.to_string())
            .or_insert_with(|| ClientEntries {
                blobs: HashMap::new(),
                last_touched: now,
            });
        entries.last_touched = now;

        match entries.blobs.get(blob).copied() {
            None => {
                entries.blobs.insert(blob.clone(), Delivery::InFlight);
                *pairs += 1;
                DeliveryDecision::Won
            }
            Some(Delivery::InFlight) => DeliveryDecision::AlreadyInFlight,
            Some(Delivery::Completed(completed_at)) => {
                let age = now.saturating_duration_since(completed_at);
                if age < self.options.resend_timeout {
                    DeliveryDecision::RecentlyDelivered {
                        age,
                        remaining: self.options.resend_timeout - age,
                    }
                } else {
                    entries.blobs.insert(blob.clone(), Delivery::InFlight);
                    DeliveryDecision::Won
                }
            }
        }
    }

    pub fn mark_completed(&self, client_id: &str, blob: &BlobIdentity) {
        self.mark_completed_at(client_id, blob, Instant::now())
    }

    /// Records that the last byte of `blob` went out to `client_id`.
    pub fn mark_completed_at(&self, client_id: &str, blob: &BlobIdentity, now: Instant) {
        if client_id.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        if let Some(entries) = state.clients.get_mut(client_id) {
            entries.last_touched = now;
            if let Some(delivery) = entries.blobs.get_mut(blob) {
                *delivery = Delivery::Completed(now);
                return;
            }
        }
        tracing::warn!(client_id, %blob, "completion recorded for a delivery that was never claimed");
    }

    /// Drops the claim, e.g. when a delivery was rejected or produced no data.
    pub fn remove(&self, client_id: &str, blob: &BlobIdentity) {
        if client_id.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        let ExcludeState { clients, pairs } = &mut *state;
        if let Some(entries) = clients.get_mut(client_id) {
            if entries.blobs.remove(blob).is_some() {
                *pairs -= 1;
            }
            if entries.blobs.is_empty() {
                clients.remove(client_id);
            }
        }
    }

    /// Number of tracked (client, blob) pairs.
    pub fn len(&self) -> usize {
        self.state.lock().pairs
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge_inactive(&self, now: Instant) {
        self.state.lock().purge(&self.options, now, self.options.max_size);
    }
}
