//! Per-key admission control with FIFO hand-off.
//!
//! Each key has at most one holder. Later contenders park on a oneshot
//! channel in arrival order; a releasing holder hands the key directly to
//! the next waiter whose receiver is still alive.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::QueueError;
use crate::key::{Key, Ticket, TicketId};

/// How a contender got past `await_turn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Now the sole holder of the key.
    Holder,
    /// Parallel caller; the queue was not consulted.
    Bypassed,
}

struct Waiter {
    ticket: TicketId,
    grant: oneshot::Sender<()>,
}

#[derive(Default)]
struct KeyEntry {
    holder: Option<TicketId>,
    waiters: VecDeque<Waiter>,
}

impl KeyEntry {
    fn is_vacant(&self) -> bool {
        self.holder.is_none() && self.waiters.is_empty()
    }
}

/// Point-in-time view of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub key: Key,
    pub holder: Option<TicketId>,
    pub waiting: Vec<TicketId>,
}

/// Shared admission queue.
///
/// Per-key state lives in a `DashMap`; every operation on a key runs under
/// that key's shard lock, so register/await/release/cancel are atomic with
/// respect to each other and distinct keys never block one another.
pub struct AdmissionQueue {
    entries: DashMap<Key, KeyEntry>,
    next_ticket: AtomicU64,
    debug: AtomicBool,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_ticket: AtomicU64::new(1),
            debug: AtomicBool::new(false),
        }
    }

    /// Emit admission events at `info` instead of `trace`.
    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    fn log(&self, ticket: &Ticket, event: &'static str) {
        if self.is_debug() {
            tracing::info!(key = %ticket.key(), ticket = %ticket.id(), event, "admission queue");
        } else {
            tracing::trace!(key = %ticket.key(), ticket = %ticket.id(), event, "admission queue");
        }
    }

    /// Issue a ticket for `key`. Nothing is reserved until `await_turn`.
    pub fn register(&self, key: Key) -> Ticket {
        let ticket = Ticket::new(TicketId::next(&self.next_ticket), key);
        self.log(&ticket, "registered");
        ticket
    }

    /// Wait until `ticket` holds its key.
    ///
    /// Parallel callers return at once without touching queue state. With a
    /// `limit`, a caller still waiting when it elapses is removed from the
    /// queue (handing the key on if it was granted in the meantime).
    pub async fn await_turn(
        &self,
        ticket: &Ticket,
        parallel: bool,
        limit: Option<Duration>,
    ) -> Result<Admission, QueueError> {
        if parallel {
            self.log(ticket, "bypassed");
            return Ok(Admission::Bypassed);
        }

        let granted = {
            let mut entry = self.entries.entry(ticket.key().clone()).or_default();
            if entry.holder.is_none() {
                debug_assert!(entry.waiters.is_empty(), "vacant key with parked waiters");
                entry.holder = Some(ticket.id());
                None
            } else {
                let (grant, granted) = oneshot::channel();
                entry.waiters.push_back(Waiter {
                    ticket: ticket.id(),
                    grant,
                });
                Some(granted)
            }
        };

        let Some(granted) = granted else {
            self.log(ticket, "acquired");
            return Ok(Admission::Holder);
        };

        self.log(ticket, "waiting");
        let outcome = match limit {
            None => granted.await,
            Some(limit) => match tokio::time::timeout(limit, granted).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.release(ticket);
                    self.log(ticket, "timed out");
                    return Err(QueueError::TimedOut(limit));
                }
            },
        };

        match outcome {
            Ok(()) => {
                self.log(ticket, "acquired");
                Ok(Admission::Holder)
            }
            Err(_) => {
                self.log(ticket, "cancelled");
                Err(QueueError::Cancelled)
            }
        }
    }

    /// Drop `ticket` from its key, handing the key on if it was the holder.
    ///
    /// Safe to call for tickets that never acquired or were already
    /// released; returns whether any state changed.
    pub fn release(&self, ticket: &Ticket) -> bool {
        let (released, next) = match self.entries.get_mut(ticket.key()) {
            None => (false, None),
            Some(mut entry) => {
                if entry.holder == Some(ticket.id()) {
                    entry.holder = None;
                    while let Some(waiter) = entry.waiters.pop_front() {
                        // A dead receiver means the waiter's future was dropped.
                        if waiter.grant.send(()).is_ok() {
                            entry.holder = Some(waiter.ticket);
                            break;
                        }
                    }
                    (true, entry.holder)
                } else if let Some(pos) = entry.waiters.iter().position(|w| w.ticket == ticket.id())
                {
                    entry.waiters.remove(pos);
                    (true, None)
                } else {
                    (false, None)
                }
            }
        };

        self.entries.remove_if(ticket.key(), |_, entry| entry.is_vacant());

        if released {
            self.log(ticket, "released");
        }
        if let Some(next) = next {
            tracing::trace!(key = %ticket.key(), from = %ticket.id(), to = %next, "handed off");
        }
        released
    }

    /// Remove a ticket that is still strictly waiting.
    ///
    /// Returns `false` for holders and for tickets that never queued.
    pub fn cancel(&self, ticket: &Ticket) -> bool {
        let removed = self
            .entries
            .get_mut(ticket.key())
            .and_then(|mut entry| {
                let pos = entry.waiters.iter().position(|w| w.ticket == ticket.id())?;
                entry.waiters.remove(pos)
            })
            .is_some();

        if removed {
            self.entries.remove_if(ticket.key(), |_, entry| entry.is_vacant());
            self.log(ticket, "cancelled");
        }
        removed
    }

    pub fn holder(&self, key: &Key) -> Option<TicketId> {
        self.entries.get(key).and_then(|entry| entry.holder)
    }

    pub fn is_waiting(&self, ticket: &Ticket) -> bool {
        self.entries
            .get(ticket.key())
            .is_some_and(|entry| entry.waiters.iter().any(|w| w.ticket == ticket.id()))
    }

    pub fn snapshot(&self, key: &Key) -> QueueSnapshot {
        let (holder, waiting) = match self.entries.get(key) {
            Some(entry) => (
                entry.holder,
                entry.waiters.iter().map(|w| w.ticket).collect(),
            ),
            None => (None, Vec::new()),
        };
        QueueSnapshot {
            key: key.clone(),
            holder,
            waiting,
        }
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.entries.len()
    }

    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AdmissionQueue {
    fn default() -> Self {
        Self::new()
    }
}
