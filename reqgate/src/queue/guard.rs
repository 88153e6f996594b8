//! AdmissionGuard - releases a ticket exactly once.
//!
//! The guard owns the ticket for the length of one `fire`. Explicit
//! `release()` consumes it; any other exit (early return, error, dropped
//! future) releases on drop.

use std::sync::Arc;
use std::time::Duration;

use super::{Admission, AdmissionQueue};
use crate::error::QueueError;
use crate::key::{Key, Ticket};

#[must_use = "dropping the guard releases the key immediately"]
pub struct AdmissionGuard {
    queue: Arc<AdmissionQueue>,
    ticket: Option<Ticket>,
}

impl AdmissionGuard {
    pub fn register(queue: Arc<AdmissionQueue>, key: Key) -> Self {
        let ticket = queue.register(key);
        Self {
            queue,
            ticket: Some(ticket),
        }
    }

    pub fn ticket(&self) -> Option<&Ticket> {
        self.ticket.as_ref()
    }

    pub async fn await_turn(
        &self,
        parallel: bool,
        limit: Option<Duration>,
    ) -> Result<Admission, QueueError> {
        match &self.ticket {
            Some(ticket) => self.queue.await_turn(ticket, parallel, limit).await,
            // Unreachable through the public API: release() consumes self.
            None => Err(QueueError::Cancelled),
        }
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.queue.release(&ticket);
        }
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if let Some(ticket) = &self.ticket {
            tracing::debug!(key = %ticket.key(), ticket = %ticket.id(), "Admission guard dropped before release");
        }
        self.release_inner();
    }
}

impl std::fmt::Debug for AdmissionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGuard")
            .field("ticket", &self.ticket)
            .finish()
    }
}
