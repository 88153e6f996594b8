//! Admission queue: one in-flight call per key, FIFO for the rest.
//!
//! - `AdmissionQueue` holds per-key holder/waiter state.
//! - `AdmissionGuard` ties a ticket's release to scope exit so cleanup runs
//!   on every path out of a call.

mod admission;
mod guard;

pub use admission::{Admission, AdmissionQueue, QueueSnapshot};
pub use guard::AdmissionGuard;
