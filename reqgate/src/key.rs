//! Keys scoping mutual exclusion, and the tickets issued to contenders.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifier scoping mutual exclusion between calls.
///
/// Caller-supplied keys need not be unique. Generated keys are UUID v4 and
/// therefore unique for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawKey")]
pub struct Key(String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<u64> for Key {
    fn from(key: u64) -> Self {
        Self(key.to_string())
    }
}

/// Keys arrive from JSON as either strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<RawKey> for Key {
    fn from(raw: RawKey) -> Self {
        match raw {
            RawKey::Text(s) => Self(s),
            RawKey::Unsigned(n) => Self(n.to_string()),
            RawKey::Signed(n) => Self(n.to_string()),
        }
    }
}

/// Opaque identifier of one registration with the admission queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TicketId(u64);

impl TicketId {
    pub(crate) fn next(counter: &AtomicU64) -> Self {
        Self(counter.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Proof of registration: which key a contender is waiting on, and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id: TicketId,
    key: Key,
}

impl Ticket {
    pub(crate) fn new(id: TicketId, key: Key) -> Self {
        Self { id, key }
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn key(&self) -> &Key {
        &self.key
    }
}
