//! reqgate: per-key FIFO admission and lifecycle hooks around an async client.
//!
//! A [`RequestSession`] wraps one request payload. Each `fire` registers the
//! call with the shared [`AdmissionQueue`] under a key, waits until no other
//! non-parallel call holds that key, runs the client, validates the result,
//! and resolves or rejects through the hook pipeline. Defaults for client,
//! validator, hooks and queue live in the [`GlobalRegistry`].

mod error;
mod key;
mod state;

pub mod config;
pub mod hooks;
pub mod logging;
pub mod queue;
pub mod registry;
pub mod session;
pub mod transport;
pub mod validator;

pub use config::RegistryOptions;
pub use error::{
    ConfigurationError, Failure, FireError, HookError, QueueError, RegistrationError,
    TransportError,
};
pub use hooks::{Hook, HookContext, HookName, HookPipeline, HookSet};
pub use key::{Key, Ticket, TicketId};
pub use logging::init_tracing;
pub use queue::{Admission, AdmissionGuard, AdmissionQueue, QueueSnapshot};
pub use registry::GlobalRegistry;
pub use session::{FireOptions, RequestSession};
pub use state::SessionState;
pub use transport::{Transport, transport_fn};
pub use validator::{Validator, ValidatorState};
