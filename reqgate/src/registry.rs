//! GlobalRegistry: process-wide defaults shared by every session.
//!
//! Holds the default client, validator and hooks, the default parallel
//! policy, and the shared admission queue. The queue instance lives as long
//! as the registry; configuration only toggles whether new sessions see it.
//! Sessions receive the registry as an `Arc` so tests can build isolated
//! instances; `GlobalRegistry::global()` serves hosts that want one per
//! process.

use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::Value;

use crate::config::RegistryOptions;
use crate::error::{ConfigurationError, RegistrationError};
use crate::hooks::{Hook, HookName, HookPipeline, HookSet};
use crate::queue::AdmissionQueue;
use crate::transport::Transport;
use crate::validator::{Validator, ValidatorSlot, ValidatorState};

struct RegistryState {
    client: Option<Arc<dyn Transport>>,
    hooks: HookSet,
    validator: ValidatorSlot,
    queue: Arc<AdmissionQueue>,
    queue_enabled: bool,
    default_parallel: bool,
    turn_timeout: Option<Duration>,
}

impl RegistryState {
    /// Pass-through hooks and an always-succeed validator, so a session with
    /// no overrides works out of the box once a client is set.
    fn bootstrap(queue: Arc<AdmissionQueue>) -> Self {
        Self {
            client: None,
            hooks: HookSet::pass_through(),
            validator: ValidatorSlot::Bootstrap,
            queue,
            queue_enabled: false,
            default_parallel: true,
            turn_timeout: None,
        }
    }
}

pub struct GlobalRegistry {
    state: RwLock<RegistryState>,
}

impl GlobalRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::bootstrap(Arc::new(AdmissionQueue::new()))),
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<GlobalRegistry> {
        static GLOBAL: OnceLock<Arc<GlobalRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(GlobalRegistry::new())))
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| {
            tracing::error!("Registry lock poisoned - continuing with last state");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|poisoned| {
            tracing::error!("Registry lock poisoned - continuing with last state");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Apply `options`.
    ///
    /// Disabling the queue hides it from new sessions; calls already holding
    /// or waiting for a key keep their place, and re-enabling hands new
    /// sessions the same instance.
    pub fn configure(&self, options: RegistryOptions) {
        let mut state = self.write();

        if let Some(client) = options.client {
            state.client = Some(client);
        }

        state.queue_enabled = options.queue_enabled;
        if options.queue_enabled {
            state.queue.set_debug(options.queue_debug_logging);
        }

        if let Some(parallel) = options.default_parallel_status {
            state.default_parallel = parallel;
        }

        if let Some(ms) = options.turn_timeout_ms {
            state.turn_timeout = Some(Duration::from_millis(ms));
        }

        tracing::info!(
            queue = state.queue_enabled,
            queue_logs = options.queue_debug_logging,
            default_parallel = state.default_parallel,
            turn_timeout = ?state.turn_timeout,
            has_client = state.client.is_some(),
            "Registry configured"
        );
    }

    /// Parse and apply a JSON configuration record.
    pub fn configure_json(&self, value: &Value) -> Result<(), ConfigurationError> {
        let options = RegistryOptions::from_value(value)?;
        self.configure(options);
        Ok(())
    }

    /// Restore the bootstrap state: no client, queuing off. The queue
    /// instance itself survives so calls in flight keep their keys.
    pub fn reset(&self) {
        let mut state = self.write();
        let queue = Arc::clone(&state.queue);
        *state = RegistryState::bootstrap(queue);
        drop(state);
        tracing::debug!("Registry reset to bootstrap defaults");
    }

    pub fn set_client(&self, client: Arc<dyn Transport>) {
        self.write().client = Some(client);
    }

    pub fn client(&self) -> Option<Arc<dyn Transport>> {
        self.read().client.clone()
    }

    pub fn set_hook(&self, name: HookName, hook: Hook) -> Result<(), RegistrationError> {
        self.write().hooks.set(name, hook)
    }

    pub fn remove_hook(&self, name: HookName) -> Option<Hook> {
        self.write().hooks.remove(name)
    }

    pub fn hook(&self, name: HookName) -> Option<Hook> {
        self.read().hooks.get(name).cloned()
    }

    /// Run registry-level hooks only, ignoring any session overrides.
    pub fn hooks(&self) -> HookPipeline<'_> {
        HookPipeline::new(None, self)
    }

    pub fn set_validator(&self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) {
        self.write().validator = ValidatorSlot::Custom(Validator::new(f));
    }

    /// Remove the validator; every result is refused until a new one is set.
    pub fn clear_validator(&self) {
        self.write().validator = ValidatorSlot::Cleared;
    }

    pub fn validator_state(&self) -> ValidatorState {
        self.read().validator.state()
    }

    /// Judge `result` with the registry validator; fail-closed when cleared.
    pub fn run_validator(&self, result: &Value) -> bool {
        // Clone out so the validator never runs under the registry lock.
        let validator = self.read().validator.validator();
        validator.is_some_and(|v| v.check(result))
    }

    /// The shared admission queue, if queuing is enabled.
    pub fn queue(&self) -> Option<Arc<AdmissionQueue>> {
        let state = self.read();
        state.queue_enabled.then(|| Arc::clone(&state.queue))
    }

    pub fn default_parallel(&self) -> bool {
        self.read().default_parallel
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        self.read().turn_timeout
    }
}

impl Default for GlobalRegistry {
    fn default() -> Self {
        Self::new()
    }
}
