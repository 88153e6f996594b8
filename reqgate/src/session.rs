//! RequestSession - one managed invocation of the client.
//!
//! `fire` drives the call through:
//! 1. register with the admission queue (if enabled) under the call's key
//! 2. `update.request-config` over the request payload
//! 3. wait for the key (skipped for parallel calls)
//! 4. `before.fire`, then the transport
//! 5. validator → `after.success` + `before.resolve`, or
//!    `after.fail` + `before.reject` (also taken when the transport fails)
//! 6. release the key, on every path
//!
//! Session-level client, validator and hooks shadow the registry's.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Failure, FireError, HookError, QueueError, RegistrationError, TransportError};
use crate::hooks::{Hook, HookContext, HookName, HookPipeline, HookSet};
use crate::key::{Key, Ticket, TicketId};
use crate::queue::{AdmissionGuard, AdmissionQueue};
use crate::registry::GlobalRegistry;
use crate::state::SessionState;
use crate::transport::Transport;
use crate::validator::Validator;

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireOptions {
    /// Mutual-exclusion scope; generated when absent.
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    /// Bypass the admission queue; the registry default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
}

impl FireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    /// Lenient parse: anything that isn't a well-formed options record
    /// yields the defaults.
    pub fn from_json(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Malformed fire options - using defaults");
            Self::default()
        })
    }
}

/// Registration of the most recent `fire`.
#[derive(Default)]
struct Current {
    state: SessionState,
    key: Option<Key>,
    ticket: Option<Ticket>,
    parallel: bool,
    queue: Option<Arc<AdmissionQueue>>,
}

pub struct RequestSession {
    registry: Arc<GlobalRegistry>,
    request: Value,
    client: Option<Arc<dyn Transport>>,
    hooks: HookSet,
    validator: Option<Validator>,
    current: Mutex<Current>,
}

impl RequestSession {
    pub fn new(registry: Arc<GlobalRegistry>, request: Value) -> Self {
        Self {
            registry,
            request,
            client: None,
            hooks: HookSet::new(),
            validator: None,
            current: Mutex::new(Current::default()),
        }
    }

    /// Session bound to the process-wide registry.
    pub fn with_global(request: Value) -> Self {
        Self::new(GlobalRegistry::global(), request)
    }

    pub fn set_client(&mut self, client: Arc<dyn Transport>) -> &mut Self {
        self.client = Some(client);
        self
    }

    pub fn set_hook(
        &mut self,
        name: HookName,
        hook: Hook,
    ) -> Result<&mut Self, RegistrationError> {
        self.hooks.set(name, hook)?;
        Ok(self)
    }

    /// Drop a session-level hook so the registry's applies again.
    pub fn remove_hook(&mut self, name: HookName) -> &mut Self {
        self.hooks.remove(name);
        self
    }

    pub fn set_validator(
        &mut self,
        f: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.validator = Some(Validator::new(f));
        self
    }

    /// Drop the session-level validator so the registry's applies again.
    pub fn remove_validator(&mut self) -> &mut Self {
        self.validator = None;
        self
    }

    pub fn request(&self) -> &Value {
        &self.request
    }

    pub fn registry(&self) -> &Arc<GlobalRegistry> {
        &self.registry
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Key of the most recent `fire`.
    pub fn key(&self) -> Option<Key> {
        self.lock().key.clone()
    }

    /// Queue ticket of the most recent `fire`; `None` while queuing is off.
    pub fn ticket(&self) -> Option<TicketId> {
        self.lock().ticket.as_ref().map(Ticket::id)
    }

    fn lock(&self) -> MutexGuard<'_, Current> {
        self.current.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Session state mutex poisoned - continuing with last state");
            PoisonError::into_inner(poisoned)
        })
    }

    fn transition(&self, state: SessionState) {
        let mut current = self.lock();
        current.state = state;
        tracing::trace!(
            key = ?current.key,
            ticket = ?current.ticket.as_ref().map(Ticket::id),
            state = %state,
            "Session transition"
        );
    }

    /// Pull this session out of the queue while it is still waiting.
    ///
    /// Returns `false` for parallel sessions, for sessions that already hold
    /// their key or have finished, and when queuing is off.
    pub fn cancel(&self) -> bool {
        let (queue, ticket) = {
            let current = self.lock();
            if current.parallel {
                return false;
            }
            match (&current.queue, &current.ticket) {
                (Some(queue), Some(ticket)) => (Arc::clone(queue), ticket.clone()),
                _ => return false,
            }
        };
        queue.cancel(&ticket)
    }

    /// Run the call. See the module docs for the full sequence.
    pub async fn fire(&self, options: FireOptions) -> Result<Value, FireError> {
        let parallel = options
            .parallel
            .unwrap_or_else(|| self.registry.default_parallel());
        let key = options.key.unwrap_or_else(Key::generate);
        let queue = self.registry.queue();

        let guard = queue
            .as_ref()
            .map(|queue| AdmissionGuard::register(Arc::clone(queue), key.clone()));
        let ticket = guard.as_ref().and_then(AdmissionGuard::ticket).cloned();

        let ctx = HookContext {
            key: key.clone(),
            ticket: ticket.as_ref().map(Ticket::id),
            parallel,
        };

        *self.lock() = Current {
            state: SessionState::Queued,
            key: Some(key),
            ticket,
            parallel,
            queue,
        };
        tracing::debug!(key = %ctx.key, ticket = ?ctx.ticket, parallel, "Session queued");

        let settled = self.drive(&ctx, guard.as_ref()).await;

        if let Some(guard) = guard {
            guard.release();
        }
        self.transition(SessionState::Released);

        let outcome = match &settled {
            Ok(_) => SessionState::Resolved,
            Err(FireError::Cancelled { .. }) => SessionState::Cancelled,
            Err(_) => SessionState::Rejected,
        };
        self.transition(outcome);
        tracing::debug!(key = %ctx.key, ticket = ?ctx.ticket, outcome = %outcome, "Session settled");

        settled
    }

    async fn drive(
        &self,
        ctx: &HookContext,
        guard: Option<&AdmissionGuard>,
    ) -> Result<Value, FireError> {
        let hooks = HookPipeline::new(Some(&self.hooks), &self.registry);

        let request = hooks
            .update_request_config(self.request.clone())
            .map_err(hook_failed(ctx, HookName::UpdateRequestConfig))?;

        self.transition(SessionState::AwaitingTurn);
        if let Some(guard) = guard {
            guard
                .await_turn(ctx.parallel, self.registry.turn_timeout())
                .await
                .map_err(|e| match e {
                    QueueError::Cancelled => FireError::Cancelled {
                        key: ctx.key.clone(),
                    },
                    QueueError::TimedOut(waited) => {
                        tracing::warn!(key = %ctx.key, ?waited, "Gave up waiting for key");
                        FireError::TurnTimeout {
                            key: ctx.key.clone(),
                            waited,
                        }
                    }
                })?;
        }

        hooks
            .before_fire(ctx)
            .map_err(hook_failed(ctx, HookName::BeforeFire))?;

        self.transition(SessionState::Executing);
        let failure = match self.execute(request).await {
            Ok(result) => {
                self.transition(SessionState::Validating);
                if self.validate(&result) {
                    self.transition(SessionState::Settling);
                    hooks
                        .after_success(&result, ctx)
                        .map_err(hook_failed(ctx, HookName::AfterSuccess))?;
                    return hooks
                        .before_resolve(result, ctx)
                        .map_err(hook_failed(ctx, HookName::BeforeResolve));
                }
                tracing::warn!(key = %ctx.key, "Result refused by validator");
                Failure::Invalid(result)
            }
            Err(e) => {
                tracing::warn!(key = %ctx.key, error = %e, "Transport failed");
                Failure::Transport(e)
            }
        };

        self.transition(SessionState::Settling);
        hooks
            .after_fail(&failure, ctx)
            .map_err(hook_failed(ctx, HookName::AfterFail))?;
        let rejection = hooks
            .before_reject(failure, ctx)
            .map_err(hook_failed(ctx, HookName::BeforeReject))?;
        Err(FireError::Rejected(rejection))
    }

    /// Invoke the resolved client. Panics count as transport failures.
    async fn execute(&self, request: Value) -> Result<Value, TransportError> {
        let Some(client) = self.client.clone().or_else(|| self.registry.client()) else {
            return Err(TransportError::new("no client configured"));
        };

        AssertUnwindSafe(client.call(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(TransportError::from_panic(panic)))
    }

    fn validate(&self, result: &Value) -> bool {
        match &self.validator {
            Some(validator) => validator.check(result),
            None => self.registry.run_validator(result),
        }
    }
}

fn hook_failed(ctx: &HookContext, hook: HookName) -> impl FnOnce(HookError) -> FireError + '_ {
    move |source| {
        tracing::error!(key = %ctx.key, hook = %hook, error = %source, "Hook failed");
        FireError::Hook { hook, source }
    }
}

impl std::fmt::Debug for RequestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.lock();
        f.debug_struct("RequestSession")
            .field("request", &self.request)
            .field("has_client", &self.client.is_some())
            .field("hooks", &self.hooks)
            .field("validator", &self.validator)
            .field("state", &current.state)
            .field("key", &current.key)
            .finish()
    }
}
