//! Lifecycle hooks.
//!
//! Each hook name has one callback shape. Hooks live in two tiers: the
//! registry's defaults and a session's overrides. Resolution checks the
//! session first, then the registry, then falls back to pass-through.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Failure, HookError, RegistrationError};
use crate::key::{Key, TicketId};
use crate::registry::GlobalRegistry;

/// Recognized hook points, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookName {
    #[serde(rename = "update.request-config")]
    UpdateRequestConfig,
    #[serde(rename = "before.fire")]
    BeforeFire,
    #[serde(rename = "after.success")]
    AfterSuccess,
    #[serde(rename = "after.fail")]
    AfterFail,
    #[serde(rename = "before.resolve")]
    BeforeResolve,
    #[serde(rename = "before.reject")]
    BeforeReject,
}

impl HookName {
    pub const ALL: [HookName; 6] = [
        HookName::UpdateRequestConfig,
        HookName::BeforeFire,
        HookName::AfterSuccess,
        HookName::AfterFail,
        HookName::BeforeResolve,
        HookName::BeforeReject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpdateRequestConfig => "update.request-config",
            Self::BeforeFire => "before.fire",
            Self::AfterSuccess => "after.success",
            Self::AfterFail => "after.fail",
            Self::BeforeResolve => "before.resolve",
            Self::BeforeReject => "before.reject",
        }
    }
}

impl std::fmt::Display for HookName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HookName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown hook name: {s}"))
    }
}

/// What every hook after `update.request-config` sees about the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookContext {
    pub key: Key,
    pub ticket: Option<TicketId>,
    pub parallel: bool,
}

/// Rewrites the outgoing request payload.
pub type RequestHookFn = dyn Fn(Value) -> Result<Value, HookError> + Send + Sync;
/// Side effect before the transport runs.
pub type FireHookFn = dyn Fn(&HookContext) -> Result<(), HookError> + Send + Sync;
/// Side effect after a validated result.
pub type SuccessHookFn = dyn Fn(&Value, &HookContext) -> Result<(), HookError> + Send + Sync;
/// Side effect after a refused result or a transport error.
pub type FailHookFn = dyn Fn(&Failure, &HookContext) -> Result<(), HookError> + Send + Sync;
/// Maps the result the caller will resolve with.
pub type ResolveHookFn = dyn Fn(Value, &HookContext) -> Result<Value, HookError> + Send + Sync;
/// Maps the failure the caller will be rejected with.
pub type RejectHookFn = dyn Fn(Failure, &HookContext) -> Result<Failure, HookError> + Send + Sync;

/// A callback bound to one hook point.
#[derive(Clone)]
pub enum Hook {
    UpdateRequestConfig(Arc<RequestHookFn>),
    BeforeFire(Arc<FireHookFn>),
    AfterSuccess(Arc<SuccessHookFn>),
    AfterFail(Arc<FailHookFn>),
    BeforeResolve(Arc<ResolveHookFn>),
    BeforeReject(Arc<RejectHookFn>),
}

impl Hook {
    pub fn update_request_config(
        f: impl Fn(Value) -> Result<Value, HookError> + Send + Sync + 'static,
    ) -> Self {
        Self::UpdateRequestConfig(Arc::new(f))
    }

    pub fn before_fire(
        f: impl Fn(&HookContext) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        Self::BeforeFire(Arc::new(f))
    }

    pub fn after_success(
        f: impl Fn(&Value, &HookContext) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        Self::AfterSuccess(Arc::new(f))
    }

    pub fn after_fail(
        f: impl Fn(&Failure, &HookContext) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        Self::AfterFail(Arc::new(f))
    }

    pub fn before_resolve(
        f: impl Fn(Value, &HookContext) -> Result<Value, HookError> + Send + Sync + 'static,
    ) -> Self {
        Self::BeforeResolve(Arc::new(f))
    }

    pub fn before_reject(
        f: impl Fn(Failure, &HookContext) -> Result<Failure, HookError> + Send + Sync + 'static,
    ) -> Self {
        Self::BeforeReject(Arc::new(f))
    }

    pub fn name(&self) -> HookName {
        match self {
            Self::UpdateRequestConfig(_) => HookName::UpdateRequestConfig,
            Self::BeforeFire(_) => HookName::BeforeFire,
            Self::AfterSuccess(_) => HookName::AfterSuccess,
            Self::AfterFail(_) => HookName::AfterFail,
            Self::BeforeResolve(_) => HookName::BeforeResolve,
            Self::BeforeReject(_) => HookName::BeforeReject,
        }
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Hook").field(&self.name()).finish()
    }
}

/// One tier of hooks. Last write wins per name.
#[derive(Debug, Clone, Default)]
pub struct HookSet {
    hooks: HashMap<HookName, Hook>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity hooks for `update.request-config`, `before.resolve` and
    /// `before.reject`.
    pub fn pass_through() -> Self {
        let mut set = Self::new();
        set.insert(Hook::update_request_config(|request| Ok(request)));
        set.insert(Hook::before_resolve(|result, _| Ok(result)));
        set.insert(Hook::before_reject(|failure, _| Ok(failure)));
        set
    }

    /// Register `hook` under `name`, refusing a callback shaped for another
    /// hook point.
    pub fn set(&mut self, name: HookName, hook: Hook) -> Result<(), RegistrationError> {
        if hook.name() != name {
            return Err(RegistrationError::InvalidArgument {
                expected: name,
                found: hook.name(),
            });
        }
        self.insert(hook);
        Ok(())
    }

    fn insert(&mut self, hook: Hook) {
        self.hooks.insert(hook.name(), hook);
    }

    pub fn get(&self, name: HookName) -> Option<&Hook> {
        self.hooks.get(&name)
    }

    pub fn remove(&mut self, name: HookName) -> Option<Hook> {
        self.hooks.remove(&name)
    }

    pub fn contains(&self, name: HookName) -> bool {
        self.hooks.contains_key(&name)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Two-tier hook resolution for one call.
///
/// Absent transforming hooks pass their input through unchanged; absent
/// side-effect hooks do nothing.
pub struct HookPipeline<'a> {
    local: Option<&'a HookSet>,
    registry: &'a GlobalRegistry,
}

impl<'a> HookPipeline<'a> {
    pub fn new(local: Option<&'a HookSet>, registry: &'a GlobalRegistry) -> Self {
        Self { local, registry }
    }

    pub fn resolve(&self, name: HookName) -> Option<Hook> {
        self.local
            .and_then(|set| set.get(name).cloned())
            .or_else(|| self.registry.hook(name))
    }

    pub fn update_request_config(&self, request: Value) -> Result<Value, HookError> {
        match self.resolve(HookName::UpdateRequestConfig) {
            Some(Hook::UpdateRequestConfig(f)) => f(request),
            _ => Ok(request),
        }
    }

    pub fn before_fire(&self, ctx: &HookContext) -> Result<(), HookError> {
        match self.resolve(HookName::BeforeFire) {
            Some(Hook::BeforeFire(f)) => f(ctx),
            _ => Ok(()),
        }
    }

    pub fn after_success(&self, result: &Value, ctx: &HookContext) -> Result<(), HookError> {
        match self.resolve(HookName::AfterSuccess) {
            Some(Hook::AfterSuccess(f)) => f(result, ctx),
            _ => Ok(()),
        }
    }

    pub fn after_fail(&self, failure: &Failure, ctx: &HookContext) -> Result<(), HookError> {
        match self.resolve(HookName::AfterFail) {
            Some(Hook::AfterFail(f)) => f(failure, ctx),
            _ => Ok(()),
        }
    }

    pub fn before_resolve(&self, result: Value, ctx: &HookContext) -> Result<Value, HookError> {
        match self.resolve(HookName::BeforeResolve) {
            Some(Hook::BeforeResolve(f)) => f(result, ctx),
            _ => Ok(result),
        }
    }

    pub fn before_reject(&self, failure: Failure, ctx: &HookContext) -> Result<Failure, HookError> {
        match self.resolve(HookName::BeforeReject) {
            Some(Hook::BeforeReject(f)) => f(failure, ctx),
            _ => Ok(failure),
        }
    }
}
