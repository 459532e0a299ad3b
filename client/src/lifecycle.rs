//! Resource action lifecycle
//!
//! One generic engine drives every network operation of the client:
//!
//! ```text
//! Idle ──execute──▶ Pending ──ok──▶ Succeeded(payload)
//!   ▲                  │
//!   │                  └──err──▶ Failed(message)
//!   └──── reset (from anywhere), clear_error (from Failed)
//! ```
//!
//! [`Lifecycle`] is the state value and its pure transitions.
//! [`LifecycleReducer`] binds it to one resource kind: `Execute` moves to
//! `Pending` and describes exactly one network call as an effect; the
//! effect's outcome comes back as `Succeeded` or `Failed`.
//!
//! Overlapping executes of the same operation are not queued. Which
//! settlement wins is decided by the [`SettlePolicy`].

use crate::error::{ApiError, ConfigError, FALLBACK_ERROR_MESSAGE};
use crate::resource::{Operation, ResourceKind};
use crate::transport::{ApiRequest, ResourceApi};
use motoshop_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use motoshop_runtime::metrics::LifecycleMetrics;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// Where a lifecycle is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing requested, or acknowledged
    Idle,
    /// Request in flight
    Pending,
    /// Last settlement was a success
    Succeeded,
    /// Last settlement was a failure
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

/// State of one network operation
///
/// Payload and error live in different variants, so they can never be
/// set together.
#[derive(Clone, Debug, PartialEq)]
pub enum Lifecycle<T> {
    /// Nothing requested, or acknowledged
    Idle,
    /// Request in flight
    Pending,
    /// Last settlement was a success
    Succeeded(T),
    /// Last settlement was a failure; never empty
    Failed(String),
}

impl<T> Default for Lifecycle<T> {
    fn default() -> Self {
        Self::Idle
    }
}

#[allow(clippy::unused_self)] // Transitions take the old value even when they ignore it
impl<T> Lifecycle<T> {
    /// Current status
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Idle => Status::Idle,
            Self::Pending => Status::Pending,
            Self::Succeeded(_) => Status::Succeeded,
            Self::Failed(_) => Status::Failed,
        }
    }

    /// Payload of the last success
    #[must_use]
    pub const fn payload(&self) -> Option<&T> {
        match self {
            Self::Succeeded(payload) => Some(payload),
            _ => None,
        }
    }

    /// Message of the last failure
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Whether a request is in flight
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Start a request; drops any previous payload or error
    #[must_use]
    pub fn request(self) -> Self {
        Self::Pending
    }

    /// Settle with a payload
    #[must_use]
    pub fn succeed(self, payload: T) -> Self {
        Self::Succeeded(payload)
    }

    /// Settle with a failure
    ///
    /// A blank message is replaced by [`FALLBACK_ERROR_MESSAGE`].
    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Self::Failed(FALLBACK_ERROR_MESSAGE.to_string())
        } else {
            Self::Failed(message)
        }
    }

    /// Back to `Idle` from anywhere
    #[must_use]
    pub fn reset(self) -> Self {
        Self::Idle
    }

    /// Back to `Idle` if failed; otherwise unchanged
    #[must_use]
    pub fn clear_error(self) -> Self {
        match self {
            Self::Failed(_) => Self::Idle,
            other => other,
        }
    }

    /// Read-only `{status, payload, error}` view for rendering
    #[must_use]
    pub fn snapshot(&self) -> LifecycleSnapshot<T>
    where
        T: Clone,
    {
        LifecycleSnapshot {
            status: self.status(),
            payload: self.payload().cloned(),
            error: self.error().map(str::to_string),
        }
    }
}

/// What views render for one lifecycle
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LifecycleSnapshot<T> {
    /// Current status
    pub status: Status,
    /// Present only when succeeded
    pub payload: Option<T>,
    /// Present only when failed
    pub error: Option<String>,
}

/// Which settlement wins when executes of one operation overlap
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettlePolicy {
    /// Every settlement applies; whichever arrives last is what remains
    #[default]
    LastToSettle,
    /// Only the most recently issued execute may settle; older ones are dropped
    LatestIssued,
}

impl SettlePolicy {
    /// Configuration name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LastToSettle => "last-to-settle",
            Self::LatestIssued => "latest-issued",
        }
    }
}

impl FromStr for SettlePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-to-settle" => Ok(Self::LastToSettle),
            "latest-issued" => Ok(Self::LatestIssued),
            other => Err(ConfigError::UnknownSettlePolicy(other.to_string())),
        }
    }
}

/// A lifecycle plus the bookkeeping for overlapping executes
#[derive(Clone, Debug, PartialEq)]
pub struct LifecycleState<T> {
    /// The observable lifecycle
    pub lifecycle: Lifecycle<T>,
    /// Generation of the most recent execute (or reset)
    pub issued: u64,
    /// How overlapping settlements are treated
    pub policy: SettlePolicy,
}

impl<T> Default for LifecycleState<T> {
    fn default() -> Self {
        Self::new(SettlePolicy::default())
    }
}

impl<T> LifecycleState<T> {
    /// Idle lifecycle using `policy`
    #[must_use]
    pub const fn new(policy: SettlePolicy) -> Self {
        Self {
            lifecycle: Lifecycle::Idle,
            issued: 0,
            policy,
        }
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> Status {
        self.lifecycle.status()
    }

    /// Payload of the last success
    #[must_use]
    pub const fn payload(&self) -> Option<&T> {
        self.lifecycle.payload()
    }

    /// Message of the last failure
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.lifecycle.error()
    }

    /// Read-only view for rendering
    #[must_use]
    pub fn snapshot(&self) -> LifecycleSnapshot<T>
    where
        T: Clone,
    {
        self.lifecycle.snapshot()
    }

    /// Whether a settlement tagged `generation` should be applied
    #[must_use]
    pub const fn accepts(&self, generation: u64) -> bool {
        match self.policy {
            SettlePolicy::LastToSettle => true,
            SettlePolicy::LatestIssued => generation == self.issued,
        }
    }

    fn transition(&mut self, f: impl FnOnce(Lifecycle<T>) -> Lifecycle<T>) {
        self.lifecycle = f(std::mem::take(&mut self.lifecycle));
    }
}

/// Inputs to a lifecycle
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleAction<T> {
    /// Start an operation
    Execute(Operation),
    /// The operation issued as `generation` succeeded
    Succeeded {
        /// Execute this settlement belongs to
        generation: u64,
        /// Extracted payload
        payload: T,
    },
    /// The operation issued as `generation` failed
    Failed {
        /// Execute this settlement belongs to
        generation: u64,
        /// Normalized message
        message: String,
    },
    /// Acknowledge and return to `Idle`
    Reset,
    /// Drop a failure message
    ClearError,
}

/// Injected collaborators of lifecycle reducers
#[derive(Clone)]
pub struct ResourceEnvironment {
    /// Backend transport
    pub api: Arc<dyn ResourceApi>,
}

impl ResourceEnvironment {
    /// Environment over `api`
    #[must_use]
    pub fn new(api: Arc<dyn ResourceApi>) -> Self {
        Self { api }
    }
}

/// Lifecycle engine for one resource kind
///
/// `T` is the payload type the operation's envelope field deserializes to:
/// a collection for listings, an entity for details and create, `bool`
/// for update and delete.
pub struct LifecycleReducer<T> {
    kind: ResourceKind,
    _payload: PhantomData<fn() -> T>,
}

impl<T> LifecycleReducer<T> {
    /// Engine bound to `kind`
    #[must_use]
    pub const fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            _payload: PhantomData,
        }
    }

    /// Resource kind this engine talks to
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl<T> Reducer for LifecycleReducer<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type State = LifecycleState<T>;
    type Action = LifecycleAction<T>;
    type Environment = ResourceEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let kind = self.kind;

        match action {
            LifecycleAction::Execute(operation) => {
                state.issued += 1;
                let generation = state.issued;
                state.transition(Lifecycle::request);

                let operation_name = operation.kind().name();
                LifecycleMetrics::record_request(kind.name(), operation_name);
                tracing::debug!(resource = %kind, operation = operation_name, generation, "Request started");

                let api = Arc::clone(&env.api);
                smallvec![async_effect! {
                    let started = Instant::now();
                    let outcome = perform::<T>(api.as_ref(), kind, operation).await;

                    match outcome {
                        Ok(payload) => {
                            LifecycleMetrics::record_settled(kind.name(), operation_name, "succeeded", started.elapsed());
                            Some(LifecycleAction::Succeeded { generation, payload })
                        },
                        Err(error) => {
                            LifecycleMetrics::record_settled(kind.name(), operation_name, error.label(), started.elapsed());
                            tracing::debug!(resource = %kind, operation = operation_name, %error, "Request failed");
                            Some(LifecycleAction::Failed {
                                generation,
                                message: error.normalized(),
                            })
                        },
                    }
                }]
            },

            LifecycleAction::Succeeded { generation, payload } => {
                if !state.accepts(generation) {
                    LifecycleMetrics::record_stale(kind.name(), "succeeded");
                    tracing::debug!(resource = %kind, generation, issued = state.issued, "Dropped stale success");
                    return SmallVec::new();
                }
                tracing::info!(resource = %kind, generation, "Request succeeded");
                state.transition(|lifecycle| lifecycle.succeed(payload));
                SmallVec::new()
            },

            LifecycleAction::Failed { generation, message } => {
                if !state.accepts(generation) {
                    LifecycleMetrics::record_stale(kind.name(), "failed");
                    tracing::debug!(resource = %kind, generation, issued = state.issued, "Dropped stale failure");
                    return SmallVec::new();
                }
                tracing::warn!(resource = %kind, generation, error = %message, "Request failed");
                state.transition(|lifecycle| lifecycle.fail(message));
                SmallVec::new()
            },

            LifecycleAction::Reset => {
                // In-flight settlements become stale under LatestIssued
                state.issued += 1;
                state.transition(Lifecycle::reset);
                SmallVec::new()
            },

            LifecycleAction::ClearError => {
                state.transition(Lifecycle::clear_error);
                SmallVec::new()
            },
        }
    }
}

/// Run one operation: build the request, call, extract and decode the payload
async fn perform<T>(api: &dyn ResourceApi, kind: ResourceKind, operation: Operation) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let (request, payload_field) = ApiRequest::for_operation(kind, operation)?;
    let envelope = api.call(request).await?;
    let payload = payload_field.extract(envelope)?;
    serde_json::from_value(payload).map_err(|e| ApiError::MalformedResponse(e.to_string()))
}
