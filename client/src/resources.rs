//! Per-resource wiring of the lifecycle engine
//!
//! Every resource kind gets the same six independent lifecycles, one per
//! operation slot. [`ResourceReducer`] scopes one [`LifecycleReducer`] onto
//! each slot, so a listing in flight never disturbs a delete that just
//! failed.

use crate::lifecycle::{LifecycleAction, LifecycleReducer, LifecycleState, ResourceEnvironment, SettlePolicy};
use crate::resource::{Operation, RequestBody, ResourceKind};
use motoshop_core::composition::{CombinedReducer, combine_reducers, scope_reducer};
use motoshop_core::{Effect, Reducer, SmallVec};
use serde::de::DeserializeOwned;
use std::fmt;

/// Bounds every record type stored in resource lifecycles satisfies
pub trait ResourceRecord: DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> ResourceRecord for T where T: DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {}

/// Operation slots of a resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Admin listing
    List,
    /// The user's own records
    Owned,
    /// Single record
    Details,
    /// Creation
    Create,
    /// Update
    Update,
    /// Deletion
    Delete,
}

/// Independent lifecycles of one resource kind
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceState<E> {
    /// Admin listing
    pub list: LifecycleState<Vec<E>>,
    /// The user's own records
    pub owned: LifecycleState<Vec<E>>,
    /// Single record
    pub details: LifecycleState<E>,
    /// Creation; payload is the created record
    pub create: LifecycleState<E>,
    /// Update; payload is the server's success flag
    pub update: LifecycleState<bool>,
    /// Deletion; payload is the server's success flag
    pub delete: LifecycleState<bool>,
}

impl<E> Default for ResourceState<E> {
    fn default() -> Self {
        Self::with_settle_policy(SettlePolicy::default())
    }
}

impl<E> ResourceState<E> {
    /// Idle lifecycles sharing one settle policy
    #[must_use]
    pub const fn with_settle_policy(policy: SettlePolicy) -> Self {
        Self {
            list: LifecycleState::new(policy),
            owned: LifecycleState::new(policy),
            details: LifecycleState::new(policy),
            create: LifecycleState::new(policy),
            update: LifecycleState::new(policy),
            delete: LifecycleState::new(policy),
        }
    }

    /// Whether any slot has a request in flight
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.list.lifecycle.is_pending()
            || self.owned.lifecycle.is_pending()
            || self.details.lifecycle.is_pending()
            || self.create.lifecycle.is_pending()
            || self.update.lifecycle.is_pending()
            || self.delete.lifecycle.is_pending()
    }

    /// Failure messages of every failed slot
    #[must_use]
    pub fn errors(&self) -> Vec<(Slot, &str)> {
        [
            (Slot::List, self.list.error()),
            (Slot::Owned, self.owned.error()),
            (Slot::Details, self.details.error()),
            (Slot::Create, self.create.error()),
            (Slot::Update, self.update.error()),
            (Slot::Delete, self.delete.error()),
        ]
        .into_iter()
        .filter_map(|(slot, error)| error.map(|error| (slot, error)))
        .collect()
    }
}

/// Inputs to a resource's lifecycles
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceAction<E> {
    /// Admin listing slot
    List(LifecycleAction<Vec<E>>),
    /// Own records slot
    Owned(LifecycleAction<Vec<E>>),
    /// Single record slot
    Details(LifecycleAction<E>),
    /// Creation slot
    Create(LifecycleAction<E>),
    /// Update slot
    Update(LifecycleAction<bool>),
    /// Deletion slot
    Delete(LifecycleAction<bool>),
    /// Drop the failure message of every slot
    ClearErrors,
}

impl<E> ResourceAction<E> {
    /// Fetch the admin listing
    #[must_use]
    pub const fn list() -> Self {
        Self::List(LifecycleAction::Execute(Operation::List))
    }

    /// Fetch the user's own records
    #[must_use]
    pub const fn owned() -> Self {
        Self::Owned(LifecycleAction::Execute(Operation::ListOwn))
    }

    /// Fetch one record
    #[must_use]
    pub fn details(id: impl Into<String>) -> Self {
        Self::Details(LifecycleAction::Execute(Operation::Details { id: id.into() }))
    }

    /// Create a record
    #[must_use]
    pub const fn create(body: RequestBody) -> Self {
        Self::Create(LifecycleAction::Execute(Operation::Create { body }))
    }

    /// Update a record
    #[must_use]
    pub fn update(id: impl Into<String>, body: RequestBody) -> Self {
        Self::Update(LifecycleAction::Execute(Operation::Update { id: id.into(), body }))
    }

    /// Delete a record
    #[must_use]
    pub fn delete(id: impl Into<String>) -> Self {
        Self::Delete(LifecycleAction::Execute(Operation::Delete { id: id.into() }))
    }

    /// Return one slot to `Idle`
    #[must_use]
    pub const fn reset(slot: Slot) -> Self {
        match slot {
            Slot::List => Self::List(LifecycleAction::Reset),
            Slot::Owned => Self::Owned(LifecycleAction::Reset),
            Slot::Details => Self::Details(LifecycleAction::Reset),
            Slot::Create => Self::Create(LifecycleAction::Reset),
            Slot::Update => Self::Update(LifecycleAction::Reset),
            Slot::Delete => Self::Delete(LifecycleAction::Reset),
        }
    }

    /// Drop every failure message
    #[must_use]
    pub const fn clear_errors() -> Self {
        Self::ClearErrors
    }
}

/// The six lifecycles of one resource kind
pub struct ResourceReducer<E: ResourceRecord> {
    kind: ResourceKind,
    slots: CombinedReducer<ResourceState<E>, ResourceAction<E>, ResourceEnvironment>,
}

impl<E: ResourceRecord> ResourceReducer<E> {
    /// Reducer for `kind`
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        let slots = combine_reducers(vec![
            Box::new(scope_reducer(
                LifecycleReducer::<Vec<E>>::new(kind),
                |state: &mut ResourceState<E>| &mut state.list,
                |env: &ResourceEnvironment| env,
                |action: ResourceAction<E>| match action {
                    ResourceAction::List(action) => Some(action),
                    ResourceAction::ClearErrors => Some(LifecycleAction::ClearError),
                    _ => None,
                },
                ResourceAction::List,
            )),
            Box::new(scope_reducer(
                LifecycleReducer::<Vec<E>>::new(kind),
                |state: &mut ResourceState<E>| &mut state.owned,
                |env: &ResourceEnvironment| env,
                |action: ResourceAction<E>| match action {
                    ResourceAction::Owned(action) => Some(action),
                    ResourceAction::ClearErrors => Some(LifecycleAction::ClearError),
                    _ => None,
                },
                ResourceAction::Owned,
            )),
            Box::new(scope_reducer(
                LifecycleReducer::<E>::new(kind),
                |state: &mut ResourceState<E>| &mut state.details,
                |env: &ResourceEnvironment| env,
                |action: ResourceAction<E>| match action {
                    ResourceAction::Details(action) => Some(action),
                    ResourceAction::ClearErrors => Some(LifecycleAction::ClearError),
                    _ => None,
                },
                ResourceAction::Details,
            )),
            Box::new(scope_reducer(
                LifecycleReducer::<E>::new(kind),
                |state: &mut ResourceState<E>| &mut state.create,
                |env: &ResourceEnvironment| env,
                |action: ResourceAction<E>| match action {
                    ResourceAction::Create(action) => Some(action),
                    ResourceAction::ClearErrors => Some(LifecycleAction::ClearError),
                    _ => None,
                },
                ResourceAction::Create,
            )),
            Box::new(scope_reducer(
                LifecycleReducer::<bool>::new(kind),
                |state: &mut ResourceState<E>| &mut state.update,
                |env: &ResourceEnvironment| env,
                |action: ResourceAction<E>| match action {
                    ResourceAction::Update(action) => Some(action),
                    ResourceAction::ClearErrors => Some(LifecycleAction::ClearError),
                    _ => None,
                },
                ResourceAction::Update,
            )),
            Box::new(scope_reducer(
                LifecycleReducer::<bool>::new(kind),
                |state: &mut ResourceState<E>| &mut state.delete,
                |env: &ResourceEnvironment| env,
                |action: ResourceAction<E>| match action {
                    ResourceAction::Delete(action) => Some(action),
                    ResourceAction::ClearErrors => Some(LifecycleAction::ClearError),
                    _ => None,
                },
                ResourceAction::Delete,
            )),
        ]);

        Self { kind, slots }
    }

    /// Resource kind this reducer talks to
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl<E: ResourceRecord> Reducer for ResourceReducer<E> {
    type State = ResourceState<E>;
    type Action = ResourceAction<E>;
    type Environment = ResourceEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        self.slots.reduce(state, action, env)
    }
}
