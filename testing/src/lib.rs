//! # Motoshop Testing
//!
//! Testing utilities and helpers for the Motoshop client.
//!
//! This crate provides:
//! - [`ReducerTest`], a Given-When-Then builder for reducers
//! - Assertion helpers for effects
//! - Helpers that execute effect descriptions without a store
//!
//! ## Example
//!
//! ```ignore
//! use motoshop_testing::{ReducerTest, helpers::run_effects};
//!
//! #[tokio::test]
//! async fn list_settles() {
//!     let mut state = LifecycleState::default();
//!     let effects = reducer.reduce(&mut state, LifecycleAction::Execute(op), &env);
//!     for action in run_effects(effects).await {
//!         reducer.reduce(&mut state, action, &env);
//!     }
//!     assert!(state.lifecycle.payload().is_some());
//! }
//! ```


pub use reducer_test::{ReducerTest, assertions};

/// Test helpers and utilities
pub mod helpers {
    use futures::future::{BoxFuture, FutureExt, join_all};
    use motoshop_core::effect::Effect;

    /// Execute effect descriptions and collect the actions they produce
    ///
    /// Parallel effects run concurrently; the returned actions follow the
    /// order in which the effects were described, not the order in which
    /// they finished.
    pub async fn run_effects<A, I>(effects: I) -> Vec<A>
    where
        A: Send + 'static,
        I: IntoIterator<Item = Effect<A>>,
    {
        let pending: Vec<_> = effects.into_iter().map(run_effect).collect();
        join_all(pending).await.into_iter().flatten().collect()
    }

    fn run_effect<A>(effect: Effect<A>) -> BoxFuture<'static, Vec<A>>
    where
        A: Send + 'static,
    {
        match effect {
            Effect::None => futures::future::ready(Vec::new()).boxed(),
            Effect::Future(fut) => fut.map(|action| action.into_iter().collect()).boxed(),
            Effect::Parallel(effects) => run_effects(effects).boxed(),
        }
    }

    /// Install a test-friendly tracing subscriber
    ///
    /// Safe to call from every test; only the first call installs.
    /// Honours `RUST_LOG`.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}
