//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`**: Run multiple reducers on the same state/action, in order
//! - **`for_key`**: Focus a reducer on a part of the state through a [`Lens`]
//! - **`typed_reducer`**: Restrict a reducer to one action variant through a [`Prism`]
//! - **`reducer_fn`**: Adapt a plain closure into a [`Reducer`]
//!
//! # Examples
//!
//! ## Building an application reducer
//!
//! ```
//! use epicstore_core::composition::{combine_reducers, for_key, reducer_fn, typed_reducer};
//! use epicstore_core::{lens, prism, Reducer};
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterState {
//!     count: i64,
//! }
//!
//! #[derive(Clone, Debug, Default)]
//! struct AppState {
//!     counter: CounterState,
//!     dispatched: usize,
//! }
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum CounterAction {
//!     Increment,
//!     Decrement,
//! }
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum AppAction {
//!     Counter(CounterAction),
//!     Noop,
//! }
//!
//! let counter = reducer_fn(|state: &mut CounterState, action: &CounterAction| match action {
//!     CounterAction::Increment => state.count += 1,
//!     CounterAction::Decrement => state.count -= 1,
//! });
//!
//! let app = combine_reducers(vec![
//!     Box::new(typed_reducer(
//!         prism!(AppAction::Counter),
//!         for_key(lens!(AppState, counter), counter),
//!     )),
//!     Box::new(reducer_fn(|state: &mut AppState, _: &AppAction| state.dispatched += 1)),
//! ]);
//!
//! let mut state = AppState::default();
//! app.reduce(&mut state, &AppAction::Counter(CounterAction::Increment));
//! app.reduce(&mut state, &AppAction::Noop);
//! assert_eq!(state.counter.count, 1);
//! assert_eq!(state.dispatched, 2);
//! ```

use crate::optics::{Lens, Prism};
use crate::reducer::{BoxedReducer, Reducer};
use std::marker::PhantomData;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is applied in the given order to the same `(state, action)`
/// pair. This is sequential application, not a merge: later reducers see the
/// mutations made by earlier ones, so
/// `combine_reducers([r1, r2])(s, a) == r2(r1(s, a), a)`.
///
/// # Examples
///
/// ```
/// use epicstore_core::composition::{combine_reducers, reducer_fn};
/// use epicstore_core::Reducer;
///
/// let double = reducer_fn(|n: &mut i64, _: &()| *n *= 2);
/// let add_one = reducer_fn(|n: &mut i64, _: &()| *n += 1);
///
/// let combined = combine_reducers(vec![Box::new(double), Box::new(add_one)]);
///
/// let mut n = 5;
/// combined.reduce(&mut n, &());
/// assert_eq!(n, 11);
/// ```
#[must_use]
pub fn combine_reducers<S, A>(reducers: Vec<BoxedReducer<S, A>>) -> CombinedReducer<S, A> {
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A> {
    reducers: Vec<BoxedReducer<S, A>>,
}

impl<S, A> CombinedReducer<S, A> {
    /// Number of reducers in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Whether the chain is empty (and therefore a no-op).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, A> Reducer for CombinedReducer<S, A> {
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        for reducer in &self.reducers {
            reducer.reduce(state, action);
        }
    }
}

/// Lifts a reducer over a part `K` of the state into a reducer over the
/// whole state `S`.
///
/// The part is reduced in place through the lens; everything outside it is
/// left untouched.
///
/// # Examples
///
/// ```
/// use epicstore_core::composition::{for_key, reducer_fn};
/// use epicstore_core::{lens, Reducer};
///
/// #[derive(Default)]
/// struct AppState {
///     clicks: u32,
///     title: String,
/// }
///
/// let clicks = for_key(lens!(AppState, clicks), reducer_fn(|n: &mut u32, _: &()| *n += 1));
///
/// let mut state = AppState { clicks: 0, title: "home".into() };
/// clicks.reduce(&mut state, &());
/// assert_eq!(state.clicks, 1);
/// assert_eq!(state.title, "home");
/// ```
pub fn for_key<S, K, R>(lens: Lens<S, K>, reducer: R) -> KeyedReducer<S, K, R>
where
    R: Reducer<State = K>,
{
    KeyedReducer { lens, reducer }
}

/// A reducer focused on one part of a larger state.
///
/// Created by [`for_key`].
pub struct KeyedReducer<S, K, R> {
    lens: Lens<S, K>,
    reducer: R,
}

impl<S, K, R> Reducer for KeyedReducer<S, K, R>
where
    R: Reducer<State = K>,
{
    type State = S;
    type Action = R::Action;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        self.reducer.reduce(self.lens.get_mut(state), action);
    }
}

/// Restricts a reducer written for one action variant `C` to a parent action
/// type `A`.
///
/// The inner reducer runs only when `prism.extract(action)` yields a value;
/// for every other variant the result is a no-op.
///
/// # Examples
///
/// ```
/// use epicstore_core::composition::{reducer_fn, typed_reducer};
/// use epicstore_core::{prism, Reducer};
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum AppAction {
///     Add(i64),
///     Ignored,
/// }
///
/// let add = typed_reducer(prism!(AppAction::Add), reducer_fn(|n: &mut i64, by: &i64| *n += by));
///
/// let mut n = 1;
/// add.reduce(&mut n, &AppAction::Add(4));
/// add.reduce(&mut n, &AppAction::Ignored);
/// assert_eq!(n, 5);
/// ```
pub fn typed_reducer<A, R>(prism: Prism<A, R::Action>, reducer: R) -> TypedReducer<A, R>
where
    R: Reducer,
{
    TypedReducer { prism, reducer }
}

/// A reducer narrowed to one action variant.
///
/// Created by [`typed_reducer`].
pub struct TypedReducer<A, R>
where
    R: Reducer,
{
    prism: Prism<A, R::Action>,
    reducer: R,
}

impl<A, R> Reducer for TypedReducer<A, R>
where
    R: Reducer,
{
    type State = R::State;
    type Action = A;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        if let Some(narrowed) = self.prism.extract(action) {
            self.reducer.reduce(state, &narrowed);
        }
    }
}

/// Adapts a closure `Fn(&mut S, &A)` into a [`Reducer`].
pub fn reducer_fn<S, A, F>(f: F) -> FnReducer<S, A, F>
where
    F: Fn(&mut S, &A),
{
    FnReducer {
        f,
        _phantom: PhantomData,
    }
}

/// A reducer backed by a closure.
///
/// Created by [`reducer_fn`].
pub struct FnReducer<S, A, F> {
    f: F,
    _phantom: PhantomData<fn(&mut S, &A)>,
}

impl<S, A, F> Reducer for FnReducer<S, A, F>
where
    F: Fn(&mut S, &A),
{
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        (self.f)(state, action);
    }
}
