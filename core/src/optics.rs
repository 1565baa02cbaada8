//! Optics for type-safe action routing and state focusing.
//!
//! - [`Prism`]: narrows a general action to one variant (`extract`) and lifts
//!   the variant back (`embed`). Used by [`Stream::of_type`](crate::stream::Stream::of_type),
//!   [`typed_reducer`](crate::composition::typed_reducer), and sub-store action
//!   forwarding.
//! - [`Lens`]: reads and writes a sub-part of a state in place. Used by
//!   [`for_key`](crate::composition::for_key).
//!
//! Both hold plain function pointers, so they are `Copy`, `Send`, `Sync`, and
//! can be built in `const` context. The [`prism!`](crate::prism) and
//! [`lens!`](crate::lens) macros, and `#[derive(Action)]` from
//! `epicstore-macros`, generate them without boilerplate.
//!
//! # Laws
//!
//! For every prism and every child value `c`:
//! `prism.extract(&prism.embed(c.clone())) == Some(c)`.
//!
//! The converse does not hold: `embed(extract(p))` is only meaningful when
//! `p` was the matching variant in the first place.

use std::fmt;

/// A matched `(extract, embed)` pair between a parent type `P` and one of its
/// variants `C`.
///
/// # Example
///
/// ```
/// use epicstore_core::optics::Prism;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum AppAction {
///     Counter(i64),
///     Reset,
/// }
///
/// const COUNTER: Prism<AppAction, i64> = Prism::new(
///     |action| match action {
///         AppAction::Counter(n) => Some(*n),
///         _ => None,
///     },
///     AppAction::Counter,
/// );
///
/// assert_eq!(COUNTER.extract(&AppAction::Counter(3)), Some(3));
/// assert_eq!(COUNTER.extract(&AppAction::Reset), None);
/// assert_eq!(COUNTER.embed(7), AppAction::Counter(7));
/// ```
pub struct Prism<P, C> {
    extract: fn(&P) -> Option<C>,
    embed: fn(C) -> P,
}

impl<P, C> Prism<P, C> {
    /// Build a prism from its two halves.
    ///
    /// The caller is responsible for the round-trip law; the macros generate
    /// pairs that satisfy it by construction.
    #[must_use]
    pub const fn new(extract: fn(&P) -> Option<C>, embed: fn(C) -> P) -> Self {
        Self { extract, embed }
    }

    /// Narrow `parent` to the variant, if it is one.
    #[must_use]
    pub fn extract(&self, parent: &P) -> Option<C> {
        (self.extract)(parent)
    }

    /// Lift a variant value into the parent type.
    #[must_use]
    pub fn embed(&self, child: C) -> P {
        (self.embed)(child)
    }

    /// Whether `parent` is the variant this prism focuses on.
    #[must_use]
    pub fn matches(&self, parent: &P) -> bool {
        self.extract(parent).is_some()
    }

    /// The raw `embed` half, for APIs that accept a lifting function.
    #[must_use]
    pub const fn embedder(&self) -> fn(C) -> P {
        self.embed
    }
}

impl<P, C> Clone for Prism<P, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, C> Copy for Prism<P, C> {}

impl<P, C> fmt::Debug for Prism<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prism")
            .field("parent", &std::any::type_name::<P>())
            .field("child", &std::any::type_name::<C>())
            .finish()
    }
}

/// A read/write-in-place accessor from `S` to a part `K`.
///
/// # Example
///
/// ```
/// use epicstore_core::optics::Lens;
///
/// #[derive(Default)]
/// struct AppState {
///     count: i64,
/// }
///
/// let lens: Lens<AppState, i64> = Lens::new(|s| &s.count, |s| &mut s.count);
/// let mut state = AppState::default();
/// *lens.get_mut(&mut state) += 2;
/// assert_eq!(*lens.get(&state), 2);
/// ```
pub struct Lens<S, K> {
    get: fn(&S) -> &K,
    get_mut: fn(&mut S) -> &mut K,
}

impl<S, K> Lens<S, K> {
    /// Build a lens from a shared and a mutable accessor to the same part.
    #[must_use]
    pub const fn new(get: fn(&S) -> &K, get_mut: fn(&mut S) -> &mut K) -> Self {
        Self { get, get_mut }
    }

    /// Borrow the focused part.
    #[must_use]
    pub fn get<'a>(&self, state: &'a S) -> &'a K {
        (self.get)(state)
    }

    /// Mutably borrow the focused part.
    pub fn get_mut<'a>(&self, state: &'a mut S) -> &'a mut K {
        (self.get_mut)(state)
    }
}

impl<S, K> Clone for Lens<S, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, K> Copy for Lens<S, K> {}

impl<S, K> fmt::Debug for Lens<S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens")
            .field("whole", &std::any::type_name::<S>())
            .field("part", &std::any::type_name::<K>())
            .finish()
    }
}
