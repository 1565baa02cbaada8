//! Declarative macros for ergonomic optics construction
//!
//! These macros remove the boilerplate of writing `extract`/`embed` and
//! `get`/`get_mut` pairs by hand. Because they are generated from a single
//! variant or field path, the halves always agree with each other.

/// Create a [`Prism`](crate::optics::Prism) for a single-field tuple variant
///
/// The variant's payload must be `Clone`.
///
/// # Example
///
/// ```
/// use epicstore_core::{prism, Prism};
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum CounterAction {
///     Increment,
/// }
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum AppAction {
///     Counter(CounterAction),
///     Quit,
/// }
///
/// let counter: Prism<AppAction, CounterAction> = prism!(AppAction::Counter);
/// assert_eq!(
///     counter.extract(&AppAction::Counter(CounterAction::Increment)),
///     Some(CounterAction::Increment)
/// );
/// assert_eq!(counter.extract(&AppAction::Quit), None);
/// ```
#[macro_export]
macro_rules! prism {
    ($($variant:ident)::+) => {
        $crate::optics::Prism::new(
            |parent| match parent {
                $($variant)::+(child) => {
                    ::std::option::Option::Some(::std::clone::Clone::clone(child))
                },
                #[allow(unreachable_patterns)]
                _ => ::std::option::Option::None,
            },
            $($variant)::+,
        )
    };
}

/// Create a [`Lens`](crate::optics::Lens) for a (possibly nested) field path
///
/// # Example
///
/// ```
/// use epicstore_core::lens;
///
/// #[derive(Default)]
/// struct Settings {
///     volume: u8,
/// }
///
/// #[derive(Default)]
/// struct AppState {
///     settings: Settings,
/// }
///
/// let volume = lens!(AppState, settings.volume);
/// let mut state = AppState::default();
/// *volume.get_mut(&mut state) = 7;
/// assert_eq!(state.settings.volume, 7);
/// ```
#[macro_export]
macro_rules! lens {
    ($state:ty, $($field:ident).+) => {
        $crate::optics::Lens::<$state, _>::new(
            |state| &state.$($field).+,
            |state| &mut state.$($field).+,
        )
    };
}
