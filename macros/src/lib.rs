//! Derive macros for the epicstore framework
//!
//! This crate provides procedural macros to reduce boilerplate when routing
//! actions between stores.
//!
//! # Available Macros
//!
//! - `#[derive(Action)]` - Generates a prism per wrapping variant and a
//!   `variant_name()` helper for action enums
//!
//! # Example
//!
//! ```
//! use epicstore_macros::Action;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! #[derive(Action, Clone, Debug, PartialEq)]
//! enum AppAction {
//!     Counter(CounterAction),
//!     Quit,
//! }
//!
//! // Generated items:
//! let action = AppAction::COUNTER.embed(CounterAction::Increment);
//! assert_eq!(AppAction::COUNTER.extract(&action), Some(CounterAction::Increment));
//! assert_eq!(action.variant_name(), "Counter");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, parse_macro_input};

/// Derive macro for action enums
///
/// Generates, on the enum itself:
/// - one associated `const` [`Prism`] per single-field tuple variant, named
///   after the variant in `SCREAMING_SNAKE_CASE` (`SetLeft(i32)` becomes
///   `SET_LEFT: Prism<Self, i32>`). Its `extract` clones the payload, so the
///   payload type must be `Clone`.
/// - `variant_name()` - Returns the variant's name, for logging
///
/// The `Action` trait itself is implemented by a blanket impl for every
/// `Clone + PartialEq + Debug + Send + Sync + 'static` type; this derive does
/// not implement it.
///
/// [`Prism`]: https://docs.rs/epicstore-core/latest/epicstore_core/optics/struct.Prism.html
///
/// # Attributes
///
/// - `#[action(skip)]` - Do not generate a prism for this variant
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a non-enum type
/// - `#[action(skip)]` is placed on a variant with no single-field payload
///
/// # Example
///
/// ```
/// use epicstore_macros::Action;
///
/// #[derive(Action, Clone, Debug, PartialEq)]
/// enum FormAction {
///     SetName(String),
///     SetAge(u8),
///     #[action(skip)]
///     Raw(Vec<u8>),
///     Submit,
/// }
///
/// assert_eq!(FormAction::SET_AGE.extract(&FormAction::SetAge(30)), Some(30));
/// assert!(!FormAction::SET_NAME.matches(&FormAction::Submit));
/// assert_eq!(FormAction::Submit.variant_name(), "Submit");
/// ```
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(&input, "#[derive(Action)] can only be used on enums")
            .to_compile_error()
            .into();
    };
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut prisms = Vec::new();
    let mut name_arms = Vec::new();

    for variant in &data_enum.variants {
        let variant_name = &variant.ident;
        let name_literal = variant_name.to_string();

        name_arms.push(match &variant.fields {
            Fields::Named(_) => quote! { Self::#variant_name { .. } => #name_literal, },
            Fields::Unnamed(_) => quote! { Self::#variant_name(..) => #name_literal, },
            Fields::Unit => quote! { Self::#variant_name => #name_literal, },
        });

        let skip = match skip_attribute(&variant.attrs) {
            Ok(skip) => skip,
            Err(error) => return error.to_compile_error().into(),
        };

        let payload = match &variant.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                fields.unnamed.first().map(|field| &field.ty)
            },
            _ => None,
        };

        let Some(payload) = payload else {
            if skip {
                return syn::Error::new_spanned(
                    variant,
                    "#[action(skip)] is only meaningful on single-field tuple variants",
                )
                .to_compile_error()
                .into();
            }
            continue;
        };

        if skip {
            continue;
        }

        let const_name = Ident::new(&screaming_snake_case(&name_literal), Span::call_site());
        let doc = format!("Prism focusing on the [`{name}::{variant_name}`] variant");

        prisms.push(quote! {
            #[doc = #doc]
            pub const #const_name: ::epicstore_core::optics::Prism<Self, #payload> =
                ::epicstore_core::optics::Prism::new(
                    |parent| match parent {
                        Self::#variant_name(child) => {
                            ::std::option::Option::Some(::std::clone::Clone::clone(child))
                        },
                        #[allow(unreachable_patterns)]
                        _ => ::std::option::Option::None,
                    },
                    Self::#variant_name,
                );
        });
    }

    let expanded = quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #(#prisms)*

            /// Returns the name of this action's variant
            #[must_use]
            pub const fn variant_name(&self) -> &'static str {
                match *self {
                    #(#name_arms)*
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// Whether the attribute list contains `#[action(skip)]`
fn skip_attribute(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut skip = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("action")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported action attribute, expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

/// `SetLeft` -> `SET_LEFT`, `HTTPError` -> `HTTP_ERROR`
fn screaming_snake_case(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);

    for (index, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && index > 0 {
            let previous = chars[index - 1];
            let next_is_lower = chars.get(index + 1).is_some_and(|next| next.is_lowercase());
            if previous != '_'
                && (previous.is_lowercase()
                    || previous.is_ascii_digit()
                    || (previous.is_uppercase() && next_is_lower))
            {
                out.push('_');
            }
        }
        out.extend(c.to_uppercase());
    }

    out
}
