//! Proc macros for sprig: `view!` RSX composition.
//!
//! This crate is not meant to be used directly; enable the `macros` feature on `sprig`.

use proc_macro::TokenStream;

mod view_macro;

/// RSX-style view macro.
///
/// Transforms JSX-like syntax into a sprig [`Builder`] that issues `element`,
/// `attribute`, `eventlistener` and `text` requests.
///
/// # Syntax
///
/// - `<tag />`: element with no children
/// - `<tag attr="val"> ... </tag>`: element with children
/// - `"text"`: a text node
/// - `{expr}`: a text node from any `ToString` value
///
/// # Attributes
///
/// - `name="value"` and `name={expr}` set an attribute; `expr` is anything
///   convertible into an attribute value
/// - a bare `name` sets a boolean attribute
/// - `on:event={handler}` attaches a listener
///
/// Every `{expr}` is evaluated when the view builds, before any request is
/// issued, and only borrows what it captures: `{name}` and `class={cls}` work
/// with owned `String`s. Handlers are moved into the listener, so a handler
/// closure may capture `Copy` values (signals are) or clones made before the
/// `view!`.
///
/// # Example
///
/// ```ignore
/// let view = view! {
///     <div class="counter">
///         <button on:click={move |_| set_count.update(|n| *n += 1)}>"+"</button>
///         <span>{count.get_untracked()}</span>
///     </div>
/// };
/// engine.mount(view)?;
/// ```
///
/// [`Builder`]: https://docs.rs/sprig/latest/sprig/request/type.Builder.html
#[proc_macro]
pub fn view(input: TokenStream) -> TokenStream {
    view_macro::view_impl(input.into())
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
