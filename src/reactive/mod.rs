//! Reactive state: signals, effects, memos, observers.
//!
//! Leptos-style fine-grained reactivity. Signals feed two kinds of observers:
//!
//! - effects ([`create_effect`]) re-run their closure immediately on change;
//! - notifiers ([`create_observer`]) only get a callback; the engine's
//!   reactive plugin uses them to schedule a slot refresh for the next flush.
//!
//! [`batch`] coalesces multiple writes into one notification pass. Effects
//! and memos created while a slot builds belong to that slot (see
//! [`with_owner`]) and are disposed when it is refreshed or torn down.

pub mod effect;
pub mod runtime;
pub mod signal;

pub use effect::{create_effect, create_effect_with_id, create_memo, dispose_effect};
pub use runtime::{
    batch, create_observer, dispose_observer, observer_exists, track, untrack, with_owner,
    EffectId, EffectOwner, ObserverId, SignalId,
};
pub use signal::{create_signal, ReadSignal, WriteSignal};
