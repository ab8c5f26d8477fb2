//! Thread-local reactive runtime: signal storage, observers, tracking.
//!
//! Single-threaded and synchronous. An *observer* is anything that can depend
//! on signals: an effect (re-runs its closure when notified) or a notifier
//! (calls a callback, e.g. to schedule a slot refresh on an engine).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Identifies a signal inside the runtime.
    pub struct SignalId;

    /// Identifies an observer (effect or notifier) inside the runtime.
    pub struct ObserverId;
}

/// Effects are observers that re-run their own closure.
pub type EffectId = ObserverId;

// ---------------------------------------------------------------------------
// Runtime internals
// ---------------------------------------------------------------------------

pub(crate) struct SignalState {
    /// Shared so readers hold the value without a borrow on the runtime.
    pub(crate) value: Rc<RefCell<dyn Any>>,
    /// Insertion-ordered so notification order is deterministic.
    pub(crate) subscribers: Vec<ObserverId>,
}

enum Reaction {
    /// Wrapped in `Option` so the closure can be taken out while it runs
    /// (no `RefMut` on the runtime across the user callback).
    Effect(Option<Box<dyn FnMut()>>),
    Notify(Rc<dyn Fn()>),
}

struct ObserverState {
    reaction: Reaction,
    dependencies: Vec<SignalId>,
}

pub(crate) struct Runtime {
    pub(crate) signals: SlotMap<SignalId, SignalState>,
    observers: SlotMap<ObserverId, ObserverState>,
    /// The observer currently executing (for auto-tracking).
    tracking: Option<ObserverId>,
    /// When > 0 we are inside a `batch()` call and notifications are deferred.
    batch_depth: usize,
    /// Observers to notify once the outermost batch or notification pass ends.
    pending: Vec<ObserverId>,
    /// Set while the notification loop runs, so nested writes queue instead
    /// of recursing.
    notifying: bool,
    /// Told about every effect created while set; see [`with_owner`].
    owner: Option<EffectOwner>,
}

/// Receives effects created under [`with_owner`].
pub type EffectOwner = Rc<dyn Fn(EffectId)>;

impl Runtime {
    fn new() -> Self {
        Self {
            signals: SlotMap::with_key(),
            observers: SlotMap::with_key(),
            tracking: None,
            batch_depth: 0,
            pending: Vec::new(),
            notifying: false,
            owner: None,
        }
    }

    /// Record that the tracking observer (if any) read `signal`.
    pub(crate) fn track_read(&mut self, signal: SignalId) {
        let Some(observer) = self.tracking else {
            return;
        };
        let Some(state) = self.observers.get_mut(observer) else {
            return;
        };
        if !state.dependencies.contains(&signal) {
            state.dependencies.push(signal);
        }
        if let Some(sig) = self.signals.get_mut(signal) {
            if !sig.subscribers.contains(&observer) {
                sig.subscribers.push(observer);
            }
        }
    }

    fn clear_dependencies(&mut self, observer: ObserverId) {
        let Some(state) = self.observers.get_mut(observer) else {
            return;
        };
        for sid in std::mem::take(&mut state.dependencies) {
            if let Some(sig) = self.signals.get_mut(sid) {
                sig.subscribers.retain(|&o| o != observer);
            }
        }
    }
}

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
}

/// Run `f` with mutable access to the runtime. `f` must not call back into
/// user code.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Register a notifier: `notify` is called (without re-tracking) whenever a
/// signal read under [`track`] for this observer changes.
pub fn create_observer(notify: impl Fn() + 'static) -> ObserverId {
    with_runtime(|rt| {
        rt.observers.insert(ObserverState {
            reaction: Reaction::Notify(Rc::new(notify)),
            dependencies: Vec::new(),
        })
    })
}

pub(crate) fn insert_effect(f: Box<dyn FnMut()>) -> EffectId {
    let (eid, owner) = with_runtime(|rt| {
        let eid = rt.observers.insert(ObserverState {
            reaction: Reaction::Effect(Some(f)),
            dependencies: Vec::new(),
        });
        (eid, rt.owner.clone())
    });
    if let Some(owner) = owner {
        owner(eid);
    }
    eid
}

/// Run `f` with `owner` told about every effect and memo created inside it.
///
/// The engine uses this to dispose effects created by a builder when the
/// slot that ran it is refreshed or torn down.
pub fn with_owner<R>(owner: EffectOwner, f: impl FnOnce() -> R) -> R {
    let prev = with_runtime(|rt| rt.owner.replace(owner));
    let result = f();
    with_runtime(|rt| rt.owner = prev);
    result
}

/// Remove an observer and unsubscribe it from every signal.
pub fn dispose_observer(observer: ObserverId) {
    with_runtime(|rt| {
        rt.clear_dependencies(observer);
        rt.observers.remove(observer);
        rt.pending.retain(|&o| o != observer);
    });
}

/// Whether the observer is still registered.
pub fn observer_exists(observer: ObserverId) -> bool {
    with_runtime(|rt| rt.observers.contains_key(observer))
}

/// Run `f` with `observer` as the tracking context.
///
/// Previous dependencies of `observer` are dropped first, so after the call
/// the observer depends on exactly the signals `f` read.
pub fn track<R>(observer: ObserverId, f: impl FnOnce() -> R) -> R {
    let prev = with_runtime(|rt| {
        rt.clear_dependencies(observer);
        rt.tracking.replace(observer)
    });
    let result = f();
    with_runtime(|rt| rt.tracking = prev);
    result
}

/// Run `f` without any tracking context.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let prev = with_runtime(|rt| rt.tracking.take());
    let result = f();
    with_runtime(|rt| rt.tracking = prev);
    result
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Batch multiple signal writes so that each observer is notified once.
///
/// ```ignore
/// batch(|| {
///     set_a.set(1);
///     set_b.set(2);
/// });
/// // Observers of a and/or b are notified once here.
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    with_runtime(|rt| rt.batch_depth += 1);
    let result = f();
    let pending = with_runtime(|rt| {
        rt.batch_depth -= 1;
        if rt.batch_depth == 0 {
            std::mem::take(&mut rt.pending)
        } else {
            Vec::new()
        }
    });
    notify_subscribers(pending);
    result
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Run a single effect under tracking.
pub(crate) fn run_effect(eid: EffectId) {
    let maybe_cb = with_runtime(|rt| match rt.observers.get_mut(eid) {
        Some(ObserverState {
            reaction: Reaction::Effect(cb),
            ..
        }) => cb.take(),
        _ => None,
    });
    let Some(mut cb) = maybe_cb else {
        return;
    };

    track(eid, || cb());

    with_runtime(|rt| {
        // Put the callback back only if the effect survived its own run.
        if let Some(ObserverState {
            reaction: Reaction::Effect(slot),
            ..
        }) = rt.observers.get_mut(eid)
        {
            *slot = Some(cb);
        }
    });
}

fn notify_one(observer: ObserverId) {
    let notifier = with_runtime(|rt| match rt.observers.get(observer) {
        Some(ObserverState {
            reaction: Reaction::Notify(f),
            ..
        }) => Some(f.clone()),
        _ => None,
    });
    match notifier {
        Some(notify) => notify(),
        None => run_effect(observer),
    }
}

/// Notify observers that a signal changed.
pub(crate) fn notify_subscribers(subs: Vec<ObserverId>) {
    if subs.is_empty() {
        return;
    }

    // Inside a batch or an ongoing notification pass: queue and return.
    let deferred = with_runtime(|rt| {
        if rt.batch_depth > 0 || rt.notifying {
            for s in &subs {
                if !rt.pending.contains(s) {
                    rt.pending.push(*s);
                }
            }
            true
        } else {
            rt.notifying = true;
            false
        }
    });
    if deferred {
        return;
    }

    let mut queue = subs;
    while !queue.is_empty() {
        let mut seen = Vec::with_capacity(queue.len());
        for observer in std::mem::take(&mut queue) {
            if seen.contains(&observer) {
                continue;
            }
            seen.push(observer);
            if observer_exists(observer) {
                notify_one(observer);
            }
        }
        with_runtime(|rt| queue.append(&mut rt.pending));
    }

    with_runtime(|rt| rt.notifying = false);
}

// ---------------------------------------------------------------------------
// Test helper: reset the thread-local runtime between tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) fn reset_runtime() {
    RUNTIME.with(|rt| {
        *rt.borrow_mut() = Runtime::new();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::signal::create_signal;
    use std::cell::Cell;

    #[test]
    fn owner_sees_effects_created_inside() {
        reset_runtime();
        let owned = Rc::new(RefCell::new(Vec::new()));
        let owned_c = owned.clone();
        let inner = with_owner(Rc::new(move |eid| owned_c.borrow_mut().push(eid)), || {
            crate::reactive::create_effect_with_id(|| {})
        });
        let outside = crate::reactive::create_effect_with_id(|| {});
        assert_eq!(*owned.borrow(), vec![inner]);
        assert_ne!(inner, outside);
    }

    #[test]
    fn observer_notified_without_rerun() {
        reset_runtime();
        let (r, w) = create_signal(1);
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        let obs = create_observer(move || hits_c.set(hits_c.get() + 1));
        track(obs, || r.get());
        w.set(2);
        w.set(3);
        // Still subscribed: nothing re-tracked, nothing dropped.
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn track_replaces_dependencies() {
        reset_runtime();
        let (a, set_a) = create_signal(0);
        let (b, set_b) = create_signal(0);
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        let obs = create_observer(move || hits_c.set(hits_c.get() + 1));
        track(obs, || a.get());
        track(obs, || b.get());
        set_a.set(1);
        assert_eq!(hits.get(), 0);
        set_b.set(1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn untrack_skips_subscription() {
        reset_runtime();
        let (a, set_a) = create_signal(0);
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        let obs = create_observer(move || hits_c.set(hits_c.get() + 1));
        track(obs, || untrack(|| a.get()));
        set_a.set(5);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn disposed_observer_is_silent() {
        reset_runtime();
        let (a, set_a) = create_signal(0);
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        let obs = create_observer(move || hits_c.set(hits_c.get() + 1));
        track(obs, || a.get());
        dispose_observer(obs);
        assert!(!observer_exists(obs));
        set_a.set(1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn batch_notifies_once() {
        reset_runtime();
        let (a, set_a) = create_signal(0);
        let (b, set_b) = create_signal(0);
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        let obs = create_observer(move || hits_c.set(hits_c.get() + 1));
        track(obs, || a.get() + b.get());
        batch(|| {
            set_a.set(1);
            set_b.set(1);
            set_a.set(2);
        });
        assert_eq!(hits.get(), 1);
    }
}
