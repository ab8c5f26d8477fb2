//! Auto-tracking side effects and computed memos.
//!
//! An effect is a closure that re-runs whenever any signal it reads changes:
//!
//! ```ignore
//! let (count, set_count) = create_signal(0);
//! create_effect(move || {
//!     println!("count = {}", count.get());
//! });
//! set_count.set(1); // prints "count = 1"
//! ```
//!
//! A memo is a cached derived computation that only notifies downstream
//! subscribers when its output actually changes.

use super::runtime::{dispose_observer, insert_effect, run_effect, untrack, EffectId};
use super::signal::{create_signal, ReadSignal};

/// Create a side-effect that auto-tracks signal reads.
///
/// The closure runs immediately once (establishing initial subscriptions),
/// then re-runs whenever any tracked signal changes.
pub fn create_effect(f: impl FnMut() + 'static) {
    create_effect_with_id(f);
}

/// Create an effect and return its [`EffectId`] so it can later be disposed.
pub fn create_effect_with_id(f: impl FnMut() + 'static) -> EffectId {
    let eid = insert_effect(Box::new(f));
    run_effect(eid);
    eid
}

/// Deactivate an effect so it no longer re-runs when its dependencies change.
pub fn dispose_effect(eid: EffectId) {
    dispose_observer(eid);
}

/// Create a memoised derived computation.
///
/// `f` runs immediately and whenever its dependencies change. The returned
/// `ReadSignal<T>` only notifies *its* subscribers when the computed value
/// actually changes (by `PartialEq`).
pub fn create_memo<T: Clone + PartialEq + 'static>(
    mut f: impl FnMut() -> T + 'static,
) -> ReadSignal<T> {
    // Eager, untracked first evaluation so a parent observer doesn't
    // subscribe to the memo's inputs.
    let first = untrack(&mut f);
    let (read, write) = create_signal(first);

    let eid = insert_effect(Box::new(move || {
        let next = f();
        let changed = read.with_untracked(|old| old != &next);
        if changed {
            write.set(next);
        }
    }));
    // Establishes dependencies; the value is already current so nothing is written.
    run_effect(eid);
    read
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::runtime::{batch, reset_runtime};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn setup() {
        reset_runtime();
    }

    #[test]
    fn effect_runs_on_creation() {
        setup();
        let ran = Rc::new(Cell::new(false));
        let ran_c = ran.clone();
        create_effect(move || ran_c.set(true));
        assert!(ran.get());
    }

    #[test]
    fn effect_tracks_multiple_signals() {
        setup();
        let (a_r, a_w) = create_signal(1);
        let (b_r, b_w) = create_signal(10);
        let sum = Rc::new(Cell::new(0));
        let sum_c = sum.clone();
        create_effect(move || sum_c.set(a_r.get() + b_r.get()));
        assert_eq!(sum.get(), 11);
        a_w.set(2);
        assert_eq!(sum.get(), 12);
        b_w.set(20);
        assert_eq!(sum.get(), 22);
    }

    #[test]
    fn dispose_stops_reruns() {
        setup();
        let (r, w) = create_signal(0);
        let count = Rc::new(Cell::new(0));
        let count_c = count.clone();
        let eid = create_effect_with_id(move || {
            let _ = r.get();
            count_c.set(count_c.get() + 1);
        });
        w.set(1);
        assert_eq!(count.get(), 2);
        dispose_effect(eid);
        w.set(2);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn memo_basic() {
        setup();
        let (r, w) = create_signal(3);
        let doubled = create_memo(move || r.get() * 2);
        assert_eq!(doubled.get(), 6);
        w.set(5);
        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn memo_skips_when_unchanged() {
        setup();
        let (r, w) = create_signal(3);
        let clamped = create_memo(move || r.get().min(10));
        let runs = Rc::new(Cell::new(0));
        let runs_c = runs.clone();
        create_effect(move || {
            let _ = clamped.get();
            runs_c.set(runs_c.get() + 1);
        });
        assert_eq!(runs.get(), 1);
        w.set(15);
        assert_eq!(runs.get(), 2);
        w.set(20);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn batch_defers_effects() {
        setup();
        let (a_r, a_w) = create_signal(0);
        let (b_r, b_w) = create_signal(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_c = log.clone();
        create_effect(move || log_c.borrow_mut().push(a_r.get() + b_r.get()));
        batch(|| {
            a_w.set(1);
            b_w.set(2);
        });
        assert_eq!(*log.borrow(), vec![0, 3]);
    }

    #[test]
    fn effect_writing_signal_settles() {
        setup();
        let (src, set_src) = create_signal(1);
        let (dst, set_dst) = create_signal(0);
        create_effect(move || set_dst.set(src.get() * 100));
        assert_eq!(dst.get_untracked(), 100);
        set_src.set(2);
        assert_eq!(dst.get_untracked(), 200);
    }
}
