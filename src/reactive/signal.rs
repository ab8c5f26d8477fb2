//! Signals: `create_signal()`, `ReadSignal<T>`, `WriteSignal<T>`.
//!
//! A signal stores one value in the thread-local runtime. Reading it while an
//! observer is tracking subscribes that observer; writing notifies every
//! subscriber.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::runtime::{notify_subscribers, with_runtime, SignalId, SignalState};

/// Create a reactive signal with the given initial value.
///
/// Returns a `(ReadSignal<T>, WriteSignal<T>)` pair. Reading inside a tracked
/// block automatically subscribes that block to changes.
pub fn create_signal<T: 'static>(initial: T) -> (ReadSignal<T>, WriteSignal<T>) {
    let id = with_runtime(|rt| {
        rt.signals.insert(SignalState {
            value: Rc::new(RefCell::new(initial)),
            subscribers: Vec::new(),
        })
    });
    (
        ReadSignal {
            id,
            _marker: PhantomData,
        },
        WriteSignal {
            id,
            _marker: PhantomData,
        },
    )
}

// ---------------------------------------------------------------------------
// ReadSignal
// ---------------------------------------------------------------------------

/// Read-half of a signal. `Copy`: only stores an id.
pub struct ReadSignal<T: 'static> {
    id: SignalId,
    _marker: PhantomData<T>,
}

// Manual impls so we don't require T: Copy/Clone for the signal itself.
impl<T: 'static> Copy for ReadSignal<T> {}
impl<T: 'static> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSignal").field("id", &self.id).finish()
    }
}

impl<T: 'static> ReadSignal<T> {
    /// Read the current value, subscribing the tracking observer (if any).
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Read by reference without cloning. Still subscribes.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        with_runtime(|rt| rt.track_read(self.id));
        self.with_untracked(f)
    }

    /// Read without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    /// Read by reference without tracking. `f` may read any signal, this one
    /// included; a write from inside `f` takes effect for later reads.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let cell = with_runtime(|rt| rt.signals[self.id].value.clone());
        let value = cell.borrow();
        let result = f(downcast_ref(&*value));
        result
    }
}

fn downcast_ref<T: 'static>(value: &dyn Any) -> &T {
    // Ids are only minted by `create_signal::<T>`.
    value.downcast_ref::<T>().expect("signal type mismatch")
}

// ---------------------------------------------------------------------------
// WriteSignal
// ---------------------------------------------------------------------------

/// Write-half of a signal. `Copy`: only stores an id.
pub struct WriteSignal<T: 'static> {
    id: SignalId,
    _marker: PhantomData<T>,
}

impl<T: 'static> Copy for WriteSignal<T> {}
impl<T: 'static> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> fmt::Debug for WriteSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSignal").field("id", &self.id).finish()
    }
}

impl<T: 'static> WriteSignal<T> {
    /// Overwrite the value and notify subscribers.
    pub fn set(&self, value: T) {
        let subs = with_runtime(|rt| {
            let sig = &mut rt.signals[self.id];
            sig.value = Rc::new(RefCell::new(value));
            sig.subscribers.clone()
        });
        notify_subscribers(subs);
    }

    /// Mutate the value in place and notify subscribers.
    ///
    /// Skipped, with an error logged, while the signal is being read further
    /// up the stack. `f` must not read this signal.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let cell = with_runtime(|rt| rt.signals[self.id].value.clone());
        let Ok(mut value) = cell.try_borrow_mut() else {
            tracing::error!(signal = ?self.id, "update skipped: signal is being read");
            return;
        };
        f(value.downcast_mut::<T>().expect("signal type mismatch"));
        drop(value);
        let subs = with_runtime(|rt| rt.signals[self.id].subscribers.clone());
        notify_subscribers(subs);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
