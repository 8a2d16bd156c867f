//! Debug-only nested-call detector.
//!
//! Both engines run user code (`K: Hash`/`K: Eq`) while probing, and a
//! reentrant call from that code could observe a half-updated table. In
//! debug builds, `ActiveCall` panics when a guarded entry point is entered
//! while another call is still on the stack. In release builds it compiles
//! to a zero-sized no-op. The raw-pointer `PhantomData` also keeps every
//! containing type `!Send`/`!Sync`, matching the single-threaded contract.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-container call tracker. Guard public entry points with
/// `let _t = self.active.begin();`.
#[derive(Debug)]
pub(crate) struct ActiveCall {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    _single_thread: PhantomData<*mut ()>,
}

impl ActiveCall {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _single_thread: PhantomData,
        }
    }

    /// Mark the container busy for the duration of the returned token.
    /// Panics in debug builds if a call is already in progress.
    #[inline]
    pub(crate) fn begin(&self) -> CallToken {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "nested call into container while an operation is in progress"
            );
            return CallToken {
                owner: self as *const ActiveCall,
                _z: PhantomData,
            };
        }

        #[cfg(not(debug_assertions))]
        {
            return CallToken { _z: PhantomData };
        }
    }
}

impl Default for ActiveCall {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII token returned by `ActiveCall::begin`.
pub(crate) struct CallToken {
    #[cfg(debug_assertions)]
    owner: *const ActiveCall,
    _z: PhantomData<*mut ()>,
}

impl Drop for CallToken {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        // SAFETY: `owner` points at the `ActiveCall` that produced this token.
        // The token is only ever held as a local guard inside a container
        // method, so the container (and thus the `ActiveCall`) outlives it.
        // Using a raw pointer rather than a live shared borrow lets the
        // container be `&mut`-borrowed while the token is held, without
        // changing the begin/clear behavior. `PhantomData<*mut ()>` keeps the
        // token `!Send`/`!Sync`, matching the single-threaded contract.
        unsafe {
            (*self.owner).busy.set(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ActiveCall;

    #[test]
    fn sequential_calls_are_ok() {
        let a = ActiveCall::new();
        drop(a.begin());
        drop(a.begin());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn nested_call_panics_in_debug() {
        let a = ActiveCall::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _t1 = a.begin();
            let _t2 = a.begin();
        }));
        assert!(res.is_err(), "expected nested begin to panic in debug");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn nested_call_is_noop_in_release() {
        let a = ActiveCall::new();
        let _t1 = a.begin();
        let _t2 = a.begin();
    }
}
