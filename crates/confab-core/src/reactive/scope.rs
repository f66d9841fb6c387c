//! The `Scope` lifetime boundary.
//!
//! A `Scope` owns every subscription and background task created through
//! it. Ending the scope synchronously cancels all of them and runs the
//! registered cleanup callbacks exactly once, no matter how many times
//! `end` is called. There is no other cancellation primitive in the
//! engine: anything that must stop when a call (or a sub-lifetime such as
//! one transport connection) goes away is bound to a scope.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::Behavior;

/// Async cleanup returned by a [`Scope::reconcile`] handler.
pub type Cleanup = BoxFuture<'static, ()>;

#[derive(Default)]
struct ScopeInner {
    ended: bool,
    on_end: Vec<Box<dyn FnOnce() + Send>>,
}

/// An explicit lifetime boundary for subscriptions and tasks.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<Mutex<ScopeInner>>,
    token: CancellationToken,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// A fresh, open scope.
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(ScopeInner::default())), token: CancellationToken::new() }
    }

    /// True once [`Scope::end`] has run.
    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    /// Register a cleanup callback.
    ///
    /// Runs exactly once when the scope ends. If the scope has already
    /// ended, the callback runs immediately.
    pub fn on_end(&self, callback: impl FnOnce() + Send + 'static) {
        let run_now = {
            let mut inner = self.lock();
            if inner.ended {
                true
            } else {
                inner.on_end.push(Box::new(callback));
                return;
            }
        };
        if run_now {
            callback();
        }
    }

    /// End the scope: cancel every task spawned through it, complete every
    /// bound derivation, and run the `on_end` callbacks.
    ///
    /// Idempotent — only the first call does anything. Cancellation of
    /// spawned tasks is signalled synchronously; in-flight `reconcile`
    /// handlers finish their current step and then run their cleanup.
    pub fn end(&self) {
        let callbacks = {
            let mut inner = self.lock();
            if inner.ended {
                return;
            }
            inner.ended = true;
            std::mem::take(&mut inner.on_end)
        };
        self.token.cancel();
        for callback in callbacks {
            callback();
        }
    }

    /// A scope that ends together with this one, or earlier on its own.
    pub fn child(&self) -> Scope {
        let child = Scope {
            inner: Arc::new(Mutex::new(ScopeInner::default())),
            token: self.token.child_token(),
        };
        let handle = child.clone();
        self.on_end(move || handle.end());
        child
    }

    /// Spawn a task that is aborted when the scope ends.
    ///
    /// A no-op on an already-ended scope.
    pub fn spawn(&self, future: impl std::future::Future<Output = ()> + Send + 'static) {
        if self.is_ended() {
            return;
        }
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {},
                () = future => {},
            }
        });
    }

    /// Derive a [`Behavior`] from a watch receiver, bound to this scope.
    ///
    /// The behavior starts from the receiver's current value and mirrors
    /// it until the scope ends; afterwards it stops emitting and freezes
    /// on the last observed value.
    pub fn behavior<T>(&self, mut rx: watch::Receiver<T>) -> Behavior<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let cell = Behavior::new(rx.borrow_and_update().clone());
        let sink = cell.clone();
        self.spawn(async move {
            while rx.changed().await.is_ok() {
                sink.set(rx.borrow_and_update().clone());
            }
        });
        cell
    }

    /// A scope-bound behavior computed from another behavior.
    pub fn derive<T, U>(&self, source: &Behavior<T>, f: impl Fn(&T) -> U + Send + 'static) -> Behavior<U>
    where
        T: Clone + Send + Sync + 'static,
        U: Clone + PartialEq + Send + Sync + 'static,
    {
        let mut rx = source.watch();
        let cell = Behavior::new(f(&rx.borrow_and_update()));
        let sink = cell.clone();
        self.spawn(async move {
            while rx.changed().await.is_ok() {
                let next = f(&rx.borrow_and_update());
                sink.set_if_changed(next);
            }
        });
        cell
    }

    /// A scope-bound behavior computed from two behaviors.
    ///
    /// Recomputes whenever either input changes. Inputs derived from a
    /// common ancestor should carry [`super::Epoch`] tags if transient
    /// mixed states are unacceptable.
    pub fn derive2<A, B, U>(
        &self,
        a: &Behavior<A>,
        b: &Behavior<B>,
        f: impl Fn(&A, &B) -> U + Send + 'static,
    ) -> Behavior<U>
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        U: Clone + PartialEq + Send + Sync + 'static,
    {
        let mut rx_a = a.watch();
        let mut rx_b = b.watch();
        let cell = Behavior::new(f(&rx_a.borrow_and_update(), &rx_b.borrow_and_update()));
        let sink = cell.clone();
        self.spawn(async move {
            loop {
                tokio::select! {
                    changed = rx_a.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    },
                    changed = rx_b.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    },
                }
                let next = f(&rx_a.borrow_and_update(), &rx_b.borrow_and_update());
                sink.set_if_changed(next);
            }
        });
        cell
    }

    /// Serialized async setup/cleanup against a changing value.
    ///
    /// The handler runs for the receiver's current value immediately, then
    /// for each subsequent *distinct* value. It may return an async
    /// cleanup, which is awaited to completion before the handler runs for
    /// the next value, and once more when the scope ends.
    ///
    /// Invariants:
    ///
    /// - Handler and cleanup executions are strictly serialized; two never
    ///   run concurrently.
    /// - Values arriving while a handler or cleanup is in flight are
    ///   coalesced: only the latest is processed next. Skipped
    ///   intermediates get no setup/cleanup pair. This is the intended
    ///   backpressure policy, not lossage.
    ///
    /// Handlers must convert their own failures into typed state (an
    /// [`crate::ErrorLatch`], a state behavior) — there is nowhere for an
    /// error to propagate from here.
    pub fn reconcile<T, F, Fut>(&self, mut rx: watch::Receiver<T>, mut handler: F)
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Option<Cleanup>> + Send + 'static,
    {
        if self.is_ended() {
            return;
        }
        let token = self.token.clone();
        tokio::spawn(async move {
            let mut cleanup: Option<Cleanup> = None;
            let mut current: Option<T> = None;
            loop {
                let value = rx.borrow_and_update().clone();
                if current.as_ref() != Some(&value) {
                    if let Some(pending) = cleanup.take() {
                        pending.await;
                    }
                    if token.is_cancelled() {
                        return;
                    }
                    cleanup = handler(value.clone()).await;
                    current = Some(value);
                }
                tokio::select! {
                    () = token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            // Source dropped: hold the last setup until the
                            // scope itself ends.
                            token.cancelled().await;
                            break;
                        }
                    },
                }
            }
            if let Some(pending) = cleanup.take() {
                pending.await;
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScopeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
