//! The `Behavior` cell: a hot, replay-1 reactive value.

use tokio::sync::watch;

/// A value cell that always holds a current value and notifies watchers.
///
/// Backed by a `tokio::sync::watch` channel. The current value is always
/// synchronously readable via [`Behavior::get`]; a watcher obtained from
/// [`Behavior::watch`] observes the current value first (via
/// `borrow_and_update`) and is then woken for every change that is not
/// coalesced away by the channel. The cell never completes while any
/// handle to it lives.
///
/// Rapid successive writes may be coalesced: watchers are guaranteed to
/// see the *latest* value, not every intermediate one. Every consumer in
/// this codebase is written against that contract.
#[derive(Debug)]
pub struct Behavior<T> {
    tx: std::sync::Arc<watch::Sender<T>>,
}

impl<T> Clone for Behavior<T> {
    fn clone(&self) -> Self {
        Self { tx: std::sync::Arc::clone(&self.tx) }
    }
}

impl<T: Clone + Send + Sync + 'static> Behavior<T> {
    /// Create a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        Self { tx: std::sync::Arc::new(watch::Sender::new(initial)) }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the current value, notifying watchers unconditionally.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate the current value in place, notifying watchers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Subscribe to this cell.
    ///
    /// The receiver starts with the current value unseen, so the standard
    /// consume loop observes it immediately:
    ///
    /// ```ignore
    /// loop {
    ///     let value = rx.borrow_and_update().clone();
    ///     /* use value */
    ///     if rx.changed().await.is_err() { break; }
    /// }
    /// ```
    pub fn watch(&self) -> watch::Receiver<T> {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }

    /// Read the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Behavior<T> {
    /// Replace the current value only if it differs, suppressing no-op
    /// notifications. Returns true if the value changed.
    pub fn set_if_changed(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Default for Behavior<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reads_current_value_synchronously() {
        let cell = Behavior::new(7u32);
        assert_eq!(cell.get(), 7);
        cell.set(8);
        assert_eq!(cell.get(), 8);
    }

    #[tokio::test]
    async fn watch_observes_current_value_first() {
        let cell = Behavior::new("first".to_string());
        let mut rx = cell.watch();
        assert_eq!(*rx.borrow_and_update(), "first");

        cell.set("second".to_string());
        assert!(rx.changed().await.is_ok());
        assert_eq!(*rx.borrow_and_update(), "second");
    }

    #[tokio::test]
    async fn set_if_changed_suppresses_noop_notifications() {
        let cell = Behavior::new(1u32);
        let mut rx = cell.watch();
        let _ = rx.borrow_and_update();

        assert!(!cell.set_if_changed(1));
        assert!(!rx.has_changed().unwrap_or(true));

        assert!(cell.set_if_changed(2));
        assert!(rx.has_changed().unwrap_or(false));
    }

    #[tokio::test]
    async fn rapid_writes_coalesce_to_latest() {
        let cell = Behavior::new(0u32);
        let mut rx = cell.watch();
        let _ = rx.borrow_and_update();

        for v in 1..=5 {
            cell.set(v);
        }
        assert!(rx.changed().await.is_ok());
        assert_eq!(*rx.borrow_and_update(), 5);
    }
}
