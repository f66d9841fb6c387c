//! Epoch tagging for glitch-free recombination.
//!
//! When several behaviors are independently derived from one ancestor and
//! later recombined, a single upstream change propagates through each
//! branch separately, and a naive combine-latest observes transient mixed
//! states. Stamping the ancestor's values with a monotonic epoch and
//! requiring equal epochs at the join point removes those glitches.

/// A value stamped with a monotonically increasing counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch<T> {
    /// Counter shared by every branch derived from the same stamp.
    pub epoch: u64,
    /// The carried value.
    pub value: T,
}

impl<T> Epoch<T> {
    /// Transform the value while preserving the epoch counter.
    pub fn map_inner<U>(self, f: impl FnOnce(T) -> U) -> Epoch<U> {
        Epoch { epoch: self.epoch, value: f(self.value) }
    }

    /// Borrowing view with the same epoch.
    pub fn as_ref(&self) -> Epoch<&T> {
        Epoch { epoch: self.epoch, value: &self.value }
    }

    /// Line up two branches of the same ancestor.
    ///
    /// Yields the pair only when both sides carry the same epoch; a
    /// mismatch means one branch has not caught up with the latest
    /// upstream change yet and the combination must wait.
    pub fn combine<'a, U>(a: &'a Epoch<T>, b: &'a Epoch<U>) -> Option<(&'a T, &'a U)> {
        (a.epoch == b.epoch).then_some((&a.value, &b.value))
    }
}

/// Source of monotonic epoch stamps.
#[derive(Debug, Default)]
pub struct EpochCounter(u64);

impl EpochCounter {
    /// Counter starting at zero; the first stamp is epoch 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a value with the next epoch.
    pub fn stamp<T>(&mut self, value: T) -> Epoch<T> {
        self.0 += 1;
        Epoch { epoch: self.0, value }
    }
}
