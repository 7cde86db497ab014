//! Values that remember what they looked like when loaded.

use std::ops::Deref;

/// A live value stored next to a frozen snapshot of its loaded state.
///
/// Equality only looks at the live value.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    value: T,
    snapshot: T,
}

impl<T: Clone + PartialEq> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            snapshot: value.clone(),
            value,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn snapshot(&self) -> &T {
        &self.snapshot
    }

    pub fn changed(&self) -> bool {
        self.value != self.snapshot
    }

    /// Restores the live value from the snapshot.
    pub fn revert(&mut self) {
        self.value = self.snapshot.clone();
    }

    /// Makes the current live value the new snapshot.
    pub fn reset(&mut self) {
        self.snapshot = self.value.clone();
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for Tracked<T> {}

impl<T: Clone + PartialEq> From<T> for Tracked<T> {
    fn from(value: T) -> Self {
        Tracked::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_tracking() {
        let mut tracked = Tracked::new(4);
        assert!(!tracked.changed());
        *tracked.value_mut() = 7;
        assert!(tracked.changed());
        assert_eq!(*tracked.snapshot(), 4);
        tracked.revert();
        assert_eq!(*tracked, 4);
    }

    #[test]
    fn test_reset_moves_snapshot() {
        let mut tracked = Tracked::new(1);
        *tracked.value_mut() = 2;
        tracked.reset();
        assert!(!tracked.changed());
        assert_eq!(*tracked.snapshot(), 2);
    }

    #[test]
    fn test_equality_ignores_snapshot() {
        let mut a = Tracked::new(1);
        *a.value_mut() = 3;
        assert_eq!(a, Tracked::new(3));
    }
}
