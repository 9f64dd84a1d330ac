use std::{cell::UnsafeCell, fmt};

/// The control block of a [`SharedPtr`](crate::SharedPtr) ownership group.
///
/// A plain, non-atomic `usize` that can be updated through a shared
/// reference. [`UnsafeCell`] makes the type `!Sync`, so only one thread can
/// ever observe a given counter.
pub struct Counter {
    value: UnsafeCell<usize>,
}

impl Counter {
    /// Returns a new [`Counter`] for a fresh ownership group, set to 1.
    pub(crate) const fn new() -> Self {
        Self {
            value: UnsafeCell::new(1),
        }
    }

    /// Copy out the number of owners.
    ///
    /// ```
    /// use shared_ptr::SharedPtr;
    ///
    /// let p = SharedPtr::new('a');
    /// let q = p.clone();
    /// assert_eq!(q.get_counter().map(|c| c.get()), Some(2));
    /// ```
    pub fn get(&self) -> usize {
        // SAFETY: only owners of the group reach the counter, all on one
        // thread, and none holds a reference into the cell across a call.
        unsafe { *self.value.get() }
    }

    fn set(&self, value: usize) {
        // SAFETY: as in `get`; the allocation stays live until the last
        // owner sees the count reach zero, after which nobody calls in here.
        unsafe {
            *self.value.get() = value;
        }
    }

    pub(crate) fn increment(&self) {
        self.update(usize::checked_add, "SharedPtr count overflown");
    }

    /// Returns the count left after releasing one owner.
    pub(crate) fn decrement(&self) -> usize {
        self.update(usize::checked_sub, "SharedPtr count underflown")
    }

    fn update(&self, step: fn(usize, usize) -> Option<usize>, broken: &str) -> usize {
        let Some(next) = step(self.get(), 1) else {
            panic!("{broken}");
        };
        self.set(next);
        next
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Counter").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn starts_at_one() {
        assert_eq!(Counter::new().get(), 1);
    }

    #[test]
    fn increments_and_decrements() {
        let c = Counter::new();
        c.increment();
        c.increment();
        assert_eq!(c.get(), 3);
        assert_eq!(c.decrement(), 2);
        assert_eq!(c.decrement(), 1);
        assert_eq!(c.decrement(), 0);
    }

    #[test]
    #[should_panic(expected = "underflown")]
    fn decrement_past_zero() {
        let c = Counter::new();
        c.decrement();
        c.decrement();
    }

    #[test]
    #[should_panic(expected = "overflown")]
    fn increment_past_max() {
        let c = Counter::new();
        c.set(usize::MAX);
        c.increment();
    }

    #[test]
    fn debug_shows_value() {
        let c = Counter::new();
        c.increment();
        assert_eq!(format!("{c:?}"), "Counter(2)");
    }
}
