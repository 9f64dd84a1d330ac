use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr::{self, NonNull},
};

use crate::{counter::Counter, error::SharedPtrError};

/// A single-threaded pointer with shared, counted ownership of a heap value.
///
/// The value and its [`Counter`] live in two separate allocations. Both
/// handles are `None` together or `Some` together; every path that mutates
/// them keeps it that way.
///
/// The raw pointer fields make the type neither `Send` nor `Sync`:
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<shared_ptr::SharedPtr<i32>>();
/// ```
pub struct SharedPtr<T> {
    raw: Option<NonNull<T>>,
    count: Option<NonNull<Counter>>,
    _owns: PhantomData<T>,
}

impl<T> SharedPtr<T> {
    /// Returns a [`SharedPtr`] that owns nothing. Does not allocate.
    pub const fn empty() -> Self {
        Self {
            raw: None,
            count: None,
            _owns: PhantomData,
        }
    }

    /// Moves `value` to the heap and starts a new ownership group.
    ///
    /// ```
    /// use shared_ptr::SharedPtr;
    ///
    /// let p = SharedPtr::new(1);
    /// assert_eq!(*p, 1);
    /// assert_eq!(p.use_count(), 1);
    /// ```
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Adopts an already boxed value, allocating a counter set to 1.
    pub fn from_box(value: Box<T>) -> Self {
        let raw = NonNull::from(Box::leak(value));
        let count = NonNull::from(Box::leak(Box::new(Counter::new())));
        log::trace!(
            "SharedPtr<{}> {:p}: new ownership group",
            std::any::type_name::<T>(),
            raw
        );
        Self {
            raw: Some(raw),
            count: Some(count),
            _owns: PhantomData,
        }
    }

    /// Adopts a nullable handle. `None` yields an empty pointer and no
    /// counter is allocated for it.
    pub fn from_option(value: Option<Box<T>>) -> Self {
        match value {
            Some(value) => Self::from_box(value),
            None => Self::empty(),
        }
    }

    /// Returns the owned value, if any. Does not touch the count.
    pub fn get(&self) -> Option<&T> {
        // SAFETY: `raw` is live for as long as this instance is an owner.
        self.raw.map(|raw| unsafe { raw.as_ref() })
    }

    /// Returns the owned value's address, or null when empty.
    pub fn as_ptr(&self) -> *const T {
        self.raw.map_or(ptr::null(), |raw| raw.as_ptr() as *const T)
    }

    /// Returns the control block shared by this pointer's ownership group.
    pub fn get_counter(&self) -> Option<&Counter> {
        // SAFETY: `count` is live for as long as this instance is an owner.
        self.count.map(|count| unsafe { count.as_ref() })
    }

    /// Number of [`SharedPtr`]s in this ownership group, 0 when empty.
    pub fn use_count(&self) -> usize {
        self.get_counter().map_or(0, Counter::get)
    }

    /// `true` when this pointer owns an object.
    pub fn is_some(&self) -> bool {
        self.raw.is_some()
    }

    /// `true` when this pointer owns nothing and holds no counter.
    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }

    /// Like [`Deref`], but reports an empty pointer instead of panicking.
    pub fn try_deref(&self) -> Result<&T, SharedPtrError> {
        self.get().ok_or(SharedPtrError::Empty)
    }

    /// Returns a mutable reference if this is the only owner.
    ///
    /// ```
    /// use shared_ptr::SharedPtr;
    ///
    /// let mut p = SharedPtr::new(1);
    /// *p.get_mut().unwrap() = 2;
    /// assert_eq!(*p, 2);
    ///
    /// let q = p.clone();
    /// assert!(p.get_mut().is_none());
    /// # drop(q);
    /// ```
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.try_get_mut().ok()
    }

    /// Returns a mutable reference if this is the only owner, otherwise the
    /// reason exclusive access is refused.
    pub fn try_get_mut(&mut self) -> Result<&mut T, SharedPtrError> {
        match self.use_count() {
            0 => Err(SharedPtrError::Empty),
            1 => {
                let mut raw = self.raw.ok_or(SharedPtrError::Empty)?;
                // SAFETY: no other owner exists and `&mut self` excludes
                // every borrow through this one.
                Ok(unsafe { raw.as_mut() })
            }
            owners => Err(SharedPtrError::Shared { owners }),
        }
    }

    /// Returns a mutable reference regardless of how many owners exist.
    ///
    /// # Safety
    /// No other reference into the owned value, through this or any other
    /// owner, may be alive while the returned reference is.
    ///
    /// # Panics
    /// If the pointer is empty.
    pub unsafe fn get_mut_unchecked(&mut self) -> &mut T {
        match self.raw {
            Some(mut raw) => unsafe { raw.as_mut() },
            None => panic!("dereferenced an empty SharedPtr"),
        }
    }

    /// Copy assignment. Joins `source`'s ownership group and leaves the
    /// current one.
    ///
    /// The source is acquired and adopted before the current group is
    /// released, so assigning from a pointer that already shares this group
    /// never frees the object being copied.
    pub fn copy_from(&mut self, source: &Self) -> &mut Self {
        source.acquire();
        let mut previous = Self {
            raw: mem::replace(&mut self.raw, source.raw),
            count: mem::replace(&mut self.count, source.count),
            _owns: PhantomData,
        };
        // `self` already owns its new group, so a panicking `T::drop` below
        // cannot strand the count taken above.
        previous.release();
        self
    }

    /// Move assignment. Takes over `source`'s ownership and leaves it empty.
    ///
    /// When both pointers already share a control block nothing changes,
    /// including `source`.
    pub fn move_from(&mut self, source: &mut Self) -> &mut Self {
        if self.count == source.count {
            return self;
        }
        self.release();
        self.raw = source.raw.take();
        self.count = source.count.take();
        self
    }

    /// Moves this pointer's ownership into the returned value, leaving `self`
    /// empty. The count is unchanged.
    ///
    /// ```
    /// use shared_ptr::SharedPtr;
    ///
    /// let mut p = SharedPtr::new(String::from("Test2"));
    /// let n = p.take();
    /// assert_eq!(*n, "Test2");
    /// assert_eq!(n.use_count(), 1);
    /// assert!(p.get().is_none() && p.get_counter().is_none());
    /// ```
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::empty())
    }

    /// Leaves the current ownership group, making `self` empty.
    pub fn reset(&mut self) {
        self.release();
    }

    /// Leaves the current ownership group and starts a new one around
    /// `value`. Other former co-owners are unaffected.
    pub fn reset_with(&mut self, value: T) {
        self.reset_box(Some(Box::new(value)));
    }

    /// Leaves the current ownership group and adopts `value` with a freshly
    /// allocated counter, or stays empty when `value` is `None`.
    pub fn reset_box(&mut self, value: Option<Box<T>>) {
        self.release();
        *self = Self::from_option(value);
    }

    /// Exchanges ownership with `other`. No count changes.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.raw, &mut other.raw);
        mem::swap(&mut self.count, &mut other.count);
    }

    /// Returns `true` if both pointers belong to the same ownership group, or
    /// are both empty.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.count == other.count
    }

    /// Returns the value if `this` is its only owner, otherwise `this` as is.
    ///
    /// ```
    /// use shared_ptr::SharedPtr;
    ///
    /// let p = SharedPtr::new(3);
    /// let q = p.clone();
    /// let p = SharedPtr::try_unwrap(p).unwrap_err();
    /// drop(q);
    /// assert_eq!(SharedPtr::try_unwrap(p), Ok(3));
    /// ```
    pub fn try_unwrap(mut this: Self) -> Result<T, Self> {
        if this.use_count() != 1 {
            return Err(this);
        }
        let (Some(raw), Some(count)) = (this.raw, this.count) else {
            return Err(this);
        };
        this.raw = None;
        this.count = None;
        // SAFETY: `this` was the last owner and has let go of both handles,
        // so nothing else refers to either allocation.
        unsafe {
            drop(Box::from_raw(count.as_ptr()));
            Ok(*Box::from_raw(raw.as_ptr()))
        }
    }

    fn acquire(&self) {
        if let Some(count) = self.get_counter() {
            count.increment();
        }
    }

    /// Drops this instance's share of ownership and empties it, freeing the
    /// value and counter when this was the last owner.
    fn release(&mut self) {
        let (raw, count) = (self.raw.take(), self.count.take());
        let (Some(raw), Some(count)) = (raw, count) else {
            debug_assert!(raw.is_none() && count.is_none());
            return;
        };

        // SAFETY: this instance was an owner until now, so `count` is live.
        if unsafe { count.as_ref() }.decrement() != 0 {
            return;
        }

        log::trace!(
            "SharedPtr<{}> {:p}: last owner released",
            std::any::type_name::<T>(),
            raw
        );
        // SAFETY: the count reached zero, no other owner refers to either
        // allocation. The counter goes first so a panicking `T::drop` cannot
        // leak it.
        unsafe {
            drop(Box::from_raw(count.as_ptr()));
            drop(Box::from_raw(raw.as_ptr()));
        }
    }
}

impl<T> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        self.acquire();
        Self {
            raw: self.raw,
            count: self.count,
            _owns: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.copy_from(source);
    }
}

impl<T> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for SharedPtr<T> {
    type Target = T;

    /// # Panics
    /// If the pointer is empty.
    fn deref(&self) -> &Self::Target {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty SharedPtr"),
        }
    }
}

impl<T> From<Box<T>> for SharedPtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T> From<Option<Box<T>>> for SharedPtr<T> {
    fn from(value: Option<Box<T>>) -> Self {
        Self::from_option(value)
    }
}

impl<T> From<&SharedPtr<T>> for bool {
    fn from(value: &SharedPtr<T>) -> Self {
        value.is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f
                .debug_struct("SharedPtr")
                .field("value", value)
                .field("use_count", &self.use_count())
                .finish(),
            None => f.write_str("SharedPtr(empty)"),
        }
    }
}

impl<T: fmt::Display> fmt::Display for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

impl<T: PartialEq> PartialEq for SharedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl<T: Eq> Eq for SharedPtr<T> {}

impl<T: PartialOrd> PartialOrd for SharedPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.get().partial_cmp(&other.get())
    }
}

impl<T: Ord> Ord for SharedPtr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.get().cmp(&other.get())
    }
}

impl<T: Hash> Hash for SharedPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.get().hash(state);
    }
}
