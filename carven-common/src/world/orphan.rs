//! a copy-on-write cell that lets a single writer make progress while any
//! number of readers hold onto consistent snapshots of the previous value.
//!
//! chunk buffers are shared between the game loop (writer) and mesh workers
//! (readers). a writer that finds readers attached does not wait for them;
//! it clones the value, applies its writes to the clone, and swaps the clone
//! in, "orphaning" the readers on the old value. readers never observe a
//! torn write, and writers never block on a slow mesh job.

use std::{
    cell::UnsafeCell,
    mem::ManuallyDrop,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use arc_swap::{ArcSwap, Guard};
use parking_lot::{lock_api::RawRwLock as RawRwLockApi, RawRwLock};

struct OrphanInner<T> {
    lock: RawRwLock,
    orphaned: AtomicBool,
    value: UnsafeCell<T>,
}

impl<T> OrphanInner<T> {
    fn new(value: T) -> Self {
        Self {
            lock: RawRwLock::INIT,
            orphaned: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }
}

pub struct Orphan<T> {
    current_inner: ArcSwap<OrphanInner<T>>,
}

unsafe impl<T: Send> Send for Orphan<T> {}
unsafe impl<T: Sync> Sync for Orphan<T> {}

impl<T> Orphan<T> {
    pub fn new(value: T) -> Self {
        Self {
            current_inner: ArcSwap::from_pointee(OrphanInner::new(value)),
        }
    }
}

impl<T: Clone> Orphan<T> {
    /// Acquire write access to the current value, cloning it out from under
    /// any attached readers if necessary. Writes become visible to new
    /// snapshots when the returned guard drops.
    pub fn orphan_readers(&self) -> OrphanWriteGuard<'_, T> {
        OrphanWriteGuard::acquire(self)
    }

    pub fn snapshot(&self) -> OrphanSnapshot<T> {
        OrphanSnapshot::acquire(self)
    }
}

pub struct OrphanSnapshot<T> {
    inner: Arc<OrphanInner<T>>,
}

unsafe impl<T: Send> Send for OrphanSnapshot<T> {}
unsafe impl<T: Sync> Sync for OrphanSnapshot<T> {}

impl<T> Clone for OrphanSnapshot<T> {
    fn clone(&self) -> Self {
        // each snapshot owns one shared-lock acquisition; its drop releases
        // exactly one
        self.inner.lock.lock_shared();
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> OrphanSnapshot<T> {
    fn acquire(orphan: &Orphan<T>) -> Self {
        let current_inner = orphan.current_inner.load();
        current_inner.lock.lock_shared();
        Self {
            inner: Guard::into_inner(current_inner),
        }
    }

    /// Whether a writer has moved on from the value this snapshot sees.
    ///
    /// Note that this returning `false` does not guarantee this snapshot is
    /// the most recent; it only guarantees the converse when `true`.
    pub fn is_orphaned(&self) -> bool {
        self.inner.orphaned.load(Ordering::Relaxed)
    }
}

impl<T> Drop for OrphanSnapshot<T> {
    fn drop(&mut self) {
        unsafe { self.inner.lock.unlock_shared() };
    }
}

impl<T> std::ops::Deref for OrphanSnapshot<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.inner.value.get() }
    }
}

enum OrphanWriteGuardCow<'a, T> {
    Borrowed(&'a mut T),
    Cloned(ManuallyDrop<T>),
}

pub struct OrphanWriteGuard<'a, T> {
    orphan: &'a Orphan<T>,
    inner: Arc<OrphanInner<T>>,
    value: OrphanWriteGuardCow<'a, T>,
}

unsafe impl<'a, T: Send> Send for OrphanWriteGuard<'a, T> {}
unsafe impl<'a, T: Sync> Sync for OrphanWriteGuard<'a, T> {}

impl<'a, T: Clone> OrphanWriteGuard<'a, T> {
    fn acquire(orphan: &'a Orphan<T>) -> Self {
        let current_inner = orphan.current_inner.load();
        if current_inner.lock.try_lock_exclusive() {
            // no readers; write in place.
            let value = unsafe { &mut *current_inner.value.get() };
            OrphanWriteGuard {
                orphan,
                inner: Guard::into_inner(current_inner),
                value: OrphanWriteGuardCow::Borrowed(value),
            }
        } else {
            current_inner.lock.lock_shared();
            let value = unsafe { (*current_inner.value.get()).clone() };
            current_inner.orphaned.store(true, Ordering::Relaxed);
            OrphanWriteGuard {
                orphan,
                inner: Guard::into_inner(current_inner),
                value: OrphanWriteGuardCow::Cloned(ManuallyDrop::new(value)),
            }
        }
    }

    pub fn was_cloned(&self) -> bool {
        matches!(&self.value, OrphanWriteGuardCow::Cloned(_))
    }
}

impl<'a, T> Drop for OrphanWriteGuard<'a, T> {
    fn drop(&mut self) {
        match &mut self.value {
            OrphanWriteGuardCow::Borrowed(_) => unsafe { self.inner.lock.unlock_exclusive() },
            OrphanWriteGuardCow::Cloned(value) => {
                unsafe { self.inner.lock.unlock_shared() };
                let value = unsafe { ManuallyDrop::take(value) };
                // we store the new inner here and not on guard acquisition because it
                // allows reads to not block while we are still writing.
                self.orphan
                    .current_inner
                    .store(Arc::new(OrphanInner::new(value)));
            }
        }
    }
}

impl<'a, T> std::ops::Deref for OrphanWriteGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match &self.value {
            OrphanWriteGuardCow::Borrowed(borrow) => borrow,
            OrphanWriteGuardCow::Cloned(owned) => owned,
        }
    }
}

impl<'a, T> std::ops::DerefMut for OrphanWriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.value {
            OrphanWriteGuardCow::Borrowed(borrow) => borrow,
            OrphanWriteGuardCow::Cloned(owned) => owned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_in_place_without_readers() {
        let cell = Orphan::new(vec![1, 2, 3]);
        {
            let mut guard = cell.orphan_readers();
            assert!(!guard.was_cloned());
            guard[0] = 7;
        }
        assert_eq!(cell.snapshot()[0], 7);
    }

    #[test]
    fn readers_keep_old_value_while_writer_progresses() {
        let cell = Orphan::new(vec![1, 2, 3]);
        let snap = cell.snapshot();
        {
            let mut guard = cell.orphan_readers();
            assert!(guard.was_cloned());
            guard[0] = 7;
        }
        // the old snapshot still sees the pre-write value and knows it is stale
        assert_eq!(snap[0], 1);
        assert!(snap.is_orphaned());
        assert_eq!(cell.snapshot()[0], 7);
    }
}
