//! Limit on concurrently running child processes.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Counting limiter for child processes.
///
/// Segments evaluate in parallel and svn alone fans out four queries, so
/// the number of live processes is capped. A [`Slot`] is held for as long
/// as the process runs and frees itself on drop.
pub struct ProcessSlots {
    free: Mutex<usize>,
    released: Condvar,
}

/// A taken slot, returned on drop.
pub struct Slot<'a> {
    slots: &'a ProcessSlots,
}

impl ProcessSlots {
    pub fn new(limit: usize) -> Self {
        Self {
            free: Mutex::new(limit.max(1)),
            released: Condvar::new(),
        }
    }

    // A poisoned count is still a valid count
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a slot is free and take it.
    pub fn acquire(&self) -> Slot<'_> {
        let mut free = self.lock();
        while *free == 0 {
            free = self
                .released
                .wait(free)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *free -= 1;
        Slot { slots: self }
    }

    /// Slots not currently taken.
    pub fn available(&self) -> usize {
        *self.lock()
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        *self.slots.lock() += 1;
        self.slots.released.notify_one();
    }
}
