//! Mutex helpers shared by the health table and the usage ledger.

use std::sync::{Mutex, MutexGuard};

/// Extension trait for `Mutex` that recovers from lock poisoning.
///
/// Health records and ledger buffers hold plain data that stays consistent
/// even if a holder panicked, so the poisoned guard is returned as-is.
pub trait IgnoreLock<T> {
    /// Lock the mutex, clearing any poison error.
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> IgnoreLock<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
