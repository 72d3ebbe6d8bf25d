use std::sync::{Mutex, MutexGuard};

mod pii;

pub(crate) use pii::Pii;

pub(crate) trait MutexExt<T> {
    /// Lock ignoring poisoning. Guarded values are always replaced whole.
    fn lock_unpoisoned(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    fn lock_unpoisoned(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|e| e.into_inner())
    }
}
