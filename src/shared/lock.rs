use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read/write lock where a waiting writer stops new readers from entering.
///
/// Perception writes obstacle lists at its own cadence while the avoidance
/// loop and the planner read them. Many readers must never starve the writer,
/// which is the task-fair policy of the parking_lot lock.
pub struct WriterPriorityLock<T> {
    inner: RwLock<T>,
}

impl<T> WriterPriorityLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }
}

impl<T: Clone> WriterPriorityLock<T> {
    /// Deep copy taken under the read lock, released before returning.
    pub fn snapshot(&self) -> T {
        self.read().clone()
    }
}
