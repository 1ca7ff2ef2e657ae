//! Rotation counter shared by the pickers of one strategy

use std::sync::Mutex;

/// Monotonic counter whose value modulo the pool size picks the next node
///
/// The read and the increment happen under one lock, so no two callers ever
/// observe the same counter value. Overflow wraps; only `value % len` matters.
#[derive(Debug, Default)]
pub struct RotationCounter {
    value: Mutex<u64>,
}

impl RotationCounter {
    pub fn new(start: u64) -> Self {
        Self {
            value: Mutex::new(start),
        }
    }

    pub fn value(&self) -> u64 {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, value: u64) {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }

    /// Index into a pool of `len` nodes, advancing the counter by one.
    /// An empty pool leaves the counter untouched.
    pub fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let mut value = self.value.lock().unwrap_or_else(|e| e.into_inner());
        let index = (*value % len as u64) as usize;
        *value = value.wrapping_add(1);
        Some(index)
    }
}
