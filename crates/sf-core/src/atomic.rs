//! Lock-free `f64` cell.

use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` stored as bits in an [`AtomicU64`].
///
/// Single-value node parameters (reference inputs, gains) live in one of
/// these so readers on the loop thread never block on a writer.
#[derive(Debug, Default)]
pub struct AtomicReal {
    bits: AtomicU64,
}

impl AtomicReal {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }
}

impl Clone for AtomicReal {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}
