//! Log sequence number type.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a position in the write-ahead log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lsn(pub u64);

impl Lsn {
    /// No log record has been written yet.
    pub const NONE: Lsn = Lsn(0);

    /// Sentinel meaning "do not recover this file" (checkpoint LSN for a
    /// file whose last checkpoint ran with logging disabled).
    pub const MAX: Lsn = Lsn(u64::MAX);

    #[inline]
    pub fn new(v: u64) -> Self {
        Lsn(v)
    }

    #[inline]
    pub fn next(&self) -> Lsn {
        Lsn(self.0 + 1)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lsn({})", self.0)
    }
}

/// An atomically-updated LSN counter, used for the global `write_lsn` and
/// `alloc_lsn` watermarks.
#[derive(Debug)]
pub struct AtomicLsn(AtomicU64);

impl AtomicLsn {
    pub fn new(initial: Lsn) -> Self {
        AtomicLsn(AtomicU64::new(initial.0))
    }

    pub fn load(&self) -> Lsn {
        Lsn(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, value: Lsn) {
        self.0.store(value.0, Ordering::Release);
    }

    /// Atomically allocate the next LSN, returning the one just handed out.
    pub fn allocate_next(&self) -> Lsn {
        Lsn(self.0.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Advance the watermark to `value` if `value` is larger than the
    /// current one. Returns true if the watermark moved.
    pub fn advance_to(&self, value: Lsn) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if value.0 <= current {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                value.0,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsn_next() {
        assert_eq!(Lsn::NONE.next(), Lsn(1));
    }

    #[test]
    fn test_atomic_lsn_allocate() {
        let lsn = AtomicLsn::new(Lsn::NONE);
        assert_eq!(lsn.allocate_next(), Lsn(1));
        assert_eq!(lsn.allocate_next(), Lsn(2));
    }

    #[test]
    fn test_atomic_lsn_advance_to() {
        let lsn = AtomicLsn::new(Lsn::new(5));
        assert!(!lsn.advance_to(Lsn::new(3)));
        assert_eq!(lsn.load(), Lsn::new(5));
        assert!(lsn.advance_to(Lsn::new(10)));
        assert_eq!(lsn.load(), Lsn::new(10));
    }
}
