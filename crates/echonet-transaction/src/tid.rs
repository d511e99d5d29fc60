use std::sync::atomic::{AtomicU16, Ordering};

/// Source of transaction ids.
///
/// Ids increase by one, wrap after `0xFFFF` and never take the value zero.
/// A generator is normally owned by one manager; share it through an `Arc`
/// when several managers must not collide.
#[derive(Debug)]
pub struct TidGenerator {
    next: AtomicU16,
}

impl TidGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start the sequence at `tid`. Zero starts at one.
    pub fn starting_at(tid: u16) -> Self {
        Self {
            next: AtomicU16::new(tid.max(1)),
        }
    }

    pub fn next_tid(&self) -> u16 {
        loop {
            let tid = self.next.fetch_add(1, Ordering::Relaxed);
            if tid != 0 {
                return tid;
            }
        }
    }
}

impl Default for TidGenerator {
    fn default() -> Self {
        Self::new()
    }
}
