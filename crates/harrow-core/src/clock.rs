//! Monotonic mapping between logical and real timestamps.
//!
//! The real timestamp (rts) of an lts is the write timestamp handed to the
//! system under test. It must be strictly increasing in lts so that the
//! store's last-write-wins resolution agrees with logical order, and it must
//! be invertible so that write times read back from the store can be
//! attributed to the visit that produced them.
//!
//! A clock is an explicit value owned by a [`crate::Run`]. There is no
//! process-wide clock; two runs in one process never share state.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use harrow_types::{Lts, Rts};

use crate::error::ClockError;

/// Bijection between lts and rts, strictly increasing in lts.
pub trait MonotonicClock: Send + Sync + Debug {
    /// Real timestamp of `lts`. Total over `0..=Lts::MAX`.
    fn rts(&self, lts: Lts) -> Rts;

    /// Inverse of [`MonotonicClock::rts`]. `None` if `rts` was not produced
    /// by this clock.
    fn lts(&self, rts: Rts) -> Option<Lts>;

    /// Allocates the next logical timestamp.
    fn next_lts(&self) -> Lts;

    /// The lts the next call to [`MonotonicClock::next_lts`] will return.
    fn peek(&self) -> Lts;
}

/// Clock mapping `lts` to `base + lts`.
///
/// The base is validated so that `rts(Lts::MAX) + 1` still fits in a
/// signed 64-bit timestamp.
#[derive(Debug)]
pub struct OffsetClock {
    base: u64,
    next: AtomicU64,
}

impl OffsetClock {
    /// Largest base that keeps every rts (and its successor) below `i64::MAX`.
    pub const MAX_BASE: u64 = i64::MAX as u64 - Lts::MAX.as_u64() - 1;

    pub fn new(base: u64) -> Result<Self, ClockError> {
        if base > Self::MAX_BASE {
            return Err(ClockError::BaseTooLarge {
                base,
                max_base: Self::MAX_BASE,
                max_lts: Lts::MAX,
            });
        }
        Ok(Self {
            base,
            next: AtomicU64::new(0),
        })
    }

    /// Clock whose base is the current wall time in microseconds, the unit
    /// CQL stores use for write timestamps.
    pub fn from_wall_clock() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_micros() as u64);
        Self {
            base: micros.min(Self::MAX_BASE),
            next: AtomicU64::new(0),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }
}

impl MonotonicClock for OffsetClock {
    fn rts(&self, lts: Lts) -> Rts {
        debug_assert!(lts <= Lts::MAX, "lts {lts} beyond clock domain");
        Rts::new(self.base.saturating_add(lts.as_u64()))
    }

    fn lts(&self, rts: Rts) -> Option<Lts> {
        let lts = rts.as_u64().checked_sub(self.base)?;
        (lts <= Lts::MAX.as_u64()).then_some(Lts::new(lts))
    }

    fn next_lts(&self) -> Lts {
        Lts::new(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn peek(&self) -> Lts {
        Lts::new(self.next.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn rejects_base_without_headroom() {
        assert!(OffsetClock::new(OffsetClock::MAX_BASE).is_ok());
        let err = OffsetClock::new(OffsetClock::MAX_BASE + 1).unwrap_err();
        assert!(matches!(err, ClockError::BaseTooLarge { .. }));
    }

    #[test]
    fn successor_of_max_rts_fits_in_i64() {
        let clock = OffsetClock::new(OffsetClock::MAX_BASE).unwrap();
        let rts = clock.rts(Lts::MAX).successor();
        assert!(rts.as_i64() > 0);
        assert_eq!(rts.as_u64(), i64::MAX as u64);
    }

    #[test]
    fn lts_rejects_foreign_timestamps() {
        let clock = OffsetClock::new(1000).unwrap();
        assert_eq!(clock.lts(Rts::new(999)), None);
        assert_eq!(clock.lts(Rts::new(1000)), Some(Lts::ZERO));
    }

    #[test]
    fn next_lts_is_unique_across_threads() {
        let clock = Arc::new(OffsetClock::new(0).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..1000).map(|_| clock.next_lts()).collect::<Vec<_>>())
            })
            .collect();
        let all: HashSet<Lts> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(all.len(), 4000);
        assert_eq!(clock.peek(), Lts::new(4000));
    }

    #[test]
    fn independent_clocks_do_not_share_state() {
        let a = OffsetClock::new(0).unwrap();
        let b = OffsetClock::new(0).unwrap();
        a.next_lts();
        a.next_lts();
        assert_eq!(b.peek(), Lts::ZERO);
    }

    proptest! {
        #[test]
        fn rts_is_strictly_increasing(
            base in 0..=OffsetClock::MAX_BASE,
            a in 0..=Lts::MAX.as_u64(),
            b in 0..=Lts::MAX.as_u64(),
        ) {
            prop_assume!(a < b);
            let clock = OffsetClock::new(base).unwrap();
            prop_assert!(clock.rts(Lts::new(a)) < clock.rts(Lts::new(b)));
        }

        #[test]
        fn lts_inverts_rts(base in 0..=OffsetClock::MAX_BASE, lts in 0..=Lts::MAX.as_u64()) {
            let clock = OffsetClock::new(base).unwrap();
            prop_assert_eq!(clock.lts(clock.rts(Lts::new(lts))), Some(Lts::new(lts)));
        }
    }
}
