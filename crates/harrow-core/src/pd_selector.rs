//! Mapping from logical timestamps to partitions.
//!
//! Partitions are visited through a sliding window. The window holds
//! `window_size` consecutive partition positions; lts values cycle through
//! the window `slide_after_repeats` times, then the window slides forward by
//! one position. Each position is therefore visited repeatedly while it is
//! in the window and never again once it leaves it.
//!
//! With window size `W` and `R` repeats, lts `l` lands in window
//! `w = l / (W * R)` at slot `l % W`, so `position_for(l) = w + l % W`.

use harrow_schema::KeyCodec;
use harrow_types::{Lts, Pd};

use crate::error::SelectorConfigError;
use crate::rng::{PcgRng, stream_key};
use crate::streams;

/// Deterministic sliding-window partition selector.
#[derive(Debug, Clone)]
pub struct PdSelector {
    rng: PcgRng,
    pk_codec: KeyCodec,
    window_size: u64,
    slide_after_repeats: u64,
    cycle: u64,
}

/// Lts count of one window position, `window_size * slide_after_repeats`.
///
/// Must be non-zero and no larger than [`Lts::MAX`].
pub fn window_cycle(window_size: u64, slide_after_repeats: u64) -> Result<u64, SelectorConfigError> {
    if window_size == 0 || slide_after_repeats == 0 {
        return Err(SelectorConfigError::EmptyWindow);
    }
    window_size
        .checked_mul(slide_after_repeats)
        .filter(|&cycle| cycle <= Lts::MAX.as_u64())
        .ok_or(SelectorConfigError::WindowOverflow {
            window_size,
            slide_after_repeats,
        })
}

impl PdSelector {
    pub fn new(
        rng: PcgRng,
        pk_codec: KeyCodec,
        window_size: u64,
        slide_after_repeats: u64,
    ) -> Result<Self, SelectorConfigError> {
        let cycle = window_cycle(window_size, slide_after_repeats)?;
        Ok(Self {
            rng,
            pk_codec,
            window_size,
            slide_after_repeats,
            cycle,
        })
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    pub fn slide_after_repeats(&self) -> u64 {
        self.slide_after_repeats
    }

    /// Partition position visited at `lts`.
    pub fn position_for(&self, lts: Lts) -> u64 {
        let lts = lts.as_u64();
        lts / self.cycle + lts % self.window_size
    }

    /// Partition descriptor visited at `lts`.
    pub fn pd(&self, lts: Lts) -> Pd {
        self.pd_at_position(self.position_for(lts))
    }

    /// Partition descriptor at a position, within the partition key domain.
    pub fn pd_at_position(&self, position: u64) -> Pd {
        let raw = self
            .rng
            .random_number(position, stream_key(&[streams::PD]));
        Pd::new(self.pk_codec.adjust(raw))
    }

    /// First lts that visits `position`, or `None` past the u64 range.
    pub fn min_lts_at(&self, position: u64) -> Option<Lts> {
        let first_window = position.saturating_sub(self.window_size - 1);
        first_window
            .checked_mul(self.cycle)?
            .checked_add(position - first_window)
            .map(Lts::new)
    }

    /// Last lts that visits `position`, or `None` past the u64 range.
    pub fn max_lts_at(&self, position: u64) -> Option<Lts> {
        position
            .checked_mul(self.cycle)?
            .checked_add(self.cycle - self.window_size)
            .map(Lts::new)
    }

    /// Number of lts that visit `position`.
    pub fn visits_at(&self, position: u64) -> u64 {
        let first_window = position.saturating_sub(self.window_size - 1);
        (position - first_window + 1) * self.slide_after_repeats
    }

    /// Next lts visiting the same position as `lts`, if any.
    pub fn next_lts(&self, lts: Lts) -> Option<Lts> {
        let (window, repeat, slot) = self.decompose(lts);
        if repeat + 1 < self.slide_after_repeats {
            return lts.as_u64().checked_add(self.window_size).map(Lts::new);
        }
        // The position sits one slot lower in the next window; slot 0 means
        // it has just left the window.
        if slot == 0 {
            return None;
        }
        (window + 1)
            .checked_mul(self.cycle)?
            .checked_add(slot - 1)
            .map(Lts::new)
    }

    /// Previous lts visiting the same position as `lts`, if any.
    pub fn prev_lts(&self, lts: Lts) -> Option<Lts> {
        let (window, repeat, slot) = self.decompose(lts);
        if repeat > 0 {
            return Some(Lts::new(lts.as_u64() - self.window_size));
        }
        (window > 0 && slot + 1 < self.window_size)
            .then(|| Lts::new((window - 1) * self.cycle + self.cycle - self.window_size + slot + 1))
    }

    /// Splits an lts into (window, repeat within the window, slot).
    fn decompose(&self, lts: Lts) -> (u64, u64, u64) {
        let lts = lts.as_u64();
        let cycle = self.cycle;
        (
            lts / cycle,
            (lts % cycle) / self.window_size,
            lts % self.window_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harrow_schema::DataType;
    use proptest::prelude::*;

    fn selector(window_size: u64, repeats: u64) -> PdSelector {
        PdSelector::new(
            PcgRng::new(1, 2),
            KeyCodec::new(vec![DataType::BigInt]),
            window_size,
            repeats,
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_window() {
        let codec = KeyCodec::new(vec![DataType::BigInt]);
        assert_eq!(
            PdSelector::new(PcgRng::new(0, 0), codec.clone(), 0, 1).unwrap_err(),
            SelectorConfigError::EmptyWindow
        );
        assert!(PdSelector::new(PcgRng::new(0, 0), codec, 1, 0).is_err());
    }

    #[test]
    fn rejects_window_cycle_beyond_lts_range() {
        let codec = KeyCodec::new(vec![DataType::BigInt]);
        assert_eq!(
            PdSelector::new(PcgRng::new(1, 1), codec.clone(), 1 << 32, 1 << 32).unwrap_err(),
            SelectorConfigError::WindowOverflow {
                window_size: 1 << 32,
                slide_after_repeats: 1 << 32,
            }
        );
        assert!(PdSelector::new(PcgRng::new(1, 1), codec.clone(), 1 << 31, (1 << 31) + 1).is_err());

        let widest = PdSelector::new(PcgRng::new(1, 1), codec, 1 << 31, 1 << 31).unwrap();
        let last = Lts::MAX;
        assert_eq!(widest.position_for(last), 1 + (last.as_u64() % (1 << 31)));
        let _ = widest.pd(last);
        assert_eq!(widest.max_lts_at(u64::MAX), None);
        assert_eq!(widest.min_lts_at(5), Some(Lts::new(5)));
        assert_eq!(widest.min_lts_at(1 << 40), None);
    }

    #[test]
    fn window_of_one_visits_each_position_repeatedly() {
        let selector = selector(1, 3);
        let positions: Vec<u64> = (0..7).map(|l| selector.position_for(Lts::new(l))).collect();
        assert_eq!(positions, [0, 0, 0, 1, 1, 1, 2]);
    }

    #[test]
    fn sliding_window_positions() {
        let selector = selector(3, 2);
        let positions: Vec<u64> = (0..12).map(|l| selector.position_for(Lts::new(l))).collect();
        assert_eq!(positions, [0, 1, 2, 0, 1, 2, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn pd_fits_partition_key_domain() {
        let selector = PdSelector::new(
            PcgRng::new(5, 5),
            KeyCodec::new(vec![DataType::SmallInt]),
            4,
            2,
        )
        .unwrap();
        for lts in 0..100 {
            assert!(selector.pd(Lts::new(lts)).as_u64() < 1 << 16);
        }
    }

    proptest! {
        #[test]
        fn next_lts_walks_every_visit_of_a_position(
            window_size in 1u64..6,
            repeats in 1u64..6,
            position in 0u64..20,
        ) {
            let selector = selector(window_size, repeats);
            let horizon = selector.max_lts_at(position).unwrap().as_u64() + 1;
            let expected: Vec<Lts> = (0..horizon)
                .map(Lts::new)
                .filter(|&lts| selector.position_for(lts) == position)
                .collect();

            let mut walked = vec![selector.min_lts_at(position).unwrap()];
            while let Some(next) = selector.next_lts(*walked.last().unwrap()) {
                walked.push(next);
            }

            prop_assert_eq!(&walked, &expected);
            prop_assert_eq!(walked.len() as u64, selector.visits_at(position));
            prop_assert_eq!(walked.last().copied(), selector.max_lts_at(position));
        }

        #[test]
        fn prev_lts_inverts_next_lts(window_size in 1u64..6, repeats in 1u64..6, lts in 0u64..500) {
            let selector = selector(window_size, repeats);
            let lts = Lts::new(lts);
            if let Some(next) = selector.next_lts(lts) {
                prop_assert_eq!(selector.prev_lts(next), Some(lts));
            }
            if let Some(prev) = selector.prev_lts(lts) {
                prop_assert_eq!(selector.next_lts(prev), Some(lts));
                prop_assert_eq!(selector.position_for(prev), selector.position_for(lts));
            }
        }
    }
}
