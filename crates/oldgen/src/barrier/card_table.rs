//! Card Table - One Byte per 512-Byte Card
//!
//! ```text
//!   heap:   │ card 0 │ card 1 │ card 2 │ card 3 │ ...
//!   table:  [ clean  ][ dirty  ][ clean  ][ clean  ] ...
//!              ▲ covered ───────────────────▲
//! ```
//!
//! Cards outside the covered range are kept clean; a card becomes part of
//! the range clean and leaves it clean.

use crate::error::{OldGenError, Result};
use crate::heap::mem_region::MemRegion;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Card size in bytes
pub const CARD_SIZE: usize = 512;

/// log2(CARD_SIZE)
pub const CARD_SHIFT: usize = 9;

/// Card value: no old-to-young pointer recorded
pub const CLEAN_CARD: u8 = 0xff;

/// Card value: card may hold an old-to-young pointer
pub const DIRTY_CARD: u8 = 0;

/// Remembered-set contract
pub trait RememberedSet: Send + Sync {
    /// Make `region` the covered range
    fn resize_covered_region(&self, region: MemRegion);

    fn covered_region(&self) -> MemRegion;

    /// Whether `addr` lies on a card boundary
    fn is_card_aligned(&self, addr: usize) -> bool;

    /// The whole heap the table can describe
    fn whole_heap(&self) -> MemRegion;
}

/// CardTable - byte-per-card RememberedSet
pub struct CardTable {
    whole_heap: MemRegion,
    covered: RwLock<MemRegion>,
    cards: Vec<AtomicU8>,
}

impl CardTable {
    /// Create a card table spanning `whole_heap`, covering nothing yet
    pub fn new(whole_heap: MemRegion) -> Result<Self> {
        if whole_heap.is_empty()
            || !whole_heap.start().is_multiple_of(CARD_SIZE)
            || !whole_heap.end().is_multiple_of(CARD_SIZE)
        {
            return Err(OldGenError::AlignmentError {
                address: whole_heap.start(),
                alignment: CARD_SIZE,
            });
        }

        let count = whole_heap.byte_size() >> CARD_SHIFT;
        let cards = (0..count).map(|_| AtomicU8::new(CLEAN_CARD)).collect();

        Ok(Self {
            whole_heap,
            covered: RwLock::new(MemRegion::new(whole_heap.start(), whole_heap.start())),
            cards,
        })
    }

    #[inline]
    fn index_for(&self, addr: usize) -> usize {
        debug_assert!(
            addr >= self.whole_heap.start() && addr < self.whole_heap.end(),
            "address {:#x} outside {}",
            addr,
            self.whole_heap
        );
        (addr - self.whole_heap.start()) >> CARD_SHIFT
    }

    fn fill(&self, start: usize, end: usize, value: u8) {
        if start >= end {
            return;
        }
        let first = self.index_for(start);
        let last = self.index_for(end - 1);
        for card in &self.cards[first..=last] {
            card.store(value, Ordering::Relaxed);
        }
    }

    /// Dirty the card holding `addr` (write barrier)
    #[inline]
    pub fn mark_dirty(&self, addr: usize) {
        debug_assert!(self.covered_region().contains(addr));
        self.cards[self.index_for(addr)].store(DIRTY_CARD, Ordering::Relaxed);
    }

    pub fn is_dirty(&self, addr: usize) -> bool {
        self.cards[self.index_for(addr)].load(Ordering::Relaxed) == DIRTY_CARD
    }

    /// Dirty every card touching `region`
    pub fn dirty_region(&self, region: MemRegion) {
        let region = region.intersection(&self.covered_region());
        self.fill(region.start(), region.end(), DIRTY_CARD);
    }

    /// Clean every card touching `region`
    pub fn clear_region(&self, region: MemRegion) {
        let region = region.intersection(&self.whole_heap);
        self.fill(region.start(), region.end(), CLEAN_CARD);
    }

    /// Number of dirty cards in the covered range
    pub fn dirty_card_count(&self) -> usize {
        let covered = self.covered_region();
        if covered.is_empty() {
            return 0;
        }
        let first = self.index_for(covered.start());
        let last = self.index_for(covered.end() - 1);
        self.cards[first..=last]
            .iter()
            .filter(|c| c.load(Ordering::Relaxed) == DIRTY_CARD)
            .count()
    }
}

impl RememberedSet for CardTable {
    fn resize_covered_region(&self, region: MemRegion) {
        crate::guarantee!(
            self.whole_heap.contains_region(&region),
            "covered {} outside heap {}",
            region,
            self.whole_heap
        );
        crate::guarantee!(
            self.is_card_aligned(region.start()),
            "covered start {:#x} not card aligned",
            region.start()
        );

        let mut covered = self.covered.write();
        let old = *covered;

        if old.start() == region.start() {
            if region.end() > old.end() {
                self.fill(old.end(), region.end(), CLEAN_CARD);
            } else {
                self.fill(region.end(), old.end(), CLEAN_CARD);
            }
        } else {
            self.fill(old.start(), old.end(), CLEAN_CARD);
            self.fill(region.start(), region.end(), CLEAN_CARD);
        }

        *covered = region;
    }

    fn covered_region(&self) -> MemRegion {
        *self.covered.read()
    }

    fn is_card_aligned(&self, addr: usize) -> bool {
        addr.is_multiple_of(CARD_SIZE)
    }

    fn whole_heap(&self) -> MemRegion {
        self.whole_heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAP_START: usize = 0x1000_0000;

    fn table(cards: usize) -> CardTable {
        CardTable::new(MemRegion::with_size(HEAP_START, cards * CARD_SIZE)).unwrap()
    }

    #[test]
    fn test_new_table_covers_nothing() {
        let ct = table(16);
        assert!(ct.covered_region().is_empty());
        assert_eq!(ct.whole_heap().byte_size(), 16 * CARD_SIZE);
        assert_eq!(ct.dirty_card_count(), 0);
    }

    #[test]
    fn test_misaligned_heap_rejected() {
        let result = CardTable::new(MemRegion::with_size(HEAP_START + 8, 4 * CARD_SIZE));
        assert!(matches!(result, Err(OldGenError::AlignmentError { .. })));
    }

    #[test]
    fn test_dirty_and_query() {
        let ct = table(16);
        ct.resize_covered_region(MemRegion::with_size(HEAP_START, 8 * CARD_SIZE));

        ct.mark_dirty(HEAP_START + CARD_SIZE + 100);
        assert!(ct.is_dirty(HEAP_START + CARD_SIZE));
        assert!(!ct.is_dirty(HEAP_START));
        assert_eq!(ct.dirty_card_count(), 1);

        ct.clear_region(MemRegion::with_size(HEAP_START, 8 * CARD_SIZE));
        assert_eq!(ct.dirty_card_count(), 0);
    }

    #[test]
    fn test_shrink_cleans_dropped_cards() {
        let ct = table(16);
        let full = MemRegion::with_size(HEAP_START, 8 * CARD_SIZE);
        ct.resize_covered_region(full);
        ct.dirty_region(full);
        assert_eq!(ct.dirty_card_count(), 8);

        ct.resize_covered_region(MemRegion::with_size(HEAP_START, 4 * CARD_SIZE));
        assert_eq!(ct.dirty_card_count(), 4);
        assert!(!ct.is_dirty(HEAP_START + 5 * CARD_SIZE));

        // Regrowth brings the dropped cards back clean
        ct.resize_covered_region(full);
        assert_eq!(ct.dirty_card_count(), 4);
    }

    #[test]
    fn test_card_alignment() {
        let ct = table(4);
        assert!(ct.is_card_aligned(HEAP_START));
        assert!(ct.is_card_aligned(HEAP_START + CARD_SIZE));
        assert!(!ct.is_card_aligned(HEAP_START + 8));
    }

    #[test]
    #[should_panic(expected = "guarantee")]
    fn test_covered_beyond_heap_panics() {
        let ct = table(4);
        ct.resize_covered_region(MemRegion::with_size(HEAP_START, 8 * CARD_SIZE));
    }
}
