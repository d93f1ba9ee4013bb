//! Per-component interface masks.

use alloc::vec::Vec;
use core::fmt;

/// Set of interface components, one bit per `slot * 4 + component`.
///
/// Grows on demand up to [`ComponentMask::MAX_SLOTS`]; components of later
/// slots are ignored.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ComponentMask {
    words: Vec<u64>,
}

impl ComponentMask {
    pub const MAX_SLOTS: u32 = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// Bit index of a component. Saturates for slots no mask can hold.
    pub fn bit(slot: u32, component: u32) -> u32 {
        slot.saturating_mul(4).saturating_add(component)
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn insert(&mut self, bit: u32) {
        if bit >= Self::MAX_SLOTS * 4 {
            return;
        }
        let word = (bit / 64) as usize;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (bit % 64);
    }

    /// Set components `[first, first + count)` of `slot`, capped at the end
    /// of the slot.
    pub fn insert_components(&mut self, slot: u32, first: u32, count: u32) {
        for component in first..(first + count).min(4) {
            self.insert(Self::bit(slot, component));
        }
    }

    pub fn contains(&self, bit: u32) -> bool {
        self.words
            .get((bit / 64) as usize)
            .is_some_and(|word| word & (1u64 << (bit % 64)) != 0)
    }

    /// The four component bits of `slot` as a nibble (bit 0 = x).
    pub fn slot_components(&self, slot: u32) -> u8 {
        (0..4)
            .filter(|c| self.contains(Self::bit(slot, *c)))
            .fold(0, |acc, c| acc | (1 << c))
    }

    pub fn is_slot_used(&self, slot: u32) -> bool {
        self.slot_components(slot) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Set bits in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            (0..64)
                .filter(move |b| word & (1u64 << *b) != 0)
                .map(move |b| i as u32 * 64 + b)
        })
    }

    /// Used slots in ascending order
    pub fn slots(&self) -> impl Iterator<Item = u32> + '_ {
        let mut last = None;
        self.iter().filter_map(move |bit| {
            let slot = bit / 4;
            (last != Some(slot)).then(|| {
                last = Some(slot);
                slot
            })
        })
    }
}

/// Prints used slots with their components, e.g. `{32.xy 33.w}`.
impl fmt::Display for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, slot) in self.slots().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}.", slot)?;
            let nibble = self.slot_components(slot);
            for (c, name) in ['x', 'y', 'z', 'w'].iter().enumerate() {
                if nibble & (1 << c) != 0 {
                    write!(f, "{}", name)?;
                }
            }
        }
        f.write_str("}")
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMask{}", self)
    }
}

#[cfg(test)]
mod tests {
    use alloc::{format, vec};

    use super::*;

    #[test]
    fn test_insert_components_caps_at_slot_end() {
        let mut mask = ComponentMask::new();
        mask.insert_components(5, 2, 3);
        assert!(mask.contains(ComponentMask::bit(5, 2)));
        assert!(mask.contains(ComponentMask::bit(5, 3)));
        assert!(!mask.contains(ComponentMask::bit(6, 0)));
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.slot_components(5), 0b1100);
    }

    #[test]
    fn test_high_slots_grow() {
        let mut mask = ComponentMask::new();
        mask.insert(ComponentMask::bit(40, 1));
        assert!(mask.is_slot_used(40));
        assert!(!mask.is_slot_used(39));
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![161]);
    }

    #[test]
    fn test_slots_past_the_limit_are_ignored() {
        let mut mask = ComponentMask::new();
        mask.insert_components(ComponentMask::MAX_SLOTS, 0, 4);
        mask.insert_components(u32::MAX, 3, 1);
        mask.insert(ComponentMask::bit(1 << 30, 0));
        assert!(mask.is_empty());
        assert_eq!(ComponentMask::bit(u32::MAX, 2), u32::MAX);

        mask.insert_components(ComponentMask::MAX_SLOTS - 1, 3, 1);
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn test_display_and_clear() {
        let mut mask = ComponentMask::new();
        mask.insert_components(32, 0, 2);
        mask.insert_components(33, 3, 1);
        assert_eq!(format!("{}", mask), "{32.xy 33.w}");
        assert_eq!(mask.slots().collect::<Vec<_>>(), vec![32, 33]);
        mask.clear();
        assert!(mask.is_empty());
        assert_eq!(format!("{}", mask), "{}");
    }
}
