//! Slot assignment for matched varyings.

use alloc::vec::Vec;

use log::debug;
use lpc_glir::Shader;

use crate::matching::VaryingMatches;

/// Position of one match record, relative to the first generic slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Placement {
    pub slot: u32,
    pub location_frac: u32,
}

impl Placement {
    fn from_fine(fine: u32) -> Self {
        Self {
            slot: fine / 4,
            location_frac: fine % 4,
        }
    }

    /// `slot * 4 + location_frac`
    pub fn fine(self) -> u32 {
        self.slot * 4 + self.location_frac
    }
}

/// Result of [`assign_locations`]: one placement per match record, in
/// record order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedLayout {
    placements: Vec<Placement>,
    slots_used: u32,
}

/// Assign every match record a component range.
///
/// Records are placed in (class, order) order, stably; each new class starts
/// on a fresh slot. A vector that would cross into the next slot moves there
/// first, except vec3s, which are allowed to straddle.
pub fn assign_locations(matches: &VaryingMatches) -> PackedLayout {
    let records = matches.as_slice();
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by_key(|&i| (records[i].packing_class, records[i].packing_order));

    let mut placements = alloc::vec![Placement::default(); records.len()];
    let mut cursor = 0u32;
    let mut previous_class = None;
    for i in order {
        let record = &records[i];
        if previous_class.is_some_and(|class| class != record.packing_class) {
            cursor = align_to_slot(cursor);
        }
        previous_class = Some(record.packing_class);

        let used = cursor % 4;
        if record.element_width != 3 && used + record.element_width > 4 {
            cursor = align_to_slot(cursor);
        }
        placements[i] = Placement::from_fine(cursor);
        cursor += record.num_components;
    }

    let layout = PackedLayout {
        placements,
        slots_used: (cursor + 3) / 4,
    };
    debug!(
        "packed {} varyings into {} slots",
        records.len(),
        layout.slots_used
    );
    layout
}

fn align_to_slot(fine: u32) -> u32 {
    (fine + 3) & !3
}

impl PackedLayout {
    pub fn slots_used(&self) -> u32 {
        self.slots_used
    }

    /// Placement of the `index`th match record.
    pub fn placement(&self, index: usize) -> Option<Placement> {
        self.placements.get(index).copied()
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Write the final locations into both stages. Slots are offset by
    /// `base`, the first generic varying slot.
    pub fn store(
        &self,
        matches: &VaryingMatches,
        producer: &mut Shader,
        mut consumer: Option<&mut Shader>,
        base: u32,
    ) {
        for (record, placement) in matches.iter().zip(&self.placements) {
            let location = Some(base + placement.slot);
            let output = &mut producer.vars[record.producer_var];
            output.location = location;
            output.location_frac = placement.location_frac;
            debug!(
                "{} -> {}.{}",
                output.name,
                base + placement.slot,
                placement.location_frac
            );
            if let (Some(consumer), Some(input)) = (consumer.as_deref_mut(), record.consumer_var) {
                let input = &mut consumer.vars[input];
                input.location = location;
                input.location_frac = placement.location_frac;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use lpc_glir::{parse_shader, VariableMode};

    use super::*;

    fn record_all(text: &str, disable: bool) -> (Shader, VaryingMatches) {
        let shader = parse_shader(text).unwrap();
        let mut matches = VaryingMatches::new(disable);
        for var in shader.interface_vars().collect::<Vec<_>>() {
            matches.record(&shader, var, None);
        }
        (shader, matches)
    }

    fn location(shader: &Shader, name: &str) -> (u32, u32) {
        let var = shader.find_var(name, VariableMode::ShaderOut).unwrap();
        let data = &shader.vars[var];
        (data.location.unwrap(), data.location_frac)
    }

    #[test]
    fn test_matrix_then_vec3_array() {
        let (mut shader, matches) = record_all(
            "shader vertex
            (declare (out) (array vec3 2) bar)
            (declare (out) mat3x2 foo)
            (function main (parameters) ())",
            false,
        );
        let layout = assign_locations(&matches);
        assert_eq!(layout.slots_used(), 3);
        layout.store(&matches, &mut shader, None, 4);
        assert_eq!(location(&shader, "foo"), (4, 0));
        assert_eq!(location(&shader, "bar"), (5, 2));
    }

    #[test]
    fn test_classes_start_on_fresh_slots() {
        let (_, matches) = record_all(
            "shader vertex
            (declare (out flat) float a)
            (declare (out) float b)
            (declare (out) vec2 c)
            (declare (out flat) vec3 d)
            (function main (parameters) ())",
            false,
        );
        let layout = assign_locations(&matches);
        let fine: Vec<u32> = layout.placements().iter().map(|p| p.fine()).collect();
        // class 0: c (vec2) then b (scalar); class 2: a (scalar) then d (vec3)
        assert_eq!(fine, vec![4, 2, 0, 5]);
        assert_eq!(layout.slots_used(), 2);
    }

    #[test]
    fn test_vec2_does_not_straddle() {
        let (_, matches) = record_all(
            "shader vertex
            (declare (out) vec3 a)
            (declare (out) vec2 b)
            (declare (out) vec3 c)
            (function main (parameters) ())",
            false,
        );
        let layout = assign_locations(&matches);
        // b first (vec2), then a and c straddle
        let fine: Vec<u32> = layout.placements().iter().map(|p| p.fine()).collect();
        assert_eq!(fine, vec![2, 0, 5]);
        assert_eq!(layout.slots_used(), 2);
    }

    #[test]
    fn test_disabled_packing_is_slot_aligned() {
        let (_, matches) = record_all(
            "shader vertex
            (declare (out) float a)
            (declare (out) (array vec2 3) b)
            (declare (out) mat2 c)
            (function main (parameters) ())",
            true,
        );
        let layout = assign_locations(&matches);
        let slots: Vec<Placement> = layout.placements().to_vec();
        assert!(slots.iter().all(|p| p.location_frac == 0));
        assert_eq!(layout.slots_used(), 1 + 3 + 2);
    }

    #[test]
    fn test_store_writes_consumer() {
        let mut vs = parse_shader(
            "shader vertex
            (declare (out) vec2 uv)
            (function main (parameters) ())",
        )
        .unwrap();
        let mut fs = parse_shader(
            "shader fragment
            (declare (in) vec2 uv)
            (function main (parameters) ())",
        )
        .unwrap();
        let mut matches = VaryingMatches::new(false);
        crate::matching::match_varyings(&vs, Some(&fs), &mut matches);
        let layout = assign_locations(&matches);
        layout.store(&matches, &mut vs, Some(&mut fs), 32);
        let input = fs.find_var("uv", VariableMode::ShaderIn).unwrap();
        assert_eq!(fs.vars[input].location, Some(32));
        assert_eq!(location(&vs, "uv"), (32, 0));
    }
}
