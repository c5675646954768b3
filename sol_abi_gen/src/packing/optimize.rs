/* Slot-saving reorderings of a declaration-order layout */

use super::{PackedLayout, Placement};
use crate::abi::WORD_BITS;
use crate::error::GenResult;
use tracing::debug;

/// A fixed-size array moved as a unit: its placements keep their offsets and
/// their slots relative to `first_slot`.
struct Block {
    indices: Vec<usize>,
    first_slot: u64,
    span: u64,
    /// Bits taken in the last slot of the block.
    tail_used: u32,
}

/// Blocks first in declaration order, then free-standing fields best-fit by
/// decreasing width. The result is only taken when it saves at least one
/// slot over `layout`; otherwise declaration order stands.
pub fn optimize(layout: &PackedLayout) -> GenResult<PackedLayout> {
    let candidate = repack(layout, Order::BlocksFirst);
    candidate.validate()?;
    debug!(
        "packing {} fields: {} slots in declaration order, {} blocks first",
        layout.placements.len(),
        layout.slot_count,
        candidate.slot_count
    );
    if candidate.slot_count < layout.slot_count {
        Ok(candidate)
    } else {
        Ok(layout.clone())
    }
}

/// Free-standing fields best-fit first, every block after them on fresh
/// slots. Only used to cross-check [`optimize`] in tests.
pub fn pack_scalars_first(layout: &PackedLayout) -> GenResult<PackedLayout> {
    let packed = repack(layout, Order::ScalarsFirst);
    packed.validate()?;
    Ok(packed)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Order {
    BlocksFirst,
    ScalarsFirst,
}

fn repack(layout: &PackedLayout, order: Order) -> PackedLayout {
    let (blocks, mut scalars) = split(layout);
    /* stable: equal widths keep declaration order */
    scalars.sort_by(|a, b| layout.placements[*b].bit_length.cmp(&layout.placements[*a].bit_length));

    let mut placements = layout.placements.clone();
    let mut bins: Vec<u32> = Vec::new();
    if order == Order::BlocksFirst {
        for block in &blocks {
            put_block(block, &mut bins, &mut placements);
        }
    }
    for index in scalars {
        let width = placements[index].bit_length;
        let best = bins
            .iter()
            .enumerate()
            .filter(|(_, used)| **used + width <= WORD_BITS)
            .min_by_key(|(_, used)| WORD_BITS - **used - width)
            .map(|(slot, _)| slot);
        let slot = match best {
            Some(slot) => slot,
            None => {
                bins.push(0);
                bins.len() - 1
            }
        };
        placements[index].slot = slot as u64;
        placements[index].bit_offset = bins[slot];
        bins[slot] += width;
    }
    if order == Order::ScalarsFirst {
        for block in &blocks {
            put_block(block, &mut bins, &mut placements);
        }
    }
    PackedLayout {
        root: layout.root,
        mode: layout.mode,
        placements,
        slot_count: bins.len() as u64,
    }
}

fn put_block(block: &Block, bins: &mut Vec<u32>, placements: &mut [Placement]) {
    let base = bins.len() as u64;
    for index in &block.indices {
        placements[*index].slot = placements[*index].slot - block.first_slot + base;
    }
    for _ in 1..block.span {
        bins.push(WORD_BITS);
    }
    bins.push(block.tail_used);
}

fn split(layout: &PackedLayout) -> (Vec<Block>, Vec<usize>) {
    let mut blocks: Vec<(usize, Block)> = Vec::new();
    let mut scalars = Vec::new();
    for (index, p) in layout.placements.iter().enumerate() {
        let Some(group) = p.group else {
            scalars.push(index);
            continue;
        };
        match blocks.iter_mut().find(|(id, _)| *id == group.id) {
            Some((_, block)) => block.indices.push(index),
            None => blocks.push((
                group.id,
                Block {
                    indices: vec![index],
                    first_slot: p.slot,
                    span: 0,
                    tail_used: 0,
                },
            )),
        }
    }
    let blocks = blocks
        .into_iter()
        .map(|(_, mut block)| {
            let last = block
                .indices
                .iter()
                .map(|i| layout.placements[*i].slot)
                .max()
                .unwrap_or(block.first_slot);
            block.span = last - block.first_slot + 1;
            block.tail_used = block
                .indices
                .iter()
                .map(|i| &layout.placements[*i])
                .filter(|p| p.slot == last)
                .map(Placement::bit_end)
                .max()
                .unwrap_or(0);
            block
        })
        .collect();
    (blocks, scalars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::TypeArena;
    use crate::config::PackingMode;
    use crate::packing::place;
    use pretty_assertions::assert_eq;
    use sol_abi_types::{MemberDesc, TypeDesc};

    fn layout_of(arena: &mut TypeArena, members: Vec<(&str, TypeDesc)>) -> PackedLayout {
        let members = members.into_iter().map(|(n, t)| MemberDesc::new(n, t)).collect();
        let ty = arena.build(&TypeDesc::structure("S", members)).unwrap();
        place(arena, ty, PackingMode::Bytes).unwrap()
    }

    #[test]
    fn interleaved_fields_collapse() {
        let mut arena = TypeArena::new();
        let layout = layout_of(
            &mut arena,
            vec![
                ("a", TypeDesc::Uint(128)),
                ("b", TypeDesc::Uint(256)),
                ("c", TypeDesc::Uint(128)),
            ],
        );
        assert_eq!(layout.slot_count, 3);
        let packed = optimize(&layout).unwrap();
        assert_eq!(packed.slot_count, 2);
        let b = packed.find("b").unwrap();
        assert_eq!((b.slot, b.bit_offset), (0, 0));
        let a = packed.find("a").unwrap();
        let c = packed.find("c").unwrap();
        assert_eq!((a.slot, a.bit_offset, c.slot, c.bit_offset), (1, 0, 1, 128));
    }

    #[test]
    fn fields_fill_the_tail_of_an_array_block() {
        let mut arena = TypeArena::new();
        let layout = layout_of(
            &mut arena,
            vec![
                ("flag", TypeDesc::Bool),
                ("xs", TypeDesc::array(TypeDesc::Uint(64), Some(5))),
                ("big", TypeDesc::Uint(192)),
                ("tail", TypeDesc::Uint(8)),
            ],
        );
        assert_eq!(layout.slot_count, 4);
        let packed = optimize(&layout).unwrap();
        let xs4 = packed.find("xs[4]").unwrap();
        assert_eq!((xs4.slot, xs4.bit_offset), (1, 0));
        let big = packed.find("big").unwrap();
        assert_eq!((big.slot, big.bit_offset), (1, 64));
        let flag = packed.find("flag").unwrap();
        assert_eq!((flag.slot, flag.bit_offset), (2, 0));
        let tail = packed.find("tail").unwrap();
        assert_eq!((tail.slot, tail.bit_offset), (2, 8));
        assert_eq!(packed.slot_count, 3);

        let oracle = pack_scalars_first(&layout).unwrap();
        assert_eq!(oracle.find("xs[0]").unwrap().slot, 1);
        assert_eq!(oracle.slot_count, 3);
    }

    #[test]
    fn no_gain_keeps_declaration_order() {
        let mut arena = TypeArena::new();
        let layout = layout_of(
            &mut arena,
            vec![("a", TypeDesc::Bool), ("b", TypeDesc::Uint(32)), ("c", TypeDesc::Address)],
        );
        assert_eq!(optimize(&layout).unwrap(), layout);
    }

    #[test]
    fn leading_field_moves_into_array_tail() {
        let mut arena = TypeArena::new();
        let layout = layout_of(
            &mut arena,
            vec![("a", TypeDesc::Uint(8)), ("xs", TypeDesc::array(TypeDesc::Uint(8), Some(1)))],
        );
        assert_eq!(layout.slot_count, 2);
        let packed = optimize(&layout).unwrap();
        assert_eq!(packed.slot_count, 1);
        let a = packed.find("a").unwrap();
        assert_eq!((a.slot, a.bit_offset), (0, 8));
        assert_eq!(packed.find("xs[0]").unwrap().bit_offset, 0);
    }

    #[test]
    fn never_worse_than_declaration_order() {
        let mut arena = TypeArena::new();
        let layout = layout_of(
            &mut arena,
            vec![("a", TypeDesc::Uint(8)), ("b", TypeDesc::Uint(16)), ("c", TypeDesc::Address)],
        );
        let packed = optimize(&layout).unwrap();
        assert_eq!(packed.slot_count, 1);
        packed.validate().unwrap();
    }
}
