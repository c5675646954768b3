//! Slot assignment for bit-packed storage and stack words.
//!
//! [`place`] walks a struct, tuple or fixed-size array in declaration order
//! and assigns every value-typed leaf a `(slot, bit offset, bit length)`.
//! Bit offsets count from the most significant bit of the slot word.
//! [`optimize`] may then reorder free-standing fields to save slots, and
//! [`accessor`] synthesizes the cheapest read/write expression per field.

pub mod accessor;
pub mod codegen;
pub mod cost;
mod optimize;

pub use accessor::{
    AccessExpr, Candidate, Field, WordSource, WriteForm, read_candidates, synthesize_read, synthesize_write,
    write_candidates,
};
pub use codegen::{emit_accessors, slot_location};
pub use optimize::{optimize, pack_scalars_first};

use crate::abi::{TypeArena, TypeId, TypeKind, WORD_BITS};
use crate::config::{PackingConfig, PackingMode};
use crate::error::{GenError, GenResult};

/// Membership of a placement in a fixed-size array: the array moves as one
/// block and its elements are never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayGroup {
    pub id: usize,
    pub index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub slot: u64,
    pub bit_offset: u32,
    pub bit_length: u32,
    /// Dotted path from the packed root, e.g. `order.legs[1]`.
    pub label: String,
    pub ty: TypeId,
    pub group: Option<ArrayGroup>,
}

impl Placement {
    pub fn bit_end(&self) -> u32 {
        self.bit_offset + self.bit_length
    }

    pub fn overlaps(&self, other: &Placement) -> bool {
        self.slot == other.slot && self.bit_offset < other.bit_end() && other.bit_offset < self.bit_end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedLayout {
    pub root: TypeId,
    pub mode: PackingMode,
    pub placements: Vec<Placement>,
    pub slot_count: u64,
}

impl PackedLayout {
    /// Checks that every field lies inside one slot and that no two fields
    /// sharing a slot overlap.
    pub fn validate(&self) -> GenResult<()> {
        for (i, p) in self.placements.iter().enumerate() {
            if p.bit_length == 0 || p.bit_end() > WORD_BITS {
                return Err(GenError::PackingInvariant(format!(
                    "{} spans bits {}..{} of slot {}",
                    p.label,
                    p.bit_offset,
                    p.bit_end(),
                    p.slot
                )));
            }
            if p.slot >= self.slot_count {
                return Err(GenError::PackingInvariant(format!(
                    "{} sits in slot {} of a {}-slot layout",
                    p.label, p.slot, self.slot_count
                )));
            }
            if let Some(q) = self.placements[..i].iter().find(|q| q.overlaps(p)) {
                return Err(GenError::PackingInvariant(format!(
                    "{} overlaps {} in slot {}",
                    p.label, q.label, p.slot
                )));
            }
        }
        Ok(())
    }

    pub fn total_bits(&self) -> u64 {
        self.placements.iter().map(|p| p.bit_length as u64).sum()
    }

    pub fn find(&self, label: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.label == label)
    }
}

/// Width a value-typed field occupies under `mode`.
pub fn field_bits(arena: &TypeArena, ty: TypeId, mode: PackingMode) -> GenResult<u32> {
    let bits = arena.exact_bits(ty)?;
    Ok(match mode {
        PackingMode::Bits => bits,
        PackingMode::Bytes => bits.div_ceil(8) * 8,
    })
}

/// Places every value-typed leaf of `root` in declaration order.
pub fn place(arena: &TypeArena, root: TypeId, mode: PackingMode) -> GenResult<PackedLayout> {
    let mut placer = Placer {
        arena,
        mode,
        slot: 0,
        used: 0,
        next_group: 0,
        out: Vec::new(),
    };
    match arena.kind(root) {
        TypeKind::Struct { .. } | TypeKind::Tuple { .. } => placer.members(root, "", None)?,
        TypeKind::Array { length: Some(_), .. } => placer.array(root, "", None)?,
        _ => return Err(unsupported(arena, root, "only structs, tuples and fixed-size arrays can be packed")),
    }
    let slot_count = placer.out.iter().map(|p| p.slot + 1).max().unwrap_or(0);
    Ok(PackedLayout {
        root,
        mode,
        placements: placer.out,
        slot_count,
    })
}

/// [`place`], then [`optimize`] when `config` asks for it.
pub fn pack(arena: &TypeArena, root: TypeId, config: &PackingConfig) -> GenResult<PackedLayout> {
    let layout = place(arena, root, config.mode)?;
    layout.validate()?;
    if config.optimize { optimize(&layout) } else { Ok(layout) }
}

struct Placer<'a> {
    arena: &'a TypeArena,
    mode: PackingMode,
    slot: u64,
    /// Bits already taken in `slot`.
    used: u32,
    next_group: usize,
    out: Vec<Placement>,
}

impl Placer<'_> {
    fn members(&mut self, ty: TypeId, prefix: &str, group: Option<ArrayGroup>) -> GenResult<()> {
        for (index, member) in self.arena.members(ty).iter().enumerate() {
            let name = self.arena.label(*member).map(str::to_string).unwrap_or_else(|| format!("_{index}"));
            let label = if prefix.is_empty() { name } else { format!("{prefix}.{name}") };
            self.field(*member, label, group)?;
        }
        Ok(())
    }

    fn field(&mut self, ty: TypeId, label: String, group: Option<ArrayGroup>) -> GenResult<()> {
        if self.arena.is_dynamically_encoded(ty) {
            return Err(unsupported(self.arena, ty, "dynamically sized data has no fixed slot"));
        }
        match self.arena.kind(ty) {
            TypeKind::Struct { .. } | TypeKind::Tuple { .. } => {
                self.fresh_slot();
                self.members(ty, &label, group)
            }
            TypeKind::Array { .. } => self.array(ty, &label, group),
            _ if self.arena.is_value_type(ty) => {
                let bits = field_bits(self.arena, ty, self.mode)?;
                if self.used + bits > WORD_BITS {
                    self.fresh_slot();
                }
                self.out.push(Placement {
                    slot: self.slot,
                    bit_offset: self.used,
                    bit_length: bits,
                    label,
                    ty,
                    group,
                });
                self.used += bits;
                Ok(())
            }
            _ => Err(unsupported(self.arena, ty, "not a storable type")),
        }
    }

    fn array(&mut self, ty: TypeId, label: &str, group: Option<ArrayGroup>) -> GenResult<()> {
        let TypeKind::Array { base, length: Some(n) } = self.arena.kind(ty) else {
            return Err(unsupported(self.arena, ty, "dynamically sized arrays have no fixed slot"));
        };
        self.fresh_slot();
        let id = match group {
            Some(outer) => outer.id,
            None => {
                self.next_group += 1;
                self.next_group - 1
            }
        };
        for index in 0..*n {
            /* nested arrays stay tagged with the outermost element */
            let tag = group.unwrap_or(ArrayGroup { id, index });
            self.field(*base, format!("{label}[{index}]"), Some(tag))?;
        }
        Ok(())
    }

    fn fresh_slot(&mut self) {
        if self.used > 0 {
            self.slot += 1;
            self.used = 0;
        }
    }
}

fn unsupported(arena: &TypeArena, ty: TypeId, reason: &str) -> GenError {
    GenError::UnsupportedPacking {
        type_name: arena.identifier(ty).to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sol_abi_types::{MemberDesc, TypeDesc};

    fn offsets(layout: &PackedLayout) -> Vec<(u64, u32, u32)> {
        layout.placements.iter().map(|p| (p.slot, p.bit_offset, p.bit_length)).collect()
    }

    #[test]
    fn bool_uint32_address_share_one_slot() {
        let mut arena = TypeArena::new();
        let ty = arena
            .build(&TypeDesc::structure(
                "Flags",
                vec![
                    MemberDesc::new("a", TypeDesc::Bool),
                    MemberDesc::new("b", TypeDesc::Uint(32)),
                    MemberDesc::new("c", TypeDesc::Address),
                ],
            ))
            .unwrap();
        let layout = place(&arena, ty, PackingMode::Bytes).unwrap();
        assert_eq!(offsets(&layout), vec![(0, 0, 8), (0, 8, 32), (0, 40, 160)]);
        assert_eq!(layout.slot_count, 1);
        layout.validate().unwrap();
    }

    #[test]
    fn nested_structs_and_arrays_start_fresh_slots() {
        let mut arena = TypeArena::new();
        let inner = TypeDesc::structure(
            "Inner",
            vec![MemberDesc::new("x", TypeDesc::Uint(64)), MemberDesc::new("y", TypeDesc::Uint(64))],
        );
        let ty = arena
            .build(&TypeDesc::structure(
                "Outer",
                vec![
                    MemberDesc::new("flag", TypeDesc::Bool),
                    MemberDesc::new("inner", inner),
                    MemberDesc::new("tail", TypeDesc::Uint(8)),
                    MemberDesc::new("legs", TypeDesc::array(TypeDesc::Uint(128), Some(3))),
                ],
            ))
            .unwrap();
        let layout = place(&arena, ty, PackingMode::Bytes).unwrap();
        assert_eq!(
            offsets(&layout),
            vec![(0, 0, 8), (1, 0, 64), (1, 64, 64), (1, 128, 8), (2, 0, 128), (2, 128, 128), (3, 0, 128)]
        );
        assert_eq!(layout.placements[1].label, "inner.x");
        assert_eq!(layout.placements[5].label, "legs[1]");
        assert_eq!(layout.placements[5].group, Some(ArrayGroup { id: 0, index: 1 }));
        assert_eq!(layout.slot_count, 4);
        layout.validate().unwrap();
    }

    #[test]
    fn bits_mode_uses_exact_widths() {
        let mut arena = TypeArena::new();
        let ty = arena
            .build(&TypeDesc::structure(
                "Small",
                vec![
                    MemberDesc::new(
                        "side",
                        TypeDesc::Enum(sol_abi_types::EnumDesc {
                            name: "Side".into(),
                            members: vec!["Buy".into(), "Sell".into(), "Hold".into()],
                        }),
                    ),
                    MemberDesc::new("n", TypeDesc::Uint(16)),
                ],
            ))
            .unwrap();
        let bits = place(&arena, ty, PackingMode::Bits).unwrap();
        assert_eq!(offsets(&bits), vec![(0, 0, 2), (0, 2, 16)]);
        let bytes = place(&arena, ty, PackingMode::Bytes).unwrap();
        assert_eq!(offsets(&bytes), vec![(0, 0, 8), (0, 8, 16)]);
    }

    #[test]
    fn dynamic_members_are_rejected() {
        let mut arena = TypeArena::new();
        let ty = arena
            .build(&TypeDesc::structure("Blob", vec![MemberDesc::new("data", TypeDesc::Bytes)]))
            .unwrap();
        assert!(matches!(place(&arena, ty, PackingMode::Bytes), Err(GenError::UnsupportedPacking { .. })));
        let word = arena.add_uint(256).unwrap();
        assert!(place(&arena, word, PackingMode::Bytes).is_err());
    }

    #[test]
    fn validate_catches_overlap() {
        let mut arena = TypeArena::new();
        let ty = arena
            .build(&TypeDesc::structure(
                "Two",
                vec![MemberDesc::new("a", TypeDesc::Uint(128)), MemberDesc::new("b", TypeDesc::Uint(128))],
            ))
            .unwrap();
        let mut layout = place(&arena, ty, PackingMode::Bytes).unwrap();
        layout.placements[1].bit_offset = 64;
        assert!(matches!(layout.validate(), Err(GenError::PackingInvariant(_))));
        layout.placements[1].bit_offset = 200;
        assert!(layout.validate().is_err());
    }
}
