//! Strategy selection for arrays and copy segmentation for structs.

use crate::abi::arena::{TypeArena, TypeId, TypeKind};
use crate::abi::geometry::{Regime, WORD};
use crate::error::{GenError, GenResult};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayStrategy {
    /// Elements are value words; the whole array is one copy.
    ValueInline,
    /// Elements are static and laid out identically in calldata and memory:
    /// one copy of the tail, then a loop writing head pointers.
    CombinedStaticTail,
    /// Elements are one level of dynamic data (bytes, string, value
    /// arrays): offsets are validated against the canonical layout, then the
    /// tail is copied in one go.
    CombinedDynamicTail,
    /// Per-element recursive calls.
    SeparateTail,
}

impl ArrayStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrayStrategy::ValueInline => "value-inline",
            ArrayStrategy::CombinedStaticTail => "combined-static-tail",
            ArrayStrategy::CombinedDynamicTail => "combined-dynamic-tail",
            ArrayStrategy::SeparateTail => "separate-tail",
        }
    }
}

pub fn classify_array(arena: &TypeArena, array: TypeId) -> GenResult<ArrayStrategy> {
    let TypeKind::Array { base, .. } = arena.kind(array) else {
        return Err(GenError::UnsupportedShape {
            type_name: arena.identifier(array).to_string(),
            operation: "array classification",
        });
    };
    let base = *base;
    if arena.is_value_type(base) {
        return Ok(ArrayStrategy::ValueInline);
    }
    let combinable =
        arena.total_nested_reference_types(base) < 2 && arena.total_nested_dynamic_types(base) < 2;
    Ok(match (combinable, arena.is_dynamically_encoded(base)) {
        (true, false) => ArrayStrategy::CombinedStaticTail,
        (true, true) => ArrayStrategy::CombinedDynamicTail,
        (false, _) => ArrayStrategy::SeparateTail,
    })
}

/// Run of struct members copied with one bulk instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub members: Range<usize>,
    /// Offset of the first member in the calldata head.
    pub calldata_offset: u64,
    /// Offset of the first member in the memory head.
    pub memory_offset: u64,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn byte_len(&self) -> u64 {
        self.members.len() as u64 * WORD
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructSegments {
    pub segments: Vec<Segment>,
    /// Reference members outside every segment.
    pub standalone: Vec<usize>,
}

impl StructSegments {
    pub fn segment_of(&self, index: usize) -> Option<&Segment> {
        self.segments.iter().find(|s| s.members.contains(&index))
    }

    pub fn covers_each_member_once(&self, member_count: usize) -> bool {
        let mut seen = vec![0u8; member_count];
        let indices = self.segments.iter().flat_map(|s| s.members.clone()).chain(self.standalone.iter().copied());
        for i in indices {
            match seen.get_mut(i) {
                Some(count) => *count += 1,
                None => return false,
            }
        }
        seen.iter().all(|c| *c == 1)
    }
}

/// Splits a struct's members into sequentially-copyable segments.
///
/// A segment starts at a value member and extends over members whose heads
/// are exactly one word in calldata. At most `max_reference_run` reference
/// heads in a row may be bridged; trailing reference heads are trimmed.
/// Offsets inside a segment are checked to advance one word per member in
/// both calldata and memory.
pub fn struct_segments(arena: &TypeArena, ty: TypeId, max_reference_run: usize) -> GenResult<StructSegments> {
    let members = match arena.kind(ty) {
        TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => members.clone(),
        _ => {
            return Err(GenError::UnsupportedShape {
                type_name: arena.identifier(ty).to_string(),
                operation: "struct segmentation",
            });
        }
    };
    let mut out = StructSegments::default();
    let mut i = 0;
    while i < members.len() {
        if !arena.is_value_type(members[i]) {
            out.standalone.push(i);
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i + 1;
        let mut reference_run = 0;
        while end < members.len() {
            let m = members[end];
            if arena.calldata_head_size(m)? != WORD {
                break;
            }
            if arena.is_value_type(m) {
                reference_run = 0;
            } else {
                reference_run += 1;
                if reference_run > max_reference_run {
                    break;
                }
            }
            end += 1;
        }
        while end > start + 1 && !arena.is_value_type(members[end - 1]) {
            end -= 1;
        }
        out.segments.push(checked_segment(arena, ty, start..end)?);
        i = end;
    }
    Ok(out)
}

fn checked_segment(arena: &TypeArena, ty: TypeId, members: Range<usize>) -> GenResult<Segment> {
    let calldata_offset = arena.member_offset(ty, members.start, Regime::Calldata)?;
    let memory_offset = arena.member_offset(ty, members.start, Regime::Memory)?;
    for (step, index) in members.clone().enumerate() {
        let calldata = arena.member_offset(ty, index, Regime::Calldata)? - calldata_offset;
        let memory = arena.member_offset(ty, index, Regime::Memory)? - memory_offset;
        let expected = step as u64 * WORD;
        if calldata != expected || memory != expected {
            return Err(GenError::SegmentMismatch {
                type_name: arena.identifier(ty).to_string(),
                index,
                calldata,
                memory,
            });
        }
    }
    Ok(Segment {
        members,
        calldata_offset,
        memory_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sol_abi_types::{MemberDesc, TypeDesc};

    fn build(arena: &mut TypeArena, members: Vec<(&str, TypeDesc)>) -> TypeId {
        let members = members.into_iter().map(|(n, t)| MemberDesc::new(n, t)).collect();
        arena.build(&TypeDesc::structure("S", members)).unwrap()
    }

    #[test]
    fn array_strategies() {
        let mut arena = TypeArena::new();
        let cases = [
            (TypeDesc::array(TypeDesc::Uint(256), None), ArrayStrategy::ValueInline),
            (TypeDesc::array(TypeDesc::array(TypeDesc::Uint(8), Some(2)), None), ArrayStrategy::CombinedStaticTail),
            (TypeDesc::array(TypeDesc::Bytes, None), ArrayStrategy::CombinedDynamicTail),
            (
                TypeDesc::array(TypeDesc::array(TypeDesc::Address, None), Some(2)),
                ArrayStrategy::CombinedDynamicTail,
            ),
            (TypeDesc::array(TypeDesc::array(TypeDesc::Bytes, None), None), ArrayStrategy::SeparateTail),
            (
                TypeDesc::array(TypeDesc::structure("W", vec![MemberDesc::new("b", TypeDesc::Bytes)]), None),
                ArrayStrategy::SeparateTail,
            ),
        ];
        for (desc, expected) in cases {
            let id = arena.build(&desc).unwrap();
            assert_eq!(classify_array(&arena, id).unwrap(), expected, "{}", arena.identifier(id));
        }
    }

    #[test]
    fn two_half_words_form_one_segment() {
        let mut arena = TypeArena::new();
        let s = build(&mut arena, vec![("a", TypeDesc::Uint(128)), ("b", TypeDesc::Uint(128))]);
        let segs = struct_segments(&arena, s, 4).unwrap();
        assert_eq!(segs.segments.len(), 1);
        assert_eq!(segs.segments[0].members, 0..2);
        assert_eq!(segs.segments[0].byte_len(), 64);
        assert!(segs.standalone.is_empty());
    }

    #[test]
    fn leading_dynamic_member_stays_standalone() {
        let mut arena = TypeArena::new();
        let s = build(&mut arena, vec![("data", TypeDesc::Bytes), ("x", TypeDesc::Uint(256))]);
        let segs = struct_segments(&arena, s, 4).unwrap();
        assert_eq!(segs.standalone, vec![0]);
        assert_eq!(segs.segments.len(), 1);
        assert_eq!(segs.segments[0].members, 1..2);
        assert_eq!(segs.segments[0].calldata_offset, 32);
        assert!(segs.covers_each_member_once(2));
    }

    #[test]
    fn reference_runs_are_capped_and_trimmed() {
        let mut arena = TypeArena::new();
        let mut members = vec![("v0", TypeDesc::Bool)];
        for n in ["r0", "r1", "r2", "r3", "r4"] {
            members.push((n, TypeDesc::Bytes));
        }
        members.push(("v1", TypeDesc::Bool));
        members.push(("r5", TypeDesc::String));
        let s = build(&mut arena, members);
        let segs = struct_segments(&arena, s, 4).unwrap();
        assert_eq!(segs.segments[0].members, 0..1);
        assert_eq!(segs.segments[1].members, 6..7);
        assert_eq!(segs.standalone, vec![1, 2, 3, 4, 5, 7]);
        assert!(segs.covers_each_member_once(8));

        let bridged = struct_segments(&arena, s, 5).unwrap();
        assert_eq!(bridged.segments[0].members, 0..7);
        assert_eq!(bridged.standalone, vec![7]);
    }

    #[test]
    fn inline_static_members_break_segments() {
        let mut arena = TypeArena::new();
        let s = build(
            &mut arena,
            vec![
                ("a", TypeDesc::Uint(256)),
                ("pair", TypeDesc::array(TypeDesc::Uint(256), Some(2))),
                ("b", TypeDesc::Uint(256)),
            ],
        );
        let segs = struct_segments(&arena, s, 4).unwrap();
        assert_eq!(segs.segments.iter().map(|s| s.members.clone()).collect::<Vec<_>>(), vec![0..1, 2..3]);
        assert_eq!(segs.segments[1].calldata_offset, 96);
        assert_eq!(segs.segments[1].memory_offset, 64);
    }
}
