/* Getter/setter routines for every field of a packed layout */

use super::PackedLayout;
use super::accessor::{Field, WordSource, WriteForm, synthesize_read, synthesize_write};
use crate::abi::TypeArena;
use crate::abi::shape::sanitize;
use crate::codegen::names::ShapeNames;
use crate::codegen::unit::{CodeSink, Routine};
use crate::codegen::yul::{Block, Expr, Stmt, add, ident, lit, mload, signextend, sload};
use crate::config::CostModel;
use crate::error::GenResult;
use tracing::debug;

/// Emits `get_{Owner}_{field}` and `set_{Owner}_{field}` for every
/// placement and returns their names in layout order.
///
/// Stack accessors take the containing word (`word`) and return the value
/// or the updated word. Memory accessors take the pointer to the first
/// slot, storage accessors the first slot number.
///
/// Getters of signed fields return the sign-extended value. Setters keep
/// only the field's bits of `value`, so sign-extended inputs are fine.
pub fn emit_accessors(
    arena: &TypeArena,
    names: &mut ShapeNames,
    layout: &PackedLayout,
    source: WordSource,
    model: &CostModel,
    sink: &mut dyn CodeSink,
) -> GenResult<Vec<String>> {
    let owner = names.owner(arena, layout.root);
    let mut emitted = Vec::with_capacity(layout.placements.len() * 2);
    for p in &layout.placements {
        let field = Field::new(p.bit_offset, p.bit_length, arena.left_aligned(p.ty))?;
        let suffix = format!("{owner}_{}", sanitize(&p.label));
        let (base, location) = match source {
            WordSource::Stack => ("word", ident("word")),
            WordSource::Memory => ("ptr", slot_location(source, ident("ptr"), p.slot)),
            WordSource::Storage => ("slot", slot_location(source, ident("slot"), p.slot)),
        };
        let word = match source {
            WordSource::Stack => ident("word"),
            WordSource::Memory => mload(location.clone()),
            WordSource::Storage => sload(location.clone()),
        };

        let read = synthesize_read(field, source, model)?;
        let getter = format!("get_{suffix}");
        debug!(
            "{} reads with {} ({} gas, {} bytes)",
            getter, read.name, read.cost.gas, read.cost.bytes
        );
        let mut value = read.form.to_yul(&word, &location, &ident("value"));
        if arena.is_signed(p.ty) && p.bit_length < 256 && p.bit_length % 8 == 0 {
            value = signextend(lit(u64::from(p.bit_length / 8 - 1)), value);
        }
        let body = Block(vec![Stmt::assign("value", value)]);
        emitted.push(sink.add_routine(Routine::yul(getter, &[base], &["value"], body))?);

        let write = synthesize_write(field, source, model)?;
        let setter = format!("set_{suffix}");
        debug!(
            "{} writes with {} ({} gas, {} bytes)",
            setter, write.name, write.cost.gas, write.cost.bytes
        );
        let routine = match (source, &write.form) {
            (WordSource::Stack, WriteForm::Word(e)) => {
                let body = Block(vec![Stmt::assign("newWord", e.to_yul(&word, &location, &ident("value")))]);
                Routine::yul(setter, &["word", "value"], &["newWord"], body)
            }
            _ => {
                let stmt = write.form.to_yul(source, &word, &location, &ident("value"));
                Routine::yul(setter, &[base, "value"], &[], Block(vec![stmt]))
            }
        };
        emitted.push(sink.add_routine(routine)?);
    }
    Ok(emitted)
}

/// Memory address or storage slot of `slot` relative to `base`.
pub fn slot_location(source: WordSource, base: Expr, slot: u64) -> Expr {
    match source {
        WordSource::Memory => add(base, lit(slot * 32)),
        _ => add(base, lit(slot)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::unit::CodeUnit;
    use crate::config::PackingMode;
    use crate::packing::place;
    use pretty_assertions::assert_eq;
    use sol_abi_types::{MemberDesc, TypeDesc};

    #[test]
    fn storage_accessors_for_a_two_slot_struct() {
        let mut arena = TypeArena::new();
        let ty = arena
            .build(&TypeDesc::structure(
                "Pos",
                vec![
                    MemberDesc::new("owner", TypeDesc::Address),
                    MemberDesc::new("open", TypeDesc::Bool),
                    MemberDesc::new("size", TypeDesc::Uint(128)),
                ],
            ))
            .unwrap();
        let layout = place(&arena, ty, PackingMode::Bytes).unwrap();
        assert_eq!(layout.slot_count, 2);
        let mut unit = CodeUnit::new();
        let mut names = ShapeNames::new();
        let emitted = emit_accessors(
            &arena,
            &mut names,
            &layout,
            WordSource::Storage,
            &CostModel::default(),
            &mut unit,
        )
        .unwrap();
        assert_eq!(
            emitted,
            vec![
                "get_Pos_owner",
                "set_Pos_owner",
                "get_Pos_open",
                "set_Pos_open",
                "get_Pos_size",
                "set_Pos_size"
            ]
        );
        let get = unit.routine("get_Pos_owner").unwrap().to_lines(true).render("  ");
        assert_eq!(get, "function get_Pos_owner(slot) -> value {\n  value := shr(0x60, sload(slot))\n}\n");
        let get = unit.routine("get_Pos_size").unwrap().to_lines(true).render("  ");
        assert_eq!(
            get,
            "function get_Pos_size(slot) -> value {\n  value := shr(0x80, sload(add(slot, 1)))\n}\n"
        );
    }

    #[test]
    fn signed_getters_sign_extend() {
        let mut arena = TypeArena::new();
        let ty = arena
            .build(&TypeDesc::tuple(vec![
                MemberDesc::new("delta", TypeDesc::Int(16)),
                MemberDesc::new("count", TypeDesc::Uint(16)),
            ]))
            .unwrap();
        let layout = place(&arena, ty, PackingMode::Bytes).unwrap();
        let mut unit = CodeUnit::new();
        emit_accessors(
            &arena,
            &mut ShapeNames::new(),
            &layout,
            WordSource::Stack,
            &CostModel::default(),
            &mut unit,
        )
        .unwrap();
        let get = unit.routine("get_tuple_int16_uint16_delta").unwrap().to_lines(true).render("  ");
        assert!(get.contains("value := signextend(1, "), "{get}");
        let get = unit.routine("get_tuple_int16_uint16_count").unwrap().to_lines(true).render("  ");
        assert!(!get.contains("signextend"), "{get}");
    }

    #[test]
    fn stack_setter_returns_the_new_word() {
        let mut arena = TypeArena::new();
        let ty = arena
            .build(&TypeDesc::tuple(vec![
                MemberDesc::new("a", TypeDesc::Uint(8)),
                MemberDesc::new("b", TypeDesc::Uint(8)),
            ]))
            .unwrap();
        let layout = place(&arena, ty, PackingMode::Bytes).unwrap();
        let mut unit = CodeUnit::new();
        emit_accessors(
            &arena,
            &mut ShapeNames::new(),
            &layout,
            WordSource::Stack,
            &CostModel::default(),
            &mut unit,
        )
        .unwrap();
        let set = unit.routine("set_tuple_uint8_uint8_b").unwrap();
        assert_eq!(set.returns.len(), 1);
        assert_eq!(set.params.len(), 2);
    }
}
