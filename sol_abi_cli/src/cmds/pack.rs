/* Pack command - slot layout and accessors for one named type */

use super::common::{load_type_defs, write_output};
use anyhow::Context;
use sol_abi_gen::packing::{self, emit_accessors};
use sol_abi_gen::{CodeUnit, GeneratorConfig, PackedLayout, ShapeNames, TypeArena, WordSource};
use std::fmt::Write as _;
use std::path::Path;

pub fn run(
    types: &Path,
    type_name: &str,
    source: WordSource,
    config: &GeneratorConfig,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let defs = load_type_defs(types)?;
    let def = defs
        .iter()
        .find(|d| d.name == type_name)
        .with_context(|| format!("no type named '{type_name}' in {}", types.display()))?;

    let mut arena = TypeArena::new();
    let ty = arena.build(&def.kind).with_context(|| format!("invalid type '{type_name}'"))?;
    let layout = packing::pack(&arena, ty, &config.packing).with_context(|| format!("cannot pack '{type_name}'"))?;

    let mut unit = CodeUnit::new();
    emit_accessors(&arena, &mut ShapeNames::new(), &layout, source, &config.cost, &mut unit)?;

    let mut text = placements_table(&layout);
    text.push_str(&unit.render("accessors", config.memory_safe));
    write_output(output, &text)
}

/// The layout as Solidity comments, one placement per line.
pub fn placements_table(layout: &PackedLayout) -> String {
    let mut out = String::new();
    let width = layout.placements.iter().map(|p| p.label.len()).max().unwrap_or(0);
    for p in &layout.placements {
        let _ = writeln!(
            out,
            "// {:<width$}  slot {}  bits {}..{}",
            p.label,
            p.slot,
            p.bit_offset,
            p.bit_end(),
        );
    }
    let _ = writeln!(out, "// {} slot(s), {} bits used\n", layout.slot_count, layout.total_bits());
    out
}
