/* Decode / encode commands - transcoders for the items of a JSON ABI */

use super::common::{build_items, load_abi, write_output};
use anyhow::Context;
use sol_abi_gen::{CodeUnit, GeneratorConfig, TypeArena, TypeKind, Transcoder};
use std::path::Path;
use tracing::info;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Direction {
    Decode,
    Encode,
}

pub fn run(
    abi: &Path,
    function: Option<&str>,
    direction: Direction,
    config: &GeneratorConfig,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let items = load_abi(abi)?;
    let mut arena = TypeArena::new();
    let built = build_items(&mut arena, &items, function)?;

    let mut unit = CodeUnit::new();
    let mut t = Transcoder::new(&arena, config, &mut unit);
    for ty in built {
        let kind = arena.kind(ty);
        let routine = match (direction, kind) {
            /* errors decode like calls, for revert data */
            (Direction::Decode, TypeKind::Function { .. } | TypeKind::Error { .. }) => Some(t.decode_parameters(ty)),
            (Direction::Encode, TypeKind::Function { .. }) => Some(t.encode_parameters(ty)),
            (Direction::Encode, TypeKind::Error { .. }) => Some(t.encode_error(ty)),
            (Direction::Encode, TypeKind::Event { .. }) => Some(t.encode_event_data(ty)),
            _ => None,
        };
        if let Some(routine) = routine {
            let routine = routine.with_context(|| format!("cannot generate for {}", arena.identifier(ty)))?;
            info!("{} -> {}", arena.identifier(ty), routine);
        }
    }
    drop(t);

    let container = match direction {
        Direction::Decode => "abi_decoders",
        Direction::Encode => "abi_encoders",
    };
    write_output(output, &unit.render(container, config.memory_safe))
}
