/* Reflect command - run a generated decoder over real call data */

use super::common::{build_items, load_abi, write_output};
use alloy_primitives::{U256, hex, keccak256};
use anyhow::Context;
use sol_abi_gen::{CodeUnit, GeneratorConfig, TypeArena, TypeKind, Transcoder};
use sol_abi_reflect::{Interpreter, Machine, read_memory};
use std::path::Path;
use tracing::debug;

pub fn run(
    abi: &Path,
    function: &str,
    calldata: &str,
    pretty: bool,
    config: &GeneratorConfig,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let items = load_abi(abi)?;
    let mut arena = TypeArena::new();
    let built = build_items(&mut arena, &items, Some(function))?;
    let found = built.iter().find_map(|ty| match arena.kind(*ty) {
        TypeKind::Function { parameters, .. } => Some((*ty, *parameters)),
        _ => None,
    });
    let Some((ty, parameters)) = found else {
        anyhow::bail!("'{function}' is not a function");
    };

    let calldata = hex::decode(calldata.trim()).context("call data is not valid hex")?;
    let signature = arena.signature(ty)?;
    let hash = keccak256(signature.as_bytes());
    let selector = &hash[..4];
    if calldata.len() < 4 || &calldata[..4] != selector {
        anyhow::bail!("call data does not start with the selector of {signature} (0x{})", hex::encode(selector));
    }

    let mut unit = CodeUnit::new();
    let decoder = Transcoder::new(&arena, config, &mut unit).decode_parameters(ty)?;
    debug!("decoding {} bytes with {}", calldata.len(), decoder);

    let mut machine = Machine::new(calldata);
    let words = Interpreter::new(&unit)
        .call(&mut machine, &decoder, &[U256::from(4)])
        .with_context(|| format!("{decoder} failed"))?;

    let mut args = serde_json::Map::new();
    for (i, (member, word)) in arena.members(parameters).iter().zip(words).enumerate() {
        let value = read_memory(&arena, *member, &machine, word)?;
        let label = arena.label(*member).filter(|l| !l.is_empty()).map_or_else(|| format!("arg{i}"), str::to_string);
        args.insert(label, serde_json::to_value(value)?);
    }
    let args = serde_json::Value::Object(args);
    let mut text = if pretty {
        serde_json::to_string_pretty(&args)?
    } else {
        serde_json::to_string(&args)?
    };
    text.push('\n');
    write_output(output, &text)
}
