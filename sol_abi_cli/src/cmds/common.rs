/* Shared helpers for loading inputs and writing generated code */

use anyhow::Context;
use sol_abi_gen::{GeneratorConfig, TypeArena, TypeId};
use sol_abi_types::{AbiItem, TypeDef, parse_abi_json};
use std::path::Path;

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/* Defaults when no file is given */
pub fn load_config(path: Option<&Path>) -> anyhow::Result<GeneratorConfig> {
    let Some(path) = path else {
        return Ok(GeneratorConfig::default());
    };
    let text = read(path)?;
    let config = if is_json(path) {
        GeneratorConfig::from_json_str(&text)
    } else {
        GeneratorConfig::from_yaml_str(&text)
    };
    config.with_context(|| format!("invalid config {}", path.display()))
}

pub fn load_abi(path: &Path) -> anyhow::Result<Vec<AbiItem>> {
    parse_abi_json(&read(path)?).with_context(|| format!("invalid JSON ABI {}", path.display()))
}

pub fn parse_type_defs(text: &str, json: bool) -> anyhow::Result<Vec<TypeDef>> {
    if json {
        Ok(serde_json::from_str(text)?)
    } else {
        Ok(serde_yml::from_str(text)?)
    }
}

pub fn load_type_defs(path: &Path) -> anyhow::Result<Vec<TypeDef>> {
    parse_type_defs(&read(path)?, is_json(path)).with_context(|| format!("invalid type file {}", path.display()))
}

/// Builds every item of `items` named `only` (or all of them when `None`)
/// that has a type of its own. Constructors, fallback and receive entries
/// are skipped.
pub fn build_items(arena: &mut TypeArena, items: &[AbiItem], only: Option<&str>) -> anyhow::Result<Vec<TypeId>> {
    let mut built = Vec::new();
    for item in items {
        if only.is_some() && item.name() != only {
            continue;
        }
        let Some(desc) = item
            .to_type_desc()
            .with_context(|| format!("cannot read ABI item {}", item.name().unwrap_or("<unnamed>")))?
        else {
            continue;
        };
        let ty = arena
            .build(&desc)
            .with_context(|| format!("invalid ABI item {}", item.name().unwrap_or("<unnamed>")))?;
        built.push(ty);
    }
    if let Some(name) = only {
        if built.is_empty() {
            anyhow::bail!("no function, error or event named '{name}' in the ABI");
        }
    }
    Ok(built)
}

pub fn write_output(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}
