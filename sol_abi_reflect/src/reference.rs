//! Reference encoders, written directly from the ABI and Solidity memory
//! layout rules. Generated routines are checked against these.
//!
//! * [`abi_encode`] gives the standalone ABI encoding of one value: a word
//!   for value types, length plus padded data for `bytes`/`string`, and head
//!   plus tails for composites, with tail offsets relative to the start of
//!   the enclosing sequence.
//! * [`write_memory`] and [`read_memory`] convert between values and their
//!   Solidity memory representation, where every element occupies one word
//!   holding either the value itself or a pointer.

use crate::errors::{ReflectError, ReflectResult};
use crate::interpreter::{Machine, to_offset};
use crate::value::Value;
use alloy_primitives::U256;
use sol_abi_gen::{TypeArena, TypeId, TypeKind};

const WORD: usize = 32;

/* What a reference type holds, with the element types laid out */
enum Composite {
    Bytes,
    Sequence { members: Vec<TypeId>, length_word: bool },
}

fn composite(arena: &TypeArena, ty: TypeId, value: &Value) -> ReflectResult<Composite> {
    match (arena.kind(ty), value) {
        (TypeKind::Bytes | TypeKind::String, Value::Bytes(_)) => Ok(Composite::Bytes),
        (TypeKind::Array { base, length }, Value::Array(items)) => {
            if let Some(n) = length {
                if items.len() as u64 != *n {
                    return Err(mismatch(arena, ty, format!("expected {n} elements, got {}", items.len())));
                }
            }
            Ok(Composite::Sequence {
                members: vec![*base; items.len()],
                length_word: length.is_none(),
            })
        }
        (TypeKind::Struct { members, .. } | TypeKind::Tuple { members }, Value::Tuple(items)) => {
            if items.len() != members.len() {
                return Err(mismatch(
                    arena,
                    ty,
                    format!("expected {} members, got {}", members.len(), items.len()),
                ));
            }
            Ok(Composite::Sequence {
                members: members.clone(),
                length_word: false,
            })
        }
        (_, value) => Err(mismatch(arena, ty, format!("cannot hold a {} value", value.kind()))),
    }
}

fn mismatch(arena: &TypeArena, ty: TypeId, reason: String) -> ReflectError {
    ReflectError::ShapeMismatch {
        type_name: arena.identifier(ty).to_string(),
        reason,
    }
}

fn items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) | Value::Tuple(items) => items,
        _ => &[],
    }
}

fn push_word(out: &mut Vec<u8>, word: U256) {
    out.extend_from_slice(&word.to_be_bytes::<WORD>());
}

fn padded(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// ABI encoding of `value` as a `ty`.
pub fn abi_encode(arena: &TypeArena, ty: TypeId, value: &Value) -> ReflectResult<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(arena, ty, value, &mut out)?;
    Ok(out)
}

fn encode_into(arena: &TypeArena, ty: TypeId, value: &Value, out: &mut Vec<u8>) -> ReflectResult<()> {
    if arena.is_value_type(ty) {
        let word = value
            .as_word()
            .ok_or_else(|| mismatch(arena, ty, format!("value types take a word, got {}", value.kind())))?;
        push_word(out, word);
        return Ok(());
    }
    match composite(arena, ty, value)? {
        Composite::Bytes => {
            let Value::Bytes(data) = value else {
                return Err(mismatch(arena, ty, "expected bytes".into()));
            };
            push_word(out, U256::from(data.len()));
            out.extend_from_slice(data);
            out.resize(out.len() + padded(data.len()) - data.len(), 0);
        }
        Composite::Sequence { members, length_word } => {
            let values = items(value);
            if length_word {
                push_word(out, U256::from(values.len()));
            }
            encode_sequence(arena, &members, values, out)?;
        }
    }
    Ok(())
}

/* Heads in order, then the tails of dynamic members in the same order */
fn encode_sequence(arena: &TypeArena, members: &[TypeId], values: &[Value], out: &mut Vec<u8>) -> ReflectResult<()> {
    let mut head_size = 0u64;
    for member in members {
        head_size += if arena.is_dynamically_encoded(*member) {
            WORD as u64
        } else {
            arena.calldata_encoded_size(*member)?
        };
    }
    let mut head = Vec::new();
    let mut tail = Vec::new();
    for (member, value) in members.iter().zip(values) {
        if arena.is_dynamically_encoded(*member) {
            push_word(&mut head, U256::from(head_size + tail.len() as u64));
            encode_into(arena, *member, value, &mut tail)?;
        } else {
            encode_into(arena, *member, value, &mut head)?;
        }
    }
    out.extend(head);
    out.extend(tail);
    Ok(())
}

/// Allocates `value` in `machine`'s memory the way Solidity lays it out
/// and returns the word that refers to it: the value itself for value
/// types, a pointer otherwise. The head is allocated before its children.
pub fn write_memory(arena: &TypeArena, ty: TypeId, value: &Value, machine: &mut Machine) -> ReflectResult<U256> {
    if arena.is_value_type(ty) {
        return value
            .as_word()
            .ok_or_else(|| mismatch(arena, ty, format!("value types take a word, got {}", value.kind())));
    }
    match composite(arena, ty, value)? {
        Composite::Bytes => {
            let Value::Bytes(data) = value else {
                return Err(mismatch(arena, ty, "expected bytes".into()));
            };
            let ptr = machine.allocate(WORD + padded(data.len()))?;
            machine.write(ptr, &U256::from(data.len()).to_be_bytes::<WORD>())?;
            machine.write(ptr + WORD, data)?;
            Ok(U256::from(ptr))
        }
        Composite::Sequence { members, length_word } => {
            let values = items(value);
            let head = if length_word { WORD } else { 0 };
            let ptr = machine.allocate(head + WORD * members.len())?;
            if length_word {
                machine.write(ptr, &U256::from(values.len()).to_be_bytes::<WORD>())?;
            }
            for (i, (member, value)) in members.iter().zip(values).enumerate() {
                let word = write_memory(arena, *member, value, machine)?;
                machine.write(ptr + head + WORD * i, &word.to_be_bytes::<WORD>())?;
            }
            Ok(U256::from(ptr))
        }
    }
}

/// Reads back a `ty` from the word referring to it.
pub fn read_memory(arena: &TypeArena, ty: TypeId, machine: &Machine, word: U256) -> ReflectResult<Value> {
    if arena.is_value_type(ty) {
        return Ok(Value::Word(word));
    }
    let ptr = to_offset(word)?;
    match arena.kind(ty) {
        TypeKind::Bytes | TypeKind::String => {
            let len = to_offset(machine.read_word(ptr))?;
            Ok(Value::Bytes(machine.slice(ptr + WORD, len)))
        }
        TypeKind::Array { base, length } => {
            let (count, head) = match length {
                Some(n) => (to_offset(U256::from(*n))?, 0),
                None => (to_offset(machine.read_word(ptr))?, WORD),
            };
            let items = (0..count)
                .map(|i| read_memory(arena, *base, machine, machine.read_word(ptr + head + WORD * i)))
                .collect::<ReflectResult<Vec<_>>>()?;
            Ok(Value::Array(items))
        }
        TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
            let items = members
                .iter()
                .enumerate()
                .map(|(i, member)| read_memory(arena, *member, machine, machine.read_word(ptr + WORD * i)))
                .collect::<ReflectResult<Vec<_>>>()?;
            Ok(Value::Tuple(items))
        }
        _ => Err(mismatch(arena, ty, "has no memory representation".into())),
    }
}
