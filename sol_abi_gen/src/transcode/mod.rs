//! Type-directed decode/encode routine generation.
//!
//! A [`Transcoder`] walks a type top-down, picks a strategy per node and
//! emits one routine per distinct shape into a [`CodeSink`]. Routines are
//! memoized on the interned shape, so structurally identical types share a
//! routine no matter where they occur.
//!
//! Calling conventions of the emitted Yul:
//!
//! * `abi_decode_X(cdPtr) -> mPtr` reads the ABI encoding of `X` starting at
//!   `cdPtr` (the length word for dynamically sized types) and returns a
//!   pointer to freshly allocated memory.
//! * `abi_encode_X(mPtr, dst) -> size` writes the ABI encoding of the value
//!   at `mPtr` to `dst` and returns the number of bytes written.
//! * `abi_decode_params_X(cdPtr) -> v0, .., vn` and
//!   `abi_encode_params_X(v0, .., vn, dst) -> size` work on stack values.

mod cast;
mod decode;
mod encode;

pub use cast::RoutineSignature;

use crate::abi::{OffsetResolver, Regime, TypeArena, TypeId, TypeKind, WellKnown};
use crate::codegen::names::ShapeNames;
use crate::codegen::unit::{CodeSink, Routine};
use crate::codegen::yul::{Expr, add, call, calldataload};
use crate::config::GeneratorConfig;
use crate::error::{GenError, GenResult};
use crate::abi::ShapeId;
use alloy_primitives::{U256, keccak256};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Result of asking for a decoder or encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineRef {
    /// Value types are read and written in place; no routine exists.
    Inline,
    Named(String),
}

impl RoutineRef {
    pub fn name(&self) -> Option<&str> {
        match self {
            RoutineRef::Inline => None,
            RoutineRef::Named(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    Decode,
    Encode,
    DecodeParams,
    EncodeParams,
    EncodeError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RoutineKey {
    op: Op,
    shape: ShapeId,
}

pub struct Transcoder<'a> {
    arena: &'a TypeArena,
    config: &'a GeneratorConfig,
    sink: &'a mut dyn CodeSink,
    names: ShapeNames,
    memo: HashMap<RoutineKey, String>,
    /* prefixes share stems (`abi_decode` / `abi_decode_params`), so full
     * names are checked again here */
    issued: HashSet<String>,
}

impl<'a> Transcoder<'a> {
    pub fn new(arena: &'a TypeArena, config: &'a GeneratorConfig, sink: &'a mut dyn CodeSink) -> Self {
        Self {
            arena,
            config,
            sink,
            names: ShapeNames::new(),
            memo: HashMap::new(),
            issued: HashSet::new(),
        }
    }

    pub fn arena(&self) -> &'a TypeArena {
        self.arena
    }

    /// Decoder for `ty`: `Inline` for value types, otherwise the name of
    /// `abi_decode_X(cdPtr) -> mPtr`.
    pub fn decode(&mut self, ty: TypeId) -> GenResult<RoutineRef> {
        if self.arena.is_value_type(ty) {
            return Ok(RoutineRef::Inline);
        }
        self.require_reference(ty, "decode")?;
        let name = self.memoized(Op::Decode, ty, "abi_decode", |t, name| t.decode_routine(ty, name))?;
        Ok(RoutineRef::Named(name))
    }

    /// Encoder for `ty`: `Inline` for value types, otherwise the name of
    /// `abi_encode_X(mPtr, dst) -> size`.
    pub fn encode(&mut self, ty: TypeId) -> GenResult<RoutineRef> {
        if self.arena.is_value_type(ty) {
            return Ok(RoutineRef::Inline);
        }
        self.require_reference(ty, "encode")?;
        let name = self.memoized(Op::Encode, ty, "abi_encode", |t, name| t.encode_routine(ty, name))?;
        Ok(RoutineRef::Named(name))
    }

    /// Stack-values decoder for a parameter list: a tuple, a function's
    /// inputs, an error's parameters or an event's non-indexed data.
    pub fn decode_parameters(&mut self, ty: TypeId) -> GenResult<String> {
        let tuple = self.parameter_tuple(ty, false)?;
        self.memoized(Op::DecodeParams, tuple, "abi_decode_params", |t, name| {
            t.decode_params_routine(tuple, name)
        })
    }

    /// Stack-values encoder for a parameter list: a tuple, a function's
    /// return values, an error's parameters or an event's non-indexed data.
    pub fn encode_parameters(&mut self, ty: TypeId) -> GenResult<String> {
        let tuple = self.parameter_tuple(ty, true)?;
        self.memoized(Op::EncodeParams, tuple, "abi_encode_params", |t, name| {
            t.encode_params_routine(tuple, name)
        })
    }

    /// Revert-data encoder `abi_encode_error_X(v0, .., vn, dst) -> size`:
    /// the selector word followed by the encoded parameters.
    pub fn encode_error(&mut self, ty: TypeId) -> GenResult<String> {
        let TypeKind::Error { name, parameters } = self.arena.kind(ty) else {
            return Err(self.unsupported(ty, "error encoding"));
        };
        let (error_name, parameters) = (name.clone(), *parameters);
        let signature = self.arena.signature(ty)?;
        let hash = keccak256(signature.as_bytes());
        let selector = U256::from_be_slice(&hash[..4]) << 224;
        let selector = self.named_value(format!("{}_selector", crate::abi::shape::sanitize(&error_name)), selector)?;
        let params = self.encode_parameters(parameters)?;
        self.memoized(Op::EncodeError, ty, "abi_encode_error", |t, name| {
            t.encode_error_routine(parameters, name, &params, selector)
        })
    }

    /// Encoder for an event's non-indexed data. Non-anonymous events also
    /// get a `{Name}_topic0` constant holding the signature hash.
    pub fn encode_event_data(&mut self, ty: TypeId) -> GenResult<String> {
        let TypeKind::Event { name, data, anonymous, .. } = self.arena.kind(ty) else {
            return Err(self.unsupported(ty, "event encoding"));
        };
        let (event_name, data, anonymous) = (name.clone(), *data, *anonymous);
        if !anonymous {
            let signature = self.arena.signature(ty)?;
            let topic = U256::from_be_bytes(keccak256(signature.as_bytes()).0);
            self.named_value(format!("{}_topic0", crate::abi::shape::sanitize(&event_name)), topic)?;
        }
        self.encode_parameters(data)
    }

    fn memoized<F>(&mut self, op: Op, ty: TypeId, prefix: &str, generate: F) -> GenResult<String>
    where
        F: FnOnce(&mut Self, &str) -> GenResult<(Routine, &'static str)>,
    {
        let key = RoutineKey {
            op,
            shape: self.arena.shape(ty),
        };
        if let Some(name) = self.memo.get(&key) {
            trace!("memo hit for {} -> {}", self.arena.identifier(ty), name);
            return Ok(name.clone());
        }
        let base = format!("{prefix}_{}", self.names.owner(self.arena, ty));
        let mut name = base.clone();
        let mut n = 1;
        while self.issued.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        self.issued.insert(name.clone());
        /* registered before generation so nested requests see it */
        self.memo.insert(key, name.clone());
        let (routine, strategy) = generate(self, &name)?;
        let name = self.sink.add_routine(routine)?;
        debug!("generated {} for {} ({})", name, self.arena.identifier(ty), strategy);
        Ok(name)
    }

    fn parameter_tuple(&self, ty: TypeId, returns: bool) -> GenResult<TypeId> {
        match self.arena.kind(ty) {
            TypeKind::Tuple { .. } => Ok(ty),
            TypeKind::Function { parameters, returns: r, .. } => Ok(if returns { *r } else { *parameters }),
            TypeKind::Error { parameters, .. } => Ok(*parameters),
            TypeKind::Event { data, .. } => Ok(*data),
            _ => Err(self.unsupported(ty, "parameter transcoding")),
        }
    }

    fn require_reference(&self, ty: TypeId, operation: &'static str) -> GenResult<()> {
        if self.arena.is_reference_type(ty) {
            Ok(())
        } else {
            Err(self.unsupported(ty, operation))
        }
    }

    fn unsupported(&self, ty: TypeId, operation: &'static str) -> GenError {
        GenError::UnsupportedShape {
            type_name: self.arena.identifier(ty).to_string(),
            operation,
        }
    }

    /* ------------------------------------------------------ shared helpers */

    fn resolver(&self) -> OffsetResolver<'a> {
        OffsetResolver::new(self.arena, self.config.named_constants)
    }

    fn offset(&mut self, parent: TypeId, index: usize, regime: Regime) -> GenResult<Expr> {
        self.resolver().member_offset(&mut self.names, &mut *self.sink, parent, index, regime)
    }

    fn words(&mut self, bytes: u64) -> GenResult<Expr> {
        self.resolver().words(&mut *self.sink, bytes)
    }

    fn well_known(&mut self, constant: WellKnown) -> GenResult<Expr> {
        self.resolver().well_known(&mut *self.sink, constant)
    }

    fn memory_head_size(&mut self, ty: TypeId) -> GenResult<Expr> {
        self.resolver().memory_head_size(&mut self.names, &mut *self.sink, ty)
    }

    fn calldata_head_size(&mut self, ty: TypeId) -> GenResult<Expr> {
        self.resolver().calldata_head_size(&mut self.names, &mut *self.sink, ty)
    }

    fn named_value(&mut self, name: String, value: U256) -> GenResult<Expr> {
        if self.config.named_constants {
            self.sink.add_constant(&name, value)
        } else {
            Ok(Expr::Literal(value))
        }
    }

    /// Calldata pointer to member `index` of the composite whose head
    /// starts at `head`: inline for static members, through the stored
    /// offset for dynamically encoded ones.
    fn member_source(&mut self, parent: TypeId, index: usize, member: TypeId, head: Expr) -> GenResult<Expr> {
        let offset = self.offset(parent, index, Regime::Calldata)?;
        let slot = add(head.clone(), offset);
        Ok(if self.arena.is_dynamically_encoded(member) {
            add(head, calldataload(slot))
        } else {
            slot
        })
    }

    /// Expression producing the in-memory form of `member` read from `src`.
    fn decoded(&mut self, member: TypeId, src: Expr) -> GenResult<Expr> {
        Ok(match self.decode(member)? {
            RoutineRef::Inline => calldataload(src),
            RoutineRef::Named(name) => call(name, vec![src]),
        })
    }
}
