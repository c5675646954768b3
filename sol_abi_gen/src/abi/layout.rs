//! Offset and size expressions for generated code.
//!
//! Geometry answers in numbers; the resolver turns those numbers into Yul
//! expressions, registering named constants with the sink when the
//! generator is configured to do so.

use crate::abi::arena::{TypeArena, TypeId, TypeKind};
use crate::abi::geometry::{Regime, WORD};
use crate::abi::shape::sanitize;
use crate::codegen::names::ShapeNames;
use crate::codegen::unit::CodeSink;
use crate::codegen::yul::{Expr, lit};
use crate::error::GenResult;
use alloy_primitives::U256;

/// Constants every generated unit may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnown {
    AlmostOneWord,
    AlmostTwoWords,
    OnlyFullWordMask,
    FreeMemoryPointerSlot,
    MaxLength,
}

impl WellKnown {
    pub fn name(self) -> &'static str {
        match self {
            WellKnown::AlmostOneWord => "AlmostOneWord",
            WellKnown::AlmostTwoWords => "AlmostTwoWords",
            WellKnown::OnlyFullWordMask => "OnlyFullWordMask",
            WellKnown::FreeMemoryPointerSlot => "FreeMemoryPointerSlot",
            WellKnown::MaxLength => "MaxLength",
        }
    }

    pub fn value(self) -> U256 {
        match self {
            WellKnown::AlmostOneWord => U256::from(31),
            WellKnown::AlmostTwoWords => U256::from(63),
            WellKnown::OnlyFullWordMask => !U256::from(31),
            WellKnown::FreeMemoryPointerSlot => U256::from(0x40),
            WellKnown::MaxLength => U256::from(u64::MAX),
        }
    }
}

pub struct OffsetResolver<'a> {
    arena: &'a TypeArena,
    named_constants: bool,
}

impl<'a> OffsetResolver<'a> {
    pub fn new(arena: &'a TypeArena, named_constants: bool) -> Self {
        Self { arena, named_constants }
    }

    pub fn well_known(&self, sink: &mut dyn CodeSink, constant: WellKnown) -> GenResult<Expr> {
        if !self.named_constants {
            return Ok(Expr::Literal(constant.value()));
        }
        sink.add_constant(constant.name(), constant.value())
    }

    /// `OneWord` .. `FourWords` for small word multiples, a literal otherwise.
    pub fn words(&self, sink: &mut dyn CodeSink, bytes: u64) -> GenResult<Expr> {
        let name = match bytes {
            32 => "OneWord",
            64 => "TwoWords",
            96 => "ThreeWords",
            128 => "FourWords",
            _ => return Ok(lit(bytes)),
        };
        self.named(sink, name.to_string(), bytes)
    }

    /// Offset of member `index` of `parent` relative to the parent's head.
    /// Zero is always the literal `0` so that pointer additions fold away.
    pub fn member_offset(
        &self,
        names: &mut ShapeNames,
        sink: &mut dyn CodeSink,
        parent: TypeId,
        index: usize,
        regime: Regime,
    ) -> GenResult<Expr> {
        let offset = self.arena.member_offset(parent, index, regime)?;
        if offset == 0 || !self.named_constants {
            return Ok(lit(offset));
        }
        let owner = names.owner(self.arena, parent);
        let member = self
            .arena
            .members(parent)
            .get(index)
            .and_then(|m| self.arena.label(*m))
            .map(sanitize)
            .unwrap_or_else(|| format!("e{index}"));
        let suffix = match regime {
            Regime::Calldata => "cd_offset",
            Regime::Memory => "mem_offset",
            Regime::Packed => "bit_offset",
        };
        self.named(sink, format!("{owner}_{member}_{suffix}"), offset)
    }

    /// Size of the memory head a composite owns (one word per member or
    /// element).
    pub fn memory_head_size(&self, names: &mut ShapeNames, sink: &mut dyn CodeSink, ty: TypeId) -> GenResult<Expr> {
        let size = self.arena.memory_data_size(ty)?;
        self.owner_size(names, sink, ty, "head_size", size)
    }

    /// Size of a composite's calldata head region: every member head,
    /// inline static data included.
    pub fn calldata_head_size(&self, names: &mut ShapeNames, sink: &mut dyn CodeSink, ty: TypeId) -> GenResult<Expr> {
        let size = self.calldata_head_region(ty)?;
        self.owner_size(names, sink, ty, "cd_head_size", size)
    }

    pub fn calldata_head_region(&self, ty: TypeId) -> GenResult<u64> {
        match self.arena.kind(ty) {
            TypeKind::Struct { .. } | TypeKind::Tuple { .. } | TypeKind::Array { length: Some(_), .. } => {
                if self.arena.is_dynamically_encoded(ty) {
                    self.arena.calldata_encoded_tail_size(ty)
                } else {
                    self.arena.calldata_encoded_size(ty)
                }
            }
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                self.calldata_head_region(*parameters)
            }
            _ => Err(self.arena.undefined(ty, "calldata head region")),
        }
    }

    fn owner_size(
        &self,
        names: &mut ShapeNames,
        sink: &mut dyn CodeSink,
        ty: TypeId,
        suffix: &str,
        size: u64,
    ) -> GenResult<Expr> {
        if size == 0 || size == WORD || !self.named_constants {
            return self.words(sink, size);
        }
        let owner = names.owner(self.arena, ty);
        self.named(sink, format!("{owner}_{suffix}"), size)
    }

    fn named(&self, sink: &mut dyn CodeSink, name: String, value: u64) -> GenResult<Expr> {
        if !self.named_constants {
            return Ok(lit(value));
        }
        sink.add_constant(&name, U256::from(value))
    }
}
