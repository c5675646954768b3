/* Signature coercion shims between routines with identical word-level calling conventions */

use super::Transcoder;
use crate::abi::{TypeId, TypeKind};
use crate::abi::shape::sanitize;
use crate::codegen::unit::{Param, Routine, RoutineKind};
use crate::codegen::yul::{Block, Stmt, ident};
use crate::error::{GenError, GenResult};
use sol_abi_types::StateMutability;

/// Solidity-level view of a generated routine: one stack word per
/// parameter and return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineSignature {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Vec<String>,
    pub mutability: StateMutability,
}

impl RoutineSignature {
    pub fn new(name: impl Into<String>, params: Vec<String>, returns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            mutability: StateMutability::Pure,
        }
    }

    /// `function(uint256) internal pure returns (Foo memory)`
    pub fn function_type(&self) -> String {
        let mutability = match self.mutability {
            StateMutability::NonPayable => String::new(),
            m => format!(" {}", m.as_str()),
        };
        let returns = if self.returns.is_empty() {
            String::new()
        } else {
            format!(" returns ({})", self.returns.join(", "))
        };
        format!("function({}) internal{mutability}{returns}", self.params.join(", "))
    }

    /// Same number of words in and out.
    pub fn same_convention(&self, other: &RoutineSignature) -> bool {
        self.params.len() == other.params.len() && self.returns.len() == other.returns.len()
    }
}

impl<'a> Transcoder<'a> {
    /// Emits `cast_{from}_to_{to}(inFn) returns (outFn)`, which reinterprets
    /// a function pointer of signature `from` as one of signature `to`.
    pub fn cast(&mut self, from: &RoutineSignature, to: &RoutineSignature) -> GenResult<String> {
        if !from.same_convention(to) {
            return Err(GenError::IncompatibleCast {
                from: from.function_type(),
                to: to.function_type(),
            });
        }
        let routine = Routine {
            name: format!("cast_{}_to_{}", sanitize(&from.name), sanitize(&to.name)),
            kind: RoutineKind::Solidity,
            params: vec![Param::typed("inFn", from.function_type())],
            returns: vec![Param::typed("outFn", to.function_type())],
            mutability: StateMutability::Pure,
            body: Block(vec![Stmt::assign("outFn", ident("inFn"))]),
        };
        self.sink.add_routine(routine)
    }

    /// Signature of the decoder of `ty`, generating it if needed.
    pub fn decoder_signature(&mut self, ty: TypeId) -> GenResult<RoutineSignature> {
        let name = match self.decode(ty)?.name() {
            Some(name) => name.to_string(),
            None => return Err(self.unsupported(ty, "decoder signature")),
        };
        let returns = vec![self.memory_type(ty)?];
        Ok(RoutineSignature::new(name, vec!["uint256".into()], returns))
    }

    /// Signature of the parameter decoder of `ty`, generating it if needed.
    pub fn params_decoder_signature(&mut self, ty: TypeId) -> GenResult<RoutineSignature> {
        let name = self.decode_parameters(ty)?;
        let tuple = self.parameter_tuple(ty, false)?;
        let returns = self
            .arena
            .members(tuple)
            .iter()
            .map(|m| self.memory_type(*m))
            .collect::<GenResult<Vec<_>>>()?;
        Ok(RoutineSignature::new(name, vec!["uint256".into()], returns))
    }

    /// Solidity type of the in-memory form of `ty`, with data location.
    /// Tuples have no Solidity name and are typed `MemoryPointer`.
    pub fn memory_type(&self, ty: TypeId) -> GenResult<String> {
        let name = self.type_name(ty)?;
        Ok(match self.arena.kind(ty) {
            TypeKind::Bytes | TypeKind::String | TypeKind::Array { .. } | TypeKind::Struct { .. } => {
                format!("{name} memory")
            }
            _ => name,
        })
    }

    fn type_name(&self, ty: TypeId) -> GenResult<String> {
        let arena = self.arena;
        Ok(match arena.kind(ty) {
            TypeKind::Enum { name, .. } | TypeKind::UserDefined { name, .. } | TypeKind::Struct { name, .. } => {
                name.clone()
            }
            TypeKind::Array { base, length } => {
                let suffix = length.map(|n| n.to_string()).unwrap_or_default();
                format!("{}[{suffix}]", self.type_name(*base)?)
            }
            TypeKind::Tuple { .. } => "MemoryPointer".into(),
            TypeKind::Function {
                parameters,
                returns,
                mutability,
                ..
            } => {
                let list = |tuple: TypeId| {
                    arena
                        .members(tuple)
                        .iter()
                        .map(|m| self.memory_type(*m))
                        .collect::<GenResult<Vec<_>>>()
                        .map(|v| v.join(", "))
                };
                let mutability = match mutability {
                    StateMutability::NonPayable => String::new(),
                    m => format!(" {}", m.as_str()),
                };
                let returns = list(*returns)?;
                let returns = if returns.is_empty() { returns } else { format!(" returns ({returns})") };
                format!("function({}) external{mutability}{returns}", list(*parameters)?)
            }
            TypeKind::Error { .. } | TypeKind::Event { .. } => {
                return Err(self.unsupported(ty, "solidity type name"));
            }
            _ => arena.abi_type_string(ty),
        })
    }
}
