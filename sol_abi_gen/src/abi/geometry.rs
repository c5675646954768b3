//! Size and offset queries over arena nodes.
//!
//! All queries are pure. A query that is structurally undefined for the
//! node it is asked about fails with [`GenError::UndefinedSize`] rather than
//! returning a guess.

use crate::abi::arena::{TypeArena, TypeId, TypeKind};
use crate::error::{GenError, GenResult};

pub const WORD: u64 = 32;
pub const WORD_BITS: u32 = 256;

/// Layout regime an offset is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    /// ABI head/tail encoding, in bytes.
    Calldata,
    /// Solidity memory layout (one word per member), in bytes.
    Memory,
    /// Bit-packed layout, in bits from the most significant end.
    Packed,
}

impl TypeArena {
    pub fn is_value_type(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Bool
                | TypeKind::Address
                | TypeKind::Integer { .. }
                | TypeKind::Enum { .. }
                | TypeKind::FixedBytes { .. }
                | TypeKind::UserDefined { .. }
                | TypeKind::Function { .. }
        )
    }

    /* Error and event signatures are neither */
    pub fn is_reference_type(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Bytes | TypeKind::String | TypeKind::Array { .. } | TypeKind::Struct { .. } | TypeKind::Tuple { .. }
        )
    }

    pub fn is_bytes_like(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Bytes | TypeKind::String)
    }

    /// Significant bits sit at the high end of the word.
    pub fn left_aligned(&self, id: TypeId) -> bool {
        match self.kind(id) {
            TypeKind::FixedBytes { .. } | TypeKind::Function { .. } => true,
            TypeKind::UserDefined { underlying, .. } => self.left_aligned(*underlying),
            _ => false,
        }
    }

    pub fn is_signed(&self, id: TypeId) -> bool {
        match self.kind(id) {
            TypeKind::Integer { signed, .. } => *signed,
            TypeKind::UserDefined { underlying, .. } => self.is_signed(*underlying),
            _ => false,
        }
    }

    pub fn is_dynamically_sized(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Bytes | TypeKind::String | TypeKind::Array { length: None, .. }
        )
    }

    pub fn is_dynamically_encoded(&self, id: TypeId) -> bool {
        if self.is_dynamically_sized(id) {
            return true;
        }
        match self.kind(id) {
            TypeKind::Array { base, .. } => self.is_dynamically_encoded(*base),
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
                members.iter().any(|m| self.is_dynamically_encoded(*m))
            }
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                self.is_dynamically_encoded(*parameters)
            }
            _ => false,
        }
    }

    pub fn calldata_encoded_size(&self, id: TypeId) -> GenResult<u64> {
        if self.is_dynamically_encoded(id) {
            return Err(self.undefined(id, "calldataEncodedSize"));
        }
        match self.kind(id) {
            TypeKind::Array { base, length: Some(n) } => {
                self.checked_mul(id, *n, self.calldata_encoded_size(*base)?)
            }
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
                members.iter().try_fold(0u64, |acc, m| Ok(acc + self.calldata_encoded_size(*m)?))
            }
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                self.calldata_encoded_size(*parameters)
            }
            _ => Ok(WORD),
        }
    }

    pub fn calldata_head_size(&self, id: TypeId) -> GenResult<u64> {
        match self.kind(id) {
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                self.calldata_head_size(*parameters)
            }
            _ if self.is_dynamically_encoded(id) => Ok(WORD),
            _ => self.calldata_encoded_size(id),
        }
    }

    /// Size of the fixed part of a dynamically encoded value's tail: the
    /// length word of a dynamic array or bytes, the element heads of a
    /// static array, or the member heads of a struct.
    pub fn calldata_encoded_tail_size(&self, id: TypeId) -> GenResult<u64> {
        if !self.is_dynamically_encoded(id) {
            return Err(self.undefined(id, "calldataEncodedTailSize"));
        }
        match self.kind(id) {
            TypeKind::Bytes | TypeKind::String | TypeKind::Array { length: None, .. } => Ok(WORD),
            TypeKind::Array { base, length: Some(n) } => self.checked_mul(id, *n, self.calldata_head_size(*base)?),
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => self.sum_heads(members),
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                self.calldata_encoded_tail_size(*parameters)
            }
            _ => Err(self.undefined(id, "calldataEncodedTailSize")),
        }
    }

    /// Every in-memory value is one word: inline for value types, a
    /// pointer otherwise.
    pub fn memory_head_size(&self, _id: TypeId) -> u64 {
        WORD
    }

    /// Size of the memory region the value owns directly.
    pub fn memory_data_size(&self, id: TypeId) -> GenResult<u64> {
        match self.kind(id) {
            TypeKind::Bytes | TypeKind::String | TypeKind::Array { length: None, .. } => {
                Err(self.undefined(id, "memoryDataSize"))
            }
            TypeKind::Array { length: Some(n), .. } => self.checked_mul(id, *n, WORD),
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => Ok(members.len() as u64 * WORD),
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                self.memory_data_size(*parameters)
            }
            _ => Ok(WORD),
        }
    }

    /// Memory owned directly plus the regions of every nested reference
    /// member, i.e. the total allocation a decoded value occupies.
    pub fn extended_memory_data_size(&self, id: TypeId) -> GenResult<u64> {
        let own = self.memory_data_size(id)?;
        let nested = match self.kind(id) {
            TypeKind::Array { base, length: Some(n) } if self.is_reference_type(*base) => {
                self.checked_mul(id, *n, self.extended_memory_data_size(*base)?)?
            }
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
                let mut total = 0;
                for m in members.iter().filter(|m| self.is_reference_type(**m)) {
                    total += self.extended_memory_data_size(*m)?;
                }
                total
            }
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                return self.extended_memory_data_size(*parameters);
            }
            _ => 0,
        };
        Ok(own + nested)
    }

    pub fn calldata_stride(&self, array: TypeId) -> GenResult<u64> {
        match self.kind(array) {
            TypeKind::Array { base, .. } => self.calldata_head_size(*base),
            _ => Err(self.undefined(array, "calldataStride")),
        }
    }

    pub fn memory_stride(&self, array: TypeId) -> GenResult<u64> {
        match self.kind(array) {
            TypeKind::Array { base, .. } => Ok(self.memory_head_size(*base)),
            _ => Err(self.undefined(array, "memoryStride")),
        }
    }

    /// Natural width in bits, ignoring ABI padding. For composites this is
    /// the end of the packed layout, including boundary padding.
    pub fn exact_bits(&self, id: TypeId) -> GenResult<u32> {
        match self.kind(id) {
            TypeKind::Bool => Ok(8),
            TypeKind::Address => Ok(160),
            TypeKind::Integer { bits, .. } => Ok(*bits as u32),
            TypeKind::Enum { member_count, .. } => Ok(enum_bits(*member_count)),
            TypeKind::FixedBytes { size } => Ok(*size as u32 * 8),
            TypeKind::UserDefined { underlying, .. } => self.exact_bits(*underlying),
            TypeKind::Function { .. } => Ok(192),
            TypeKind::Array { .. } | TypeKind::Struct { .. } | TypeKind::Tuple { .. }
                if !self.is_dynamically_encoded(id) =>
            {
                Ok(self.packed_layout(id)?.1)
            }
            _ => Err(self.undefined(id, "exactBits")),
        }
    }

    /// Bit offset of `id` within its parent's packed layout.
    pub fn exact_bits_offset(&self, id: TypeId) -> GenResult<u32> {
        Ok(self.offset_in_parent(id, Regime::Packed)? as u32)
    }

    /// Bit offsets of every element/member plus the total width. A field
    /// that would straddle a 256-bit boundary starts at the next one.
    fn packed_layout(&self, id: TypeId) -> GenResult<(Vec<u32>, u32)> {
        let widths: Vec<u32> = match self.kind(id) {
            TypeKind::Array { base, length: Some(n) } => {
                let w = self.exact_bits(*base)?;
                vec![w; *n as usize]
            }
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
                members.iter().map(|m| self.exact_bits(*m)).collect::<GenResult<_>>()?
            }
            _ => return Err(self.undefined(id, "packed layout")),
        };
        let mut offsets = Vec::with_capacity(widths.len());
        let mut cursor = 0u32;
        for w in widths {
            let used = cursor % WORD_BITS;
            if used != 0 && used + w > WORD_BITS {
                cursor += WORD_BITS - used;
            }
            offsets.push(cursor);
            cursor += w;
        }
        Ok((offsets, cursor))
    }

    /// Number of reference levels this shape embeds, itself included.
    pub fn total_nested_reference_types(&self, id: TypeId) -> u32 {
        match self.kind(id) {
            TypeKind::Bytes | TypeKind::String => 1,
            TypeKind::Array { base, .. } => 1 + self.total_nested_reference_types(*base),
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
                1 + members.iter().map(|m| self.total_nested_reference_types(*m)).sum::<u32>()
            }
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                self.members(*parameters).iter().map(|m| self.total_nested_reference_types(*m)).sum()
            }
            _ => 0,
        }
    }

    /// Number of dynamically sized levels this shape embeds, itself included.
    pub fn total_nested_dynamic_types(&self, id: TypeId) -> u32 {
        match self.kind(id) {
            TypeKind::Bytes | TypeKind::String => 1,
            TypeKind::Array { base, length } => {
                length.is_none() as u32 + self.total_nested_dynamic_types(*base)
            }
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
                members.iter().map(|m| self.total_nested_dynamic_types(*m)).sum()
            }
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                self.total_nested_dynamic_types(*parameters)
            }
            _ => 0,
        }
    }

    /// Offset of child `index`, relative to the start of the parent's head
    /// (after the length word for dynamic arrays).
    pub fn member_offset(&self, parent: TypeId, index: usize, regime: Regime) -> GenResult<u64> {
        match self.kind(parent) {
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
                if index >= members.len() {
                    return Err(self.unknown_member(parent, index));
                }
                match regime {
                    Regime::Calldata => self.sum_heads(&members[..index]),
                    Regime::Memory => Ok(index as u64 * WORD),
                    Regime::Packed => Ok(self.packed_layout(parent)?.0[index] as u64),
                }
            }
            TypeKind::Array { length, .. } => {
                if length.is_some_and(|n| index as u64 >= n) {
                    return Err(self.unknown_member(parent, index));
                }
                match regime {
                    Regime::Calldata => self.checked_mul(parent, index as u64, self.calldata_stride(parent)?),
                    Regime::Memory => self.checked_mul(parent, index as u64, self.memory_stride(parent)?),
                    Regime::Packed => Ok(self.packed_layout(parent)?.0[index] as u64),
                }
            }
            TypeKind::UserDefined { .. } if index == 0 => Ok(0),
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => {
                self.member_offset(*parameters, index, regime)
            }
            _ => Err(self.undefined(parent, "member offset")),
        }
    }

    pub fn member_offset_by_name(&self, parent: TypeId, name: &str, regime: Regime) -> GenResult<u64> {
        let index = self.member_index_by_name(parent, name)?;
        self.member_offset(parent, index, regime)
    }

    /// Offset of `child` within its parent. For an array this is the offset
    /// of the first element.
    pub fn offset_in_parent(&self, child: TypeId, regime: Regime) -> GenResult<u64> {
        let parent = self.parent(child).ok_or_else(|| self.undefined(child, "offset within parent"))?;
        let index = match self.kind(parent) {
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
                members.iter().position(|m| *m == child).ok_or_else(|| self.not_a_member(parent, child))?
            }
            TypeKind::Array { .. } | TypeKind::UserDefined { .. } => 0,
            _ => return Err(self.not_a_member(parent, child)),
        };
        self.member_offset(parent, index, regime)
    }

    fn sum_heads(&self, members: &[TypeId]) -> GenResult<u64> {
        members.iter().try_fold(0u64, |acc, m| Ok(acc + self.calldata_head_size(*m)?))
    }

    fn checked_mul(&self, id: TypeId, a: u64, b: u64) -> GenResult<u64> {
        a.checked_mul(b)
            .ok_or_else(|| GenError::InvalidType(format!("size of {} overflows", self.identifier(id))))
    }

    pub(crate) fn undefined(&self, id: TypeId, query: &'static str) -> GenError {
        GenError::UndefinedSize {
            type_name: self.identifier(id).to_string(),
            query,
        }
    }

    fn unknown_member(&self, parent: TypeId, index: usize) -> GenError {
        GenError::UnknownMember {
            type_name: self.identifier(parent).to_string(),
            member: format!("#{index}"),
        }
    }

    fn not_a_member(&self, parent: TypeId, child: TypeId) -> GenError {
        GenError::NotAMember {
            parent: self.identifier(parent).to_string(),
            child: self.identifier(child).to_string(),
        }
    }
}

/// `ceil(log2(n))`, at least one bit.
pub fn enum_bits(member_count: u16) -> u32 {
    let n = member_count.max(2) as u32;
    (32 - (n - 1).leading_zeros()).max(1)
}
