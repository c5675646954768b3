//! Read and write expressions for a bit field inside one 256-bit word.
//!
//! Every field has several equivalent access forms; each is priced with
//! [`cost`](super::cost) and the cheapest one wins. Candidates are kept as
//! small [`AccessExpr`] trees so they can be checked against each other on
//! concrete words before being lowered to Yul.

use super::cost::{self, Cost, OP};
use crate::abi::WORD_BITS;
use crate::codegen::yul::{self, Builtin, Expr, Stmt, lit, op};
use crate::config::CostModel;
use crate::error::{GenError, GenResult};
use alloy_primitives::U256;

/// Where the word holding the field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSource {
    /// The word is already on the stack.
    Stack,
    /// The word sits at a memory pointer; neighbouring bytes may be read.
    Memory,
    Storage,
}

/// A `(bit offset, bit length)` range, offsets counted from the MSB.
/// Left-aligned fields (fixed bytes, function pointers) are read into and
/// written from the high bits of a word; all others use the low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub bit_offset: u32,
    pub bit_length: u32,
    pub left_aligned: bool,
}

impl Field {
    pub fn new(bit_offset: u32, bit_length: u32, left_aligned: bool) -> GenResult<Self> {
        let fits = bit_offset.checked_add(bit_length).is_some_and(|end| end <= WORD_BITS);
        if bit_length == 0 || !fits {
            return Err(GenError::InvalidField { bit_offset, bit_length });
        }
        Ok(Self {
            bit_offset,
            bit_length,
            left_aligned,
        })
    }

    /// Bits below the field.
    pub fn shift(&self) -> u32 {
        WORD_BITS - self.bit_offset - self.bit_length
    }

    pub fn mask(&self) -> U256 {
        low_mask(self.bit_length)
    }

    /// The field's bits in place.
    pub fn in_place_mask(&self) -> U256 {
        self.mask() << self.shift() as usize
    }

    /// Reference extraction, used by tests and the interpreter.
    pub fn extract(&self, word: U256) -> U256 {
        let value = (word >> self.shift() as usize) & self.mask();
        if self.left_aligned { value << (WORD_BITS - self.bit_length) as usize } else { value }
    }

    /// Reference insertion. Bits of `value` outside the field's alignment
    /// are dropped.
    pub fn insert(&self, word: U256, value: U256) -> U256 {
        let value = if self.left_aligned {
            value >> (WORD_BITS - self.bit_length) as usize
        } else {
            value
        };
        (word & !self.in_place_mask()) | ((value & self.mask()) << self.shift() as usize)
    }

    fn byte_aligned_start(&self) -> bool {
        self.bit_offset % 8 == 0
    }

    fn byte_aligned_end(&self) -> bool {
        (self.bit_offset + self.bit_length) % 8 == 0
    }
}

fn low_mask(bits: u32) -> U256 {
    if bits >= WORD_BITS { U256::MAX } else { (U256::from(1u8) << bits as usize) - U256::from(1u8) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessExpr {
    /// The word holding the field.
    Word,
    /// The value being written.
    Value,
    /// The 32 memory bytes starting this many bytes after the word.
    Load(i64),
    Lit(U256),
    Shl(u32, Box<AccessExpr>),
    Shr(u32, Box<AccessExpr>),
    And(Box<AccessExpr>, Box<AccessExpr>),
    Or(Box<AccessExpr>, Box<AccessExpr>),
    Not(Box<AccessExpr>),
    Byte(u32, Box<AccessExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteForm {
    /// New contents of the whole word.
    Word(AccessExpr),
    /// `mstore8` at this byte of the word.
    Store8 { offset: i64, value: AccessExpr },
    /// `mstore` of a full word starting this many bytes after the word.
    Window { offset: i64, value: AccessExpr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<T> {
    pub name: &'static str,
    pub form: T,
    pub cost: Cost,
}

fn shl(bits: u32, e: AccessExpr) -> AccessExpr {
    AccessExpr::Shl(bits, Box::new(e))
}

fn shr(bits: u32, e: AccessExpr) -> AccessExpr {
    AccessExpr::Shr(bits, Box::new(e))
}

fn and(a: AccessExpr, b: AccessExpr) -> AccessExpr {
    AccessExpr::And(Box::new(a), Box::new(b))
}

fn or(a: AccessExpr, b: AccessExpr) -> AccessExpr {
    AccessExpr::Or(Box::new(a), Box::new(b))
}

fn not(a: AccessExpr) -> AccessExpr {
    AccessExpr::Not(Box::new(a))
}

fn byte(index: u32, e: AccessExpr) -> AccessExpr {
    AccessExpr::Byte(index, Box::new(e))
}

fn lit_u256(v: U256) -> AccessExpr {
    AccessExpr::Lit(v)
}

impl AccessExpr {
    pub fn cost(&self, source: WordSource) -> Cost {
        match self {
            AccessExpr::Word => match source {
                WordSource::Stack => OP,
                WordSource::Memory => OP + OP,
                WordSource::Storage => OP + cost::SLOAD,
            },
            AccessExpr::Value => OP,
            AccessExpr::Load(offset) => pointer_cost(*offset) + OP,
            AccessExpr::Lit(v) => cost::push(*v),
            AccessExpr::Shl(n, e) | AccessExpr::Shr(n, e) | AccessExpr::Byte(n, e) => {
                cost::push_u64(*n as u64) + OP + e.cost(source)
            }
            AccessExpr::And(a, b) | AccessExpr::Or(a, b) => OP + a.cost(source) + b.cost(source),
            AccessExpr::Not(e) => OP + e.cost(source),
        }
    }

    /// Evaluates against a 96-byte memory window whose middle word holds
    /// the field.
    pub fn evaluate(&self, window: &[u8; 96], value: U256) -> U256 {
        match self {
            AccessExpr::Word => load(window, 0),
            AccessExpr::Value => value,
            AccessExpr::Load(offset) => load(window, *offset),
            AccessExpr::Lit(v) => *v,
            AccessExpr::Shl(n, e) => shift_left(e.evaluate(window, value), *n),
            AccessExpr::Shr(n, e) => shift_right(e.evaluate(window, value), *n),
            AccessExpr::And(a, b) => a.evaluate(window, value) & b.evaluate(window, value),
            AccessExpr::Or(a, b) => a.evaluate(window, value) | b.evaluate(window, value),
            AccessExpr::Not(e) => !e.evaluate(window, value),
            AccessExpr::Byte(i, e) => match e.evaluate(window, value).to_be_bytes::<32>().get(*i as usize) {
                Some(b) => U256::from(*b),
                None => U256::ZERO,
            },
        }
    }

    /// Lowers to Yul; `word` is the loaded word and `ptr` its address.
    pub fn to_yul(&self, word: &Expr, ptr: &Expr, value: &Expr) -> Expr {
        match self {
            AccessExpr::Word => word.clone(),
            AccessExpr::Value => value.clone(),
            AccessExpr::Load(offset) => yul::mload(displaced(ptr, *offset)),
            AccessExpr::Lit(v) => Expr::Literal(*v),
            AccessExpr::Shl(n, e) => yul::shl(lit(*n as u64), e.to_yul(word, ptr, value)),
            AccessExpr::Shr(n, e) => yul::shr(lit(*n as u64), e.to_yul(word, ptr, value)),
            AccessExpr::And(a, b) => yul::and(a.to_yul(word, ptr, value), b.to_yul(word, ptr, value)),
            AccessExpr::Or(a, b) => yul::or(a.to_yul(word, ptr, value), b.to_yul(word, ptr, value)),
            AccessExpr::Not(e) => yul::not(e.to_yul(word, ptr, value)),
            AccessExpr::Byte(i, e) => op(Builtin::Byte, vec![lit(*i as u64), e.to_yul(word, ptr, value)]),
        }
    }
}

impl WriteForm {
    pub fn cost(&self, source: WordSource) -> Cost {
        match self {
            WriteForm::Word(e) => {
                let store = match source {
                    WordSource::Stack => Cost::default(),
                    WordSource::Memory => OP + OP,
                    WordSource::Storage => OP + cost::SSTORE,
                };
                e.cost(source) + store
            }
            WriteForm::Store8 { offset, value } | WriteForm::Window { offset, value } => {
                pointer_cost(*offset) + OP + value.cost(source)
            }
        }
    }

    /// Applies the write to a copy of `window`.
    pub fn apply(&self, window: &[u8; 96], value: U256) -> [u8; 96] {
        let mut out = *window;
        match self {
            WriteForm::Word(e) => store(&mut out, 0, e.evaluate(window, value)),
            WriteForm::Store8 { offset, value: e } => {
                let byte = e.evaluate(window, value).to_be_bytes::<32>()[31];
                out[(32 + offset) as usize] = byte;
            }
            WriteForm::Window { offset, value: e } => store(&mut out, *offset, e.evaluate(window, value)),
        }
        out
    }

    /// Lowers to a Yul statement. For stack words the new word is assigned
    /// to `word`, which must then be an identifier.
    pub fn to_yul(&self, source: WordSource, word: &Expr, ptr: &Expr, value: &Expr) -> Stmt {
        match self {
            WriteForm::Word(e) => {
                let new_word = e.to_yul(word, ptr, value);
                match (source, word) {
                    (WordSource::Memory, _) => Stmt::mstore(ptr.clone(), new_word),
                    (WordSource::Storage, _) => Stmt::sstore(ptr.clone(), new_word),
                    (WordSource::Stack, Expr::Ident(name)) => Stmt::assign(name.clone(), new_word),
                    (WordSource::Stack, _) => Stmt::Expr(op(Builtin::Pop, vec![new_word])),
                }
            }
            WriteForm::Store8 { offset, value: e } => {
                Stmt::mstore8(displaced(ptr, *offset), e.to_yul(word, ptr, value))
            }
            WriteForm::Window { offset, value: e } => {
                Stmt::mstore(displaced(ptr, *offset), e.to_yul(word, ptr, value))
            }
        }
    }
}

fn pointer_cost(offset: i64) -> Cost {
    if offset == 0 { OP } else { OP + cost::push_u64(offset.unsigned_abs()) + OP }
}

fn displaced(ptr: &Expr, offset: i64) -> Expr {
    match offset {
        0 => ptr.clone(),
        k if k > 0 => yul::add(ptr.clone(), lit(k as u64)),
        k => yul::sub(ptr.clone(), lit(k.unsigned_abs())),
    }
}

fn load(window: &[u8; 96], offset: i64) -> U256 {
    let start = (32 + offset) as usize;
    U256::from_be_slice(&window[start..start + 32])
}

fn store(window: &mut [u8; 96], offset: i64, word: U256) {
    let start = (32 + offset) as usize;
    window[start..start + 32].copy_from_slice(&word.to_be_bytes::<32>());
}

fn shift_left(v: U256, n: u32) -> U256 {
    if n >= WORD_BITS { U256::ZERO } else { v << n as usize }
}

fn shift_right(v: U256, n: u32) -> U256 {
    if n >= WORD_BITS { U256::ZERO } else { v >> n as usize }
}

/// Every read form for `field`, priced for `source`.
pub fn read_candidates(field: Field, source: WordSource) -> Vec<Candidate<AccessExpr>> {
    let (o, l, s) = (field.bit_offset, field.bit_length, field.shift());
    let mut forms: Vec<(&'static str, AccessExpr)> = Vec::new();
    if l == WORD_BITS {
        forms.push(("word", AccessExpr::Word));
    } else if !field.left_aligned {
        let mask = lit_u256(field.mask());
        if o == 0 {
            forms.push(("shift", shr(s, AccessExpr::Word)));
        } else if s == 0 {
            forms.push(("mask", and(AccessExpr::Word, mask.clone())));
        } else {
            forms.push(("shift-mask", and(shr(s, AccessExpr::Word), mask.clone())));
            forms.push(("mask-shift", shr(s, and(AccessExpr::Word, lit_u256(field.in_place_mask())))));
            forms.push(("double-shift", shr(WORD_BITS - l, shl(o, AccessExpr::Word))));
        }
        if l == 8 && field.byte_aligned_start() {
            forms.push(("byte", byte(o / 8, AccessExpr::Word)));
        }
        if source == WordSource::Memory {
            if s > 0 && field.byte_aligned_end() {
                forms.push(("load-end", and(AccessExpr::Load(-((s / 8) as i64)), mask)));
            }
            if o > 0 && field.byte_aligned_start() {
                forms.push(("load-start", shr(WORD_BITS - l, AccessExpr::Load((o / 8) as i64))));
            }
        }
    } else {
        let high = lit_u256(field.mask() << (WORD_BITS - l) as usize);
        if o == 0 {
            forms.push(("mask", and(AccessExpr::Word, high.clone())));
        } else if s == 0 {
            forms.push(("shift", shl(o, AccessExpr::Word)));
        } else {
            forms.push(("shift-mask", and(shl(o, AccessExpr::Word), high.clone())));
        }
        if s > 0 {
            forms.push(("double-shift", shl(WORD_BITS - l, shr(s, AccessExpr::Word))));
        }
        if o > 0 {
            forms.push(("mask-shift", shl(o, and(AccessExpr::Word, lit_u256(field.in_place_mask())))));
        }
        if l == 8 && field.byte_aligned_start() {
            forms.push(("byte", shl(WORD_BITS - 8, byte(o / 8, AccessExpr::Word))));
        }
        if source == WordSource::Memory && o > 0 && field.byte_aligned_start() {
            forms.push(("load-start", and(AccessExpr::Load((o / 8) as i64), high)));
        }
    }
    forms
        .into_iter()
        .map(|(name, form)| Candidate {
            name,
            cost: form.cost(source),
            form,
        })
        .collect()
}

/// Every write form for `field`, priced for `source`. Bits of the value
/// outside the field's alignment never reach the word.
pub fn write_candidates(field: Field, source: WordSource) -> Vec<Candidate<WriteForm>> {
    let (o, l, s) = (field.bit_offset, field.bit_length, field.shift());
    let mut forms: Vec<(&'static str, WriteForm)> = Vec::new();
    if l == WORD_BITS {
        forms.push(("word", WriteForm::Word(AccessExpr::Value)));
    } else {
        let in_place = field.in_place_mask();
        let shifted = match (field.left_aligned, o, s) {
            (false, _, 0) | (true, 0, _) => AccessExpr::Value,
            (false, _, s) => shl(s, AccessExpr::Value),
            (true, o, _) => shr(o, AccessExpr::Value),
        };
        let placed = and(shifted, lit_u256(in_place));
        forms.push((
            "literal-mask",
            WriteForm::Word(or(and(AccessExpr::Word, lit_u256(!in_place)), placed.clone())),
        ));
        forms.push((
            "computed-mask",
            WriteForm::Word(or(and(AccessExpr::Word, not(lit_u256(in_place))), placed.clone())),
        ));
        if s > 0 {
            forms.push((
                "shifted-mask",
                WriteForm::Word(or(and(AccessExpr::Word, not(shl(s, lit_u256(field.mask())))), placed)),
            ));
        }
        if source == WordSource::Memory {
            if l == 8 && field.byte_aligned_start() {
                let value = if field.left_aligned { shr(WORD_BITS - 8, AccessExpr::Value) } else { AccessExpr::Value };
                forms.push((
                    "store8",
                    WriteForm::Store8 {
                        offset: (o / 8) as i64,
                        value,
                    },
                ));
            }
            if s > 0 && field.byte_aligned_end() {
                let offset = -((s / 8) as i64);
                let value = if field.left_aligned {
                    shr(WORD_BITS - l, AccessExpr::Value)
                } else {
                    and(AccessExpr::Value, lit_u256(field.mask()))
                };
                let kept = and(AccessExpr::Load(offset), not(lit_u256(field.mask())));
                forms.push(("window", WriteForm::Window { offset, value: or(kept, value) }));
            }
        }
    }
    forms
        .into_iter()
        .map(|(name, form)| Candidate {
            name,
            cost: form.cost(source),
            form,
        })
        .collect()
}

fn cheapest<T>(candidates: Vec<Candidate<T>>, model: &CostModel) -> Option<Candidate<T>> {
    candidates.into_iter().min_by(|a, b| a.cost.compare(b.cost, model))
}

/// Cheapest read of `field` under `model`.
pub fn synthesize_read(field: Field, source: WordSource, model: &CostModel) -> GenResult<Candidate<AccessExpr>> {
    cheapest(read_candidates(field, source), model).ok_or(GenError::InvalidField {
        bit_offset: field.bit_offset,
        bit_length: field.bit_length,
    })
}

/// Cheapest write of `field` under `model`.
pub fn synthesize_write(field: Field, source: WordSource, model: &CostModel) -> GenResult<Candidate<WriteForm>> {
    cheapest(write_candidates(field, source), model).ok_or(GenError::InvalidField {
        bit_offset: field.bit_offset,
        bit_length: field.bit_length,
    })
}
