/* Decoder bodies: ABI calldata -> Solidity memory */

use super::Transcoder;
use crate::abi::{ArrayStrategy, Regime, TypeId, TypeKind, WORD, WellKnown, classify_array, struct_segments};
use crate::codegen::unit::Routine;
use crate::codegen::yul::{
    Block, Expr, Stmt, add, and, calldataload, calldatasize, eq, gt, ident, iszero, lit, mload, mul, shl,
};
use crate::error::GenResult;

/// Where the pieces of an array live while its routine runs.
struct ArrayFrame {
    param: &'static str,
    ret: &'static str,
    length: Expr,
    cd_head: Expr,
    m_head: Expr,
    head_size: Expr,
    dynamic: bool,
}

fn revert_if(condition: Expr) -> Stmt {
    Stmt::If(condition, Block(vec![Stmt::revert_empty()]))
}

impl<'a> Transcoder<'a> {
    pub(super) fn decode_routine(&mut self, ty: TypeId, name: &str) -> GenResult<(Routine, &'static str)> {
        match self.arena.kind(ty) {
            TypeKind::Bytes | TypeKind::String => Ok((self.decode_bytes(name)?, "bytes")),
            TypeKind::Array { .. } => {
                let strategy = classify_array(self.arena, ty)?;
                Ok((self.decode_array(ty, name, strategy)?, strategy.as_str()))
            }
            TypeKind::Struct { .. } | TypeKind::Tuple { .. } => Ok((self.decode_struct(ty, name)?, "segments")),
            _ => Err(self.unsupported(ty, "decode")),
        }
    }

    /// Word-rounded length plus the length word itself.
    pub(super) fn padded_bytes_size(&mut self, length: Expr) -> GenResult<Expr> {
        let almost_two = self.well_known(WellKnown::AlmostTwoWords)?;
        let mask = self.well_known(WellKnown::OnlyFullWordMask)?;
        Ok(and(add(length, almost_two), mask))
    }

    fn decode_bytes(&mut self, name: &str) -> GenResult<Routine> {
        let fmp = self.well_known(WellKnown::FreeMemoryPointerSlot)?;
        let size = self.padded_bytes_size(calldataload(ident("cdPtrLength")))?;
        let body = Block(vec![
            Stmt::assign("mPtrLength", mload(fmp.clone())),
            Stmt::let_("size", size),
            Stmt::calldatacopy(ident("mPtrLength"), ident("cdPtrLength"), ident("size")),
            Stmt::mstore(fmp, add(ident("mPtrLength"), ident("size"))),
        ]);
        Ok(Routine::yul(name, &["cdPtrLength"], &["mPtrLength"], body))
    }

    fn decode_frame(&mut self, ty: TypeId, body: &mut Block) -> GenResult<ArrayFrame> {
        let TypeKind::Array { length, .. } = self.arena.kind(ty) else {
            return Err(self.unsupported(ty, "decode"));
        };
        Ok(match length {
            None => {
                let one = self.words(WORD)?;
                body.push(Stmt::let_("length", calldataload(ident("cdPtrLength"))));
                body.push(Stmt::let_("cdPtrHead", add(ident("cdPtrLength"), one.clone())));
                ArrayFrame {
                    param: "cdPtrLength",
                    ret: "mPtrLength",
                    length: ident("length"),
                    cd_head: ident("cdPtrHead"),
                    m_head: ident("mPtrHead"),
                    head_size: shl(lit(5), ident("length")),
                    dynamic: true,
                }
            }
            Some(n) => ArrayFrame {
                param: "cdPtr",
                ret: "mPtr",
                length: lit(*n),
                cd_head: ident("cdPtr"),
                m_head: ident("mPtr"),
                head_size: self.words(n * WORD)?,
                dynamic: false,
            },
        })
    }

    /* Dynamic arrays keep their length word in front of the memory head */
    fn store_length(&mut self, frame: &ArrayFrame, body: &mut Block) -> GenResult<()> {
        if frame.dynamic {
            let one = self.words(WORD)?;
            body.push(Stmt::mstore(ident("mPtrLength"), ident("length")));
            body.push(Stmt::let_("mPtrHead", add(ident("mPtrLength"), one)));
        }
        Ok(())
    }

    fn decode_array(&mut self, ty: TypeId, name: &str, strategy: ArrayStrategy) -> GenResult<Routine> {
        let TypeKind::Array { base, length } = self.arena.kind(ty).clone() else {
            return Err(self.unsupported(ty, "decode"));
        };
        let fmp = self.well_known(WellKnown::FreeMemoryPointerSlot)?;
        let mut body = Block::new();

        if strategy == ArrayStrategy::ValueInline {
            /* value words are laid out identically: copy everything, length included */
            let (param, ret, size) = match length {
                None => ("cdPtrLength", "mPtrLength", shl(lit(5), add(calldataload(ident("cdPtrLength")), lit(1)))),
                Some(n) => ("cdPtr", "mPtr", self.words(n * WORD)?),
            };
            body.push(Stmt::assign(ret, mload(fmp.clone())));
            body.push(Stmt::let_("size", size));
            body.push(Stmt::calldatacopy(ident(ret), ident(param), ident("size")));
            body.push(Stmt::mstore(fmp, add(ident(ret), ident("size"))));
            return Ok(Routine::yul(name, &[param], &[ret], body));
        }

        let frame = self.decode_frame(ty, &mut body)?;
        body.0.insert(0, Stmt::assign(frame.ret, mload(fmp.clone())));
        let slot = |head: &Expr| add(head.clone(), shl(lit(5), ident("i")));

        match strategy {
            ArrayStrategy::CombinedStaticTail => {
                let element = self.arena.calldata_encoded_size(base)?;
                let element = self.words(element)?;
                self.store_length(&frame, &mut body)?;
                body.push(Stmt::let_("mPtrTail", add(frame.m_head.clone(), frame.head_size.clone())));
                body.push(Stmt::let_("tailSize", mul(frame.length.clone(), element.clone())));
                body.push(Stmt::calldatacopy(ident("mPtrTail"), frame.cd_head.clone(), ident("tailSize")));
                body.push(Stmt::mstore(fmp, add(ident("mPtrTail"), ident("tailSize"))));
                let rewrite = Block(vec![Stmt::mstore(
                    slot(&frame.m_head),
                    add(ident("mPtrTail"), mul(ident("i"), element)),
                )]);
                body.push(Stmt::count("i", frame.length.clone(), rewrite));
            }
            ArrayStrategy::CombinedDynamicTail => {
                /* lengths are bounded so the running tail offset cannot wrap */
                let max_length = self.well_known(WellKnown::MaxLength)?;
                if frame.dynamic {
                    body.push(revert_if(gt(ident("length"), max_length.clone())));
                }
                let element_size = self.element_tail_size(base, ident("elemLength"))?;
                body.push(Stmt::let_("tailOffset", frame.head_size.clone()));
                let validate = Block(vec![
                    Stmt::let_("offset", calldataload(slot(&frame.cd_head))),
                    revert_if(iszero(eq(ident("offset"), ident("tailOffset")))),
                    Stmt::let_("elemLength", calldataload(add(frame.cd_head.clone(), ident("offset")))),
                    revert_if(gt(ident("elemLength"), max_length)),
                    Stmt::assign("tailOffset", add(ident("tailOffset"), element_size)),
                ]);
                body.push(Stmt::count("i", frame.length.clone(), validate));
                if frame.dynamic {
                    let one = self.words(WORD)?;
                    body.push(Stmt::let_("size", add(ident("tailOffset"), one)));
                } else {
                    body.push(Stmt::let_("size", ident("tailOffset")));
                }
                body.push(revert_if(gt(add(ident(frame.param), ident("size")), calldatasize())));
                body.push(Stmt::calldatacopy(ident(frame.ret), ident(frame.param), ident("size")));
                body.push(Stmt::mstore(fmp, add(ident(frame.ret), ident("size"))));
                if frame.dynamic {
                    let one = self.words(WORD)?;
                    body.push(Stmt::let_("mPtrHead", add(ident("mPtrLength"), one)));
                }
                let rewrite = Block(vec![
                    Stmt::let_("mPtrElem", slot(&frame.m_head)),
                    Stmt::mstore(ident("mPtrElem"), add(frame.m_head.clone(), mload(ident("mPtrElem")))),
                ]);
                body.push(Stmt::count("i", frame.length.clone(), rewrite));
            }
            ArrayStrategy::SeparateTail => {
                self.store_length(&frame, &mut body)?;
                body.push(Stmt::mstore(fmp, add(frame.m_head.clone(), frame.head_size.clone())));
                let source = if self.arena.is_dynamically_encoded(base) {
                    add(frame.cd_head.clone(), calldataload(slot(&frame.cd_head)))
                } else {
                    let stride = self.arena.calldata_stride(ty)?;
                    let stride = self.words(stride)?;
                    add(frame.cd_head.clone(), mul(ident("i"), stride))
                };
                let element = self.decoded(base, ident("cdPtrElem"))?;
                let each = Block(vec![
                    Stmt::let_("cdPtrElem", source),
                    Stmt::mstore(slot(&frame.m_head), element),
                ]);
                body.push(Stmt::count("i", frame.length.clone(), each));
            }
            ArrayStrategy::ValueInline => {}
        }
        Ok(Routine::yul(name, &[frame.param], &[frame.ret], body))
    }

    /// Full size of one element's tail, given its length word.
    pub(super) fn element_tail_size(&mut self, base: TypeId, length: Expr) -> GenResult<Expr> {
        match self.arena.kind(base) {
            TypeKind::Bytes | TypeKind::String => self.padded_bytes_size(length),
            TypeKind::Array { length: None, base: inner } if self.arena.is_value_type(*inner) => {
                Ok(shl(lit(5), add(length, lit(1))))
            }
            _ => Err(self.unsupported(base, "combined dynamic tail")),
        }
    }

    fn decode_struct(&mut self, ty: TypeId, name: &str) -> GenResult<Routine> {
        let fmp = self.well_known(WellKnown::FreeMemoryPointerSlot)?;
        let head_size = self.memory_head_size(ty)?;
        let mut body = Block(vec![
            Stmt::assign("mPtr", mload(fmp.clone())),
            Stmt::mstore(fmp, add(ident("mPtr"), head_size)),
        ]);

        let segments = struct_segments(self.arena, ty, self.config.max_consecutive_reference_heads)?;
        for segment in &segments.segments {
            let cd = self.offset(ty, segment.members.start, Regime::Calldata)?;
            let mem = self.offset(ty, segment.members.start, Regime::Memory)?;
            let dst = add(ident("mPtr"), mem);
            let src = add(ident("cdPtr"), cd);
            if segment.len() == 1 {
                body.push(Stmt::mstore(dst, calldataload(src)));
            } else {
                let len = self.words(segment.byte_len())?;
                body.push(Stmt::calldatacopy(dst, src, len));
            }
        }

        let members = self.arena.members(ty).to_vec();
        for (index, member) in members.into_iter().enumerate() {
            if !self.arena.is_reference_type(member) {
                continue;
            }
            let src = self.member_source(ty, index, member, ident("cdPtr"))?;
            let value = self.decoded(member, src)?;
            let mem = self.offset(ty, index, Regime::Memory)?;
            body.push(Stmt::mstore(add(ident("mPtr"), mem), value));
        }
        Ok(Routine::yul(name, &["cdPtr"], &["mPtr"], body))
    }

    pub(super) fn decode_params_routine(&mut self, tuple: TypeId, name: &str) -> GenResult<(Routine, &'static str)> {
        let members = self.arena.members(tuple).to_vec();
        let returns: Vec<String> = (0..members.len()).map(|i| format!("v{i}")).collect();
        let mut body = Block::new();
        for (index, member) in members.into_iter().enumerate() {
            let src = self.member_source(tuple, index, member, ident("cdPtr"))?;
            let value = self.decoded(member, src)?;
            body.push(Stmt::assign(returns[index].clone(), value));
        }
        let returns: Vec<&str> = returns.iter().map(String::as_str).collect();
        Ok((Routine::yul(name, &["cdPtr"], &returns, body), "parameters"))
    }
}

