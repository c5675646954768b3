/* Encoder bodies: Solidity memory -> ABI encoding; every encoder returns the bytes written */

use super::{RoutineRef, Transcoder};
use crate::abi::{ArrayStrategy, Regime, TypeId, TypeKind, WORD, classify_array, struct_segments};
use crate::codegen::unit::{Param, Routine};
use crate::codegen::yul::{Block, Builtin, Expr, Stmt, add, call, ident, lit, mload, mul, op, shl, sub};
use crate::error::GenResult;

impl<'a> Transcoder<'a> {
    pub(super) fn encode_routine(&mut self, ty: TypeId, name: &str) -> GenResult<(Routine, &'static str)> {
        match self.arena.kind(ty) {
            TypeKind::Bytes | TypeKind::String => Ok((self.encode_bytes(name)?, "bytes")),
            TypeKind::Array { .. } => {
                let strategy = classify_array(self.arena, ty)?;
                Ok((self.encode_array(ty, name, strategy)?, strategy.as_str()))
            }
            TypeKind::Struct { .. } | TypeKind::Tuple { .. } => Ok((self.encode_struct(ty, name)?, "segments")),
            _ => Err(self.unsupported(ty, "encode")),
        }
    }

    /// Zeroes the final padding word first, so the output is canonical
    /// whatever sits behind the data in memory.
    fn encode_bytes(&mut self, name: &str) -> GenResult<Routine> {
        let one = self.words(WORD)?;
        let size = self.padded_bytes_size(ident("length"))?;
        let body = Block(vec![
            Stmt::let_("length", mload(ident("mPtrLength"))),
            Stmt::assign("size", size),
            Stmt::mstore(add(ident("dst"), sub(ident("size"), one.clone())), lit(0)),
            Stmt::mcopy(ident("dst"), ident("mPtrLength"), add(ident("length"), one)),
        ]);
        Ok(Routine::yul(name, &["mPtrLength", "dst"], &["size"], body))
    }

    fn encode_array(&mut self, ty: TypeId, name: &str, strategy: ArrayStrategy) -> GenResult<Routine> {
        let TypeKind::Array { base, length } = self.arena.kind(ty).clone() else {
            return Err(self.unsupported(ty, "encode"));
        };
        let one = self.words(WORD)?;
        let param = if length.is_none() { "mPtrLength" } else { "mPtr" };
        let mut body = Block::new();

        if strategy == ArrayStrategy::ValueInline {
            let size = match length {
                None => shl(lit(5), add(mload(ident("mPtrLength")), lit(1))),
                Some(n) => self.words(n * WORD)?,
            };
            body.push(Stmt::assign("size", size));
            body.push(Stmt::mcopy(ident("dst"), ident(param), ident("size")));
            return Ok(Routine::yul(name, &[param, "dst"], &["size"], body));
        }

        let (len, m_head, dst_head, head_size) = match length {
            None => {
                body.push(Stmt::let_("length", mload(ident("mPtrLength"))));
                body.push(Stmt::let_("mPtrHead", add(ident("mPtrLength"), one.clone())));
                body.push(Stmt::mstore(ident("dst"), ident("length")));
                body.push(Stmt::let_("dstHead", add(ident("dst"), one.clone())));
                (ident("length"), ident("mPtrHead"), ident("dstHead"), shl(lit(5), ident("length")))
            }
            Some(n) => (lit(n), ident("mPtr"), ident("dst"), self.words(n * WORD)?),
        };
        let slot = |head: &Expr| add(head.clone(), shl(lit(5), ident("i")));
        let element_ptr = mload(slot(&m_head));
        /* length word in front of the heads, if any */
        let framed = |size: Expr| if length.is_none() { add(size, one.clone()) } else { size };

        match strategy {
            ArrayStrategy::CombinedStaticTail => {
                let element = self.arena.calldata_encoded_size(base)?;
                let element = self.words(element)?;
                let each = Block(vec![Stmt::mcopy(
                    add(dst_head.clone(), mul(ident("i"), element.clone())),
                    element_ptr,
                    element.clone(),
                )]);
                body.push(Stmt::count("i", len.clone(), each));
                body.push(Stmt::assign("size", framed(mul(len, element))));
            }
            ArrayStrategy::CombinedDynamicTail => {
                let element_size = self.element_tail_size(base, ident("elemLength"))?;
                let mut each = Block(vec![
                    Stmt::let_("mPtrElem", element_ptr),
                    Stmt::mstore(slot(&dst_head), ident("tailOffset")),
                    Stmt::let_("elemLength", mload(ident("mPtrElem"))),
                    Stmt::let_("elemSize", element_size),
                ]);
                let dst_tail = add(dst_head.clone(), ident("tailOffset"));
                if self.arena.is_bytes_like(base) {
                    each.push(Stmt::mstore(
                        add(dst_tail.clone(), sub(ident("elemSize"), one.clone())),
                        lit(0),
                    ));
                    each.push(Stmt::mcopy(dst_tail, ident("mPtrElem"), add(ident("elemLength"), one.clone())));
                } else {
                    each.push(Stmt::mcopy(dst_tail, ident("mPtrElem"), ident("elemSize")));
                }
                each.push(Stmt::assign("tailOffset", add(ident("tailOffset"), ident("elemSize"))));
                body.push(Stmt::let_("tailOffset", head_size));
                body.push(Stmt::count("i", len, each));
                body.push(Stmt::assign("size", framed(ident("tailOffset"))));
            }
            ArrayStrategy::SeparateTail => {
                let encoder = self.encoder_name(base)?;
                if self.arena.is_dynamically_encoded(base) {
                    let written = call(
                        encoder,
                        vec![element_ptr, add(dst_head.clone(), ident("tailOffset"))],
                    );
                    let each = Block(vec![
                        Stmt::mstore(slot(&dst_head), ident("tailOffset")),
                        Stmt::assign("tailOffset", add(ident("tailOffset"), written)),
                    ]);
                    body.push(Stmt::let_("tailOffset", head_size));
                    body.push(Stmt::count("i", len, each));
                    body.push(Stmt::assign("size", framed(ident("tailOffset"))));
                } else {
                    let stride = self.arena.calldata_stride(ty)?;
                    let stride = self.words(stride)?;
                    let written = call(encoder, vec![element_ptr, add(dst_head.clone(), mul(ident("i"), stride.clone()))]);
                    body.push(Stmt::count("i", len.clone(), Block(vec![pop(written)])));
                    body.push(Stmt::assign("size", framed(mul(len, stride))));
                }
            }
            ArrayStrategy::ValueInline => {}
        }
        Ok(Routine::yul(name, &[param, "dst"], &["size"], body))
    }

    fn encoder_name(&mut self, ty: TypeId) -> GenResult<String> {
        match self.encode(ty)? {
            RoutineRef::Named(name) => Ok(name),
            RoutineRef::Inline => Err(self.unsupported(ty, "encode")),
        }
    }

    fn encode_struct(&mut self, ty: TypeId, name: &str) -> GenResult<Routine> {
        let head_size = self.calldata_head_size(ty)?;
        let mut body = Block(vec![Stmt::assign("size", head_size)]);

        let segments = struct_segments(self.arena, ty, self.config.max_consecutive_reference_heads)?;
        for segment in &segments.segments {
            let cd = self.offset(ty, segment.members.start, Regime::Calldata)?;
            let mem = self.offset(ty, segment.members.start, Regime::Memory)?;
            let dst = add(ident("dst"), cd);
            let src = add(ident("mPtr"), mem);
            if segment.len() == 1 {
                body.push(Stmt::mstore(dst, mload(src)));
            } else {
                let len = self.words(segment.byte_len())?;
                body.push(Stmt::mcopy(dst, src, len));
            }
        }

        let members = self.arena.members(ty).to_vec();
        for (index, member) in members.into_iter().enumerate() {
            if !self.arena.is_reference_type(member) {
                continue;
            }
            let mem = self.offset(ty, index, Regime::Memory)?;
            let value = mload(add(ident("mPtr"), mem));
            self.encode_member(ty, index, member, value, &mut body)?;
        }
        Ok(Routine::yul(name, &["mPtr", "dst"], &["size"], body))
    }

    /// Writes member `index` of `parent` into the head at `dst`; dynamic
    /// members get their offset in the head and their data at `dst + size`.
    fn encode_member(
        &mut self,
        parent: TypeId,
        index: usize,
        member: TypeId,
        value: Expr,
        body: &mut Block,
    ) -> GenResult<()> {
        let cd = self.offset(parent, index, Regime::Calldata)?;
        let head = add(ident("dst"), cd);
        match self.encode(member)? {
            RoutineRef::Inline => body.push(Stmt::mstore(head, value)),
            RoutineRef::Named(encoder) if self.arena.is_dynamically_encoded(member) => {
                body.push(Stmt::mstore(head, ident("size")));
                let written = call(encoder, vec![value, add(ident("dst"), ident("size"))]);
                body.push(Stmt::assign("size", add(ident("size"), written)));
            }
            RoutineRef::Named(encoder) => body.push(pop(call(encoder, vec![value, head]))),
        }
        Ok(())
    }

    pub(super) fn encode_params_routine(&mut self, tuple: TypeId, name: &str) -> GenResult<(Routine, &'static str)> {
        let members = self.arena.members(tuple).to_vec();
        let params: Vec<String> = (0..members.len()).map(|i| format!("v{i}")).collect();
        let head_size = self.calldata_head_size(tuple)?;
        let mut body = Block(vec![Stmt::assign("size", head_size)]);
        for (index, member) in members.into_iter().enumerate() {
            self.encode_member(tuple, index, member, ident(params[index].clone()), &mut body)?;
        }
        let mut routine = Routine::yul(name, &[], &["size"], body);
        routine.params = params.iter().map(Param::word).chain([Param::word("dst")]).collect();
        Ok((routine, "parameters"))
    }

    pub(super) fn encode_error_routine(
        &mut self,
        parameters: TypeId,
        name: &str,
        params_encoder: &str,
        selector: Expr,
    ) -> GenResult<(Routine, &'static str)> {
        let count = self.arena.members(parameters).len();
        let mut args: Vec<Expr> = (0..count).map(|i| ident(format!("v{i}"))).collect();
        args.push(add(ident("dst"), lit(4)));
        let body = Block(vec![
            Stmt::mstore(ident("dst"), selector),
            Stmt::assign("size", add(call(params_encoder, args), lit(4))),
        ]);
        let mut routine = Routine::yul(name, &[], &["size"], body);
        routine.params = (0..count)
            .map(|i| Param::word(format!("v{i}")))
            .chain([Param::word("dst")])
            .collect();
        Ok((routine, "error"))
    }
}

fn pop(value: Expr) -> Stmt {
    Stmt::Expr(op(Builtin::Pop, vec![value]))
}
