//! Executes generated Yul routines.
//!
//! [`Machine`] holds the EVM state a routine can touch: memory, calldata
//! and storage. [`Interpreter`] walks the same [`Block`] trees the generator
//! renders, so what passes here is what gets emitted.

use crate::errors::{ReflectError, ReflectResult};
use alloy_primitives::U256;
use sol_abi_gen::CodeUnit;
use sol_abi_gen::codegen::{Block, Builtin, Expr, Stmt};
use std::collections::{BTreeMap, HashMap};

/// Slot of the free memory pointer.
pub const FREE_MEMORY_POINTER: usize = 0x40;
/// First allocatable byte, as in Solidity.
pub const INITIAL_FREE_MEMORY: usize = 0x80;
pub const MEMORY_LIMIT: usize = 1 << 24;
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// Sizes of every bulk copy performed, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub calldatacopy: Vec<usize>,
    pub mcopy: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Machine {
    pub memory: Vec<u8>,
    pub calldata: Vec<u8>,
    pub storage: BTreeMap<U256, U256>,
    pub copies: CopyStats,
}

impl Machine {
    pub fn new(calldata: Vec<u8>) -> Self {
        let mut memory = vec![0u8; INITIAL_FREE_MEMORY];
        memory[FREE_MEMORY_POINTER..FREE_MEMORY_POINTER + 32]
            .copy_from_slice(&U256::from(INITIAL_FREE_MEMORY).to_be_bytes::<32>());
        Self {
            memory,
            calldata,
            storage: BTreeMap::new(),
            copies: CopyStats::default(),
        }
    }

    pub fn free_memory_pointer(&self) -> ReflectResult<usize> {
        to_offset(self.read_word(FREE_MEMORY_POINTER))
    }

    /// Bumps the free memory pointer by `size` and returns the old value.
    pub fn allocate(&mut self, size: usize) -> ReflectResult<usize> {
        let ptr = self.free_memory_pointer()?;
        let end = ptr.checked_add(size).ok_or_else(|| limit_error(ptr))?;
        self.ensure(end)?;
        self.mstore(U256::from(FREE_MEMORY_POINTER), U256::from(end))?;
        Ok(ptr)
    }

    /// Word at `offset`; memory past the end reads as zero.
    pub fn read_word(&self, offset: usize) -> U256 {
        U256::from_be_slice(&self.slice(offset, 32))
    }

    /// `len` bytes at `offset`, zero-extended.
    pub fn slice(&self, offset: usize, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        if offset < self.memory.len() {
            let end = (offset + len).min(self.memory.len());
            out[..end - offset].copy_from_slice(&self.memory[offset..end]);
        }
        out
    }

    pub fn write(&mut self, offset: usize, data: &[u8]) -> ReflectResult<()> {
        let end = offset.checked_add(data.len()).ok_or_else(|| limit_error(offset))?;
        self.ensure(end)?;
        self.memory[offset..end].copy_from_slice(data);
        Ok(())
    }

    pub fn mload(&self, offset: U256) -> ReflectResult<U256> {
        let offset = to_offset(offset)?;
        Ok(self.read_word(offset))
    }

    pub fn mstore(&mut self, offset: U256, value: U256) -> ReflectResult<()> {
        self.write(to_offset(offset)?, &value.to_be_bytes::<32>())
    }

    pub fn mstore8(&mut self, offset: U256, value: U256) -> ReflectResult<()> {
        self.write(to_offset(offset)?, &[value.to_be_bytes::<32>()[31]])
    }

    pub fn mcopy(&mut self, dst: U256, src: U256, len: U256) -> ReflectResult<()> {
        let len = to_offset(len)?;
        if len == 0 {
            return Ok(());
        }
        let data = self.slice(to_offset(src)?, len);
        self.write(to_offset(dst)?, &data)?;
        self.copies.mcopy.push(len);
        Ok(())
    }

    pub fn calldataload(&self, offset: U256) -> U256 {
        let Some(start) = small(offset).filter(|o| *o < self.calldata.len()) else {
            return U256::ZERO;
        };
        U256::from_be_slice(&self.calldata_slice(start, 32))
    }

    pub fn calldatacopy(&mut self, dst: U256, src: U256, len: U256) -> ReflectResult<()> {
        let len = to_offset(len)?;
        if len == 0 {
            return Ok(());
        }
        let data = match small(src) {
            Some(start) => self.calldata_slice(start, len),
            None => vec![0u8; len],
        };
        self.write(to_offset(dst)?, &data)?;
        self.copies.calldatacopy.push(len);
        Ok(())
    }

    pub fn sload(&self, slot: U256) -> U256 {
        self.storage.get(&slot).copied().unwrap_or_default()
    }

    pub fn sstore(&mut self, slot: U256, value: U256) {
        if value.is_zero() {
            self.storage.remove(&slot);
        } else {
            self.storage.insert(slot, value);
        }
    }

    fn calldata_slice(&self, offset: usize, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        if offset < self.calldata.len() {
            let end = offset.saturating_add(len).min(self.calldata.len());
            out[..end - offset].copy_from_slice(&self.calldata[offset..end]);
        }
        out
    }

    fn ensure(&mut self, end: usize) -> ReflectResult<()> {
        if end > MEMORY_LIMIT {
            return Err(limit_error(end));
        }
        if end > self.memory.len() {
            self.memory.resize(end.div_ceil(32) * 32, 0);
        }
        Ok(())
    }
}

fn small(v: U256) -> Option<usize> {
    if v > U256::from(usize::MAX as u64) { None } else { Some(v.as_limbs()[0] as usize) }
}

pub(crate) fn to_offset(v: U256) -> ReflectResult<usize> {
    match small(v) {
        Some(offset) if offset <= MEMORY_LIMIT => Ok(offset),
        _ => Err(ReflectError::MemoryLimit {
            offset: format!("{v:#x}"),
            limit: MEMORY_LIMIT,
        }),
    }
}

fn limit_error(offset: usize) -> ReflectError {
    ReflectError::MemoryLimit {
        offset: format!("{offset:#x}"),
        limit: MEMORY_LIMIT,
    }
}

/// Runs routines of one [`CodeUnit`]; constants resolve against the unit.
pub struct Interpreter<'a> {
    unit: &'a CodeUnit,
    step_limit: u64,
}

enum Flow {
    Normal,
    Leave,
}

/* Variables of one routine invocation, innermost block last */
struct Frame<'r> {
    routine: &'r str,
    scopes: Vec<HashMap<String, U256>>,
}

impl Frame<'_> {
    fn declare(&mut self, name: &str, value: U256) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn lookup(&self, name: &str) -> ReflectResult<U256> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .ok_or_else(|| self.undefined(name))
    }

    fn assign(&mut self, name: &str, value: U256) -> ReflectResult<()> {
        match self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.undefined(name)),
        }
    }

    fn undefined(&self, name: &str) -> ReflectError {
        ReflectError::UndefinedVariable {
            routine: self.routine.to_string(),
            name: name.to_string(),
        }
    }
}

impl<'a> Interpreter<'a> {
    pub fn new(unit: &'a CodeUnit) -> Self {
        Self {
            unit,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, step_limit: u64) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Calls routine `name` with `args` and returns its return values.
    pub fn call(&self, machine: &mut Machine, name: &str, args: &[U256]) -> ReflectResult<Vec<U256>> {
        let mut steps = 0;
        self.invoke(machine, name, args, &mut steps)
    }

    fn invoke(&self, m: &mut Machine, name: &str, args: &[U256], steps: &mut u64) -> ReflectResult<Vec<U256>> {
        let routine = self
            .unit
            .routine(name)
            .ok_or_else(|| ReflectError::UnknownRoutine { name: name.to_string() })?;
        if routine.params.len() != args.len() {
            return Err(ReflectError::ArityMismatch {
                context: name.to_string(),
                expected: routine.params.len(),
                got: args.len(),
            });
        }
        let mut frame = Frame {
            routine: &routine.name,
            scopes: vec![HashMap::new()],
        };
        for (param, arg) in routine.params.iter().zip(args) {
            frame.declare(&param.name, *arg);
        }
        for ret in &routine.returns {
            frame.declare(&ret.name, U256::ZERO);
        }
        self.exec_block(&routine.body, &mut frame, m, steps)?;
        routine.returns.iter().map(|r| frame.lookup(&r.name)).collect()
    }

    fn exec_block(&self, block: &Block, frame: &mut Frame<'_>, m: &mut Machine, steps: &mut u64) -> ReflectResult<Flow> {
        frame.scopes.push(HashMap::new());
        let flow = self.exec_stmts(block.stmts(), frame, m, steps);
        frame.scopes.pop();
        flow
    }

    fn exec_stmts(&self, stmts: &[Stmt], frame: &mut Frame<'_>, m: &mut Machine, steps: &mut u64) -> ReflectResult<Flow> {
        for stmt in stmts {
            if let Flow::Leave = self.exec(stmt, frame, m, steps)? {
                return Ok(Flow::Leave);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&self, stmt: &Stmt, frame: &mut Frame<'_>, m: &mut Machine, steps: &mut u64) -> ReflectResult<Flow> {
        self.tick(steps)?;
        match stmt {
            Stmt::Let(names, None) => {
                for name in names {
                    frame.declare(name, U256::ZERO);
                }
            }
            Stmt::Let(names, Some(value)) => {
                let values = self.eval_exact(value, names.len(), frame, m, steps)?;
                for (name, v) in names.iter().zip(values) {
                    frame.declare(name, v);
                }
            }
            Stmt::Assign(names, value) => {
                let values = self.eval_exact(value, names.len(), frame, m, steps)?;
                for (name, v) in names.iter().zip(values) {
                    frame.assign(name, v)?;
                }
            }
            Stmt::Expr(e) => {
                self.eval_multi(e, frame, m, steps)?;
            }
            Stmt::If(cond, body) => {
                if !self.eval(cond, frame, m, steps)?.is_zero() {
                    return self.exec_block(body, frame, m, steps);
                }
            }
            Stmt::For { init, cond, post, body } => {
                /* init variables live for the whole loop */
                frame.scopes.push(HashMap::new());
                let flow = self.run_loop(init, cond, post, body, frame, m, steps);
                frame.scopes.pop();
                return flow;
            }
            Stmt::Leave => return Ok(Flow::Leave),
        }
        Ok(Flow::Normal)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_loop(
        &self,
        init: &Block,
        cond: &Expr,
        post: &Block,
        body: &Block,
        frame: &mut Frame<'_>,
        m: &mut Machine,
        steps: &mut u64,
    ) -> ReflectResult<Flow> {
        if let Flow::Leave = self.exec_stmts(init.stmts(), frame, m, steps)? {
            return Ok(Flow::Leave);
        }
        loop {
            self.tick(steps)?;
            if self.eval(cond, frame, m, steps)?.is_zero() {
                return Ok(Flow::Normal);
            }
            if let Flow::Leave = self.exec_block(body, frame, m, steps)? {
                return Ok(Flow::Leave);
            }
            self.exec_block(post, frame, m, steps)?;
        }
    }

    fn tick(&self, steps: &mut u64) -> ReflectResult<()> {
        *steps += 1;
        if *steps > self.step_limit {
            return Err(ReflectError::StepLimit { limit: self.step_limit });
        }
        Ok(())
    }

    fn eval(&self, e: &Expr, frame: &mut Frame<'_>, m: &mut Machine, steps: &mut u64) -> ReflectResult<U256> {
        let values = self.eval_exact(e, 1, frame, m, steps)?;
        Ok(values[0])
    }

    fn eval_exact(
        &self,
        e: &Expr,
        expected: usize,
        frame: &mut Frame<'_>,
        m: &mut Machine,
        steps: &mut u64,
    ) -> ReflectResult<Vec<U256>> {
        let values = self.eval_multi(e, frame, m, steps)?;
        if values.len() != expected {
            return Err(ReflectError::ArityMismatch {
                context: e.render(),
                expected,
                got: values.len(),
            });
        }
        Ok(values)
    }

    fn eval_multi(&self, e: &Expr, frame: &mut Frame<'_>, m: &mut Machine, steps: &mut u64) -> ReflectResult<Vec<U256>> {
        match e {
            Expr::Literal(v) => Ok(vec![*v]),
            Expr::Ident(name) => Ok(vec![frame.lookup(name)?]),
            Expr::Constant(name) => self
                .unit
                .constant(name)
                .map(|v| vec![v])
                .ok_or_else(|| ReflectError::UnknownConstant { name: name.clone() }),
            Expr::Builtin(builtin, args) => {
                if args.len() != builtin.arity() {
                    return Err(ReflectError::ArityMismatch {
                        context: builtin.name().to_string(),
                        expected: builtin.arity(),
                        got: args.len(),
                    });
                }
                let args = self.eval_args(args, frame, m, steps)?;
                Ok(apply(*builtin, &args, m)?.into_iter().collect())
            }
            Expr::Call(name, args) => {
                let args = self.eval_args(args, frame, m, steps)?;
                self.invoke(m, name, &args, steps)
            }
        }
    }

    /* Yul evaluates arguments right to left */
    fn eval_args(&self, args: &[Expr], frame: &mut Frame<'_>, m: &mut Machine, steps: &mut u64) -> ReflectResult<Vec<U256>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args.iter().rev() {
            values.push(self.eval(arg, frame, m, steps)?);
        }
        values.reverse();
        Ok(values)
    }
}

fn flag(b: bool) -> U256 {
    if b { U256::from(1u8) } else { U256::ZERO }
}

fn shift_amount(v: U256) -> Option<usize> {
    if v < U256::from(256u16) { Some(v.as_limbs()[0] as usize) } else { None }
}

fn apply(builtin: Builtin, a: &[U256], m: &mut Machine) -> ReflectResult<Option<U256>> {
    let value = match builtin {
        Builtin::Add => a[0].wrapping_add(a[1]),
        Builtin::Sub => a[0].wrapping_sub(a[1]),
        Builtin::Mul => a[0].wrapping_mul(a[1]),
        Builtin::Div => a[0].checked_div(a[1]).unwrap_or_default(),
        Builtin::Shl => shift_amount(a[0]).map(|n| a[1] << n).unwrap_or_default(),
        Builtin::Shr => shift_amount(a[0]).map(|n| a[1] >> n).unwrap_or_default(),
        Builtin::And => a[0] & a[1],
        Builtin::Or => a[0] | a[1],
        Builtin::Xor => a[0] ^ a[1],
        Builtin::Not => !a[0],
        Builtin::Lt => flag(a[0] < a[1]),
        Builtin::Gt => flag(a[0] > a[1]),
        Builtin::Eq => flag(a[0] == a[1]),
        Builtin::IsZero => flag(a[0].is_zero()),
        Builtin::Byte => match shift_amount(a[0]).filter(|i| *i < 32) {
            Some(i) => U256::from(a[1].to_be_bytes::<32>()[i]),
            None => U256::ZERO,
        },
        Builtin::SignExtend => match shift_amount(a[0]).filter(|b| *b < 31) {
            Some(b) => {
                let low = (U256::from(1u8) << (8 * b + 8)) - U256::from(1u8);
                if a[1].bit(8 * b + 7) { a[1] | !low } else { a[1] & low }
            }
            None => a[1],
        },
        Builtin::MLoad => m.mload(a[0])?,
        Builtin::CalldataLoad => m.calldataload(a[0]),
        Builtin::CalldataSize => U256::from(m.calldata.len()),
        Builtin::SLoad => m.sload(a[0]),
        Builtin::MStore => return m.mstore(a[0], a[1]).map(|_| None),
        Builtin::MStore8 => return m.mstore8(a[0], a[1]).map(|_| None),
        Builtin::MCopy => return m.mcopy(a[0], a[1], a[2]).map(|_| None),
        Builtin::CalldataCopy => return m.calldatacopy(a[0], a[1], a[2]).map(|_| None),
        Builtin::SStore => {
            m.sstore(a[0], a[1]);
            return Ok(None);
        }
        Builtin::Pop => return Ok(None),
        Builtin::Revert => {
            let len = to_offset(a[1])?;
            let data = if len == 0 { Vec::new() } else { m.slice(to_offset(a[0])?, len) };
            return Err(ReflectError::Revert { data });
        }
    };
    Ok(Some(value))
}
