//! Procedure compiler (procedure graph to resumable bytecode)
//!
//! Compilation runs in three passes over a validated `ProcedureDef`:
//!
//! 1. capture tracking decides the access mode of every register at every
//!    program point,
//! 2. type inference finds arithmetic that can skip dispatch,
//! 3. code generation lays the blocks out linearly and turns the procedure
//!    into a state machine.
//!
//! Every instruction that may suspend (a call, an index, a length, or
//! arithmetic on operands not known to be numbers) gets a fresh resumption
//! point, and the instruction right after it collects its results. The
//! resumption table maps each point to that instruction, so a frame restored
//! from a snapshot continues exactly where its callee's results are expected.
//! Procedures without suspendable instructions get no table at all and run
//! without any interception.

pub mod capture;
pub mod types;

use crate::bytecode::{
    ArgList, CompiledProc, Instr, Operand, Receive, ResumePoint, ResumeTable, SlotMode, SlotRef,
};
use crate::dispatch::arithmetic::ArithOp;
use crate::error::CompileError;
use crate::ir::{self, BlockId, CaptureSource, Const, Op, ProcedureDef, Reg, Terminator, UnaryOp};
use crate::value::Value;
use capture::{captured_locals, CaptureAnalysis, ProgramPoint, SlotState};
use lunaria_types::TypeSeq;
use std::rc::Rc;
use tracing::debug;
use types::TypeAnalysis;

/// Compile a procedure and everything nested in it
pub fn compile(def: &ProcedureDef) -> Result<Rc<CompiledProc>, CompileError> {
    validate(def)?;

    let nested = def
        .nested
        .iter()
        .map(compile)
        .collect::<Result<Vec<_>, _>>()?;

    let captures = CaptureAnalysis::analyze(def);
    let types = TypeAnalysis::analyze(def, &captures);

    let mut gen = CodeGen::new(def, &captures, &types);
    gen.emit_prologue();
    for block in 0..def.blocks.len() {
        if captures.is_reachable(block) {
            gen.emit_block(block);
        }
    }
    let proc = gen.finish(nested);

    debug!(
        procedure = %proc.name,
        instructions = proc.code.len(),
        resume_points = proc.resume_points(),
        returns = %proc.return_type,
        "compiled procedure"
    );
    Ok(Rc::new(proc))
}

// ============================================================================
// Validation
// ============================================================================

fn validate(def: &ProcedureDef) -> Result<(), CompileError> {
    let procedure = || def.name.clone();

    if def.blocks.is_empty() {
        return Err(CompileError::EmptyProcedure {
            procedure: procedure(),
        });
    }
    if def.params > def.registers {
        return Err(CompileError::TooManyParameters {
            procedure: procedure(),
            params: def.params,
            registers: def.registers,
        });
    }

    let check_reg = |r: Reg| -> Result<(), CompileError> {
        if r >= def.registers {
            Err(CompileError::InvalidRegister {
                procedure: procedure(),
                register: r,
                count: def.registers,
            })
        } else {
            Ok(())
        }
    };
    let check_upvalue = |index: u16| -> Result<(), CompileError> {
        if index as usize >= def.upvalues.len() {
            Err(CompileError::InvalidUpvalue {
                procedure: procedure(),
                index,
            })
        } else {
            Ok(())
        }
    };

    for block in &def.blocks {
        for op in &block.ops {
            let mut result = Ok(());
            op.for_each_reg(|r| {
                if result.is_ok() {
                    result = check_reg(r);
                }
            });
            result?;

            match op {
                Op::GetUpvalue { index, .. } | Op::SetUpvalue { index, .. } => {
                    check_upvalue(*index)?
                }
                Op::Closure { proto, .. } => {
                    let nested =
                        def.nested
                            .get(*proto)
                            .ok_or_else(|| CompileError::InvalidProcedure {
                                procedure: procedure(),
                                index: *proto,
                            })?;
                    for source in &nested.upvalues {
                        match source {
                            CaptureSource::Local(r) => check_reg(*r)?,
                            CaptureSource::Upvalue(i) => check_upvalue(*i)?,
                        }
                    }
                }
                Op::Vararg { .. } if !def.is_vararg => {
                    return Err(CompileError::VarargOutsideVarargProcedure {
                        procedure: procedure(),
                    });
                }
                _ => {}
            }
        }

        let mut result = Ok(());
        block.exit.for_each_reg(|r| {
            if result.is_ok() {
                result = check_reg(r);
            }
        });
        result?;

        for succ in block.exit.successors() {
            if succ >= def.blocks.len() {
                return Err(CompileError::InvalidBlock {
                    procedure: procedure(),
                    block: succ,
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// Code generation
// ============================================================================

struct CodeGen<'a> {
    def: &'a ProcedureDef,
    captures: &'a CaptureAnalysis,
    types: &'a TypeAnalysis,
    code: Vec<Instr>,
    /// Instruction index for each resumption point; point 0 is the entry
    points: Vec<usize>,
    block_starts: Vec<Option<usize>>,
    /// Jumps to patch once every block has an address
    fixups: Vec<(usize, BlockId)>,
    return_type: Option<TypeSeq>,
}

impl<'a> CodeGen<'a> {
    fn new(def: &'a ProcedureDef, captures: &'a CaptureAnalysis, types: &'a TypeAnalysis) -> Self {
        Self {
            def,
            captures,
            types,
            code: Vec::new(),
            points: vec![0],
            block_starts: vec![None; def.blocks.len()],
            fixups: Vec::new(),
            return_type: None,
        }
    }

    /// Box registers the entry block expects captured.
    ///
    /// Only a back edge into block 0 makes its entry captured; those edges
    /// jump past the prologue and box on the edge instead.
    fn emit_prologue(&mut self) {
        let entry = self.captures.block_entry(0);
        for (r, state) in entry.iter().enumerate() {
            if *state == SlotState::Captured {
                self.code.push(Instr::Capture { reg: r as u16 });
            }
        }
    }

    fn emit_block(&mut self, block: BlockId) {
        self.block_starts[block] = Some(self.code.len());

        let mut regs = match self.types.block_entry(block) {
            Some(t) => t.clone(),
            None => unreachable!("capture and type analyses disagree on reachability"),
        };

        let (def, captures) = (self.def, self.captures);
        let ops = &def.blocks[block].ops;
        for (index, op) in ops.iter().enumerate() {
            let before = captures.states_at(ProgramPoint { block, index });
            let after = captures.states_at(ProgramPoint {
                block,
                index: index + 1,
            });
            self.emit_op(op, before, after, &regs);
            types::transfer(op, &mut regs, before, after);
        }

        let states = captures.states_at(ProgramPoint {
            block,
            index: ops.len(),
        });
        self.emit_terminator(&def.blocks[block].exit, states, &regs);
    }

    fn emit_op(&mut self, op: &Op, before: &[SlotState], after: &[SlotState], regs: &TypeSeq) {
        let slot = |r: Reg| slot_ref(r, before);
        let operand = |o: &ir::Operand| lower_operand(o, before);

        match op {
            Op::Move { dst, src } => self.code.push(Instr::Move {
                dst: slot(*dst),
                src: Operand::Slot(slot(*src)),
            }),
            Op::Load { dst, value } => self.code.push(Instr::Move {
                dst: slot(*dst),
                src: Operand::Const(const_value(value)),
            }),
            Op::GetUpvalue { dst, index } => self.code.push(Instr::GetUpvalue {
                dst: slot(*dst),
                index: *index,
            }),
            Op::SetUpvalue { index, src } => self.code.push(Instr::SetUpvalue {
                index: *index,
                src: operand(src),
            }),
            Op::NewTable { dst } => self.code.push(Instr::NewTable { dst: slot(*dst) }),
            Op::SetIndex { table, key, value } => self.code.push(Instr::SetIndex {
                table: slot(*table),
                key: operand(key),
                value: operand(value),
            }),
            Op::Index { dst, table, key } => {
                let (table, key) = (operand(table), operand(key));
                self.emit_suspendable(
                    |point| Instr::Index { table, key, point },
                    Receive::One(slot(*dst)),
                );
            }
            Op::Arith { dst, op, a, b } => {
                self.emit_arith(*op, slot(*dst), a, b, before, regs);
            }
            Op::Unary { dst, op, src } => match op {
                UnaryOp::Neg => self.emit_arith(ArithOp::Unm, slot(*dst), src, src, before, regs),
                UnaryOp::Not => self.code.push(Instr::Not {
                    dst: slot(*dst),
                    src: operand(src),
                }),
                UnaryOp::Len => {
                    let src = operand(src);
                    self.emit_suspendable(
                        |point| Instr::Len { src, point },
                        Receive::One(slot(*dst)),
                    );
                }
            },
            Op::Compare { dst, op, a, b } => self.code.push(Instr::Compare {
                op: *op,
                dst: slot(*dst),
                a: operand(a),
                b: operand(b),
            }),
            Op::Call {
                target,
                args,
                results,
            } => {
                let target = slot(*target);
                let args = lower_args(args, before);
                self.emit_suspendable(
                    |point| Instr::Call {
                        target,
                        args,
                        point,
                    },
                    lower_results(results, before),
                );
            }
            Op::Closure { dst, proto } => {
                let mut boxed: Vec<Reg> = Vec::new();
                for r in captured_locals(self.def, *proto) {
                    if before[r as usize] == SlotState::Plain && !boxed.contains(&r) {
                        self.code.push(Instr::Capture { reg: r });
                        boxed.push(r);
                    }
                }
                self.code.push(Instr::Closure {
                    dst: slot_ref(*dst, after),
                    proto: *proto,
                });
            }
            Op::Close { regs: closed } => {
                for r in closed {
                    if before[*r as usize] == SlotState::Captured {
                        self.code.push(Instr::Uncapture { reg: *r });
                    }
                }
            }
            Op::Vararg { results } => {
                self.code
                    .push(Instr::Vararg(lower_results(results, before)));
            }
        }
    }

    fn emit_arith(
        &mut self,
        op: ArithOp,
        dst: SlotRef,
        a: &ir::Operand,
        b: &ir::Operand,
        states: &[SlotState],
        regs: &TypeSeq,
    ) {
        let ta = types::operand_type(a, regs, states);
        let tb = types::operand_type(b, regs, states);
        let (a, b) = (lower_operand(a, states), lower_operand(b, states));

        if ta.is_numeric() && tb.is_numeric() {
            self.code.push(Instr::ArithRaw { op, dst, a, b });
        } else {
            self.emit_suspendable(|point| Instr::Arith { op, a, b, point }, Receive::One(dst));
        }
    }

    /// Emit `instr` with a fresh resumption point that lands on `receive`
    fn emit_suspendable(&mut self, instr: impl FnOnce(ResumePoint) -> Instr, receive: Receive) {
        let point = ResumePoint(self.points.len() as u32);
        self.points.push(self.code.len() + 1);
        self.code.push(instr(point));
        self.code.push(Instr::Receive(receive));
    }

    fn emit_terminator(&mut self, exit: &Terminator, states: &[SlotState], regs: &TypeSeq) {
        match exit {
            Terminator::Jump(target) => self.emit_edge(*target, states),
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => {
                let branch = self.code.len();
                self.code.push(Instr::JumpIfFalse {
                    cond: slot_ref(*cond, states),
                    target: usize::MAX,
                });
                self.emit_edge(*then_block, states);
                let else_pc = self.code.len();
                if let Instr::JumpIfFalse { target, .. } = &mut self.code[branch] {
                    *target = else_pc;
                }
                self.emit_edge(*else_block, states);
            }
            Terminator::Return(args) => {
                let shape = TypeSeq::new(
                    args.fixed
                        .iter()
                        .map(|o| types::operand_type(o, regs, states))
                        .collect(),
                    args.spread,
                );
                self.add_return_shape(shape);
                self.code.push(Instr::Return {
                    args: lower_args(args, states),
                });
            }
            Terminator::TailCall { target, args } => {
                self.add_return_shape(TypeSeq::vararg());
                self.code.push(Instr::TailCall {
                    target: slot_ref(*target, states),
                    args: lower_args(args, states),
                });
            }
        }
    }

    /// Box what the target expects captured, then jump
    fn emit_edge(&mut self, target: BlockId, states: &[SlotState]) {
        let captures = self.captures;
        let expected = captures.block_entry(target);
        for (r, (have, want)) in states.iter().zip(expected).enumerate() {
            if *have == SlotState::Plain && *want == SlotState::Captured {
                self.code.push(Instr::Capture { reg: r as u16 });
            }
        }
        self.fixups.push((self.code.len(), target));
        self.code.push(Instr::Jump { target: usize::MAX });
    }

    fn add_return_shape(&mut self, shape: TypeSeq) {
        self.return_type = Some(match self.return_type.take() {
            Some(existing) => existing.join(&shape),
            None => shape,
        });
    }

    fn finish(mut self, nested: Vec<Rc<CompiledProc>>) -> CompiledProc {
        for (pc, block) in std::mem::take(&mut self.fixups) {
            let start = match self.block_starts[block] {
                Some(start) => start,
                None => unreachable!("jump to block {} that was never emitted", block),
            };
            if let Instr::Jump { target } = &mut self.code[pc] {
                *target = start;
            }
        }

        let resume_table = if self.points.len() > 1 {
            Some(ResumeTable::new(self.points))
        } else {
            None
        };

        CompiledProc {
            name: self.def.name.clone(),
            param_count: self.def.params,
            is_vararg: self.def.is_vararg,
            register_count: self.def.registers,
            code: self.code,
            resume_table,
            upvalues: self.def.upvalues.clone(),
            nested,
            return_type: self.return_type.unwrap_or_else(TypeSeq::vararg),
        }
    }
}

fn slot_ref(reg: Reg, states: &[SlotState]) -> SlotRef {
    let mode = match states[reg as usize] {
        SlotState::Plain => SlotMode::Direct,
        SlotState::Captured => SlotMode::Boxed,
    };
    SlotRef { reg, mode }
}

fn lower_operand(operand: &ir::Operand, states: &[SlotState]) -> Operand {
    match operand {
        ir::Operand::Reg(r) => Operand::Slot(slot_ref(*r, states)),
        ir::Operand::Const(c) => Operand::Const(const_value(c)),
    }
}

fn lower_args(args: &ir::Args, states: &[SlotState]) -> ArgList {
    ArgList {
        fixed: args
            .fixed
            .iter()
            .map(|o| lower_operand(o, states))
            .collect(),
        spread: args.spread,
    }
}

fn lower_results(results: &ir::Results, states: &[SlotState]) -> Receive {
    match results {
        ir::Results::Multi => Receive::Multi,
        ir::Results::Fixed(regs) => match regs.as_slice() {
            [] => Receive::Discard,
            [r] => Receive::One(slot_ref(*r, states)),
            many => Receive::Fixed(many.iter().map(|r| slot_ref(*r, states)).collect()),
        },
    }
}

fn const_value(c: &Const) -> Value {
    match c {
        Const::Nil => Value::Nil,
        Const::Boolean(b) => Value::Boolean(*b),
        Const::Integer(i) => Value::Integer(*i),
        Const::Float(f) => Value::Float(*f),
        Const::String(s) => Value::from(s.as_str()),
    }
}
