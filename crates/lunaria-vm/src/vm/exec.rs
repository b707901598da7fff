//! Instruction execution
//!
//! `run` is the single entry for both fresh calls and resumption. Plain
//! procedures execute straight from instruction 0. Resumable procedures look
//! up their start in the resumption table and wrap execution so that a
//! suspension escaping the body takes a snapshot of this frame with it.

use super::closure::LuaClosure;
use super::frame::Frame;
use crate::bytecode::{CompiledProc, Instr};
use crate::context::ExecutionContext;
use crate::dispatch::{self, raw_arithmetic};
use crate::error::{Control, LuaError};
use crate::ir::{CaptureSource, CompareOp};
use crate::suspend::SavedFrame;
use crate::table::Table;
use crate::value::Value;
use std::rc::Rc;
use tracing::{debug, trace};

pub(crate) fn run(
    ctx: &mut ExecutionContext,
    closure: &Rc<LuaClosure>,
    mut frame: Frame,
) -> Result<(), Control> {
    let proc = Rc::clone(&closure.proc);
    match &proc.resume_table {
        None => execute(ctx, closure, &proc, &mut frame, 0),
        Some(table) => {
            let pc = table.target(frame.point);
            let result = execute(ctx, closure, &proc, &mut frame, pc);
            result.map_err(|control| {
                control.suspended_through(|| {
                    debug!(
                        procedure = %proc.name,
                        point = frame.point.0,
                        "saving frame for suspension"
                    );
                    SavedFrame::Compiled {
                        closure: Rc::clone(closure),
                        frame,
                    }
                })
            })
        }
    }
}

fn execute(
    ctx: &mut ExecutionContext,
    closure: &LuaClosure,
    proc: &CompiledProc,
    frame: &mut Frame,
    mut pc: usize,
) -> Result<(), Control> {
    loop {
        let instr = &proc.code[pc];
        trace!(procedure = %proc.name, pc, "execute");
        pc += 1;

        match instr {
            Instr::Move { dst, src } => {
                let v = frame.read(src);
                frame.registers.set(*dst, v);
            }
            Instr::GetUpvalue { dst, index } => {
                let v = closure.upvalues[*index as usize].borrow().clone();
                frame.registers.set(*dst, v);
            }
            Instr::SetUpvalue { index, src } => {
                let v = frame.read(src);
                *closure.upvalues[*index as usize].borrow_mut() = v;
            }
            Instr::NewTable { dst } => {
                frame.registers.set(*dst, Value::table(Table::new()));
            }
            Instr::SetIndex { table, key, value } => match frame.registers.get(*table) {
                Value::Table(t) => {
                    let (k, v) = (frame.read(key), frame.read(value));
                    t.borrow_mut().rawset(k, v)?;
                }
                other => return Err(LuaError::illegal("index", other.type_name()).into()),
            },
            Instr::Capture { reg } => frame.registers.capture(*reg),
            Instr::Uncapture { reg } => frame.registers.uncapture(*reg),
            Instr::Closure { dst, proto } => {
                let nested = &proc.nested[*proto];
                let upvalues = nested
                    .upvalues
                    .iter()
                    .map(|source| match source {
                        CaptureSource::Local(r) => frame.registers.cell(*r),
                        CaptureSource::Upvalue(i) => Rc::clone(&closure.upvalues[*i as usize]),
                    })
                    .collect();
                let value = LuaClosure::new(Rc::clone(nested), upvalues).into_value();
                frame.registers.set(*dst, value);
            }
            Instr::Arith { op, a, b, point } => {
                frame.point = *point;
                let (a, b) = (frame.read(a), frame.read(b));
                dispatch::arithmetic(ctx, *op, a, b)?;
            }
            Instr::ArithRaw { op, dst, a, b } => {
                let (a, b) = (frame.read(a), frame.read(b));
                let result = match raw_arithmetic(*op, &a, &b) {
                    Some(r) => r?,
                    None => {
                        let culprit = if a.to_number().is_none() { &a } else { &b };
                        return Err(
                            LuaError::illegal("perform arithmetic on", culprit.type_name()).into(),
                        );
                    }
                };
                frame.registers.set(*dst, result);
            }
            Instr::Not { dst, src } => {
                let v = frame.read(src);
                frame.registers.set(*dst, Value::Boolean(!v.is_truthy()));
            }
            Instr::Len { src, point } => {
                frame.point = *point;
                let v = frame.read(src);
                dispatch::len(ctx, v)?;
            }
            Instr::Compare { op, dst, a, b } => {
                let (a, b) = (frame.read(a), frame.read(b));
                let result = match op {
                    CompareOp::Eq => dispatch::eq(ctx, &a, &b)?,
                    CompareOp::Ne => !dispatch::eq(ctx, &a, &b)?,
                    CompareOp::Lt => dispatch::lt(ctx, &a, &b)?,
                    CompareOp::Le => dispatch::le(ctx, &a, &b)?,
                };
                frame.registers.set(*dst, Value::Boolean(result));
            }
            Instr::Index { table, key, point } => {
                frame.point = *point;
                let (t, k) = (frame.read(table), frame.read(key));
                dispatch::index(ctx, t, k)?;
            }
            Instr::Call {
                target,
                args,
                point,
            } => {
                frame.point = *point;
                let target = frame.registers.get(*target);
                let args = frame.arguments(args);
                dispatch::call(ctx, target, args)?;
            }
            Instr::Receive(receive) => frame.receive(receive, ctx.channel.as_slice()),
            Instr::Vararg(receive) => frame.receive_varargs(receive),
            Instr::Jump { target } => pc = *target,
            Instr::JumpIfFalse { cond, target } => {
                if !frame.registers.get(*cond).is_truthy() {
                    pc = *target;
                }
            }
            Instr::Return { args } => {
                let values = frame.arguments(args);
                ctx.channel.set_values(values);
                return Ok(());
            }
            Instr::TailCall { target, args } => {
                let target = frame.registers.get(*target);
                let args = frame.arguments(args);
                ctx.channel.set_tail_call(target, args);
                return Ok(());
            }
        }
    }
}
