//! Static register types
//!
//! Forward dataflow over the register file, modeled as a `TypeSeq` with one
//! fixed position per register. Parameters start as `Any`, every other
//! register as `Nil`; merges take the join and iteration stops once no block's
//! entry state grows. Captured registers can be written by any closure at any
//! call, so reads through a capture cell are always `Any`, and a register that
//! leaves its cell at `Close` keeps `Any` rather than its pre-capture type.
//!
//! The compiler uses the result to skip dispatch (and the resumption point
//! that comes with it) for arithmetic on operands known to be numbers.

use super::capture::{CaptureAnalysis, ProgramPoint, SlotState};
use crate::dispatch::arithmetic::ArithOp;
use crate::ir::{BlockId, Const, Op, Operand, ProcedureDef, Results, UnaryOp};
use lunaria_types::{TypeSeq, ValueType};
use std::collections::VecDeque;

/// Register types on entry to each reachable block
#[derive(Debug, Clone)]
pub struct TypeAnalysis {
    entry: Vec<Option<TypeSeq>>,
}

impl TypeAnalysis {
    pub fn analyze(def: &ProcedureDef, captures: &CaptureAnalysis) -> Self {
        let mut start = vec![ValueType::Nil; def.registers as usize];
        for slot in start.iter_mut().take(def.params as usize) {
            *slot = ValueType::Any;
        }

        let mut entry: Vec<Option<TypeSeq>> = vec![None; def.blocks.len()];
        entry[0] = Some(TypeSeq::new(start, false));

        let mut worklist = VecDeque::from([0]);
        while let Some(block) = worklist.pop_front() {
            let mut regs = match &entry[block] {
                Some(t) => t.clone(),
                None => continue,
            };
            for (index, op) in def.blocks[block].ops.iter().enumerate() {
                let before = captures.states_at(ProgramPoint { block, index });
                let after = captures.states_at(ProgramPoint {
                    block,
                    index: index + 1,
                });
                transfer(op, &mut regs, before, after);
            }

            for succ in def.blocks[block].exit.successors() {
                let merged = match &entry[succ] {
                    Some(existing) if regs.is_subsumed_by(existing) => continue,
                    Some(existing) => existing.join(&regs),
                    None => regs.clone(),
                };
                entry[succ] = Some(merged);
                if !worklist.contains(&succ) {
                    worklist.push_back(succ);
                }
            }
        }

        Self { entry }
    }

    /// Register types on entry to a block, `None` if unreachable
    pub fn block_entry(&self, block: BlockId) -> Option<&TypeSeq> {
        self.entry.get(block).and_then(|t| t.as_ref())
    }
}

/// Static type of an operand given the current register types
pub fn operand_type(operand: &Operand, regs: &TypeSeq, states: &[SlotState]) -> ValueType {
    match operand {
        Operand::Reg(r) if states[*r as usize] == SlotState::Captured => ValueType::Any,
        Operand::Reg(r) => regs.get(*r as usize),
        Operand::Const(c) => const_type(c),
    }
}

pub fn const_type(c: &Const) -> ValueType {
    match c {
        Const::Nil => ValueType::Nil,
        Const::Boolean(_) => ValueType::Boolean,
        Const::Integer(_) => ValueType::Integer,
        Const::Float(_) => ValueType::Float,
        Const::String(_) => ValueType::String,
    }
}

/// Result type of primitive arithmetic on two numeric types
pub fn arith_result(op: ArithOp, a: ValueType, b: ValueType) -> ValueType {
    if !a.is_numeric() || !b.is_numeric() {
        return ValueType::Any;
    }
    match op {
        ArithOp::Div | ArithOp::Pow => ValueType::Float,
        _ if a == ValueType::Float || b == ValueType::Float => ValueType::Float,
        _ if a == ValueType::Integer && b == ValueType::Integer => ValueType::Integer,
        _ => ValueType::Number,
    }
}

/// Apply one op to the register types.
///
/// `before` and `after` are the capture states around the op. Any register
/// captured on either side ends up `Any`.
pub fn transfer(op: &Op, regs: &mut TypeSeq, before: &[SlotState], after: &[SlotState]) {
    let states = before;
    let set = |regs: &mut TypeSeq, r: u16, t: ValueType| regs.fixed[r as usize] = t;

    match op {
        Op::Move { dst, src } => {
            let t = operand_type(&Operand::Reg(*src), regs, states);
            set(regs, *dst, t);
        }
        Op::Load { dst, value } => set(regs, *dst, const_type(value)),
        Op::GetUpvalue { dst, .. } | Op::Index { dst, .. } => set(regs, *dst, ValueType::Any),
        Op::NewTable { dst } => set(regs, *dst, ValueType::Table),
        Op::Closure { dst, .. } => set(regs, *dst, ValueType::Function),
        Op::Compare { dst, .. } => set(regs, *dst, ValueType::Boolean),
        Op::Arith { dst, op, a, b } => {
            let t = arith_result(
                *op,
                operand_type(a, regs, states),
                operand_type(b, regs, states),
            );
            set(regs, *dst, t);
        }
        Op::Unary { dst, op, src } => {
            let t = match op {
                UnaryOp::Not => ValueType::Boolean,
                UnaryOp::Neg => {
                    let t = operand_type(src, regs, states);
                    if t.is_numeric() {
                        t
                    } else {
                        ValueType::Any
                    }
                }
                UnaryOp::Len => match operand_type(src, regs, states) {
                    ValueType::String => ValueType::Integer,
                    _ => ValueType::Any,
                },
            };
            set(regs, *dst, t);
        }
        Op::Call { results, .. } | Op::Vararg { results } => {
            if let Results::Fixed(dsts) = results {
                for r in dsts {
                    set(regs, *r, ValueType::Any);
                }
            }
        }
        Op::SetUpvalue { .. } | Op::SetIndex { .. } | Op::Close { .. } => {}
    }

    for (r, (b, a)) in before.iter().zip(after).enumerate() {
        if *b == SlotState::Captured || *a == SlotState::Captured {
            regs.fixed[r] = ValueType::Any;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Args, CaptureSource, CompareOp, ProcBuilder};

    #[test]
    fn test_arith_result() {
        use ValueType::*;
        assert_eq!(arith_result(ArithOp::Add, Integer, Integer), Integer);
        assert_eq!(arith_result(ArithOp::Add, Integer, Float), Float);
        assert_eq!(arith_result(ArithOp::Div, Integer, Integer), Float);
        assert_eq!(arith_result(ArithOp::Mul, Number, Integer), Number);
        assert_eq!(arith_result(ArithOp::Add, Integer, Any), Any);
        assert_eq!(arith_result(ArithOp::Add, String, Integer), Any);
    }

    #[test]
    fn test_loop_widens_to_fixpoint() {
        // r0 = 0; loop { r0 = r0 + 0.5 } widens r0 from Integer to Number
        let mut b = ProcBuilder::new("f", 0);
        let body = b.new_block();
        let exit = b.new_block();
        b.load(0, Const::Integer(0));
        b.jump(body);

        b.switch_to(body);
        b.arith(0, ArithOp::Add, 0u16, Operand::float(0.5));
        b.compare(1, CompareOp::Lt, 0u16, Operand::int(10));
        b.branch(1, body, exit);

        b.switch_to(exit);
        b.ret(Args::of(vec![0u16.into()]));
        let def = b.build().unwrap();

        let captures = CaptureAnalysis::analyze(&def);
        let types = TypeAnalysis::analyze(&def, &captures);
        assert_eq!(types.block_entry(body).unwrap().get(0), ValueType::Number);
        assert_eq!(types.block_entry(exit).unwrap().get(0), ValueType::Float);
        assert_eq!(types.block_entry(exit).unwrap().get(1), ValueType::Boolean);
    }

    #[test]
    fn test_parameters_are_any() {
        let mut b = ProcBuilder::new("f", 1);
        b.arith(1, ArithOp::Add, 0u16, Operand::int(1));
        b.ret(Args::of(vec![1u16.into()]));
        let def = b.build().unwrap();

        let captures = CaptureAnalysis::analyze(&def);
        let types = TypeAnalysis::analyze(&def, &captures);
        let entry = types.block_entry(0).unwrap();
        assert_eq!(entry.get(0), ValueType::Any);
        assert_eq!(entry.get(1), ValueType::Nil);
    }

    #[test]
    fn test_close_forgets_captured_type() {
        let mut inner = ProcBuilder::new("g", 0);
        inner.capture(CaptureSource::Local(0));
        inner.ret(Args::default());

        let mut b = ProcBuilder::new("f", 0);
        let proto = b.nested(inner.build().unwrap());
        let next = b.new_block();
        b.load(0, Const::Integer(1));
        b.closure(1, proto);
        b.close(vec![0]);
        b.jump(next);
        b.switch_to(next);
        b.ret(Args::of(vec![0u16.into()]));
        let def = b.build().unwrap();

        let captures = CaptureAnalysis::analyze(&def);
        let types = TypeAnalysis::analyze(&def, &captures);
        let entry = types.block_entry(next).unwrap();
        assert_eq!(entry.get(0), ValueType::Any);
        assert_eq!(entry.get(1), ValueType::Function);
    }
}
