//! Compiled procedure format
//!
//! Instructions address registers through `SlotRef`s whose mode was fixed at
//! compile time: `Direct` slots hold their value in place, `Boxed` slots hold a
//! capture cell shared with closures. Suspendable instructions carry the
//! resumption point that the frame records before dispatching; the procedure's
//! resumption table maps that point back to the instruction that collects the
//! operation's results.

use crate::dispatch::arithmetic::ArithOp;
use crate::ir::{CaptureSource, CompareOp};
use crate::value::Value;
use lunaria_types::TypeSeq;
use std::fmt;
use std::rc::Rc;

/// Index into a procedure's resumption table; 0 is the normal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResumePoint(pub u32);

impl ResumePoint {
    pub const ENTRY: ResumePoint = ResumePoint(0);
}

impl fmt::Display for ResumePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// How a register is accessed at a given instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotMode {
    Direct,
    Boxed,
}

/// Register reference with its access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub reg: u16,
    pub mode: SlotMode,
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            SlotMode::Direct => write!(f, "r{}", self.reg),
            SlotMode::Boxed => write!(f, "[r{}]", self.reg),
        }
    }
}

/// Register or constant operand
#[derive(Debug, Clone)]
pub enum Operand {
    Slot(SlotRef),
    Const(Value),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Slot(s) => write!(f, "{}", s),
            Operand::Const(Value::String(s)) => write!(f, "{:?}", s),
            Operand::Const(v) => write!(f, "{}", v),
        }
    }
}

/// Arguments; `spread` appends the frame's pending multi-value
#[derive(Debug, Clone)]
pub struct ArgList {
    pub fixed: Vec<Operand>,
    pub spread: bool,
}

/// Where results from the channel or the varargs go
#[derive(Debug, Clone)]
pub enum Receive {
    Discard,
    One(SlotRef),
    Fixed(Vec<SlotRef>),
    /// Keep them all as the frame's pending multi-value
    Multi,
}

/// Compiled instruction
#[derive(Debug, Clone)]
pub enum Instr {
    Move { dst: SlotRef, src: Operand },
    GetUpvalue { dst: SlotRef, index: u16 },
    SetUpvalue { index: u16, src: Operand },
    NewTable { dst: SlotRef },
    SetIndex { table: SlotRef, key: Operand, value: Operand },
    /// Move a plain register into a fresh capture cell
    Capture { reg: u16 },
    /// Unwrap a capture cell back into a plain register
    Uncapture { reg: u16 },
    Closure { dst: SlotRef, proto: usize },
    /// Dispatched arithmetic; result goes to the channel
    Arith { op: ArithOp, a: Operand, b: Operand, point: ResumePoint },
    /// Arithmetic on operands statically known to be numbers
    ArithRaw { op: ArithOp, dst: SlotRef, a: Operand, b: Operand },
    Not { dst: SlotRef, src: Operand },
    Len { src: Operand, point: ResumePoint },
    Compare { op: CompareOp, dst: SlotRef, a: Operand, b: Operand },
    Index { table: Operand, key: Operand, point: ResumePoint },
    Call { target: SlotRef, args: ArgList, point: ResumePoint },
    /// Collect the channel's results after a suspendable instruction
    Receive(Receive),
    Vararg(Receive),
    Jump { target: usize },
    JumpIfFalse { cond: SlotRef, target: usize },
    Return { args: ArgList },
    TailCall { target: SlotRef, args: ArgList },
}

impl Instr {
    /// Resumption point allocated for this instruction, if it may suspend
    pub fn resume_point(&self) -> Option<ResumePoint> {
        match self {
            Instr::Arith { point, .. }
            | Instr::Len { point, .. }
            | Instr::Index { point, .. }
            | Instr::Call { point, .. } => Some(*point),
            _ => None,
        }
    }
}

/// Resumption point to instruction index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeTable {
    targets: Vec<usize>,
}

impl ResumeTable {
    pub fn new(targets: Vec<usize>) -> Self {
        Self { targets }
    }

    /// Instruction to continue at.
    ///
    /// # Panics
    /// An index the compiler never allocated means the saved frame does not
    /// belong to this procedure; that is an internal invariant violation.
    pub fn target(&self, point: ResumePoint) -> usize {
        match self.targets.get(point.0 as usize) {
            Some(pc) => *pc,
            None => panic!(
                "invalid resumption point {} ({} allocated)",
                point,
                self.targets.len()
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }
}

/// Compiled procedure
#[derive(Debug, Clone)]
pub struct CompiledProc {
    pub name: String,
    pub param_count: u16,
    pub is_vararg: bool,
    pub register_count: u16,
    pub code: Vec<Instr>,
    /// `None` for procedures that can never suspend
    pub resume_table: Option<ResumeTable>,
    pub upvalues: Vec<CaptureSource>,
    pub nested: Vec<Rc<CompiledProc>>,
    /// Join of the shapes of everything the procedure returns
    pub return_type: TypeSeq,
}

impl CompiledProc {
    /// Has more than the entry resumption point?
    pub fn is_resumable(&self) -> bool {
        self.resume_table.is_some()
    }

    /// Number of resumption points including the entry
    pub fn resume_points(&self) -> usize {
        self.resume_table.as_ref().map_or(1, |t| t.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_table_lookup() {
        let table = ResumeTable::new(vec![0, 4, 9]);
        assert_eq!(table.target(ResumePoint::ENTRY), 0);
        assert_eq!(table.target(ResumePoint(2)), 9);
    }

    #[test]
    #[should_panic(expected = "invalid resumption point")]
    fn test_resume_table_out_of_range() {
        let table = ResumeTable::new(vec![0, 4]);
        table.target(ResumePoint(5));
    }

    #[test]
    fn test_slot_display() {
        let direct = SlotRef {
            reg: 3,
            mode: SlotMode::Direct,
        };
        let boxed = SlotRef {
            reg: 3,
            mode: SlotMode::Boxed,
        };
        assert_eq!(direct.to_string(), "r3");
        assert_eq!(boxed.to_string(), "[r3]");
    }
}
