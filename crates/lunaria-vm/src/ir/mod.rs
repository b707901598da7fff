//! Procedure graphs
//!
//! The compiler's input: a procedure as a graph of basic blocks over a fixed
//! register file. Block 0 is the entry. Every block ends in exactly one
//! terminator. Nested procedures are listed in `nested` and instantiated with
//! `Op::Closure`; each declares in `upvalues` which of its parent's registers
//! or upvalues it captures.
//!
//! The graph is serde-serializable so front ends and tools can exchange it as
//! JSON.

pub mod builder;

pub use crate::dispatch::arithmetic::ArithOp;
pub use builder::ProcBuilder;

use serde::{Deserialize, Serialize};

/// Register index
pub type Reg = u16;

/// Block index
pub type BlockId = usize;

/// Literal constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Register or constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Reg(Reg),
    Const(Const),
}

impl Operand {
    pub fn int(i: i64) -> Self {
        Operand::Const(Const::Integer(i))
    }

    pub fn float(f: f64) -> Self {
        Operand::Const(Const::Float(f))
    }

    pub fn str(s: &str) -> Self {
        Operand::Const(Const::String(s.to_string()))
    }

    pub fn nil() -> Self {
        Operand::Const(Const::Nil)
    }
}

impl From<Reg> for Operand {
    fn from(r: Reg) -> Self {
        Operand::Reg(r)
    }
}

impl From<Const> for Operand {
    fn from(c: Const) -> Self {
        Operand::Const(c)
    }
}

/// Unary operators other than arithmetic negation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    Len,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
}

/// Where the results of a call or vararg go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Results {
    /// Into these registers, padding with nil; empty discards
    Fixed(Vec<Reg>),
    /// Kept as a pending multi-value for the next spreading call or return
    Multi,
}

/// Argument list; `spread` appends the pending multi-value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Args {
    pub fixed: Vec<Operand>,
    #[serde(default)]
    pub spread: bool,
}

impl Args {
    pub fn of(fixed: Vec<Operand>) -> Self {
        Self {
            fixed,
            spread: false,
        }
    }

    pub fn spread(fixed: Vec<Operand>) -> Self {
        Self {
            fixed,
            spread: true,
        }
    }
}

/// What a nested procedure captures from its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureSource {
    /// A parent register, shared through a capture cell
    Local(Reg),
    /// One of the parent's own upvalues
    Upvalue(u16),
}

/// Straight-line operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Move { dst: Reg, src: Reg },
    Load { dst: Reg, value: Const },
    GetUpvalue { dst: Reg, index: u16 },
    SetUpvalue { index: u16, src: Operand },
    NewTable { dst: Reg },
    /// `dst = table[key]` with `__index` dispatch
    Index { dst: Reg, table: Operand, key: Operand },
    /// `table[key] = value`, raw
    SetIndex { table: Reg, key: Operand, value: Operand },
    Arith { dst: Reg, op: ArithOp, a: Operand, b: Operand },
    Unary { dst: Reg, op: UnaryOp, src: Operand },
    Compare { dst: Reg, op: CompareOp, a: Operand, b: Operand },
    Call { target: Reg, args: Args, results: Results },
    /// Instantiate `nested[proto]`, capturing what it declares
    Closure { dst: Reg, proto: usize },
    /// End of scope for captured registers; the next capture gets a fresh cell
    Close { regs: Vec<Reg> },
    Vararg { results: Results },
}

impl Operand {
    fn for_each_reg(&self, f: &mut impl FnMut(Reg)) {
        if let Operand::Reg(r) = self {
            f(*r);
        }
    }
}

impl Args {
    fn for_each_reg(&self, f: &mut impl FnMut(Reg)) {
        for operand in &self.fixed {
            operand.for_each_reg(f);
        }
    }
}

impl Results {
    fn for_each_reg(&self, f: &mut impl FnMut(Reg)) {
        if let Results::Fixed(regs) = self {
            for r in regs {
                f(*r);
            }
        }
    }
}

impl Op {
    /// Visit every register the op names directly
    pub fn for_each_reg(&self, mut f: impl FnMut(Reg)) {
        let f = &mut f;
        match self {
            Op::Move { dst, src } => {
                f(*dst);
                f(*src);
            }
            Op::Load { dst, .. }
            | Op::GetUpvalue { dst, .. }
            | Op::NewTable { dst }
            | Op::Closure { dst, .. } => f(*dst),
            Op::SetUpvalue { src, .. } => src.for_each_reg(f),
            Op::Index { dst, table, key } => {
                f(*dst);
                table.for_each_reg(f);
                key.for_each_reg(f);
            }
            Op::SetIndex { table, key, value } => {
                f(*table);
                key.for_each_reg(f);
                value.for_each_reg(f);
            }
            Op::Arith { dst, a, b, .. } | Op::Compare { dst, a, b, .. } => {
                f(*dst);
                a.for_each_reg(f);
                b.for_each_reg(f);
            }
            Op::Unary { dst, src, .. } => {
                f(*dst);
                src.for_each_reg(f);
            }
            Op::Call {
                target,
                args,
                results,
            } => {
                f(*target);
                args.for_each_reg(f);
                results.for_each_reg(f);
            }
            Op::Close { regs } => {
                for r in regs {
                    f(*r);
                }
            }
            Op::Vararg { results } => results.for_each_reg(f),
        }
    }
}

/// How a block ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Jump(BlockId),
    Branch {
        cond: Reg,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return(Args),
    TailCall { target: Reg, args: Args },
}

impl Terminator {
    /// Successor blocks
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Jump(b) => vec![*b],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Return(_) | Terminator::TailCall { .. } => Vec::new(),
        }
    }

    /// Visit every register the terminator names
    pub fn for_each_reg(&self, mut f: impl FnMut(Reg)) {
        let f = &mut f;
        match self {
            Terminator::Jump(_) => {}
            Terminator::Branch { cond, .. } => f(*cond),
            Terminator::Return(args) => args.for_each_reg(f),
            Terminator::TailCall { target, args } => {
                f(*target);
                args.for_each_reg(f);
            }
        }
    }
}

/// Basic block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub ops: Vec<Op>,
    pub exit: Terminator,
}

/// A procedure definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDef {
    pub name: String,
    /// Parameters occupy registers 0..params
    pub params: u16,
    #[serde(default)]
    pub is_vararg: bool,
    pub registers: u16,
    /// Captures, in upvalue index order
    #[serde(default)]
    pub upvalues: Vec<CaptureSource>,
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub nested: Vec<ProcedureDef>,
}

impl ProcedureDef {
    /// Parse from JSON
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
