//! Programmatic construction of procedure graphs
//!
//! ```
//! use lunaria_vm::ir::{Args, Const, ProcBuilder};
//!
//! let mut b = ProcBuilder::new("answer", 0);
//! b.load(0, Const::Integer(42));
//! b.ret(Args::of(vec![0u16.into()]));
//! let def = b.build().unwrap();
//! assert_eq!(def.registers, 1);
//! ```

use super::{
    ArithOp, Args, Block, BlockId, CaptureSource, CompareOp, Const, Op, Operand, ProcedureDef,
    Reg, Results, Terminator, UnaryOp,
};
use crate::error::CompileError;

/// Incremental builder with a current-block cursor
#[derive(Debug, Clone)]
pub struct ProcBuilder {
    name: String,
    params: u16,
    is_vararg: bool,
    registers: Option<u16>,
    upvalues: Vec<CaptureSource>,
    blocks: Vec<(Vec<Op>, Option<Terminator>)>,
    nested: Vec<ProcedureDef>,
    current: BlockId,
}

impl ProcBuilder {
    /// New procedure with an empty entry block selected
    pub fn new(name: impl Into<String>, params: u16) -> Self {
        Self {
            name: name.into(),
            params,
            is_vararg: false,
            registers: None,
            upvalues: Vec::new(),
            blocks: vec![(Vec::new(), None)],
            nested: Vec::new(),
            current: 0,
        }
    }

    /// Accept extra arguments
    pub fn vararg(mut self) -> Self {
        self.is_vararg = true;
        self
    }

    /// Fix the register count instead of inferring it from the ops
    pub fn registers(mut self, count: u16) -> Self {
        self.registers = Some(count);
        self
    }

    /// Declare an upvalue, returning its index
    pub fn capture(&mut self, source: CaptureSource) -> u16 {
        self.upvalues.push(source);
        (self.upvalues.len() - 1) as u16
    }

    /// Add a nested procedure, returning its index for `closure`
    pub fn nested(&mut self, def: ProcedureDef) -> usize {
        self.nested.push(def);
        self.nested.len() - 1
    }

    /// Add an empty block without selecting it
    pub fn new_block(&mut self) -> BlockId {
        self.blocks.push((Vec::new(), None));
        self.blocks.len() - 1
    }

    /// Select the block subsequent ops go to
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Append an op to the current block
    pub fn push(&mut self, op: Op) -> &mut Self {
        self.blocks[self.current].0.push(op);
        self
    }

    /// End the current block
    pub fn terminate(&mut self, exit: Terminator) {
        self.blocks[self.current].1 = Some(exit);
    }

    pub fn mov(&mut self, dst: Reg, src: Reg) -> &mut Self {
        self.push(Op::Move { dst, src })
    }

    pub fn load(&mut self, dst: Reg, value: Const) -> &mut Self {
        self.push(Op::Load { dst, value })
    }

    pub fn get_upvalue(&mut self, dst: Reg, index: u16) -> &mut Self {
        self.push(Op::GetUpvalue { dst, index })
    }

    pub fn set_upvalue(&mut self, index: u16, src: impl Into<Operand>) -> &mut Self {
        self.push(Op::SetUpvalue {
            index,
            src: src.into(),
        })
    }

    pub fn new_table(&mut self, dst: Reg) -> &mut Self {
        self.push(Op::NewTable { dst })
    }

    pub fn index(
        &mut self,
        dst: Reg,
        table: impl Into<Operand>,
        key: impl Into<Operand>,
    ) -> &mut Self {
        self.push(Op::Index {
            dst,
            table: table.into(),
            key: key.into(),
        })
    }

    pub fn set_index(
        &mut self,
        table: Reg,
        key: impl Into<Operand>,
        value: impl Into<Operand>,
    ) -> &mut Self {
        self.push(Op::SetIndex {
            table,
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn arith(
        &mut self,
        dst: Reg,
        op: ArithOp,
        a: impl Into<Operand>,
        b: impl Into<Operand>,
    ) -> &mut Self {
        self.push(Op::Arith {
            dst,
            op,
            a: a.into(),
            b: b.into(),
        })
    }

    pub fn unary(&mut self, dst: Reg, op: UnaryOp, src: impl Into<Operand>) -> &mut Self {
        self.push(Op::Unary {
            dst,
            op,
            src: src.into(),
        })
    }

    pub fn compare(
        &mut self,
        dst: Reg,
        op: CompareOp,
        a: impl Into<Operand>,
        b: impl Into<Operand>,
    ) -> &mut Self {
        self.push(Op::Compare {
            dst,
            op,
            a: a.into(),
            b: b.into(),
        })
    }

    pub fn call(&mut self, target: Reg, args: Args, results: Results) -> &mut Self {
        self.push(Op::Call {
            target,
            args,
            results,
        })
    }

    pub fn closure(&mut self, dst: Reg, proto: usize) -> &mut Self {
        self.push(Op::Closure { dst, proto })
    }

    pub fn close(&mut self, regs: Vec<Reg>) -> &mut Self {
        self.push(Op::Close { regs })
    }

    pub fn vararg_into(&mut self, results: Results) -> &mut Self {
        self.push(Op::Vararg { results })
    }

    pub fn jump(&mut self, target: BlockId) {
        self.terminate(Terminator::Jump(target));
    }

    pub fn branch(&mut self, cond: Reg, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, args: Args) {
        self.terminate(Terminator::Return(args));
    }

    pub fn tail_call(&mut self, target: Reg, args: Args) {
        self.terminate(Terminator::TailCall { target, args });
    }

    /// Finish; every block must have a terminator
    pub fn build(self) -> Result<ProcedureDef, CompileError> {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        let mut used = self.params;

        for (idx, (ops, exit)) in self.blocks.into_iter().enumerate() {
            let exit = exit.ok_or_else(|| CompileError::UnterminatedBlock {
                procedure: self.name.clone(),
                block: idx,
            })?;
            for op in &ops {
                op.for_each_reg(|r| used = used.max(r.saturating_add(1)));
            }
            exit.for_each_reg(|r| used = used.max(r.saturating_add(1)));
            blocks.push(Block { ops, exit });
        }
        for def in &self.nested {
            for source in &def.upvalues {
                if let CaptureSource::Local(r) = source {
                    used = used.max(r.saturating_add(1));
                }
            }
        }

        Ok(ProcedureDef {
            name: self.name,
            params: self.params,
            is_vararg: self.is_vararg,
            registers: self.registers.unwrap_or(used),
            upvalues: self.upvalues,
            blocks,
            nested: self.nested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_count_inferred() {
        let mut b = ProcBuilder::new("f", 2);
        b.arith(4, ArithOp::Add, 0u16, 1u16);
        b.ret(Args::of(vec![4u16.into()]));
        let def = b.build().unwrap();
        assert_eq!(def.registers, 5);
        assert_eq!(def.blocks.len(), 1);
    }

    #[test]
    fn test_unterminated_block() {
        let mut b = ProcBuilder::new("f", 0);
        let other = b.new_block();
        b.jump(other);
        let err = b.build().unwrap_err();
        assert_eq!(
            err,
            CompileError::UnterminatedBlock {
                procedure: "f".to_string(),
                block: 1
            }
        );
    }

    #[test]
    fn test_nested_and_captures() {
        let mut inner = ProcBuilder::new("inner", 0);
        let up = inner.capture(CaptureSource::Local(0));
        inner.get_upvalue(0, up);
        inner.ret(Args::of(vec![0u16.into()]));

        let mut outer = ProcBuilder::new("outer", 1);
        let proto = outer.nested(inner.build().unwrap());
        outer.closure(1, proto);
        outer.ret(Args::of(vec![1u16.into()]));
        let def = outer.build().unwrap();

        assert_eq!(def.nested[0].upvalues, vec![CaptureSource::Local(0)]);
        assert_eq!(def.registers, 2);
    }
}
