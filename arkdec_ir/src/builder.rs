//! Instruction builder with an insertion point
//!
//! Thin convenience layer over [`Function`]: tracks the current block and
//! appends instructions to it. The SSA lifter drives one of these per
//! method.

use crate::function::Function;
use crate::instruction::{BinaryOp, CmpOp, Op, UnaryOp};
use crate::types::IrType;
use crate::value::{BlockId, ValueId};

/// Builder appending instructions at a movable insertion point
pub struct IrBuilder<'a> {
    func: &'a mut Function,
    block: Option<BlockId>,
}

impl<'a> IrBuilder<'a> {
    pub fn new(func: &'a mut Function) -> Self {
        Self { func, block: None }
    }

    pub fn func(&mut self) -> &mut Function {
        self.func
    }

    pub fn set_block(&mut self, block: BlockId) {
        self.block = Some(block);
    }

    pub fn block(&self) -> BlockId {
        self.block.expect("builder has no insertion block")
    }

    /// Create and append an instruction at the insertion point
    pub fn emit(&mut self, op: Op, operands: Vec<ValueId>, ty: IrType) -> ValueId {
        let block = self.block();
        let v = self.func.create_inst(op, operands, ty);
        self.func.append(block, v);
        v
    }

    pub fn copy(&mut self, value: ValueId) -> ValueId {
        let ty = self.func.ty(value);
        self.emit(Op::Copy, vec![value], ty)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(Op::Binary(op), vec![lhs, rhs], IrType::Any)
    }

    pub fn cmp(&mut self, pred: CmpOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(Op::Cmp(pred), vec![lhs, rhs], IrType::Bool)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ValueId) -> ValueId {
        let ty = match op {
            UnaryOp::IsTrue | UnaryOp::IsFalse | UnaryOp::Not => IrType::Bool,
            UnaryOp::TypeOf => IrType::Str,
            _ => IrType::Any,
        };
        self.emit(Op::Unary(op), vec![operand], ty)
    }

    pub fn br(&mut self, target: BlockId) -> ValueId {
        self.emit(Op::Br { target }, vec![], IrType::Void)
    }

    pub fn br_cond(&mut self, cond: ValueId, then_dest: BlockId, else_dest: BlockId) -> ValueId {
        self.emit(
            Op::BrCond {
                then_dest,
                else_dest,
            },
            vec![cond],
            IrType::Void,
        )
    }

    pub fn ret(&mut self, value: ValueId) -> ValueId {
        self.emit(Op::Ret, vec![value], IrType::Void)
    }

    pub fn ret_void(&mut self) -> ValueId {
        self.emit(Op::RetVoid, vec![], IrType::Void)
    }

    pub fn throw(&mut self, value: ValueId) -> ValueId {
        self.emit(Op::Throw, vec![value], IrType::Void)
    }

    pub fn is_terminated(&self) -> bool {
        self.func.is_terminated(self.block())
    }
}
