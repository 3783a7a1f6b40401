//! Compound-assignment detection
//!
//! Runs after variable reconstruction: an arithmetic update whose first
//! operand belongs to the same reconstructed variable as the result is
//! flagged so the emitter renders `v += c` or `v++` instead of a fresh
//! assignment.

use crate::manager::{FunctionPass, PassResult};
use crate::util::{const_through_copies, resolve_copies};
use arkdec_ir::{BinaryOp, Function, Op, UnaryOp, ValueId};

pub struct CompoundAssignment;

impl CompoundAssignment {
    fn is_self_update(func: &Function, v: ValueId) -> bool {
        let name = func.value_name(v);
        if name.is_empty() {
            return false;
        }
        match func.op(v) {
            Some(Op::Binary(
                BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Shl
                | BinaryOp::Shr
                | BinaryOp::Ashr,
            )) => {
                let source = resolve_copies(func, func.operands(v)[0]);
                let update_is_const = const_through_copies(func, func.operands(v)[1]).is_some();
                update_is_const && func.value_name(source) == name
            }
            Some(Op::Unary(UnaryOp::Inc | UnaryOp::Dec)) => {
                let source = resolve_copies(func, func.operands(v)[0]);
                func.value_name(source) == name
            }
            _ => false,
        }
    }

    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;
        for b in func.block_order().to_vec() {
            for v in func.insts_of(b).to_vec() {
                if Self::is_self_update(func, v) && !func.is_compound_assign(v) {
                    func.set_compound_assign(v, true);
                    modified = true;
                }
            }
        }
        modified
    }
}

impl FunctionPass for CompoundAssignment {
    fn name(&self) -> &'static str {
        "compound-assignment"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkdec_ir::IrType;

    #[test]
    fn test_named_add_update_is_flagged() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let x = func.add_arg(IrType::Any);
        let one = func.const_i32(1);
        let add = func.create_inst(Op::Binary(BinaryOp::Add), vec![x, one], IrType::Any);
        func.append(b, add);
        let ret = func.create_inst(Op::Ret, vec![add], IrType::Void);
        func.append(b, ret);

        func.set_value_name(x, "i1");
        func.set_value_name(add, "i1");

        assert!(CompoundAssignment::run_on(&mut func));
        assert!(func.is_compound_assign(add));
    }

    #[test]
    fn test_unnamed_add_is_not_flagged() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let x = func.add_arg(IrType::Any);
        let one = func.const_i32(1);
        let add = func.create_inst(Op::Binary(BinaryOp::Add), vec![x, one], IrType::Any);
        func.append(b, add);
        let ret = func.create_inst(Op::Ret, vec![add], IrType::Void);
        func.append(b, ret);

        assert!(!CompoundAssignment::run_on(&mut func));
        assert!(!func.is_compound_assign(add));
    }

    #[test]
    fn test_inc_update_is_flagged() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let x = func.add_arg(IrType::Any);
        let inc = func.create_inst(Op::Unary(UnaryOp::Inc), vec![x], IrType::Any);
        func.append(b, inc);
        let ret = func.create_inst(Op::Ret, vec![inc], IrType::Void);
        func.append(b, ret);

        func.set_value_name(x, "i2");
        func.set_value_name(inc, "i2");

        assert!(CompoundAssignment::run_on(&mut func));
        assert!(func.is_compound_assign(inc));
    }

    #[test]
    fn test_idempotent() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let x = func.add_arg(IrType::Any);
        let inc = func.create_inst(Op::Unary(UnaryOp::Inc), vec![x], IrType::Any);
        func.append(b, inc);
        let ret = func.create_inst(Op::Ret, vec![inc], IrType::Void);
        func.append(b, ret);
        func.set_value_name(x, "i1");
        func.set_value_name(inc, "i1");

        assert!(CompoundAssignment::run_on(&mut func));
        assert!(!CompoundAssignment::run_on(&mut func));
    }
}
