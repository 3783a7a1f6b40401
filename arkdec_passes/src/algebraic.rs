//! Algebraic simplification
//!
//! Closed-form identities over one variable operand and one constant,
//! plus same-operand comparison folding. Source-language edge cases
//! around NaN are deliberately ignored: the decompiler reconstructs the
//! expression the programmer wrote, it does not execute it.

use crate::manager::{FunctionPass, PassResult};
use crate::util::{const_through_copies, resolve_copies};
use arkdec_ir::{BinaryOp, CmpOp, ConstValue, Function, Op, ValueId};

pub struct AlgebraicSimplification;

enum Rewrite {
    /// Replace the instruction with an existing value
    Value(ValueId),
    /// Replace the instruction with an integer constant
    Int(i64),
    Bool(bool),
}

impl AlgebraicSimplification {
    fn simplify_binary(func: &Function, v: ValueId, op: BinaryOp) -> Option<Rewrite> {
        let lhs = func.operands(v)[0];
        let rhs = func.operands(v)[1];
        let lhs_const = const_through_copies(func, lhs).and_then(ConstValue::as_int);
        let rhs_const = const_through_copies(func, rhs).and_then(ConstValue::as_int);
        let same_operand = resolve_copies(func, lhs) == resolve_copies(func, rhs);

        match op {
            BinaryOp::Add => match (lhs_const, rhs_const) {
                (_, Some(0)) => Some(Rewrite::Value(lhs)),
                (Some(0), _) => Some(Rewrite::Value(rhs)),
                _ => None,
            },
            BinaryOp::Sub => {
                if rhs_const == Some(0) {
                    Some(Rewrite::Value(lhs))
                } else if same_operand {
                    Some(Rewrite::Int(0))
                } else {
                    None
                }
            }
            BinaryOp::Mul => match (lhs_const, rhs_const) {
                (_, Some(0)) | (Some(0), _) => Some(Rewrite::Int(0)),
                (_, Some(1)) => Some(Rewrite::Value(lhs)),
                (Some(1), _) => Some(Rewrite::Value(rhs)),
                _ => None,
            },
            BinaryOp::Div => (rhs_const == Some(1)).then_some(Rewrite::Value(lhs)),
            BinaryOp::And => match (lhs_const, rhs_const) {
                (_, Some(0)) | (Some(0), _) => Some(Rewrite::Int(0)),
                _ => None,
            },
            BinaryOp::Or => match (lhs_const, rhs_const) {
                (_, Some(0)) => Some(Rewrite::Value(lhs)),
                (Some(0), _) => Some(Rewrite::Value(rhs)),
                (_, Some(-1)) | (Some(-1), _) => Some(Rewrite::Int(-1)),
                _ => None,
            },
            BinaryOp::Xor => match (lhs_const, rhs_const) {
                (_, Some(0)) => Some(Rewrite::Value(lhs)),
                (Some(0), _) => Some(Rewrite::Value(rhs)),
                _ => None,
            },
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ashr => {
                (rhs_const == Some(0)).then_some(Rewrite::Value(lhs))
            }
            _ => None,
        }
    }

    fn simplify_cmp(func: &Function, v: ValueId, op: CmpOp) -> Option<Rewrite> {
        let lhs = func.operands(v)[0];
        let rhs = func.operands(v)[1];
        if resolve_copies(func, lhs) != resolve_copies(func, rhs) {
            return None;
        }
        match op {
            CmpOp::Eq | CmpOp::StrictEq | CmpOp::Le | CmpOp::Ge => Some(Rewrite::Bool(true)),
            CmpOp::Ne | CmpOp::StrictNe | CmpOp::Lt | CmpOp::Gt => Some(Rewrite::Bool(false)),
            CmpOp::In | CmpOp::InstanceOf => None,
        }
    }

    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;
        for b in func.block_order().to_vec() {
            for v in func.insts_of(b).to_vec() {
                if func.is_removed(v) {
                    continue;
                }
                let rewrite = match func.op(v) {
                    Some(&Op::Binary(bin)) => Self::simplify_binary(func, v, bin),
                    Some(&Op::Cmp(cmp)) => Self::simplify_cmp(func, v, cmp),
                    _ => None,
                };
                let Some(rewrite) = rewrite else { continue };
                let replacement = match rewrite {
                    Rewrite::Value(r) => r,
                    Rewrite::Int(i) => func.const_i32(i as i32),
                    Rewrite::Bool(t) => func.const_bool(t),
                };
                func.replace_all_uses_with(v, replacement);
                func.erase(v);
                modified = true;
            }
        }
        modified
    }
}

impl FunctionPass for AlgebraicSimplification {
    fn name(&self) -> &'static str {
        "algebraic-simplification"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkdec_ir::IrType;

    fn setup() -> (Function, arkdec_ir::BlockId, ValueId) {
        let mut func = Function::new("t");
        let b = func.create_block();
        let x = func.add_arg(IrType::Any);
        (func, b, x)
    }

    fn finish(func: &mut Function, b: arkdec_ir::BlockId, v: ValueId) -> ValueId {
        let ret = func.create_inst(Op::Ret, vec![v], IrType::Void);
        func.append(b, ret);
        ret
    }

    #[test]
    fn test_add_zero_is_identity() {
        let (mut func, b, x) = setup();
        let zero = func.const_i32(0);
        let add = func.create_inst(Op::Binary(BinaryOp::Add), vec![x, zero], IrType::Any);
        func.append(b, add);
        let ret = finish(&mut func, b, add);

        assert!(AlgebraicSimplification::run_on(&mut func));
        assert_eq!(func.operands(ret), &[x]);
        assert!(func.is_removed(add));
    }

    #[test]
    fn test_mul_zero_is_zero() {
        let (mut func, b, x) = setup();
        let zero = func.const_i32(0);
        let mul = func.create_inst(Op::Binary(BinaryOp::Mul), vec![x, zero], IrType::Any);
        func.append(b, mul);
        let ret = finish(&mut func, b, mul);

        assert!(AlgebraicSimplification::run_on(&mut func));
        assert_eq!(
            func.const_of(func.operands(ret)[0]).and_then(ConstValue::as_int),
            Some(0)
        );
    }

    #[test]
    fn test_sub_self_is_zero() {
        let (mut func, b, x) = setup();
        let sub = func.create_inst(Op::Binary(BinaryOp::Sub), vec![x, x], IrType::Any);
        func.append(b, sub);
        let ret = finish(&mut func, b, sub);

        assert!(AlgebraicSimplification::run_on(&mut func));
        assert_eq!(
            func.const_of(func.operands(ret)[0]).and_then(ConstValue::as_int),
            Some(0)
        );
    }

    #[test]
    fn test_self_comparisons() {
        let (mut func, b, x) = setup();
        let eq = func.create_inst(Op::Cmp(CmpOp::Eq), vec![x, x], IrType::Bool);
        func.append(b, eq);
        let lt = func.create_inst(Op::Cmp(CmpOp::Lt), vec![x, x], IrType::Bool);
        func.append(b, lt);
        let ret_eq = finish(&mut func, b, eq);
        let _ = ret_eq;

        assert!(AlgebraicSimplification::run_on(&mut func));
        assert_eq!(
            func.const_of(func.operands(ret_eq)[0]).and_then(ConstValue::as_bool),
            Some(true)
        );
        assert!(func.is_removed(lt));
    }

    #[test]
    fn test_identity_through_copies() {
        let (mut func, b, x) = setup();
        let zero = func.const_i32(0);
        let boxed = func.create_inst(Op::Copy, vec![zero], IrType::I32);
        func.append(b, boxed);
        let or = func.create_inst(Op::Binary(BinaryOp::Or), vec![x, boxed], IrType::Any);
        func.append(b, or);
        let ret = finish(&mut func, b, or);

        assert!(AlgebraicSimplification::run_on(&mut func));
        assert_eq!(func.operands(ret), &[x]);
    }

    #[test]
    fn test_idempotent() {
        let (mut func, b, x) = setup();
        let zero = func.const_i32(0);
        let add = func.create_inst(Op::Binary(BinaryOp::Add), vec![x, zero], IrType::Any);
        func.append(b, add);
        finish(&mut func, b, add);

        assert!(AlgebraicSimplification::run_on(&mut func));
        assert!(!AlgebraicSimplification::run_on(&mut func));
    }
}
