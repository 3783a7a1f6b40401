//! Constant folding
//!
//! Replaces instructions whose operands all resolve to constants with the
//! computed constant. Integer inputs stay integers where the result is
//! exact; everything else folds through 64-bit float arithmetic, matching
//! the source language's number semantics. Division by a zero divisor is
//! left alone.

use crate::manager::{FunctionPass, PassResult};
use crate::util::const_through_copies;
use arkdec_ir::{
    BinaryOp, CmpOp, ConstValue, Function, IntWidth, Op, SpecialConst, UnaryOp, ValueId,
};

pub struct ConstantFolding;

fn int_pair(lhs: &ConstValue, rhs: &ConstValue) -> Option<(i64, i64)> {
    match (lhs, rhs) {
        (ConstValue::Int { value: l, .. }, ConstValue::Int { value: r, .. }) => Some((*l, *r)),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, lhs: &ConstValue, rhs: &ConstValue) -> Option<ConstValue> {
    // Integer-exact paths first.
    if let Some((l, r)) = int_pair(lhs, rhs) {
        match op {
            BinaryOp::Add => {
                return l.checked_add(r).map(|v| ConstValue::Int {
                    value: v,
                    width: IntWidth::W32,
                })
            }
            BinaryOp::Sub => {
                return l.checked_sub(r).map(|v| ConstValue::Int {
                    value: v,
                    width: IntWidth::W32,
                })
            }
            BinaryOp::Mul => {
                return l.checked_mul(r).map(|v| ConstValue::Int {
                    value: v,
                    width: IntWidth::W32,
                })
            }
            BinaryOp::Div => {
                if r == 0 {
                    return None;
                }
                if l % r == 0 {
                    return Some(ConstValue::Int {
                        value: l / r,
                        width: IntWidth::W32,
                    });
                }
                return Some(ConstValue::Float(l as f64 / r as f64));
            }
            BinaryOp::Mod => {
                if r == 0 {
                    return None;
                }
                return Some(ConstValue::Int {
                    value: l % r,
                    width: IntWidth::W32,
                });
            }
            // Bitwise semantics work on 32-bit truncations.
            BinaryOp::And => {
                return Some(ConstValue::Int {
                    value: i64::from((l as i32) & (r as i32)),
                    width: IntWidth::W32,
                })
            }
            BinaryOp::Or => {
                return Some(ConstValue::Int {
                    value: i64::from((l as i32) | (r as i32)),
                    width: IntWidth::W32,
                })
            }
            BinaryOp::Xor => {
                return Some(ConstValue::Int {
                    value: i64::from((l as i32) ^ (r as i32)),
                    width: IntWidth::W32,
                })
            }
            BinaryOp::Shl => {
                return Some(ConstValue::Int {
                    value: i64::from((l as i32).wrapping_shl(r as u32 & 31)),
                    width: IntWidth::W32,
                })
            }
            BinaryOp::Shr => {
                return Some(ConstValue::Int {
                    value: i64::from((l as u32).wrapping_shr(r as u32 & 31) as i32),
                    width: IntWidth::W32,
                })
            }
            BinaryOp::Ashr => {
                return Some(ConstValue::Int {
                    value: i64::from((l as i32).wrapping_shr(r as u32 & 31)),
                    width: IntWidth::W32,
                })
            }
            BinaryOp::Exp => {}
        }
    }

    // String concatenation.
    if let (ConstValue::Str(l), ConstValue::Str(r), BinaryOp::Add) = (lhs, rhs, op) {
        return Some(ConstValue::Str(format!("{}{}", l, r)));
    }

    // Float fallback.
    let l = lhs.as_f64()?;
    let r = rhs.as_f64()?;
    let folded = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0.0 {
                return None;
            }
            l / r
        }
        BinaryOp::Mod => {
            if r == 0.0 {
                return None;
            }
            l % r
        }
        BinaryOp::Exp => l.powf(r),
        _ => return None,
    };
    Some(ConstValue::Float(folded))
}

fn fold_cmp(op: CmpOp, lhs: &ConstValue, rhs: &ConstValue) -> Option<ConstValue> {
    if let (ConstValue::Str(l), ConstValue::Str(r)) = (lhs, rhs) {
        let folded = match op {
            CmpOp::Eq | CmpOp::StrictEq => l == r,
            CmpOp::Ne | CmpOp::StrictNe => l != r,
            CmpOp::Lt => l < r,
            CmpOp::Le => l <= r,
            CmpOp::Gt => l > r,
            CmpOp::Ge => l >= r,
            _ => return None,
        };
        return Some(ConstValue::bool(folded));
    }
    let l = lhs.as_f64()?;
    let r = rhs.as_f64()?;
    let folded = match op {
        CmpOp::Eq | CmpOp::StrictEq => l == r,
        CmpOp::Ne | CmpOp::StrictNe => l != r,
        CmpOp::Lt => l < r,
        CmpOp::Le => l <= r,
        CmpOp::Gt => l > r,
        CmpOp::Ge => l >= r,
        CmpOp::In | CmpOp::InstanceOf => return None,
    };
    Some(ConstValue::bool(folded))
}

fn fold_unary(op: UnaryOp, operand: &ConstValue) -> Option<ConstValue> {
    match op {
        UnaryOp::Neg => match operand {
            ConstValue::Int { value, width } => value.checked_neg().map(|v| ConstValue::Int {
                value: v,
                width: *width,
            }),
            _ => operand.as_f64().map(|v| ConstValue::Float(-v)),
        },
        UnaryOp::BitNot => operand.as_f64().map(|v| ConstValue::Int {
            value: i64::from(!(v as i64 as i32)),
            width: IntWidth::W32,
        }),
        UnaryOp::Inc => match operand {
            ConstValue::Int { value, .. } => value.checked_add(1).map(|v| ConstValue::Int {
                value: v,
                width: IntWidth::W32,
            }),
            _ => operand.as_f64().map(|v| ConstValue::Float(v + 1.0)),
        },
        UnaryOp::Dec => match operand {
            ConstValue::Int { value, .. } => value.checked_sub(1).map(|v| ConstValue::Int {
                value: v,
                width: IntWidth::W32,
            }),
            _ => operand.as_f64().map(|v| ConstValue::Float(v - 1.0)),
        },
        UnaryOp::Not => operand.truthy().map(|t| ConstValue::bool(!t)),
        UnaryOp::IsTrue => operand.truthy().map(ConstValue::bool),
        UnaryOp::IsFalse => operand.truthy().map(|t| ConstValue::bool(!t)),
        UnaryOp::ToNumber | UnaryOp::ToNumeric => {
            if operand.is_numeric() {
                Some(operand.clone())
            } else {
                None
            }
        }
        UnaryOp::TypeOf => {
            let name = match operand {
                ConstValue::Int {
                    width: IntWidth::W1,
                    ..
                } => "boolean",
                ConstValue::Int { .. } | ConstValue::Float(_) => "number",
                ConstValue::Str(_) => "string",
                ConstValue::Special(SpecialConst::Undefined) => "undefined",
                ConstValue::Special(SpecialConst::Null) => "object",
                ConstValue::Special(
                    SpecialConst::NaN | SpecialConst::PosInf | SpecialConst::NegInf,
                ) => "number",
                ConstValue::Special(SpecialConst::Hole) => return None,
            };
            Some(ConstValue::Str(name.to_string()))
        }
    }
}

impl ConstantFolding {
    fn fold_inst(func: &Function, v: ValueId) -> Option<ConstValue> {
        let op = func.op(v)?;
        let operands = func.operands(v);
        match op {
            Op::Binary(bin) => {
                let lhs = const_through_copies(func, operands[0])?;
                let rhs = const_through_copies(func, operands[1])?;
                fold_binary(*bin, lhs, rhs)
            }
            Op::Cmp(cmp) => {
                let lhs = const_through_copies(func, operands[0])?;
                let rhs = const_through_copies(func, operands[1])?;
                fold_cmp(*cmp, lhs, rhs)
            }
            Op::Unary(un) => {
                let operand = const_through_copies(func, operands[0])?;
                fold_unary(*un, operand)
            }
            Op::Select => {
                let cond = const_through_copies(func, operands[0])?;
                let taken = if cond.truthy()? {
                    operands[1]
                } else {
                    operands[2]
                };
                const_through_copies(func, taken).cloned()
            }
            Op::Phi { .. } => {
                // A φ folds when every incoming resolves to one shared
                // constant.
                let mut shared: Option<&ConstValue> = None;
                for &incoming in operands {
                    let c = const_through_copies(func, incoming)?;
                    match shared {
                        None => shared = Some(c),
                        Some(s) if s == c => {}
                        Some(_) => return None,
                    }
                }
                shared.cloned()
            }
            _ => None,
        }
    }

    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;
        loop {
            let mut folded_any = false;
            for b in func.block_order().to_vec() {
                for v in func.insts_of(b).to_vec() {
                    if func.is_removed(v) {
                        continue;
                    }
                    let Some(constant) = Self::fold_inst(func, v) else {
                        continue;
                    };
                    let replacement = func.const_value(constant);
                    func.replace_all_uses_with(v, replacement);
                    func.erase(v);
                    folded_any = true;
                }
            }
            if !folded_any {
                break;
            }
            modified = true;
        }
        modified
    }
}

impl FunctionPass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkdec_ir::IrType;

    fn with_ret(func: &mut Function, b: arkdec_ir::BlockId, v: ValueId) {
        let ret = func.create_inst(Op::Ret, vec![v], IrType::Void);
        func.append(b, ret);
    }

    #[test]
    fn test_fold_add() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let three = func.const_i32(3);
        let four = func.const_i32(4);
        let add = func.create_inst(Op::Binary(BinaryOp::Add), vec![three, four], IrType::Any);
        func.append(b, add);
        with_ret(&mut func, b, add);

        assert!(ConstantFolding::run_on(&mut func));
        let ret = func.terminator(b).unwrap();
        let v = func.operands(ret)[0];
        assert_eq!(func.const_of(v).and_then(ConstValue::as_int), Some(7));
    }

    #[test]
    fn test_fold_through_copies() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let three = func.const_i32(3);
        let c = func.create_inst(Op::Copy, vec![three], IrType::I32);
        func.append(b, c);
        let four = func.const_i32(4);
        let add = func.create_inst(Op::Binary(BinaryOp::Add), vec![c, four], IrType::Any);
        func.append(b, add);
        with_ret(&mut func, b, add);

        assert!(ConstantFolding::run_on(&mut func));
        let ret = func.terminator(b).unwrap();
        assert_eq!(
            func.const_of(func.operands(ret)[0]).and_then(ConstValue::as_int),
            Some(7)
        );
    }

    #[test]
    fn test_division_by_zero_left_alone() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let one = func.const_i32(1);
        let zero = func.const_i32(0);
        let div = func.create_inst(Op::Binary(BinaryOp::Div), vec![one, zero], IrType::Any);
        func.append(b, div);
        with_ret(&mut func, b, div);

        assert!(!ConstantFolding::run_on(&mut func));
        assert!(!func.is_removed(div));
    }

    #[test]
    fn test_fold_comparison_and_unary() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let one = func.const_i32(1);
        let two = func.const_i32(2);
        let lt = func.create_inst(Op::Cmp(CmpOp::Lt), vec![one, two], IrType::Bool);
        func.append(b, lt);
        let not = func.create_inst(Op::Unary(UnaryOp::Not), vec![lt], IrType::Bool);
        func.append(b, not);
        with_ret(&mut func, b, not);

        assert!(ConstantFolding::run_on(&mut func));
        let ret = func.terminator(b).unwrap();
        assert_eq!(
            func.const_of(func.operands(ret)[0]).and_then(ConstValue::as_bool),
            Some(false)
        );
    }

    #[test]
    fn test_non_exact_division_folds_to_float() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let seven = func.const_i32(7);
        let two = func.const_i32(2);
        let div = func.create_inst(Op::Binary(BinaryOp::Div), vec![seven, two], IrType::Any);
        func.append(b, div);
        with_ret(&mut func, b, div);

        assert!(ConstantFolding::run_on(&mut func));
        let ret = func.terminator(b).unwrap();
        match func.const_of(func.operands(ret)[0]) {
            Some(ConstValue::Float(v)) => assert_eq!(*v, 3.5),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_idempotent() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let three = func.const_i32(3);
        let four = func.const_i32(4);
        let add = func.create_inst(Op::Binary(BinaryOp::Add), vec![three, four], IrType::Any);
        func.append(b, add);
        with_ret(&mut func, b, add);

        assert!(ConstantFolding::run_on(&mut func));
        assert!(!ConstantFolding::run_on(&mut func));
    }
}
