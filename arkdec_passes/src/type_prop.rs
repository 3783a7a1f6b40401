//! Type propagation and numeric-coercion removal
//!
//! A fixed point grows the set of values known to be numeric: numeric
//! constants seed it, and it spreads through arithmetic, ordering
//! comparisons, copies, numeric unaries and φ-nodes whose inputs are all
//! known. Known-numeric `any` values get their type tag refined, and
//! `to-numeric` of a known-numeric operand disappears.

use crate::manager::{FunctionPass, PassResult};
use arkdec_ir::{CmpOp, Function, IrType, Op, UnaryOp, ValueId};
use hashbrown::HashSet;

pub struct TypePropagation;

impl TypePropagation {
    fn known_numeric(func: &Function) -> HashSet<ValueId> {
        let mut known: HashSet<ValueId> = HashSet::new();
        for v in func.value_ids() {
            if func.is_removed(v) {
                continue;
            }
            if func.const_of(v).map(|c| c.is_numeric()).unwrap_or(false) {
                known.insert(v);
            }
            if func.ty(v).is_numeric() {
                known.insert(v);
            }
        }

        fn mark(known: &mut HashSet<ValueId>, grew: &mut bool, v: ValueId) {
            if known.insert(v) {
                *grew = true;
            }
        }

        loop {
            let mut grew = false;
            for &b in func.block_order() {
                for &v in func.insts_of(b) {
                    let operands = func.operands(v);
                    match func.op(v).unwrap() {
                        // Arithmetic produces numbers and implies its
                        // operands were numbers.
                        Op::Binary(_) => {
                            mark(&mut known, &mut grew, v);
                            for &operand in operands {
                                mark(&mut known, &mut grew, operand);
                            }
                        }
                        // Ordering comparisons imply numeric operands.
                        Op::Cmp(CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge) => {
                            for &operand in operands {
                                mark(&mut known, &mut grew, operand);
                            }
                        }
                        Op::Unary(
                            UnaryOp::Neg
                            | UnaryOp::Inc
                            | UnaryOp::Dec
                            | UnaryOp::BitNot
                            | UnaryOp::ToNumber
                            | UnaryOp::ToNumeric,
                        ) => {
                            mark(&mut known, &mut grew, v);
                        }
                        Op::Copy => {
                            if known.contains(&operands[0]) {
                                mark(&mut known, &mut grew, v);
                            }
                        }
                        Op::Phi { .. } => {
                            if !operands.is_empty()
                                && operands.iter().all(|operand| {
                                    known.contains(operand) || *operand == v
                                })
                            {
                                mark(&mut known, &mut grew, v);
                            }
                        }
                        _ => {}
                    }
                }
            }
            if !grew {
                break;
            }
        }
        known
    }

    pub fn run_on(func: &mut Function) -> bool {
        let known = Self::known_numeric(func);
        let mut modified = false;

        // Refine the type tags of known-numeric dynamic values.
        for &v in &known {
            if func.ty(v) == IrType::Any {
                func.set_ty(v, IrType::F64);
                modified = true;
            }
        }

        // to-numeric of a known-numeric value is the value itself.
        for b in func.block_order().to_vec() {
            for v in func.insts_of(b).to_vec() {
                if func.is_removed(v) {
                    continue;
                }
                if !matches!(func.op(v), Some(Op::Unary(UnaryOp::ToNumeric))) {
                    continue;
                }
                let operand = func.operands(v)[0];
                if known.contains(&operand) {
                    func.replace_all_uses_with(v, operand);
                    func.erase(v);
                    modified = true;
                }
            }
        }
        modified
    }
}

impl FunctionPass for TypePropagation {
    fn name(&self) -> &'static str {
        "type-propagation"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}

/// Drops `to-numeric` whose operand already carries a numeric type tag
pub struct ToNumericElimination;

impl ToNumericElimination {
    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;
        for b in func.block_order().to_vec() {
            for v in func.insts_of(b).to_vec() {
                if func.is_removed(v) {
                    continue;
                }
                if !matches!(func.op(v), Some(Op::Unary(UnaryOp::ToNumeric))) {
                    continue;
                }
                let operand = func.operands(v)[0];
                if func.ty(operand).is_numeric() {
                    func.replace_all_uses_with(v, operand);
                    func.erase(v);
                    modified = true;
                }
            }
        }
        modified
    }
}

impl FunctionPass for ToNumericElimination {
    fn name(&self) -> &'static str {
        "to-numeric-elimination"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}
