//! Constant propagation
//!
//! Rewrites operands that resolve to constants through `copy` chains so
//! downstream passes see the constants directly, then collapses φ-nodes
//! whose incomings all resolve to one constant. Terminators and the
//! copies themselves are left untouched; the copies die in DCE once
//! nothing reads them.

use crate::manager::{FunctionPass, PassResult};
use crate::util::{const_through_copies, resolve_copies};
use arkdec_ir::{Function, Op, ValueId};

pub struct ConstantPropagation;

impl ConstantPropagation {
    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;

        for b in func.block_order().to_vec() {
            for v in func.insts_of(b).to_vec() {
                let Some(op) = func.op(v) else { continue };
                if op.is_terminator() || matches!(op, Op::Copy) {
                    continue;
                }
                for slot in 0..func.operands(v).len() {
                    let operand = func.operands(v)[slot];
                    if func.const_of(operand).is_some() {
                        continue;
                    }
                    let resolved = resolve_copies(func, operand);
                    if resolved != operand && func.const_of(resolved).is_some() {
                        func.set_operand(v, slot, resolved);
                        modified = true;
                    }
                }
            }
        }

        // φ-nodes whose incomings all resolve to the same constant become
        // that constant; repeat, since one collapse can enable another.
        loop {
            let mut collapsed = false;
            for b in func.block_order().to_vec() {
                for phi in func.phis(b) {
                    if func.is_removed(phi) {
                        continue;
                    }
                    let mut shared: Option<ValueId> = None;
                    let mut all_const = true;
                    for &incoming in func.operands(phi) {
                        let Some(_) = const_through_copies(func, incoming) else {
                            all_const = false;
                            break;
                        };
                        let resolved = resolve_copies(func, incoming);
                        match shared {
                            None => shared = Some(resolved),
                            Some(s) if s == resolved => {}
                            Some(_) => {
                                all_const = false;
                                break;
                            }
                        }
                    }
                    let Some(replacement) = shared else { continue };
                    if !all_const {
                        continue;
                    }
                    func.replace_all_uses_with(phi, replacement);
                    func.erase(phi);
                    collapsed = true;
                }
            }
            if !collapsed {
                break;
            }
            modified = true;
        }

        modified
    }
}

impl FunctionPass for ConstantPropagation {
    fn name(&self) -> &'static str {
        "constant-propagation"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}
