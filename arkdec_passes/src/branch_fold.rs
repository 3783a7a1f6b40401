//! Branch folding
//!
//! The lifter lowers conditional jumps as a comparison against zero over
//! an earlier comparison result. This pass fuses the three-instruction
//! shape `cmp OP a b ; cmp-eq t, 0 ; br-cond` into a single ordered
//! branch, inverting the predicate where the zero test flips polarity.
//! The leftover comparisons die in DCE.

use crate::manager::{FunctionPass, PassResult};
use crate::util::{const_through_copies, resolve_copies};
use arkdec_ir::{CmpOp, ConstValue, Function, IrType, Op};

pub struct BranchFolding;

impl BranchFolding {
    fn fold_block(func: &mut Function, b: arkdec_ir::BlockId) -> bool {
        let Some(term) = func.terminator(b) else {
            return false;
        };
        let Some(&Op::BrCond {
            then_dest,
            else_dest,
        }) = func.op(term)
        else {
            return false;
        };

        // The condition must be an equality test of a comparison result
        // against zero.
        let zero_test = resolve_copies(func, func.operands(term)[0]);
        let Some(&Op::Cmp(outer)) = func.op(zero_test) else {
            return false;
        };
        let against_zero = matches!(
            const_through_copies(func, func.operands(zero_test)[1]),
            Some(ConstValue::Int { value: 0, .. })
        );
        if !against_zero {
            return false;
        }
        let inner = resolve_copies(func, func.operands(zero_test)[0]);
        let Some(&Op::Cmp(pred)) = func.op(inner) else {
            return false;
        };

        // `cmp-eq t, 0` branches when the inner comparison is false; the
        // fused branch inverts the predicate. `cmp-ne t, 0` keeps it.
        let fused_pred = match outer {
            CmpOp::Eq => match pred.inverse() {
                Some(p) => p,
                None => return false,
            },
            CmpOp::Ne => pred,
            _ => return false,
        };

        let lhs = func.operands(inner)[0];
        let rhs = func.operands(inner)[1];
        func.erase(term);
        let fused = func.create_inst(
            Op::BrCmp {
                pred: fused_pred,
                then_dest,
                else_dest,
            },
            vec![lhs, rhs],
            IrType::Void,
        );
        func.append(b, fused);
        log::trace!("branch-folding: fused ordered branch in {}", b);
        true
    }

    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;
        for b in func.block_order().to_vec() {
            modified |= Self::fold_block(func, b);
        }
        modified
    }
}

impl FunctionPass for BranchFolding {
    fn name(&self) -> &'static str {
        "branch-folding"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}
