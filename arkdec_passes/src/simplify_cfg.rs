//! Control-flow graph simplification
//!
//! Three rewrites run to fixpoint:
//!
//! 1. merge a block into its sole successor when the edge is the
//!    successor's only entry,
//! 2. fold conditional branches whose condition is a known constant,
//! 3. drop empty forwarding blocks whose predecessors all branch
//!    unconditionally.
//!
//! φ-nodes are preserved by re-parenting their incoming pairs whenever an
//! edge changes shape.

use crate::manager::{FunctionPass, PassResult};
use crate::util::const_through_copies;
use arkdec_ir::{BlockId, Function, IrType, Op};

pub struct SimplifyCfg;

impl SimplifyCfg {
    /// Merge `b`'s sole successor into `b` when that successor has no
    /// other predecessors. Returns true on change.
    fn merge_into_successor(func: &mut Function, b: BlockId) -> bool {
        let Some(term) = func.terminator(b) else {
            return false;
        };
        let Some(&Op::Br { target: s }) = func.op(term) else {
            return false;
        };
        if s == b || s == func.entry() || func.preds(s) != [b].as_slice() {
            return false;
        }

        // φs in s have exactly one incoming (from b); they are plain
        // aliases now. A self-referential incoming means the value was
        // never defined on this path.
        for phi in func.phis(s) {
            let incoming = func.phi_value_for_block(phi, b).expect("phi missing incoming");
            func.phi_remove_incoming_for(phi, b);
            let replacement = if incoming == phi {
                func.undef_value(func.ty(phi))
            } else {
                incoming
            };
            func.replace_all_uses_with(phi, replacement);
            func.erase(phi);
        }

        func.erase(term);

        let moved: Vec<_> = func.insts_of(s).to_vec();
        let s_succs = func.succs(s).to_vec();
        for v in moved {
            func.remove_from_block(v);
            func.append(b, v);
        }
        // Appending s's terminator rewired the edges from b; the φs in
        // the successors still name s.
        for succ in s_succs {
            for phi in func.phis(succ) {
                func.phi_replace_incoming_block(phi, s, b);
            }
        }
        func.remove_block(s);
        log::trace!("simplify-cfg: merged {} into {}", s, b);
        true
    }

    /// Rewrite `br-cond` with a constant condition into `br`
    fn fold_constant_branch(func: &mut Function, b: BlockId) -> bool {
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
        let cond = func.operands(term)[0];
        let Some(truthy) = const_through_copies(func, cond).and_then(|c| c.truthy()) else {
            return false;
        };
        let (taken, dropped) = if truthy {
            (then_dest, else_dest)
        } else {
            (else_dest, then_dest)
        };

        func.erase(term);
        let br = func.create_inst(Op::Br { target: taken }, vec![], IrType::Void);
        func.append(b, br);
        if dropped != taken {
            for phi in func.phis(dropped) {
                func.phi_remove_incoming_for(phi, b);
            }
        }
        log::trace!("simplify-cfg: folded constant branch in {}", b);
        true
    }

    /// Remove an empty block that only forwards to its single successor,
    /// provided every predecessor reaches it by an unconditional branch.
    /// Before the block disappears, φs in the successor re-parent the
    /// incoming pair onto each predecessor that now flows in directly.
    fn drop_trampoline(func: &mut Function, t: BlockId) -> bool {
        if t == func.entry() {
            return false;
        }
        let insts = func.insts_of(t);
        if insts.len() != 1 {
            return false;
        }
        let term = insts[0];
        let Some(&Op::Br { target: s }) = func.op(term) else {
            return false;
        };
        if s == t {
            return false;
        }
        let preds = func.preds(t).to_vec();
        if preds.is_empty() {
            return false;
        }
        // A conditional predecessor needs the forwarding block to keep
        // its two paths apart; removing it would collapse them.
        for &p in &preds {
            let Some(pt) = func.terminator(p) else {
                return false;
            };
            if !matches!(func.op(pt), Some(Op::Br { .. })) {
                return false;
            }
        }

        for phi in func.phis(s) {
            if let Some(v) = func.phi_value_for_block(phi, t) {
                func.phi_remove_incoming_for(phi, t);
                for &p in &preds {
                    func.add_incoming(phi, v, p);
                }
            }
        }
        for &p in &preds {
            func.replace_successor(p, t, s);
        }
        func.erase(term);
        func.remove_block(t);
        log::trace!("simplify-cfg: dropped trampoline {}", t);
        true
    }

    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;
        loop {
            let mut changed = false;
            for b in func.block_order().to_vec() {
                // The block may have been removed by an earlier rewrite
                // in this round.
                if !func.block_order().contains(&b) {
                    continue;
                }
                changed |= Self::fold_constant_branch(func, b);
                changed |= Self::merge_into_successor(func, b);
                if func.block_order().contains(&b) {
                    changed |= Self::drop_trampoline(func, b);
                }
            }
            if !changed {
                break;
            }
            modified = true;
        }
        modified
    }
}

impl FunctionPass for SimplifyCfg {
    fn name(&self) -> &'static str {
        "simplify-cfg"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkdec_ir::{IrType, ValueId};

    fn br(func: &mut Function, from: BlockId, to: BlockId) -> ValueId {
        let v = func.create_inst(Op::Br { target: to }, vec![], IrType::Void);
        func.append(from, v);
        v
    }

    #[test]
    fn test_merge_linear_chain() {
        let mut func = Function::new("t");
        let b0 = func.create_block();
        let b1 = func.create_block();
        br(&mut func, b0, b1);
        let one = func.const_i32(1);
        let ret = func.create_inst(Op::Ret, vec![one], IrType::Void);
        func.append(b1, ret);

        assert!(SimplifyCfg::run_on(&mut func));
        assert_eq!(func.block_order().len(), 1);
        assert_eq!(func.terminator(b0), Some(ret));
        assert!(func.verify().is_empty());
    }

    #[test]
    fn test_constant_branch_folds_and_merges() {
        let mut func = Function::new("t");
        let entry = func.create_block();
        let then_b = func.create_block();
        let else_b = func.create_block();
        let cond = func.const_bool(true);
        let brc = func.create_inst(
            Op::BrCond {
                then_dest: then_b,
                else_dest: else_b,
            },
            vec![cond],
            IrType::Void,
        );
        func.append(entry, brc);
        let one = func.const_i32(1);
        let ret1 = func.create_inst(Op::Ret, vec![one], IrType::Void);
        func.append(then_b, ret1);
        let two = func.const_i32(2);
        let ret2 = func.create_inst(Op::Ret, vec![two], IrType::Void);
        func.append(else_b, ret2);

        assert!(SimplifyCfg::run_on(&mut func));
        // Entry now returns 1 directly; the else block is disconnected.
        assert_eq!(func.terminator(entry), Some(ret1));
        assert!(func.preds(else_b).is_empty());
        assert!(func.verify().is_empty());
    }

    #[test]
    fn test_trampoline_removed_and_phi_reparented() {
        // entry -> t -> join, side -> join; t is empty forwarding.
        let mut func = Function::new("t");
        let entry = func.create_block();
        let tramp = func.create_block();
        let side = func.create_block();
        let join = func.create_block();

        br(&mut func, entry, tramp);
        br(&mut func, tramp, join);
        br(&mut func, side, join);

        let one = func.const_i32(1);
        let two = func.const_i32(2);
        let phi = func.create_phi(join, IrType::Any);
        func.add_incoming(phi, one, tramp);
        func.add_incoming(phi, two, side);
        let ret = func.create_inst(Op::Ret, vec![phi], IrType::Void);
        func.append(join, ret);

        assert!(SimplifyCfg::run_on(&mut func));
        assert!(!func.block_order().contains(&tramp));
        // The φ pair moved from the trampoline onto entry.
        assert_eq!(func.phi_value_for_block(phi, entry), Some(one));
        assert_eq!(func.phi_value_for_block(phi, side), Some(two));
        assert!(func.verify().is_empty());
    }

    #[test]
    fn test_trampoline_kept_for_conditional_predecessor() {
        let mut func = Function::new("t");
        let entry = func.create_block();
        let tramp = func.create_block();
        let other = func.create_block();
        let join = func.create_block();
        let cond = func.add_arg(IrType::Any);
        let brc = func.create_inst(
            Op::BrCond {
                then_dest: tramp,
                else_dest: other,
            },
            vec![cond],
            IrType::Void,
        );
        func.append(entry, brc);
        br(&mut func, tramp, join);
        br(&mut func, other, join);
        let one = func.const_i32(1);
        let two = func.const_i32(2);
        let phi = func.create_phi(join, IrType::Any);
        func.add_incoming(phi, one, tramp);
        func.add_incoming(phi, two, other);
        let ret = func.create_inst(Op::Ret, vec![phi], IrType::Void);
        func.append(join, ret);

        // The trampoline distinguishes the two φ paths; nothing merges.
        assert!(!SimplifyCfg::run_on(&mut func));
        assert!(func.block_order().contains(&tramp));
        assert!(func.verify().is_empty());
    }

    #[test]
    fn test_idempotent() {
        let mut func = Function::new("t");
        let b0 = func.create_block();
        let b1 = func.create_block();
        br(&mut func, b0, b1);
        let ret = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(b1, ret);

        assert!(SimplifyCfg::run_on(&mut func));
        assert!(!SimplifyCfg::run_on(&mut func));
    }
}
