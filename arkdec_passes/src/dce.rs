//! Dead-code elimination
//!
//! Liveness is the transitive closure over operands from the roots:
//! terminators and instructions with side effects. Everything else whose
//! result is never needed disappears. The aggressive variant first sweeps
//! blocks unreachable from the entry.

use crate::manager::{FunctionPass, PassResult};
use arkdec_ir::{Function, IrType, ValueId};
use hashbrown::HashSet;

pub struct DeadCodeElimination;

impl DeadCodeElimination {
    /// One mark-and-sweep round; true when anything was removed
    fn sweep(func: &mut Function) -> bool {
        let mut live: HashSet<ValueId> = HashSet::new();
        let mut worklist: Vec<ValueId> = Vec::new();

        for &b in func.block_order() {
            for &v in func.insts_of(b) {
                let op = func.op(v).unwrap();
                if op.is_terminator() || op.has_side_effects() {
                    if live.insert(v) {
                        worklist.push(v);
                    }
                }
            }
        }
        while let Some(v) = worklist.pop() {
            for &operand in func.operands(v) {
                if func.inst(operand).is_some() && live.insert(operand) {
                    worklist.push(operand);
                }
            }
        }

        let mut dead: Vec<ValueId> = Vec::new();
        for &b in func.block_order() {
            for &v in func.insts_of(b) {
                if !live.contains(&v) {
                    dead.push(v);
                }
            }
        }
        if dead.is_empty() {
            return false;
        }
        log::debug!("dce: removing {} dead instructions from {}", dead.len(), func.name);
        // Detach operands first so mutually-referencing dead values (φ
        // cycles) end up use-free before erasure.
        for &v in &dead {
            func.drop_operands(v);
        }
        for &v in &dead {
            func.erase(v);
        }
        true
    }

    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;
        while Self::sweep(func) {
            modified = true;
        }
        modified
    }
}

impl FunctionPass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}

/// Unreachable-block removal followed by ordinary DCE
pub struct AggressiveDce;

impl AggressiveDce {
    fn remove_unreachable_blocks(func: &mut Function) -> bool {
        if func.block_order().is_empty() {
            return false;
        }
        let entry = func.entry();
        let mut reachable: HashSet<_> = HashSet::new();
        let mut stack = vec![entry];
        while let Some(b) = stack.pop() {
            if !reachable.insert(b) {
                continue;
            }
            for &s in func.succs(b) {
                stack.push(s);
            }
        }

        let doomed: Vec<_> = func
            .block_order()
            .iter()
            .copied()
            .filter(|b| !reachable.contains(b))
            .collect();
        if doomed.is_empty() {
            return false;
        }
        log::debug!("adce: removing {} unreachable blocks from {}", doomed.len(), func.name);

        // Detach terminators first: this clears the edges into reachable
        // blocks, whose φs then drop the dangling incoming pairs.
        for &b in &doomed {
            let succs = func.succs(b).to_vec();
            if let Some(term) = func.terminator(b) {
                func.erase(term);
            }
            for s in succs {
                if !reachable.contains(&s) {
                    continue;
                }
                for phi in func.phis(s) {
                    func.phi_remove_incoming_for(phi, b);
                }
            }
        }

        // Values defined in doomed blocks can only feed other doomed
        // values (φ pairs above were the reachable entry points), so
        // erasing in bulk after a detach pass is safe. Anything still
        // referenced from reachable code is replaced by undef.
        let mut all: Vec<ValueId> = Vec::new();
        for &b in &doomed {
            all.extend(func.insts_of(b).iter().copied());
        }
        for &v in &all {
            func.drop_operands(v);
        }
        for &v in &all {
            if !func.uses(v).is_empty() {
                let undef = func.undef_value(IrType::Any);
                func.replace_all_uses_with(v, undef);
            }
            func.erase(v);
        }
        for &b in &doomed {
            func.remove_block(b);
        }
        true
    }
}

impl FunctionPass for AggressiveDce {
    fn name(&self) -> &'static str {
        "aggressive-dce"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        let mut modified = Self::remove_unreachable_blocks(func);
        modified |= DeadCodeElimination::run_on(func);
        Ok(modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkdec_ir::{BinaryOp, Op};

    fn ret_void(func: &mut Function, b: arkdec_ir::BlockId) {
        let term = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(b, term);
    }

    #[test]
    fn test_unused_pure_inst_is_removed() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let one = func.const_i32(1);
        let two = func.const_i32(2);
        let add = func.create_inst(Op::Binary(BinaryOp::Add), vec![one, two], IrType::Any);
        func.append(b, add);
        ret_void(&mut func, b);

        assert!(DeadCodeElimination::run_on(&mut func));
        assert!(func.is_removed(add));
        assert_eq!(func.insts_of(b).len(), 1);
        assert!(func.verify().is_empty());
    }

    #[test]
    fn test_side_effecting_inst_is_kept() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let callee = func.const_str("f");
        let call = func.create_inst(Op::Call, vec![callee], IrType::Any);
        func.append(b, call);
        ret_void(&mut func, b);

        assert!(!DeadCodeElimination::run_on(&mut func));
        assert_eq!(func.insts_of(b).len(), 2);
    }

    #[test]
    fn test_dead_chain_is_removed_transitively() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let one = func.const_i32(1);
        let c1 = func.create_inst(Op::Copy, vec![one], IrType::I32);
        func.append(b, c1);
        let c2 = func.create_inst(Op::Copy, vec![c1], IrType::I32);
        func.append(b, c2);
        ret_void(&mut func, b);

        assert!(DeadCodeElimination::run_on(&mut func));
        assert!(func.is_removed(c1));
        assert!(func.is_removed(c2));
    }

    #[test]
    fn test_idempotent() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let one = func.const_i32(1);
        let c = func.create_inst(Op::Copy, vec![one], IrType::I32);
        func.append(b, c);
        ret_void(&mut func, b);

        assert!(DeadCodeElimination::run_on(&mut func));
        assert!(!DeadCodeElimination::run_on(&mut func));
    }

    #[test]
    fn test_unreachable_block_removed() {
        let mut func = Function::new("t");
        let entry = func.create_block();
        let orphan = func.create_block();
        ret_void(&mut func, entry);
        let five = func.const_i32(5);
        let copy = func.create_inst(Op::Copy, vec![five], IrType::I32);
        func.append(orphan, copy);
        let ret = func.create_inst(Op::Ret, vec![copy], IrType::Void);
        func.append(orphan, ret);

        let mut pass = AggressiveDce;
        assert!(pass.run(&mut func).unwrap());
        assert_eq!(func.block_order().len(), 1);
        assert!(func.verify().is_empty());
    }

    #[test]
    fn test_unreachable_loop_pair_removed() {
        let mut func = Function::new("t");
        let entry = func.create_block();
        let a = func.create_block();
        let b = func.create_block();
        ret_void(&mut func, entry);
        let br_ab = func.create_inst(Op::Br { target: b }, vec![], IrType::Void);
        func.append(a, br_ab);
        let br_ba = func.create_inst(Op::Br { target: a }, vec![], IrType::Void);
        func.append(b, br_ba);

        let mut pass = AggressiveDce;
        assert!(pass.run(&mut func).unwrap());
        assert_eq!(func.block_order().len(), 1);
        assert!(func.verify().is_empty());
    }
}
