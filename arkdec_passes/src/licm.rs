//! Loop-invariant code motion
//!
//! Natural loops are discovered through depth-first back-edges; each
//! loop's body is the set of blocks that reach the latch without passing
//! the header. Pure instructions whose operands are all defined outside
//! the loop move to the preheader, the unique predecessor of the header
//! from outside the loop.

use crate::manager::{FunctionPass, PassResult};
use arkdec_ir::{BlockId, Function, ValueId};
use hashbrown::HashSet;

pub struct LoopInvariantCodeMotion;

#[derive(Debug)]
struct Loop {
    header: BlockId,
    body: HashSet<BlockId>,
}

impl LoopInvariantCodeMotion {
    /// Back edges (latch → header) found by DFS from the entry
    fn back_edges(func: &Function) -> Vec<(BlockId, BlockId)> {
        let mut edges = Vec::new();
        let mut visited: HashSet<BlockId> = HashSet::new();
        let mut on_stack: HashSet<BlockId> = HashSet::new();
        // Iterative DFS with explicit enter/leave events.
        enum Event {
            Enter(BlockId),
            Leave(BlockId),
        }
        if func.block_order().is_empty() {
            return edges;
        }
        let mut stack = vec![Event::Enter(func.entry())];
        while let Some(event) = stack.pop() {
            match event {
                Event::Enter(b) => {
                    if !visited.insert(b) {
                        continue;
                    }
                    on_stack.insert(b);
                    stack.push(Event::Leave(b));
                    for &s in func.succs(b) {
                        if on_stack.contains(&s) {
                            edges.push((b, s));
                        } else if !visited.contains(&s) {
                            stack.push(Event::Enter(s));
                        }
                    }
                }
                Event::Leave(b) => {
                    on_stack.remove(&b);
                }
            }
        }
        edges
    }

    /// The natural loop of a back edge: walk predecessors from the latch
    /// until the header closes the region.
    fn natural_loop(func: &Function, latch: BlockId, header: BlockId) -> Loop {
        let mut body: HashSet<BlockId> = HashSet::new();
        body.insert(header);
        let mut worklist = vec![latch];
        while let Some(b) = worklist.pop() {
            if !body.insert(b) {
                continue;
            }
            for &p in func.preds(b) {
                worklist.push(p);
            }
        }
        Loop { header, body }
    }

    /// The unique predecessor of the header outside the loop, if any
    fn preheader(func: &Function, lp: &Loop) -> Option<BlockId> {
        let outside: Vec<BlockId> = func
            .preds(lp.header)
            .iter()
            .copied()
            .filter(|p| !lp.body.contains(p))
            .collect();
        match outside.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    fn defined_outside(func: &Function, lp: &Loop, v: ValueId) -> bool {
        match func.block_of(v) {
            Some(b) => !lp.body.contains(&b),
            // Constants, arguments and globals have no defining block.
            None => true,
        }
    }

    fn hoist_loop(func: &mut Function, lp: &Loop) -> bool {
        let Some(preheader) = Self::preheader(func, lp) else {
            return false;
        };
        let Some(anchor) = func.terminator(preheader) else {
            return false;
        };
        let mut modified = false;
        loop {
            let mut moved_any = false;
            let body: Vec<BlockId> = {
                let mut blocks: Vec<BlockId> = lp.body.iter().copied().collect();
                blocks.sort();
                blocks
            };
            for b in body {
                for v in func.insts_of(b).to_vec() {
                    let Some(op) = func.op(v) else { continue };
                    if !op.is_pure() || op.is_phi() {
                        continue;
                    }
                    let invariant = func
                        .operands(v)
                        .iter()
                        .all(|&operand| Self::defined_outside(func, lp, operand));
                    if !invariant {
                        continue;
                    }
                    func.remove_from_block(v);
                    func.insert_before(anchor, v);
                    log::trace!("licm: hoisted {} into {}", v, preheader);
                    moved_any = true;
                    modified = true;
                }
            }
            if !moved_any {
                break;
            }
        }
        modified
    }

    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;
        for (latch, header) in Self::back_edges(func) {
            let lp = Self::natural_loop(func, latch, header);
            modified |= Self::hoist_loop(func, &lp);
        }
        modified
    }
}

impl FunctionPass for LoopInvariantCodeMotion {
    fn name(&self) -> &'static str {
        "loop-invariant-code-motion"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkdec_ir::{IrType, Op};

    /// entry -> header; header -> {body, exit}; body -> header
    fn loop_skeleton(func: &mut Function) -> (BlockId, BlockId, BlockId, BlockId) {
        let entry = func.create_block();
        let header = func.create_block();
        let body = func.create_block();
        let exit = func.create_block();
        let br_in = func.create_inst(Op::Br { target: header }, vec![], IrType::Void);
        func.append(entry, br_in);
        let cond = func.add_arg(IrType::Any);
        let brc = func.create_inst(
            Op::BrCond {
                then_dest: body,
                else_dest: exit,
            },
            vec![cond],
            IrType::Void,
        );
        func.append(header, brc);
        let br_back = func.create_inst(Op::Br { target: header }, vec![], IrType::Void);
        func.append(body, br_back);
        let ret = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(exit, ret);
        (entry, header, body, exit)
    }

    #[test]
    fn test_back_edge_discovery() {
        let mut func = Function::new("t");
        let (_, header, body, _) = loop_skeleton(&mut func);
        let edges = LoopInvariantCodeMotion::back_edges(&func);
        assert_eq!(edges, vec![(body, header)]);
    }

    #[test]
    fn test_invariant_load_hoisted_to_preheader() {
        let mut func = Function::new("t");
        let (entry, _, body, _) = loop_skeleton(&mut func);
        let global = func.global_value(0, Some("globalThis".into()), true);
        let name = func.const_str("log");
        let load = func.create_inst(Op::GetProperty, vec![global, name], IrType::Any);
        func.insert_before(func.terminator(body).unwrap(), load);
        let call = func.create_inst(Op::Call, vec![load], IrType::Any);
        func.insert_before(func.terminator(body).unwrap(), call);

        assert!(LoopInvariantCodeMotion::run_on(&mut func));
        assert_eq!(func.block_of(load), Some(entry));
        // The call has side effects and stays in the loop.
        assert_eq!(func.block_of(call), Some(body));
        assert!(func.verify().is_empty());
    }

    #[test]
    fn test_loop_dependent_value_not_hoisted() {
        let mut func = Function::new("t");
        let (entry, header, body, _) = loop_skeleton(&mut func);
        let zero = func.const_i32(0);
        let phi = func.create_phi(header, IrType::Any);
        func.add_incoming(phi, zero, entry);
        let one = func.const_i32(1);
        let next = func.create_inst(
            Op::Binary(arkdec_ir::BinaryOp::Add),
            vec![phi, one],
            IrType::Any,
        );
        func.insert_before(func.terminator(body).unwrap(), next);
        func.add_incoming(phi, next, body);

        assert!(!LoopInvariantCodeMotion::run_on(&mut func));
        assert_eq!(func.block_of(next), Some(body));
    }

    #[test]
    fn test_chained_invariants_hoist_together() {
        let mut func = Function::new("t");
        let (entry, _, body, _) = loop_skeleton(&mut func);
        let two = func.const_i32(2);
        let three = func.const_i32(3);
        let a = func.create_inst(Op::Binary(arkdec_ir::BinaryOp::Mul), vec![two, three], IrType::Any);
        func.insert_before(func.terminator(body).unwrap(), a);
        let b = func.create_inst(Op::Binary(arkdec_ir::BinaryOp::Add), vec![a, two], IrType::Any);
        func.insert_before(func.terminator(body).unwrap(), b);
        let call = func.create_inst(Op::Call, vec![b], IrType::Any);
        func.insert_before(func.terminator(body).unwrap(), call);

        assert!(LoopInvariantCodeMotion::run_on(&mut func));
        assert_eq!(func.block_of(a), Some(entry));
        assert_eq!(func.block_of(b), Some(entry));
        assert!(func.verify().is_empty());
    }
}
