//! Variable reconstruction
//!
//! Loop-variable φ-nodes and their update chains (copies, inc/dec,
//! to-numeric, additive updates) are grouped with union-find; each group
//! gets one display name `i1, i2, …` that the emitter renders as a single
//! source variable.

use crate::manager::{FunctionPass, PassResult};
use arkdec_ir::{BinaryOp, Function, Op, UnaryOp, ValueId};
use hashbrown::HashMap;

pub struct VariableReconstruction;

/// Plain union-find over value ids
#[derive(Default)]
struct UnionFind {
    parent: HashMap<ValueId, ValueId>,
}

impl UnionFind {
    fn find(&mut self, v: ValueId) -> ValueId {
        let mut root = v;
        while let Some(&p) = self.parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }
        // Path compression.
        let mut cur = v;
        while let Some(&p) = self.parent.get(&cur) {
            if p == root {
                break;
            }
            self.parent.insert(cur, root);
            cur = p;
        }
        root
    }

    fn union(&mut self, a: ValueId, b: ValueId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(rb, ra);
        }
    }
}

impl VariableReconstruction {
    /// Follow one update-chain step toward the φ: copies, inc/dec,
    /// numeric coercions and additive self-updates all qualify.
    fn chain_step(func: &Function, v: ValueId) -> Option<ValueId> {
        match func.op(v)? {
            Op::Copy => Some(func.operands(v)[0]),
            Op::Unary(
                UnaryOp::Inc | UnaryOp::Dec | UnaryOp::ToNumber | UnaryOp::ToNumeric,
            ) => Some(func.operands(v)[0]),
            Op::Binary(BinaryOp::Add | BinaryOp::Sub) => Some(func.operands(v)[0]),
            _ => None,
        }
    }

    /// If `start` reaches `phi` through an update chain, return the chain
    /// members (excluding the φ itself).
    fn chain_to_phi(func: &Function, phi: ValueId, start: ValueId) -> Option<Vec<ValueId>> {
        let mut chain = Vec::new();
        let mut cur = start;
        for _ in 0..64 {
            if cur == phi {
                return Some(chain);
            }
            chain.push(cur);
            cur = Self::chain_step(func, cur)?;
        }
        None
    }

    pub fn run_on(func: &mut Function) -> bool {
        let mut uf = UnionFind::default();
        let mut loop_phis: Vec<ValueId> = Vec::new();

        for &b in func.block_order() {
            for phi in func.phis(b) {
                let mut is_loop_var = false;
                for &incoming in func.operands(phi).to_vec().iter() {
                    if let Some(chain) = Self::chain_to_phi(func, phi, incoming) {
                        if chain.is_empty() {
                            // Direct self-reference carries no update.
                            continue;
                        }
                        is_loop_var = true;
                        for v in chain {
                            uf.union(phi, v);
                        }
                    }
                }
                if is_loop_var {
                    loop_phis.push(phi);
                }
            }
        }

        // One name per group, in deterministic block order.
        let mut modified = false;
        let mut counter = 0usize;
        let mut named_roots: HashMap<ValueId, String> = HashMap::new();
        for &phi in &loop_phis {
            let root = uf.find(phi);
            if named_roots.contains_key(&root) {
                continue;
            }
            counter += 1;
            named_roots.insert(root, format!("i{}", counter));
        }

        let members: Vec<ValueId> = uf.parent.keys().copied().collect();
        for v in members.into_iter().chain(loop_phis.iter().copied()) {
            let root = uf.find(v);
            if let Some(name) = named_roots.get(&root) {
                if func.value_name(v) != name {
                    func.set_value_name(v, name.clone());
                    modified = true;
                }
            }
        }
        modified
    }
}

impl FunctionPass for VariableReconstruction {
    fn name(&self) -> &'static str {
        "variable-reconstruction"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkdec_ir::IrType;

    /// entry -> header -> {body -> header, exit}; φ in header updated by
    /// add in body through a copy
    fn build_counter_loop(func: &mut Function) -> (ValueId, ValueId, ValueId) {
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

        let zero = func.const_i32(0);
        let phi = func.create_phi(header, IrType::Any);
        func.add_incoming(phi, zero, entry);
        let one = func.const_i32(1);
        let next = func.create_inst(Op::Binary(BinaryOp::Add), vec![phi, one], IrType::Any);
        func.insert_before(func.terminator(body).unwrap(), next);
        let copied = func.create_inst(Op::Copy, vec![next], IrType::Any);
        func.insert_before(func.terminator(body).unwrap(), copied);
        func.add_incoming(phi, copied, body);
        (phi, next, copied)
    }

    #[test]
    fn test_loop_variable_group_named() {
        let mut func = Function::new("t");
        let (phi, next, copied) = build_counter_loop(&mut func);

        assert!(VariableReconstruction::run_on(&mut func));
        assert_eq!(func.value_name(phi), "i1");
        assert_eq!(func.value_name(next), "i1");
        assert_eq!(func.value_name(copied), "i1");
    }

    #[test]
    fn test_two_loops_get_distinct_names() {
        let mut func = Function::new("t");
        let (phi1, _, _) = build_counter_loop(&mut func);
        let (phi2, _, _) = build_counter_loop(&mut func);

        assert!(VariableReconstruction::run_on(&mut func));
        assert_eq!(func.value_name(phi1), "i1");
        assert_eq!(func.value_name(phi2), "i2");
    }

    #[test]
    fn test_non_loop_phi_unnamed() {
        let mut func = Function::new("t");
        let entry = func.create_block();
        let left = func.create_block();
        let right = func.create_block();
        let join = func.create_block();
        let cond = func.add_arg(IrType::Any);
        let brc = func.create_inst(
            Op::BrCond {
                then_dest: left,
                else_dest: right,
            },
            vec![cond],
            IrType::Void,
        );
        func.append(entry, brc);
        for b in [left, right] {
            let br = func.create_inst(Op::Br { target: join }, vec![], IrType::Void);
            func.append(b, br);
        }
        let one = func.const_i32(1);
        let two = func.const_i32(2);
        let phi = func.create_phi(join, IrType::Any);
        func.add_incoming(phi, one, left);
        func.add_incoming(phi, two, right);
        let ret = func.create_inst(Op::Ret, vec![phi], IrType::Void);
        func.append(join, ret);

        assert!(!VariableReconstruction::run_on(&mut func));
        assert_eq!(func.value_name(phi), "");
    }

    #[test]
    fn test_idempotent() {
        let mut func = Function::new("t");
        build_counter_loop(&mut func);
        assert!(VariableReconstruction::run_on(&mut func));
        assert!(!VariableReconstruction::run_on(&mut func));
    }
}
