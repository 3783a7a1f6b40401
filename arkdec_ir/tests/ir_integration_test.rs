//! Integration tests for the IR crate: structural invariants that must
//! hold across combined mutations.

use arkdec_ir::{BinaryOp, Function, IrType, Module, Op, UseRef, ValueId};

fn append(func: &mut Function, b: arkdec_ir::BlockId, op: Op, operands: Vec<ValueId>) -> ValueId {
    let v = func.create_inst(op, operands, IrType::Any);
    func.append(b, v);
    v
}

#[test]
fn use_lists_agree_with_operand_slots_after_mutation_storm() {
    let mut func = Function::new("storm");
    let b = func.create_block();
    let one = func.const_i32(1);
    let two = func.const_i32(2);

    let a = append(&mut func, b, Op::Binary(BinaryOp::Add), vec![one, two]);
    let c = append(&mut func, b, Op::Copy, vec![a]);
    let d = append(&mut func, b, Op::Binary(BinaryOp::Mul), vec![c, a]);
    let ret = func.create_inst(Op::Ret, vec![d], IrType::Void);
    func.append(b, ret);

    // Swap operands around, then check the global property: u uses v
    // exactly when some operand slot of u names v.
    func.set_operand(d, 0, a);
    func.set_operand(d, 1, c);
    func.set_operand(a, 0, two);

    for v in func.value_ids() {
        if func.is_removed(v) {
            continue;
        }
        for (slot, &operand) in func.operands(v).to_vec().iter().enumerate() {
            assert!(
                func.uses(operand).contains(&UseRef { user: v, slot }),
                "{} slot {} not mirrored in {}'s use list",
                v,
                slot,
                operand
            );
        }
        for &u in func.uses(v) {
            assert_eq!(func.operands(u.user)[u.slot], v);
        }
    }
    assert!(func.verify().is_empty());
}

#[test]
fn rauw_leaves_old_value_unused() {
    let mut func = Function::new("rauw");
    let b = func.create_block();
    let one = func.const_i32(1);
    let old = append(&mut func, b, Op::Copy, vec![one]);
    let u1 = append(&mut func, b, Op::Binary(BinaryOp::Add), vec![old, old]);
    let u2 = append(&mut func, b, Op::Copy, vec![old]);
    let ret = func.create_inst(Op::Ret, vec![u1], IrType::Void);
    func.append(b, ret);

    let new = func.const_i32(9);
    func.replace_all_uses_with(old, new);

    assert!(func.uses(old).is_empty());
    assert_eq!(func.operands(u1), &[new, new]);
    assert_eq!(func.operands(u2), &[new]);
    assert!(func.verify().is_empty());
}

#[test]
fn phi_edges_stay_consistent_with_predecessors() {
    let mut func = Function::new("phis");
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

    assert!(func.verify().is_empty());

    // Redirect left's branch through a new forwarding block and
    // re-parent the φ pair; the verifier must stay satisfied.
    let fwd = func.create_block();
    func.replace_successor(left, join, fwd);
    let br = func.create_inst(Op::Br { target: join }, vec![], IrType::Void);
    func.append(fwd, br);
    func.phi_replace_incoming_block(phi, left, fwd);

    assert!(func.verify().is_empty(), "{:?}", func.verify());
}

#[test]
fn module_state_is_isolated_per_function() {
    let mut module = Module::new();
    module.register_string_mapping("str_1", "alpha");
    module.register_global_symbol(9, "window");

    let mut f1 = Function::new("first");
    let b1 = f1.create_block();
    let term1 = f1.create_inst(Op::RetVoid, vec![], IrType::Void);
    f1.append(b1, term1);
    module.add_function(f1);

    let mut f2 = Function::new("second");
    let b2 = f2.create_block();
    let term2 = f2.create_inst(Op::RetVoid, vec![], IrType::Void);
    f2.append(b2, term2);
    module.add_function(f2);

    assert_eq!(module.function_count(), 2);
    assert_eq!(module.string_for_id(1), Some("alpha"));
    assert_eq!(module.global_symbol(9), Some("window"));

    // Mutating one function leaves the other untouched.
    let f1 = module.function_mut("first").unwrap();
    let extra = f1.create_inst(Op::Nop, vec![], IrType::Void);
    let entry = f1.entry();
    let term = f1.terminator(entry).unwrap();
    f1.insert_before(term, extra);

    assert_eq!(
        module.function("second").unwrap().insts_of(arkdec_ir::BlockId(0)).len(),
        1
    );
}
