//! Redundant-return elimination
//!
//! A function with several `ret-void` blocks keeps the most-referenced
//! one as the single exit; the others branch to it instead.

use crate::manager::{FunctionPass, PassResult};
use arkdec_ir::{Function, IrType, Op};

pub struct RedundantReturnElimination;

impl RedundantReturnElimination {
    pub fn run_on(func: &mut Function) -> bool {
        let mut exits = Vec::new();
        for &b in func.block_order() {
            if let Some(term) = func.terminator(b) {
                if matches!(func.op(term), Some(Op::RetVoid)) {
                    exits.push(b);
                }
            }
        }
        if exits.len() < 2 {
            return false;
        }

        let keep = *exits
            .iter()
            .max_by_key(|&&b| func.preds(b).len())
            .expect("at least two exits");
        for b in exits {
            if b == keep {
                continue;
            }
            let term = func.terminator(b).unwrap();
            func.erase(term);
            let br = func.create_inst(Op::Br { target: keep }, vec![], IrType::Void);
            func.append(b, br);
        }
        log::debug!("ret-elim: {} now exits through {}", func.name, keep);
        true
    }
}

impl FunctionPass for RedundantReturnElimination {
    fn name(&self) -> &'static str {
        "redundant-return-elimination"
    }

    fn run(&mut self, func: &mut Function) -> PassResult {
        Ok(Self::run_on(func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkdec_ir::IrType;

    #[test]
    fn test_returns_are_merged_to_most_referenced() {
        let mut func = Function::new("t");
        let entry = func.create_block();
        let a = func.create_block();
        let b = func.create_block();
        let exit = func.create_block();
        let cond = func.add_arg(IrType::Any);
        let brc = func.create_inst(
            Op::BrCond {
                then_dest: a,
                else_dest: b,
            },
            vec![cond],
            IrType::Void,
        );
        func.append(entry, brc);
        // a and b both flow into the shared exit; a second return hides
        // in b.
        let br_a = func.create_inst(Op::Br { target: exit }, vec![], IrType::Void);
        func.append(a, br_a);
        let ret_b = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(b, ret_b);
        let ret_exit = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(exit, ret_exit);

        assert!(RedundantReturnElimination::run_on(&mut func));
        // exit has one predecessor, b's return had none referencing it,
        // so exit is kept and b branches to it.
        assert!(matches!(
            func.op(func.terminator(b).unwrap()),
            Some(Op::Br { .. })
        ));
        assert_eq!(func.op(func.terminator(exit).unwrap()), Some(&Op::RetVoid));
        assert_eq!(func.preds(exit).len(), 2);
        assert!(func.verify().is_empty());
    }

    #[test]
    fn test_single_return_untouched() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let ret = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(b, ret);
        assert!(!RedundantReturnElimination::run_on(&mut func));
    }

    #[test]
    fn test_idempotent() {
        let mut func = Function::new("t");
        let e = func.create_block();
        let x = func.create_block();
        let y = func.create_block();
        let cond = func.add_arg(IrType::Any);
        let brc = func.create_inst(
            Op::BrCond {
                then_dest: x,
                else_dest: y,
            },
            vec![cond],
            IrType::Void,
        );
        func.append(e, brc);
        let rx = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(x, rx);
        let ry = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(y, ry);

        assert!(RedundantReturnElimination::run_on(&mut func));
        assert!(!RedundantReturnElimination::run_on(&mut func));
        assert!(func.verify().is_empty());
    }
}
