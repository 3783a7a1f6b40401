//! Global value numbering
//!
//! Hashes a small family of pure expression keys (property loads off a
//! global symbol, copies of a global symbol) and replaces later
//! occurrences with the first. Blocks are visited in layout order, so the
//! first occurrence is the one the entry reaches first.

use crate::manager::{FunctionPass, PassResult};
use crate::util::resolve_copies;
use arkdec_ir::{ConstValue, Function, Op, ValueId, ValueKind};
use hashbrown::HashMap;

pub struct GlobalValueNumbering;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ExprKey {
    /// get-property of a global symbol by constant name
    PropOfGlobal(ValueId, String),
    /// copy of a global symbol
    CopyOfGlobal(ValueId),
}

impl GlobalValueNumbering {
    fn key_of(func: &Function, v: ValueId) -> Option<ExprKey> {
        match func.op(v)? {
            Op::GetProperty => {
                let obj = resolve_copies(func, func.operands(v)[0]);
                if !matches!(func.kind(obj), ValueKind::Global { .. }) {
                    return None;
                }
                let key = resolve_copies(func, func.operands(v)[1]);
                match func.const_of(key) {
                    Some(ConstValue::Str(name)) => Some(ExprKey::PropOfGlobal(obj, name.clone())),
                    _ => None,
                }
            }
            Op::Copy => {
                let src = resolve_copies(func, func.operands(v)[0]);
                matches!(func.kind(src), ValueKind::Global { .. })
                    .then(|| ExprKey::CopyOfGlobal(src))
            }
            _ => None,
        }
    }

    pub fn run_on(func: &mut Function) -> bool {
        let mut modified = false;
        let mut numbered: HashMap<ExprKey, ValueId> = HashMap::new();
        for b in func.block_order().to_vec() {
            for v in func.insts_of(b).to_vec() {
                if func.is_removed(v) {
                    continue;
                }
                let Some(key) = Self::key_of(func, v) else {
                    continue;
                };
                match numbered.get(&key) {
                    Some(&first) if first != v => {
                        func.replace_all_uses_with(v, first);
                        func.erase(v);
                        modified = true;
                    }
                    Some(_) => {}
                    None => {
                        numbered.insert(key, v);
                    }
                }
            }
        }
        modified
    }
}

impl FunctionPass for GlobalValueNumbering {
    fn name(&self) -> &'static str {
        "global-value-numbering"
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
    fn test_duplicate_global_property_load_collapses() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let global = func.global_value(0, Some("globalThis".into()), true);
        let name = func.const_str("log");
        let p1 = func.create_inst(Op::GetProperty, vec![global, name], IrType::Any);
        func.append(b, p1);
        let p2 = func.create_inst(Op::GetProperty, vec![global, name], IrType::Any);
        func.append(b, p2);
        let call1 = func.create_inst(Op::Call, vec![p1], IrType::Any);
        func.append(b, call1);
        let call2 = func.create_inst(Op::Call, vec![p2], IrType::Any);
        func.append(b, call2);
        let ret = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(b, ret);

        assert!(GlobalValueNumbering::run_on(&mut func));
        assert!(func.is_removed(p2));
        // Both call sites reference the first load.
        assert_eq!(func.operands(call1), &[p1]);
        assert_eq!(func.operands(call2), &[p1]);
        assert!(func.verify().is_empty());
    }

    #[test]
    fn test_distinct_names_are_kept() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let global = func.global_value(0, None, true);
        let log = func.const_str("log");
        let warn = func.const_str("warn");
        let p1 = func.create_inst(Op::GetProperty, vec![global, log], IrType::Any);
        func.append(b, p1);
        let p2 = func.create_inst(Op::GetProperty, vec![global, warn], IrType::Any);
        func.append(b, p2);
        let call = func.create_inst(Op::Call, vec![p1, p2], IrType::Any);
        func.append(b, call);
        let ret = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(b, ret);

        assert!(!GlobalValueNumbering::run_on(&mut func));
    }

    #[test]
    fn test_global_copies_collapse() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let global = func.global_value(0, None, true);
        let c1 = func.create_inst(Op::Copy, vec![global], IrType::Any);
        func.append(b, c1);
        let c2 = func.create_inst(Op::Copy, vec![global], IrType::Any);
        func.append(b, c2);
        let call = func.create_inst(Op::Call, vec![c1, c2], IrType::Any);
        func.append(b, call);
        let ret = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(b, ret);

        assert!(GlobalValueNumbering::run_on(&mut func));
        assert_eq!(func.operands(call), &[c1, c1]);
    }

    #[test]
    fn test_non_global_property_untouched() {
        let mut func = Function::new("t");
        let b = func.create_block();
        let obj = func.add_arg(IrType::Any);
        let name = func.const_str("x");
        let p1 = func.create_inst(Op::GetProperty, vec![obj, name], IrType::Any);
        func.append(b, p1);
        let p2 = func.create_inst(Op::GetProperty, vec![obj, name], IrType::Any);
        func.append(b, p2);
        let call = func.create_inst(Op::Call, vec![p1, p2], IrType::Any);
        func.append(b, call);
        let ret = func.create_inst(Op::RetVoid, vec![], IrType::Void);
        func.append(b, ret);

        assert!(!GlobalValueNumbering::run_on(&mut func));
    }
}
