//! Textual rendering of functions
//!
//! The printed form is for inspection and test assertions, not a
//! persisted format. Values print as their display name when a pass has
//! assigned one, falling back to `%N`.

use crate::function::Function;
use crate::instruction::Op;
use crate::value::{ValueId, ValueKind};
use std::fmt;

impl Function {
    fn fmt_value_ref(&self, f: &mut fmt::Formatter<'_>, v: ValueId) -> fmt::Result {
        match self.kind(v) {
            ValueKind::Constant(c) => write!(f, "{}", c),
            ValueKind::Argument { index } => write!(f, "a{}", index),
            ValueKind::Global { id, resolved, .. } => match resolved {
                Some(name) => write!(f, "@{}", name),
                None => write!(f, "@global_{}", id),
            },
            ValueKind::Undef => write!(f, "undef"),
            _ => {
                let name = self.value_name(v);
                if name.is_empty() {
                    write!(f, "{}", v)
                } else {
                    write!(f, "%{}", name)
                }
            }
        }
    }

    fn fmt_inst(&self, f: &mut fmt::Formatter<'_>, v: ValueId) -> fmt::Result {
        let inst = self.inst(v).expect("printing a non-instruction");
        write!(f, "  ")?;
        if self.ty(v) != crate::types::IrType::Void {
            self.fmt_value_ref(f, v)?;
            write!(f, " = ")?;
        }
        write!(f, "{}", inst.op.mnemonic())?;
        if inst.compound_assign {
            write!(f, " [compound]")?;
        }
        match &inst.op {
            Op::Phi { blocks } => {
                for (i, (&operand, &block)) in
                    inst.operands.iter().zip(blocks.iter()).enumerate()
                {
                    write!(f, "{}[", if i == 0 { " " } else { ", " })?;
                    self.fmt_value_ref(f, operand)?;
                    write!(f, ", {}]", block)?;
                }
            }
            op => {
                for (i, &operand) in inst.operands.iter().enumerate() {
                    write!(f, "{}", if i == 0 { " " } else { ", " })?;
                    self.fmt_value_ref(f, operand)?;
                }
                let targets = op.targets();
                for (i, target) in targets.iter().enumerate() {
                    if i == 0 && inst.operands.is_empty() {
                        write!(f, " {}", target)?;
                    } else {
                        write!(f, ", {}", target)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}(", self.name)?;
        for (i, &arg) in self.args().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.fmt_value_ref(f, arg)?;
        }
        writeln!(f, ") -> {} {{", self.return_ty)?;
        for &b in self.block_order() {
            write!(f, "{}:", b)?;
            if !self.preds(b).is_empty() {
                write!(f, "  ; preds:")?;
                for p in self.preds(b) {
                    write!(f, " {}", p)?;
                }
            }
            writeln!(f)?;
            for &v in self.insts_of(b) {
                self.fmt_inst(f, v)?;
                writeln!(f)?;
            }
        }
        write!(f, "}}")
    }
}
