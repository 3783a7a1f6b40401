//! Instruction opcodes of the SSA IR
//!
//! Instructions are values; the arena entry holds an [`Inst`] whose
//! operand list is use-tracked by the owning function. The opcode is a
//! closed sum type: per-pass `match` over [`Op`] is the intended dispatch
//! idiom. Block targets of terminators and the incoming-block list of a
//! φ live in the opcode payload, not in the operand list, since blocks
//! are not values.

use crate::value::{BlockId, ValueId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Binary arithmetic and bitwise operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    And,
    Or,
    Xor,
    Shl,
    /// Logical shift right
    Shr,
    /// Arithmetic shift right
    Ashr,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Exp => "exp",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::Ashr => "ashr",
        };
        write!(f, "{}", s)
    }
}

/// Comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    StrictEq,
    StrictNe,
    In,
    InstanceOf,
}

impl CmpOp {
    /// The predicate holding exactly when `self` does not
    pub fn inverse(self) -> Option<CmpOp> {
        match self {
            CmpOp::Eq => Some(CmpOp::Ne),
            CmpOp::Ne => Some(CmpOp::Eq),
            CmpOp::Lt => Some(CmpOp::Ge),
            CmpOp::Ge => Some(CmpOp::Lt),
            CmpOp::Gt => Some(CmpOp::Le),
            CmpOp::Le => Some(CmpOp::Gt),
            CmpOp::StrictEq => Some(CmpOp::StrictNe),
            CmpOp::StrictNe => Some(CmpOp::StrictEq),
            CmpOp::In | CmpOp::InstanceOf => None,
        }
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge)
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
            CmpOp::StrictEq => "stricteq",
            CmpOp::StrictNe => "strictne",
            CmpOp::In => "isin",
            CmpOp::InstanceOf => "instanceof",
        };
        write!(f, "{}", s)
    }
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    /// Logical not
    Not,
    /// Bitwise complement
    BitNot,
    Inc,
    Dec,
    TypeOf,
    ToNumber,
    ToNumeric,
    IsTrue,
    IsFalse,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
            UnaryOp::BitNot => "bitnot",
            UnaryOp::Inc => "inc",
            UnaryOp::Dec => "dec",
            UnaryOp::TypeOf => "typeof",
            UnaryOp::ToNumber => "tonumber",
            UnaryOp::ToNumeric => "tonumeric",
            UnaryOp::IsTrue => "istrue",
            UnaryOp::IsFalse => "isfalse",
        };
        write!(f, "{}", s)
    }
}

/// IR instruction opcode
///
/// Operand counts and order are fixed per variant and documented inline
/// where they are not obvious.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    // Terminators
    /// return operand0
    Ret,
    RetVoid,
    Unreachable,
    Br {
        target: BlockId,
    },
    /// operand0 = condition; branch to `then_dest` when truthy
    BrCond {
        then_dest: BlockId,
        else_dest: BlockId,
    },
    /// Fused compare-and-branch: operands = (lhs, rhs)
    BrCmp {
        pred: CmpOp,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    /// operand0 = scrutinee
    Switch {
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    },
    /// throw operand0
    Throw,

    /// operands = (lhs, rhs)
    Binary(BinaryOp),
    /// operands = (lhs, rhs)
    Cmp(CmpOp),
    Unary(UnaryOp),

    // Memory
    Load,
    /// operands = (address, value)
    Store,
    Alloca,
    GetElementPtr,

    // Objects and arrays
    CreateObject,
    CreateArray,
    CreateArrayWithBuffer {
        literal: u16,
    },
    CreateObjectWithBuffer {
        literal: u16,
    },
    CreateRegExp {
        pattern: String,
        flags: u8,
    },
    /// operands = (object, key)
    GetProperty,
    /// operands = (object, key, value)
    SetProperty,
    /// operands = (object, key)
    DeleteProperty,
    /// operands = (object, index)
    GetElement,
    /// operands = (object, index, value)
    SetElement,

    // Calls
    /// operands = (callee, args...)
    Call,
    /// operands = (callee, this, args...)
    CallThis,
    /// operands = (args...)
    CallSuper,
    /// operands = (args...)
    CallRuntime {
        intrinsic: String,
    },
    /// operands = (constructor, args...)
    New,
    /// operands = (callee, this, args-array)
    Apply,

    // Lexical environment
    NewLexEnv {
        slots: u16,
    },
    PopLexEnv,
    LoadLexVar {
        level: u16,
        slot: u16,
    },
    /// operand0 = value
    StoreLexVar {
        level: u16,
        slot: u16,
    },

    // Globals
    LoadGlobal {
        name: String,
    },
    /// operand0 = value
    StoreGlobal {
        name: String,
    },
    TryLoadGlobal {
        name: String,
    },
    /// operand0 = value
    TryStoreGlobal {
        name: String,
    },

    // Module
    LoadModuleVar {
        index: u32,
    },
    /// operand0 = value
    StoreModuleVar {
        index: u32,
    },
    GetModuleNamespace {
        index: u32,
    },
    /// operand0 = specifier
    DynamicImport,

    // Generators and async functions
    /// operand0 = function object
    CreateGenerator,
    ResumeGenerator,
    GetResumeMode,
    /// operands = (generator, value)
    SuspendGenerator,
    AsyncFunctionEnter,
    /// operands = (async-object, value)
    AsyncFunctionResolve,
    /// operands = (async-object, reason)
    AsyncFunctionReject,

    // Closures
    CreateClosure {
        method: u16,
        param_count: u8,
    },
    /// operand0 = parent class or hole
    CreateClass {
        method: u16,
        literal: u16,
        form_count: u16,
    },

    // Exceptions
    LandingPad,
    Resume,

    // SSA
    /// Incoming blocks are parallel to the operand list
    Phi {
        blocks: Vec<BlockId>,
    },
    /// operands = (cond, on-true, on-false)
    Select,
    Copy,

    Nop,
    Debugger,
}

impl Op {
    /// Ends its basic block; must be the last instruction
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Ret
                | Op::RetVoid
                | Op::Unreachable
                | Op::Br { .. }
                | Op::BrCond { .. }
                | Op::BrCmp { .. }
                | Op::Switch { .. }
                | Op::Throw
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Op::Phi { .. })
    }

    /// Observable effect beyond producing a value. Loads are treated as
    /// effect-free: the decompiler reorders and deduplicates them when
    /// reconstructing expressions.
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Op::Store
                | Op::SetProperty
                | Op::DeleteProperty
                | Op::SetElement
                | Op::Call
                | Op::CallThis
                | Op::CallSuper
                | Op::CallRuntime { .. }
                | Op::New
                | Op::Apply
                | Op::NewLexEnv { .. }
                | Op::PopLexEnv
                | Op::StoreLexVar { .. }
                | Op::StoreGlobal { .. }
                | Op::TryStoreGlobal { .. }
                | Op::StoreModuleVar { .. }
                | Op::DynamicImport
                | Op::CreateGenerator
                | Op::ResumeGenerator
                | Op::SuspendGenerator
                | Op::AsyncFunctionEnter
                | Op::AsyncFunctionResolve
                | Op::AsyncFunctionReject
                | Op::Throw
                | Op::LandingPad
                | Op::Resume
                | Op::Debugger
        )
    }

    /// Safe to delete when the result is unused, and safe to hoist when
    /// operands allow
    pub fn is_pure(&self) -> bool {
        !self.is_terminator() && !self.has_side_effects()
    }

    /// Successor blocks named by a terminator, in branch order
    pub fn targets(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Op::Br { target } => SmallVec::from_slice(&[*target]),
            Op::BrCond {
                then_dest,
                else_dest,
            }
            | Op::BrCmp {
                then_dest,
                else_dest,
                ..
            } => SmallVec::from_slice(&[*then_dest, *else_dest]),
            Op::Switch { cases, default } => {
                let mut targets: SmallVec<[BlockId; 2]> =
                    cases.iter().map(|(_, b)| *b).collect();
                targets.push(*default);
                targets
            }
            _ => SmallVec::new(),
        }
    }

    /// Rewrite every successor reference equal to `old` into `new`.
    /// Returns how many references changed.
    pub fn retarget(&mut self, old: BlockId, new: BlockId) -> usize {
        let mut changed = 0;
        let mut patch = |b: &mut BlockId| {
            if *b == old {
                *b = new;
                changed += 1;
            }
        };
        match self {
            Op::Br { target } => patch(target),
            Op::BrCond {
                then_dest,
                else_dest,
            }
            | Op::BrCmp {
                then_dest,
                else_dest,
                ..
            } => {
                patch(then_dest);
                patch(else_dest);
            }
            Op::Switch { cases, default } => {
                for (_, b) in cases.iter_mut() {
                    patch(b);
                }
                patch(default);
            }
            _ => {}
        }
        changed
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Ret => "ret",
            Op::RetVoid => "ret-void",
            Op::Unreachable => "unreachable",
            Op::Br { .. } => "br",
            Op::BrCond { .. } => "br-cond",
            Op::BrCmp { .. } => "br-cmp",
            Op::Switch { .. } => "switch",
            Op::Throw => "throw",
            Op::Binary(op) => match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::Div => "div",
                BinaryOp::Mod => "mod",
                BinaryOp::Exp => "exp",
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
                BinaryOp::Xor => "xor",
                BinaryOp::Shl => "shl",
                BinaryOp::Shr => "shr",
                BinaryOp::Ashr => "ashr",
            },
            Op::Cmp(op) => match op {
                CmpOp::Eq => "cmp-eq",
                CmpOp::Ne => "cmp-ne",
                CmpOp::Lt => "cmp-lt",
                CmpOp::Le => "cmp-le",
                CmpOp::Gt => "cmp-gt",
                CmpOp::Ge => "cmp-ge",
                CmpOp::StrictEq => "cmp-stricteq",
                CmpOp::StrictNe => "cmp-strictne",
                CmpOp::In => "isin",
                CmpOp::InstanceOf => "instanceof",
            },
            Op::Unary(op) => match op {
                UnaryOp::Neg => "neg",
                UnaryOp::Not => "not",
                UnaryOp::BitNot => "bitnot",
                UnaryOp::Inc => "inc",
                UnaryOp::Dec => "dec",
                UnaryOp::TypeOf => "typeof",
                UnaryOp::ToNumber => "to-number",
                UnaryOp::ToNumeric => "to-numeric",
                UnaryOp::IsTrue => "is-true",
                UnaryOp::IsFalse => "is-false",
            },
            Op::Load => "load",
            Op::Store => "store",
            Op::Alloca => "alloca",
            Op::GetElementPtr => "get-element-ptr",
            Op::CreateObject => "create-object",
            Op::CreateArray => "create-array",
            Op::CreateArrayWithBuffer { .. } => "create-array-with-buf",
            Op::CreateObjectWithBuffer { .. } => "create-object-with-buf",
            Op::CreateRegExp { .. } => "create-regexp",
            Op::GetProperty => "get-property",
            Op::SetProperty => "set-property",
            Op::DeleteProperty => "delete-property",
            Op::GetElement => "get-element",
            Op::SetElement => "set-element",
            Op::Call => "call",
            Op::CallThis => "call-this",
            Op::CallSuper => "call-super",
            Op::CallRuntime { .. } => "call-runtime",
            Op::New => "new",
            Op::Apply => "apply",
            Op::NewLexEnv { .. } => "new-lex-env",
            Op::PopLexEnv => "pop-lex-env",
            Op::LoadLexVar { .. } => "load-lex-var",
            Op::StoreLexVar { .. } => "store-lex-var",
            Op::LoadGlobal { .. } => "load-global",
            Op::StoreGlobal { .. } => "store-global",
            Op::TryLoadGlobal { .. } => "try-load-global",
            Op::TryStoreGlobal { .. } => "try-store-global",
            Op::LoadModuleVar { .. } => "load-module-var",
            Op::StoreModuleVar { .. } => "store-module-var",
            Op::GetModuleNamespace { .. } => "get-module-ns",
            Op::DynamicImport => "dynamic-import",
            Op::CreateGenerator => "create-generator",
            Op::ResumeGenerator => "resume-generator",
            Op::GetResumeMode => "get-resume-mode",
            Op::SuspendGenerator => "suspend-generator",
            Op::AsyncFunctionEnter => "async-func-enter",
            Op::AsyncFunctionResolve => "async-func-resolve",
            Op::AsyncFunctionReject => "async-func-reject",
            Op::CreateClosure { .. } => "create-closure",
            Op::CreateClass { .. } => "create-class",
            Op::LandingPad => "landing-pad",
            Op::Resume => "resume",
            Op::Phi { .. } => "phi",
            Op::Select => "select",
            Op::Copy => "copy",
            Op::Nop => "nop",
            Op::Debugger => "debugger",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// An instruction: opcode plus its use-tracked operand list
///
/// Operand slots must only be rewritten through
/// `Function::set_operand`, which keeps the use lists of both the old and
/// the new value coherent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inst {
    pub op: Op,
    pub operands: Vec<ValueId>,
    /// Owning block; `None` until inserted
    pub block: Option<BlockId>,
    /// Display flag: render as `v OP= x` / `v++` instead of a plain
    /// assignment
    pub compound_assign: bool,
}

impl Inst {
    pub fn new(op: Op, operands: Vec<ValueId>) -> Self {
        Self {
            op,
            operands,
            block: None,
            compound_assign: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminator_classification() {
        assert!(Op::Ret.is_terminator());
        assert!(Op::Br { target: BlockId(0) }.is_terminator());
        assert!(Op::Throw.is_terminator());
        assert!(!Op::Copy.is_terminator());
        assert!(!Op::Phi { blocks: vec![] }.is_terminator());
    }

    #[test]
    fn test_purity() {
        assert!(Op::Binary(BinaryOp::Add).is_pure());
        assert!(Op::GetProperty.is_pure());
        assert!(Op::Copy.is_pure());
        assert!(!Op::Call.is_pure());
        assert!(!Op::SetProperty.is_pure());
        assert!(!Op::Ret.is_pure());
    }

    #[test]
    fn test_targets_and_retarget() {
        let mut op = Op::BrCond {
            then_dest: BlockId(1),
            else_dest: BlockId(2),
        };
        assert_eq!(op.targets().as_slice(), &[BlockId(1), BlockId(2)]);
        assert_eq!(op.retarget(BlockId(2), BlockId(3)), 1);
        assert_eq!(op.targets().as_slice(), &[BlockId(1), BlockId(3)]);
    }

    #[test]
    fn test_cmp_inverse() {
        assert_eq!(CmpOp::Lt.inverse(), Some(CmpOp::Ge));
        assert_eq!(CmpOp::StrictEq.inverse(), Some(CmpOp::StrictNe));
        assert_eq!(CmpOp::In.inverse(), None);
    }
}
