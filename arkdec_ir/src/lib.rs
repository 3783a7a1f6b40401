//! SSA intermediate representation for the arkdec decompiler
//!
//! The IR models one compilation unit as a [`Module`] owning
//! [`Function`]s. A function owns its basic blocks and values in index
//! arenas; instructions reference their operands through use-tracked
//! slots so that def-use chains stay coherent under every mutation the
//! optimization passes perform.

pub mod builder;
pub mod function;
pub mod instruction;
pub mod module;
pub mod printer;
pub mod types;
pub mod value;

pub use builder::IrBuilder;
pub use function::{BlockData, Function};
pub use instruction::{BinaryOp, CmpOp, Inst, Op, UnaryOp};
pub use module::{Module, StrId};
pub use types::IrType;
pub use value::{BlockId, ConstValue, IntWidth, SpecialConst, UseRef, ValueId, ValueKind};
