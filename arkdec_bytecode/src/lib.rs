//! Bytecode front end for the arkdec decompiler
//!
//! Three layers live here, bottom up:
//!
//! - [`opcodes`]: the catalog of every recognized opcode across the
//!   standard namespace and the four prefix namespaces (wide, deprecated,
//!   throw, callruntime), together with operand layouts and classification
//!   flags.
//! - [`decoder`]: a non-restartable iterator turning a raw method body
//!   into structured instructions with byte offsets.
//! - [`flow`]: block-boundary and successor-edge analysis over the
//!   decoded stream.

pub mod decoder;
pub mod flow;
pub mod opcodes;

pub use decoder::{Decoder, Inst, InstKind, Operand, Prefix};
pub use flow::FlowGraph;
pub use opcodes::{
    AluOp, CallRuntimeOpcode, CondOp, DeprecatedOpcode, Lowering, OpFlags, Opcode, OperandFormat,
    ThrowOpcode, UnaryAlu, WideOpcode, PREFIX_CALLRUNTIME, PREFIX_DEPRECATED, PREFIX_THROW,
    PREFIX_WIDE,
};
