//! Bytecode-to-SSA lifter
//!
//! Entry point is [`convert`]: hand it a [`MethodRequest`] and a
//! [`Module`](arkdec_ir::Module) and it leaves a structurally verified
//! SSA function in the module, reporting anything noteworthy on the
//! returned [`ConversionResult`].

pub mod convert;
pub mod regmap;
pub mod result;

pub use convert::convert;
pub use regmap::{RegisterMap, ACC};
pub use result::{ConversionResult, MethodRequest};
