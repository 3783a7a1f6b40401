//! IR type tags
//!
//! Values carry a coarse dynamic-typing-aware tag. `Any` is the default
//! for everything the bytecode does not pin down; TypePropagation refines
//! it conservatively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of an IR value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    /// Unknown or polymorphic; the default for dynamic values
    Any,
    I32,
    I64,
    F64,
    Bool,
    Str,
    /// No value; type of instructions used only for effect
    Void,
}

impl IrType {
    pub fn is_numeric(self) -> bool {
        matches!(self, IrType::I32 | IrType::I64 | IrType::F64)
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Any => write!(f, "any"),
            IrType::I32 => write!(f, "i32"),
            IrType::I64 => write!(f, "i64"),
            IrType::F64 => write!(f, "f64"),
            IrType::Bool => write!(f, "bool"),
            IrType::Str => write!(f, "string"),
            IrType::Void => write!(f, "void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_tags() {
        assert!(IrType::I32.is_numeric());
        assert!(IrType::F64.is_numeric());
        assert!(!IrType::Any.is_numeric());
        assert!(!IrType::Str.is_numeric());
    }
}
