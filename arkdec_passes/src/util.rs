//! Helpers shared by the transform passes

use arkdec_ir::{ConstValue, Function, Op, ValueId, ValueKind};

/// Follow `copy` chains to the underlying value
pub fn resolve_copies(func: &Function, v: ValueId) -> ValueId {
    let mut cur = v;
    let mut steps = 0;
    while let Some(Op::Copy) = func.op(cur) {
        cur = func.operands(cur)[0];
        steps += 1;
        if steps > 1024 {
            // A copy cycle would be malformed SSA; stop rather than spin.
            return v;
        }
    }
    cur
}

/// The constant a value resolves to through `copy` chains, if any
pub fn const_through_copies(func: &Function, v: ValueId) -> Option<&ConstValue> {
    func.const_of(resolve_copies(func, v))
}

/// Whether the value resolves to a global symbol through copies
pub fn is_global_through_copies(func: &Function, v: ValueId) -> bool {
    matches!(
        func.kind(resolve_copies(func, v)),
        ValueKind::Global { .. }
    )
}
