//! Decompiler driver facade
//!
//! Ties the pipeline together: the bytecode loader registers its string
//! and global-symbol tables, hands over method bodies, and receives back
//! optimized SSA functions inside the session's [`Module`]. Everything
//! else (decoding, flow analysis, SSA construction, the pass pipeline)
//! happens behind [`Decompiler::decompile_method`].

pub use arkdec_bytecode as bytecode;
pub use arkdec_common::{Diagnostic, DiagnosticBag, Severity};
pub use arkdec_ir::{
    BinaryOp, BlockId, CmpOp, ConstValue, Function, IrType, Module, Op, UnaryOp, ValueId,
    ValueKind,
};
pub use arkdec_lifter::{convert, ConversionResult, MethodRequest};
pub use arkdec_passes::{default_pipeline, PassManager};

/// Rounds of the function-pass list before giving up on a fixpoint
const MAX_PIPELINE_ROUNDS: usize = 8;

/// One decompilation session: owns the module and drives each method
/// through conversion and the optimization pipeline.
pub struct Decompiler {
    module: Module,
    collect_stats: bool,
    debug: bool,
}

impl Decompiler {
    pub fn new() -> Self {
        Self {
            module: Module::new(),
            collect_stats: false,
            debug: false,
        }
    }

    pub fn set_collect_stats(&mut self, enabled: bool) {
        self.collect_stats = enabled;
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    /// Register the decoded text of a bytecode string id, e.g.
    /// `("str_17", "console")`. Must happen before the methods using it
    /// are decompiled.
    pub fn register_string_mapping(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.module.register_string_mapping(id, text);
    }

    pub fn register_global_symbol(&mut self, id: u32, name: impl Into<String>) {
        self.module.register_global_symbol(id, name);
    }

    /// Convert one method and run the optimization pipeline over it. The
    /// function stays in the module either way; a pass failure is
    /// surfaced as an error diagnostic and the effects of earlier passes
    /// are kept.
    pub fn decompile_method(&mut self, request: &MethodRequest<'_>) -> ConversionResult {
        let mut result = convert(&mut self.module, request);
        let Some(mut func) = self.module.remove_function(&result.function_name) else {
            return result;
        };

        let mut pipeline = default_pipeline();
        pipeline.set_collect_stats(self.collect_stats);
        pipeline.set_debug(self.debug);
        match pipeline.run_function_to_fixpoint(&mut func, MAX_PIPELINE_ROUNDS) {
            Ok(modified) => {
                log::debug!(
                    "pipeline finished for {} (modified: {})",
                    result.function_name,
                    modified
                );
            }
            Err(e) => {
                result.diagnostics.error(format!("{}", e));
            }
        }
        for finding in func.verify() {
            result
                .diagnostics
                .warning(format!("post-pipeline verifier: {}", finding));
        }
        self.module.add_function(func);
        result
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }
}

impl Default for Decompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompile_empty_method() {
        let mut decompiler = Decompiler::new();
        let request = MethodRequest::new("empty", &[]);
        let result = decompiler.decompile_method(&request);
        assert!(result.is_success());
        assert!(decompiler.module().function("empty").is_some());
    }

    #[test]
    fn test_module_survives_method_error() {
        let mut decompiler = Decompiler::new();
        let ok = MethodRequest::new("good", &[0x61]);
        assert!(decompiler.decompile_method(&ok).is_success());

        // Truncated method: conversion reports an error but the module
        // keeps both functions.
        let bad_bytes = [0x07, 1];
        let bad = MethodRequest::new("bad", &bad_bytes);
        assert!(!decompiler.decompile_method(&bad).is_success());
        assert!(decompiler.module().function("good").is_some());
        assert!(decompiler.module().function("bad").is_some());
    }
}
