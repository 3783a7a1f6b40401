//! Conversion inputs and outcome

use arkdec_common::{Diagnostic, DiagnosticBag};

/// One method body handed over by the bytecode loader
#[derive(Debug, Clone)]
pub struct MethodRequest<'a> {
    pub name: String,
    pub bytes: &'a [u8],
    /// Declared source-level parameter count
    pub param_count: u32,
    /// Virtual registers reserved by the method frame
    pub num_vregs: u32,
    /// Total argument slots, including the three implicit leading slots
    /// (callee, new-target, this)
    pub num_args: u32,
}

impl<'a> MethodRequest<'a> {
    pub fn new(name: impl Into<String>, bytes: &'a [u8]) -> Self {
        Self {
            name: name.into(),
            bytes,
            param_count: 0,
            num_vregs: 0,
            num_args: 3,
        }
    }

    pub fn with_params(mut self, param_count: u32, num_vregs: u32, num_args: u32) -> Self {
        self.param_count = param_count;
        self.num_vregs = num_vregs;
        self.num_args = num_args;
        self
    }
}

/// Outcome of converting one method. The function itself is left in the
/// module under `function_name`; warnings and errors accumulate here and
/// never abort the surrounding session.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub function_name: String,
    pub diagnostics: DiagnosticBag,
}

impl ConversionResult {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            diagnostics: DiagnosticBag::new(),
        }
    }

    /// Conversion succeeded when no error-severity diagnostic was
    /// recorded; warnings do not count against success.
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }

    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics.warnings().collect()
    }

    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics.errors().collect()
    }
}
