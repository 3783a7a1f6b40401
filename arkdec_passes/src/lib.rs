//! Optimization passes for the arkdec decompiler
//!
//! The [`manager`] module holds the pass framework; each sibling module
//! implements one transform over the SSA IR. [`default_pipeline`] wires
//! the full sequence the decompiler driver runs to a fixpoint after
//! conversion.

pub mod algebraic;
pub mod branch_fold;
pub mod compound_assign;
pub mod const_fold;
pub mod const_prop;
pub mod dce;
pub mod gvn;
pub mod licm;
pub mod manager;
pub mod ret_elim;
pub mod simplify_cfg;
pub mod type_prop;
pub mod util;
pub mod var_recon;

pub use algebraic::AlgebraicSimplification;
pub use branch_fold::BranchFolding;
pub use compound_assign::CompoundAssignment;
pub use const_fold::ConstantFolding;
pub use const_prop::ConstantPropagation;
pub use dce::{AggressiveDce, DeadCodeElimination};
pub use gvn::GlobalValueNumbering;
pub use licm::LoopInvariantCodeMotion;
pub use manager::{FunctionPass, ModulePass, PassError, PassManager, PassResult, PassStats};
pub use ret_elim::RedundantReturnElimination;
pub use simplify_cfg::SimplifyCfg;
pub use type_prop::{ToNumericElimination, TypePropagation};
pub use var_recon::VariableReconstruction;

/// The standard pipeline: cleanup, constants, control flow, loops,
/// types, then naming. Variable reconstruction runs before
/// compound-assignment detection, which consumes its names.
pub fn default_pipeline() -> PassManager {
    let mut manager = PassManager::new();
    manager.add_function_pass(AggressiveDce);
    manager.add_function_pass(ConstantPropagation);
    manager.add_function_pass(ConstantFolding);
    manager.add_function_pass(AlgebraicSimplification);
    manager.add_function_pass(SimplifyCfg);
    manager.add_function_pass(BranchFolding);
    manager.add_function_pass(GlobalValueNumbering);
    manager.add_function_pass(LoopInvariantCodeMotion);
    manager.add_function_pass(TypePropagation);
    manager.add_function_pass(ToNumericElimination);
    manager.add_function_pass(DeadCodeElimination);
    manager.add_function_pass(RedundantReturnElimination);
    manager.add_function_pass(VariableReconstruction);
    manager.add_function_pass(CompoundAssignment);
    manager
}
