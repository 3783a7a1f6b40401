//! Pass registration, sequencing and statistics

use arkdec_ir::{Function, Module};
use hashbrown::HashMap;
use std::any::Any;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A pass failed; the pipeline for the current function is aborted and
/// earlier pass effects are kept.
#[derive(Debug, Clone, Error)]
#[error("pass {pass} failed: {reason}")]
pub struct PassError {
    pub pass: &'static str,
    pub reason: String,
}

impl PassError {
    pub fn new(pass: &'static str, reason: impl Into<String>) -> Self {
        Self {
            pass,
            reason: reason.into(),
        }
    }
}

/// `Ok(true)` when the pass changed anything
pub type PassResult = Result<bool, PassError>;

/// A transform over one function
pub trait FunctionPass {
    fn name(&self) -> &'static str;
    fn run(&mut self, func: &mut Function) -> PassResult;
}

/// A transform over the whole module
pub trait ModulePass {
    fn name(&self) -> &'static str;
    fn run(&mut self, module: &mut Module) -> PassResult;
}

/// Per-pass run statistics, collected when enabled
#[derive(Debug, Clone, Copy, Default)]
pub struct PassStats {
    pub runs: usize,
    pub modified: usize,
    pub total_time: Duration,
}

/// Holds the registered passes and runs them in order: module passes
/// first, then every function pass across each function. Analysis results
/// are cached per manager lifetime and dropped wholesale whenever a pass
/// reports a modification.
#[derive(Default)]
pub struct PassManager {
    module_passes: Vec<Box<dyn ModulePass>>,
    function_passes: Vec<Box<dyn FunctionPass>>,
    stats: HashMap<&'static str, PassStats>,
    collect_stats: bool,
    debug: bool,
    analyses: HashMap<&'static str, Box<dyn Any>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_collect_stats(&mut self, enabled: bool) {
        self.collect_stats = enabled;
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    pub fn add_module_pass(&mut self, pass: impl ModulePass + 'static) {
        self.module_passes.push(Box::new(pass));
    }

    pub fn add_function_pass(&mut self, pass: impl FunctionPass + 'static) {
        self.function_passes.push(Box::new(pass));
    }

    pub fn stats(&self) -> impl Iterator<Item = (&'static str, &PassStats)> {
        self.stats.iter().map(|(&name, stats)| (name, stats))
    }

    // ---- analysis cache -------------------------------------------------

    pub fn cache_analysis<T: Any>(&mut self, id: &'static str, result: T) {
        self.analyses.insert(id, Box::new(result));
    }

    pub fn analysis<T: Any>(&self, id: &'static str) -> Option<&T> {
        self.analyses.get(id).and_then(|b| b.downcast_ref())
    }

    pub fn invalidate(&mut self, id: &'static str) {
        self.analyses.remove(id);
    }

    fn invalidate_all(&mut self) {
        self.analyses.clear();
    }

    // ---- execution ------------------------------------------------------

    fn record(&mut self, name: &'static str, modified: bool, elapsed: Duration) {
        if !self.collect_stats {
            return;
        }
        let entry = self.stats.entry(name).or_default();
        entry.runs += 1;
        entry.total_time += elapsed;
        if modified {
            entry.modified += 1;
        }
    }

    /// Run every registered pass once over the module. Stops at the first
    /// failure; earlier effects are kept.
    pub fn run(&mut self, module: &mut Module) -> PassResult {
        let mut any_modified = false;

        let mut module_passes = std::mem::take(&mut self.module_passes);
        for pass in module_passes.iter_mut() {
            let start = Instant::now();
            let outcome = pass.run(module);
            let elapsed = start.elapsed();
            let name = pass.name();
            match outcome {
                Ok(modified) => {
                    self.record(name, modified, elapsed);
                    if modified {
                        any_modified = true;
                        self.invalidate_all();
                    }
                }
                Err(e) => {
                    self.module_passes = module_passes;
                    return Err(e);
                }
            }
        }
        self.module_passes = module_passes;

        let names: Vec<String> = module.function_names().iter().map(|s| s.to_string()).collect();
        for name in names {
            let Some(mut func) = module.remove_function(&name) else {
                continue;
            };
            let outcome = self.run_function(&mut func);
            module.add_function(func);
            any_modified |= outcome?;
        }
        Ok(any_modified)
    }

    /// Run the function-pass list once over `func`
    pub fn run_function(&mut self, func: &mut Function) -> PassResult {
        let mut any_modified = false;
        let mut passes = std::mem::take(&mut self.function_passes);
        let mut failure = None;
        for pass in passes.iter_mut() {
            let start = Instant::now();
            let outcome = pass.run(func);
            let elapsed = start.elapsed();
            let name = pass.name();
            match outcome {
                Ok(modified) => {
                    if self.debug && modified {
                        log::debug!("pass {} modified {}", name, func.name);
                    }
                    self.record(name, modified, elapsed);
                    if modified {
                        any_modified = true;
                        self.invalidate_all();
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.function_passes = passes;
        match failure {
            Some(e) => Err(e),
            None => Ok(any_modified),
        }
    }

    /// Repeat the function-pass list until no pass reports a change, up
    /// to `max_rounds` rounds.
    pub fn run_function_to_fixpoint(
        &mut self,
        func: &mut Function,
        max_rounds: usize,
    ) -> PassResult {
        let mut any_modified = false;
        for round in 0..max_rounds {
            let modified = self.run_function(func)?;
            if !modified {
                log::debug!("{} reached fixpoint after {} rounds", func.name, round + 1);
                return Ok(any_modified);
            }
            any_modified = true;
        }
        log::warn!("{} did not reach fixpoint in {} rounds", func.name, max_rounds);
        Ok(any_modified)
    }
}
