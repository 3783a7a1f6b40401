//! Compilation-unit container
//!
//! The [`Module`] is the only process-wide state of a decompilation
//! session: it owns the functions produced so far, the interned string
//! constant pool, and the two symbol tables registered by the bytecode
//! loader before conversion starts.

use crate::function::Function;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Handle into the module's interned string pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrId(pub u32);

/// Process-wide container for one decompilation session
#[derive(Debug, Default)]
pub struct Module {
    functions: HashMap<String, Function>,
    strings: Vec<String>,
    string_index: HashMap<String, StrId>,
    /// Symbolic bytecode string id ("str_17") → decoded text
    bytecode_strings: HashMap<String, String>,
    /// Synthetic global-symbol id → source name
    global_symbols: HashMap<u32, String>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- functions ------------------------------------------------------

    pub fn add_function(&mut self, function: Function) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.get_mut(name)
    }

    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        self.functions.remove(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.values_mut()
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    // ---- interned string constant pool ----------------------------------

    /// Intern `text`, returning a stable id; repeated calls with equal
    /// text return the same id.
    pub fn intern(&mut self, text: &str) -> StrId {
        if let Some(&id) = self.string_index.get(text) {
            return id;
        }
        let id = StrId(self.strings.len() as u32);
        self.strings.push(text.to_string());
        self.string_index.insert(text.to_string(), id);
        id
    }

    pub fn resolve(&self, id: StrId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(String::as_str)
    }

    // ---- loader-supplied symbol tables ----------------------------------

    /// Register the decoded text for a symbolic bytecode string id, e.g.
    /// `"str_17"`. Called by the loader before conversion.
    pub fn register_string_mapping(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.bytecode_strings.insert(id.into(), text.into());
    }

    /// Text for the numeric bytecode string id, if registered
    pub fn string_for_id(&self, id: u16) -> Option<&str> {
        self.bytecode_strings
            .get(&format!("str_{}", id))
            .map(String::as_str)
    }

    /// All registered `str_N` mappings with their numeric ids
    pub fn numeric_string_ids(&self) -> Vec<(u16, String)> {
        self.bytecode_strings
            .iter()
            .filter_map(|(key, text)| {
                let id = key.strip_prefix("str_")?.parse().ok()?;
                Some((id, text.clone()))
            })
            .collect()
    }

    pub fn register_global_symbol(&mut self, id: u32, name: impl Into<String>) {
        self.global_symbols.insert(id, name.into());
    }

    pub fn global_symbol(&self, id: u32) -> Option<&str> {
        self.global_symbols.get(&id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_stable() {
        let mut module = Module::new();
        let a = module.intern("log");
        let b = module.intern("warn");
        let c = module.intern("log");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(module.resolve(a), Some("log"));
    }

    #[test]
    fn test_string_mapping_lookup() {
        let mut module = Module::new();
        module.register_string_mapping("str_17", "console");
        assert_eq!(module.string_for_id(17), Some("console"));
        assert_eq!(module.string_for_id(18), None);
    }

    #[test]
    fn test_global_symbols() {
        let mut module = Module::new();
        module.register_global_symbol(3, "globalThis");
        assert_eq!(module.global_symbol(3), Some("globalThis"));
        assert_eq!(module.global_symbol(4), None);
    }

    #[test]
    fn test_function_registry() {
        let mut module = Module::new();
        module.add_function(Function::new("main"));
        assert_eq!(module.function_count(), 1);
        assert!(module.function("main").is_some());
        assert!(module.function("other").is_none());
    }
}
