//! On-the-fly register-to-SSA mapping
//!
//! The construction algorithm is the on-the-fly SSA scheme of Braun et
//! al.: register reads consult a per-block definition map, falling back
//! to predecessors; join points get φ-instructions which are completed
//! when their block is sealed and removed again when trivial. The
//! accumulator participates as a reserved register key.

use arkdec_ir::{BlockId, Function, IrType, ValueId};
use hashbrown::{HashMap, HashSet};

/// Reserved register key for the accumulator
pub const ACC: u32 = u32::MAX;

/// Per-function register state during SSA construction
#[derive(Debug, Default)]
pub struct RegisterMap {
    current_def: HashMap<(u32, BlockId), ValueId>,
    incomplete_phis: HashMap<BlockId, Vec<(u32, ValueId)>>,
    sealed: HashSet<BlockId>,
    /// Re-entrancy guard: (reg, block) pairs with a read in progress
    visiting: HashSet<(u32, BlockId)>,
    /// φ-instructions removed as trivial, mapped to their replacement
    replaced: HashMap<ValueId, ValueId>,
}

impl RegisterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `value` as the current definition of `reg` in `block`
    pub fn write(&mut self, reg: u32, block: BlockId, value: ValueId) {
        self.current_def.insert((reg, block), value);
    }

    pub fn has_local_def(&self, reg: u32, block: BlockId) -> bool {
        self.current_def.contains_key(&(reg, block))
    }

    /// Follow the replacement chain left behind by trivial-φ removal
    fn resolve(&mut self, v: ValueId) -> ValueId {
        let mut cur = v;
        while let Some(&next) = self.replaced.get(&cur) {
            cur = next;
        }
        if cur != v {
            self.replaced.insert(v, cur);
        }
        cur
    }

    /// Current SSA value of `reg` seen from `block`
    pub fn read(&mut self, func: &mut Function, reg: u32, block: BlockId) -> ValueId {
        if let Some(&v) = self.current_def.get(&(reg, block)) {
            let v = self.resolve(v);
            self.current_def.insert((reg, block), v);
            return v;
        }

        if !self.sealed.contains(&block) {
            // Predecessors are still unknown; leave an incomplete φ to be
            // filled in when the block is sealed.
            let phi = func.create_phi(block, IrType::Any);
            self.incomplete_phis
                .entry(block)
                .or_default()
                .push((reg, phi));
            self.current_def.insert((reg, block), phi);
            return phi;
        }

        if self.visiting.contains(&(reg, block)) {
            // A read for this pair is already on the stack; produce the
            // pending φ instead of recursing forever.
            let phi = func.create_phi(block, IrType::Any);
            self.current_def.insert((reg, block), phi);
            return phi;
        }
        self.visiting.insert((reg, block));

        let preds = func.preds(block).to_vec();
        let value = if preds.len() == 1 {
            self.read(func, reg, preds[0])
        } else {
            // Break recursion by caching the φ before walking the
            // predecessors; loops feed the φ back into itself.
            let phi = func.create_phi(block, IrType::Any);
            self.current_def.insert((reg, block), phi);
            for p in preds {
                let v = self.read(func, reg, p);
                func.add_incoming(phi, v, p);
            }
            self.try_remove_trivial_phi(func, phi)
        };

        self.visiting.remove(&(reg, block));
        self.current_def.insert((reg, block), value);
        value
    }

    /// Declare that `block` will receive no further predecessors and
    /// complete its pending φ-instructions.
    pub fn seal(&mut self, func: &mut Function, block: BlockId) {
        if !self.sealed.insert(block) {
            return;
        }
        let pending = self.incomplete_phis.remove(&block).unwrap_or_default();
        for (reg, phi) in pending {
            let preds = func.preds(block).to_vec();
            for p in preds {
                let v = self.read(func, reg, p);
                func.add_incoming(phi, v, p);
            }
            let value = self.try_remove_trivial_phi(func, phi);
            self.current_def.insert((reg, block), value);
        }
    }

    pub fn is_sealed(&self, block: BlockId) -> bool {
        self.sealed.contains(&block)
    }

    /// Drop `phi` when all non-self incoming values are one single value,
    /// rewriting its uses to that value. Users that are themselves φs are
    /// re-examined, since removing one φ can make another trivial.
    fn try_remove_trivial_phi(&mut self, func: &mut Function, phi: ValueId) -> ValueId {
        let mut same: Option<ValueId> = None;
        for &operand in func.operands(phi).to_vec().iter() {
            let operand = self.resolve(operand);
            if operand == phi {
                continue;
            }
            match same {
                Some(s) if s == operand => {}
                Some(_) => return phi, // merges at least two distinct values
                None => same = Some(operand),
            }
        }
        // A φ with no non-self operands reads a register that was never
        // written on any path.
        let same = same.unwrap_or_else(|| func.undef_value(IrType::Any));

        let users: Vec<ValueId> = func
            .users(phi)
            .into_iter()
            .filter(|&u| u != phi)
            .collect();
        func.replace_all_uses_with(phi, same);
        func.erase(phi);
        self.replaced.insert(phi, same);

        for user in users {
            if func.is_removed(user) {
                continue;
            }
            if func.op(user).map(|op| op.is_phi()).unwrap_or(false) {
                self.try_remove_trivial_phi(func, user);
            }
        }
        self.resolve(same)
    }
}
