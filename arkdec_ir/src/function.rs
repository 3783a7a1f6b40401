//! Function bodies: block and value arenas with use-def maintenance
//!
//! A [`Function`] owns every block and value of one method. Blocks and
//! values are addressed by id; all structural mutation goes through the
//! methods here so that three invariants can never silently break:
//!
//! 1. every operand slot has exactly one matching entry in the operand
//!    value's use list,
//! 2. predecessor lists mirror the successor references of terminators,
//! 3. φ-instructions stay a contiguous prefix of their block with one
//!    incoming pair per predecessor.
//!
//! Violating a structural precondition (inserting an instruction twice,
//! removing one from a block it is not in, rewriting a slot that does not
//! exist) is a bug in the caller and panics.

use crate::instruction::{Inst, Op};
use crate::types::IrType;
use crate::value::{
    BlockId, ConstValue, IntWidth, SpecialConst, UseRef, ValueData, ValueId, ValueKind,
};
use hashbrown::HashMap;

/// One basic block: an ordered instruction list plus CFG edges
#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub insts: Vec<ValueId>,
    /// Set-like ordered predecessor list, mirrored from terminators
    pub preds: Vec<BlockId>,
    /// Ordered successor list, mirrored from this block's terminator
    pub succs: Vec<BlockId>,
    removed: bool,
}

/// Interning key for the per-function constant pool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Int(i64, IntWidth),
    Float(u64),
    Special(SpecialConst),
    Str(String),
}

impl ConstKey {
    fn of(value: &ConstValue) -> Self {
        match value {
            ConstValue::Int { value, width } => ConstKey::Int(*value, *width),
            ConstValue::Float(v) => ConstKey::Float(v.to_bits()),
            ConstValue::Special(s) => ConstKey::Special(*s),
            ConstValue::Str(s) => ConstKey::Str(s.clone()),
        }
    }
}

/// A function under construction or transformation
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub return_ty: IrType,
    values: Vec<ValueData>,
    blocks: Vec<BlockData>,
    block_order: Vec<BlockId>,
    args: Vec<ValueId>,
    const_cache: HashMap<ConstKey, ValueId>,
    global_cache: HashMap<u32, ValueId>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_ty: IrType::Any,
            values: Vec::new(),
            blocks: Vec::new(),
            block_order: Vec::new(),
            args: Vec::new(),
            const_cache: HashMap::new(),
            global_cache: HashMap::new(),
        }
    }

    // ---- value arena ----------------------------------------------------

    fn make_value(&mut self, kind: ValueKind, ty: IrType) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData::new(kind, ty));
        id
    }

    pub fn value(&self, v: ValueId) -> &ValueData {
        &self.values[v.index()]
    }

    fn value_mut(&mut self, v: ValueId) -> &mut ValueData {
        &mut self.values[v.index()]
    }

    pub fn kind(&self, v: ValueId) -> &ValueKind {
        &self.value(v).kind
    }

    pub fn ty(&self, v: ValueId) -> IrType {
        self.value(v).ty
    }

    pub fn set_ty(&mut self, v: ValueId, ty: IrType) {
        self.value_mut(v).ty = ty;
    }

    pub fn value_name(&self, v: ValueId) -> &str {
        &self.value(v).name
    }

    pub fn set_value_name(&mut self, v: ValueId, name: impl Into<String>) {
        self.value_mut(v).name = name.into();
    }

    pub fn is_removed(&self, v: ValueId) -> bool {
        matches!(self.value(v).kind, ValueKind::Removed)
    }

    /// All value ids ever allocated, including removed ones
    pub fn value_ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        (0..self.values.len() as u32).map(ValueId)
    }

    pub fn inst(&self, v: ValueId) -> Option<&Inst> {
        match &self.value(v).kind {
            ValueKind::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    fn inst_mut(&mut self, v: ValueId) -> &mut Inst {
        match &mut self.value_mut(v).kind {
            ValueKind::Inst(inst) => inst,
            _ => panic!("{} is not an instruction", v),
        }
    }

    pub fn op(&self, v: ValueId) -> Option<&Op> {
        self.inst(v).map(|i| &i.op)
    }

    pub fn operands(&self, v: ValueId) -> &[ValueId] {
        self.inst(v).map(|i| i.operands.as_slice()).unwrap_or(&[])
    }

    pub fn uses(&self, v: ValueId) -> &[UseRef] {
        &self.value(v).uses
    }

    /// Instructions using `v`, deduplicated, in use-list order
    pub fn users(&self, v: ValueId) -> Vec<ValueId> {
        let mut out = Vec::new();
        for u in &self.value(v).uses {
            if !out.contains(&u.user) {
                out.push(u.user);
            }
        }
        out
    }

    pub fn block_of(&self, v: ValueId) -> Option<BlockId> {
        self.inst(v).and_then(|i| i.block)
    }

    pub fn is_compound_assign(&self, v: ValueId) -> bool {
        self.inst(v).map(|i| i.compound_assign).unwrap_or(false)
    }

    pub fn set_compound_assign(&mut self, v: ValueId, flag: bool) {
        self.inst_mut(v).compound_assign = flag;
    }

    // ---- arguments, constants, globals ----------------------------------

    pub fn add_arg(&mut self, ty: IrType) -> ValueId {
        let index = self.args.len();
        let v = self.make_value(ValueKind::Argument { index }, ty);
        self.args.push(v);
        v
    }

    pub fn args(&self) -> &[ValueId] {
        &self.args
    }

    pub fn const_value(&mut self, value: ConstValue) -> ValueId {
        let key = ConstKey::of(&value);
        if let Some(&v) = self.const_cache.get(&key) {
            return v;
        }
        let ty = value.ty();
        let v = self.make_value(ValueKind::Constant(value), ty);
        self.const_cache.insert(key, v);
        v
    }

    pub fn const_i32(&mut self, value: i32) -> ValueId {
        self.const_value(ConstValue::Int {
            value: i64::from(value),
            width: IntWidth::W32,
        })
    }

    pub fn const_i64(&mut self, value: i64) -> ValueId {
        self.const_value(ConstValue::Int {
            value,
            width: IntWidth::W64,
        })
    }

    pub fn const_f64(&mut self, value: f64) -> ValueId {
        self.const_value(ConstValue::Float(value))
    }

    pub fn const_bool(&mut self, value: bool) -> ValueId {
        self.const_value(ConstValue::bool(value))
    }

    pub fn const_str(&mut self, value: impl Into<String>) -> ValueId {
        self.const_value(ConstValue::Str(value.into()))
    }

    pub fn const_special(&mut self, value: SpecialConst) -> ValueId {
        self.const_value(ConstValue::Special(value))
    }

    pub fn undef_value(&mut self, ty: IrType) -> ValueId {
        self.make_value(ValueKind::Undef, ty)
    }

    pub fn global_value(
        &mut self,
        id: u32,
        resolved: Option<String>,
        external: bool,
    ) -> ValueId {
        if let Some(&v) = self.global_cache.get(&id) {
            return v;
        }
        let v = self.make_value(
            ValueKind::Global {
                id,
                resolved,
                external,
            },
            IrType::Any,
        );
        self.global_cache.insert(id, v);
        v
    }

    pub fn const_of(&self, v: ValueId) -> Option<&ConstValue> {
        match self.kind(v) {
            ValueKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    // ---- blocks ---------------------------------------------------------

    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockData::default());
        self.block_order.push(id);
        id
    }

    /// The designated entry block; the first one ever created
    pub fn entry(&self) -> BlockId {
        *self
            .block_order
            .first()
            .expect("function has no entry block")
    }

    pub fn block_order(&self) -> &[BlockId] {
        &self.block_order
    }

    pub fn block(&self, b: BlockId) -> &BlockData {
        let data = &self.blocks[b.index()];
        assert!(!data.removed, "{} was removed", b);
        data
    }

    fn block_mut(&mut self, b: BlockId) -> &mut BlockData {
        let data = &mut self.blocks[b.index()];
        assert!(!data.removed, "{} was removed", b);
        data
    }

    pub fn preds(&self, b: BlockId) -> &[BlockId] {
        &self.block(b).preds
    }

    pub fn succs(&self, b: BlockId) -> &[BlockId] {
        &self.block(b).succs
    }

    pub fn insts_of(&self, b: BlockId) -> &[ValueId] {
        &self.block(b).insts
    }

    pub fn terminator(&self, b: BlockId) -> Option<ValueId> {
        let last = *self.block(b).insts.last()?;
        let op = self.op(last)?;
        op.is_terminator().then_some(last)
    }

    pub fn is_terminated(&self, b: BlockId) -> bool {
        self.terminator(b).is_some()
    }

    /// Index of the first non-φ instruction
    pub fn first_non_phi(&self, b: BlockId) -> usize {
        self.block(b)
            .insts
            .iter()
            .take_while(|&&v| self.op(v).map(Op::is_phi).unwrap_or(false))
            .count()
    }

    /// φ-instructions of `b`, the contiguous prefix
    pub fn phis(&self, b: BlockId) -> Vec<ValueId> {
        let n = self.first_non_phi(b);
        self.block(b).insts[..n].to_vec()
    }

    /// Remove an empty, unreferenced block. Panics when instructions or
    /// predecessor edges are still attached.
    pub fn remove_block(&mut self, b: BlockId) {
        assert!(
            self.block(b).insts.is_empty(),
            "cannot remove {}: still holds instructions",
            b
        );
        assert!(
            self.block(b).preds.is_empty(),
            "cannot remove {}: still has predecessors",
            b
        );
        assert!(
            self.entry() != b,
            "cannot remove the entry block"
        );
        self.blocks[b.index()].removed = true;
        self.block_order.retain(|&o| o != b);
    }

    // ---- use-list maintenance -------------------------------------------

    fn add_use(&mut self, value: ValueId, user: ValueId, slot: usize) {
        self.value_mut(value).uses.push(UseRef { user, slot });
    }

    fn remove_use(&mut self, value: ValueId, user: ValueId, slot: usize) {
        let uses = &mut self.value_mut(value).uses;
        let pos = uses
            .iter()
            .position(|u| u.user == user && u.slot == slot)
            .unwrap_or_else(|| panic!("use-list corruption: {} has no use ({}, {})", value, user, slot));
        uses.remove(pos);
    }

    /// The single entry point for rewriting an operand slot. Keeps both
    /// use lists coherent.
    pub fn set_operand(&mut self, user: ValueId, slot: usize, new: ValueId) {
        let old = *self
            .inst(user)
            .expect("set_operand: user is not an instruction")
            .operands
            .get(slot)
            .unwrap_or_else(|| panic!("set_operand: {} has no slot {}", user, slot));
        if old == new {
            return;
        }
        self.remove_use(old, user, slot);
        self.inst_mut(user).operands[slot] = new;
        self.add_use(new, user, slot);
    }

    /// Remove operand slot `slot`, shifting later slots down and
    /// re-indexing their use entries.
    fn remove_operand(&mut self, user: ValueId, slot: usize) -> ValueId {
        let old = self.inst_mut(user).operands.remove(slot);
        self.remove_use(old, user, slot);
        let count = self.operands(user).len();
        for s in slot..count {
            let v = self.operands(user)[s];
            let uses = &mut self.value_mut(v).uses;
            let entry = uses
                .iter_mut()
                .find(|u| u.user == user && u.slot == s + 1)
                .expect("use-list corruption while shifting slots");
            entry.slot = s;
        }
        old
    }

    /// Detach every operand of `v`, emptying its operand list
    pub fn drop_operands(&mut self, v: ValueId) {
        let operands = std::mem::take(&mut self.inst_mut(v).operands);
        for (slot, operand) in operands.iter().enumerate() {
            self.remove_use(*operand, v, slot);
        }
    }

    /// Rewrite every use of `old` to point at `new`. Afterwards `old` has
    /// an empty use list.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) {
        assert_ne!(old, new, "replace_all_uses_with: old and new are the same value");
        while let Some(&UseRef { user, slot }) = self.value(old).uses.first() {
            self.set_operand(user, slot, new);
        }
    }

    // ---- instruction lifecycle ------------------------------------------

    /// Create an unattached instruction value and register its operand
    /// uses
    pub fn create_inst(&mut self, op: Op, operands: Vec<ValueId>, ty: IrType) -> ValueId {
        let v = self.make_value(ValueKind::Inst(Inst::new(op, operands)), ty);
        let operands = self.inst(v).unwrap().operands.clone();
        for (slot, operand) in operands.iter().enumerate() {
            self.add_use(*operand, v, slot);
        }
        v
    }

    fn wire_terminator(&mut self, b: BlockId, v: ValueId) {
        let targets = self.op(v).unwrap().targets();
        for &t in &targets {
            if !self.block(b).succs.contains(&t) {
                self.block_mut(b).succs.push(t);
            }
            if !self.block(t).preds.contains(&b) {
                self.block_mut(t).preds.push(b);
            }
        }
    }

    fn unwire_terminator(&mut self, b: BlockId, v: ValueId) {
        let targets = self.op(v).unwrap().targets();
        for &t in &targets {
            self.block_mut(b).succs.retain(|&s| s != t);
            self.block_mut(t).preds.retain(|&p| p != b);
        }
    }

    fn attach(&mut self, b: BlockId, v: ValueId, index: usize) {
        let inst = self
            .inst(v)
            .unwrap_or_else(|| panic!("{} is not an instruction", v));
        assert!(
            inst.block.is_none(),
            "instruction {} is already inserted in {}",
            v,
            inst.block.unwrap()
        );
        if inst.op.is_terminator() {
            assert!(
                !self.is_terminated(b),
                "{} already has a terminator",
                b
            );
            assert_eq!(
                index,
                self.block(b).insts.len(),
                "terminators may only be appended"
            );
        }
        self.inst_mut(v).block = Some(b);
        self.block_mut(b).insts.insert(index, v);
        if self.op(v).unwrap().is_terminator() {
            self.wire_terminator(b, v);
        }
    }

    pub fn append(&mut self, b: BlockId, v: ValueId) {
        self.attach(b, v, self.block(b).insts.len());
    }

    pub fn prepend(&mut self, b: BlockId, v: ValueId) {
        self.attach(b, v, 0);
    }

    pub fn insert_before(&mut self, before: ValueId, v: ValueId) {
        let b = self
            .block_of(before)
            .unwrap_or_else(|| panic!("{} is not inserted anywhere", before));
        let index = self.index_in_block(b, before);
        self.attach(b, v, index);
    }

    pub fn insert_after(&mut self, after: ValueId, v: ValueId) {
        let b = self
            .block_of(after)
            .unwrap_or_else(|| panic!("{} is not inserted anywhere", after));
        let index = self.index_in_block(b, after);
        self.attach(b, v, index + 1);
    }

    fn index_in_block(&self, b: BlockId, v: ValueId) -> usize {
        self.block(b)
            .insts
            .iter()
            .position(|&i| i == v)
            .unwrap_or_else(|| panic!("{} is not in {}", v, b))
    }

    /// Detach `v` from its block, keeping operands and uses intact
    pub fn remove_from_block(&mut self, v: ValueId) {
        let b = self
            .block_of(v)
            .unwrap_or_else(|| panic!("{} is not inserted in any block", v));
        if self.op(v).unwrap().is_terminator() {
            self.unwire_terminator(b, v);
        }
        let index = self.index_in_block(b, v);
        self.block_mut(b).insts.remove(index);
        self.inst_mut(v).block = None;
    }

    /// Erase `v` entirely. Its use list must already be empty.
    pub fn erase(&mut self, v: ValueId) {
        assert!(
            self.value(v).uses.is_empty(),
            "cannot erase {}: it still has uses",
            v
        );
        if self.block_of(v).is_some() {
            self.remove_from_block(v);
        }
        self.drop_operands(v);
        self.value_mut(v).kind = ValueKind::Removed;
    }

    /// Split `b` before instruction index `index`; instructions from
    /// `index` onward move to a fresh block, `b` is re-terminated with a
    /// branch to it. Returns the new block.
    pub fn split_block(&mut self, b: BlockId, index: usize) -> BlockId {
        let nb = self.create_block();
        let moved: Vec<ValueId> = self.block(b).insts[index..].to_vec();
        self.block_mut(b).insts.truncate(index);
        let had_terminator = moved
            .last()
            .map(|&v| self.op(v).unwrap().is_terminator())
            .unwrap_or(false);
        for &v in &moved {
            self.inst_mut(v).block = Some(nb);
        }
        self.block_mut(nb).insts = moved;
        if had_terminator {
            // Successor bookkeeping moves wholesale: targets previously
            // reached from b are now reached from nb.
            let succs = std::mem::take(&mut self.block_mut(b).succs);
            for &t in &succs {
                for p in self.block_mut(t).preds.iter_mut() {
                    if *p == b {
                        *p = nb;
                    }
                }
                for phi in self.phis(t) {
                    self.phi_replace_incoming_block(phi, b, nb);
                }
            }
            self.block_mut(nb).succs = succs;
        }
        let br = self.create_inst(Op::Br { target: nb }, vec![], IrType::Void);
        self.append(b, br);
        nb
    }

    /// Rewrite the terminator of `b` so references to `old` point at
    /// `new`, keeping edge mirrors consistent. φ incomings in `old` and
    /// `new` are the caller's responsibility.
    pub fn replace_successor(&mut self, b: BlockId, old: BlockId, new: BlockId) {
        let term = self
            .terminator(b)
            .unwrap_or_else(|| panic!("{} has no terminator", b));
        self.unwire_terminator(b, term);
        self.inst_mut(term).op.retarget(old, new);
        self.wire_terminator(b, term);
    }

    // ---- φ management ---------------------------------------------------

    /// Create an empty φ at the head of `b`'s φ prefix
    pub fn create_phi(&mut self, b: BlockId, ty: IrType) -> ValueId {
        let phi = self.create_inst(Op::Phi { blocks: vec![] }, vec![], ty);
        let index = self.first_non_phi(b);
        self.attach(b, phi, index);
        phi
    }

    pub fn add_incoming(&mut self, phi: ValueId, value: ValueId, block: BlockId) {
        let slot = self.operands(phi).len();
        self.inst_mut(phi).operands.push(value);
        self.add_use(value, phi, slot);
        match &mut self.inst_mut(phi).op {
            Op::Phi { blocks } => blocks.push(block),
            _ => panic!("{} is not a phi", phi),
        }
    }

    pub fn phi_incoming_blocks(&self, phi: ValueId) -> &[BlockId] {
        match self.op(phi) {
            Some(Op::Phi { blocks }) => blocks,
            _ => panic!("{} is not a phi", phi),
        }
    }

    pub fn phi_incoming_block(&self, phi: ValueId, i: usize) -> BlockId {
        self.phi_incoming_blocks(phi)[i]
    }

    pub fn phi_value_for_block(&self, phi: ValueId, b: BlockId) -> Option<ValueId> {
        let index = self.phi_incoming_blocks(phi).iter().position(|&p| p == b)?;
        Some(self.operands(phi)[index])
    }

    /// Remove the incoming pair for `b`, if present
    pub fn phi_remove_incoming_for(&mut self, phi: ValueId, b: BlockId) -> Option<ValueId> {
        let index = self.phi_incoming_blocks(phi).iter().position(|&p| p == b)?;
        match &mut self.inst_mut(phi).op {
            Op::Phi { blocks } => {
                blocks.remove(index);
            }
            _ => unreachable!(),
        }
        Some(self.remove_operand(phi, index))
    }

    pub fn phi_replace_incoming_block(&mut self, phi: ValueId, old: BlockId, new: BlockId) {
        match &mut self.inst_mut(phi).op {
            Op::Phi { blocks } => {
                for b in blocks.iter_mut() {
                    if *b == old {
                        *b = new;
                    }
                }
            }
            _ => panic!("{} is not a phi", phi),
        }
    }

    // ---- verification ---------------------------------------------------

    /// Check the structural invariants; findings are returned as
    /// human-readable strings and an empty list means the function is
    /// well formed.
    pub fn verify(&self) -> Vec<String> {
        let mut findings = Vec::new();
        if self.block_order.is_empty() {
            findings.push("function has no blocks".to_string());
            return findings;
        }

        for &b in &self.block_order {
            let data = self.block(b);

            match data.insts.last() {
                Some(&last) if self.op(last).map(Op::is_terminator).unwrap_or(false) => {}
                _ => findings.push(format!("{} is not terminated", b)),
            }
            for (i, &v) in data.insts.iter().enumerate() {
                let Some(op) = self.op(v) else {
                    findings.push(format!("{} contains non-instruction {}", b, v));
                    continue;
                };
                if op.is_terminator() && i + 1 != data.insts.len() {
                    findings.push(format!("terminator {} is not the tail of {}", v, b));
                }
                if self.inst(v).unwrap().block != Some(b) {
                    findings.push(format!("{} does not point back at {}", v, b));
                }
            }

            let phi_prefix = self.first_non_phi(b);
            for (i, &v) in data.insts.iter().enumerate() {
                if self.op(v).map(Op::is_phi).unwrap_or(false) && i >= phi_prefix {
                    findings.push(format!("phi {} appears after non-phi instructions in {}", v, b));
                }
            }

            // Predecessor set must equal the set of blocks whose
            // terminator names b.
            for &p in &data.preds {
                let names_b = self
                    .terminator(p)
                    .map(|t| self.op(t).unwrap().targets().contains(&b))
                    .unwrap_or(false);
                if !names_b {
                    findings.push(format!("{} lists {} as predecessor but {} does not branch to it", b, p, p));
                }
            }
            if let Some(t) = self.terminator(b) {
                for target in self.op(t).unwrap().targets() {
                    if !self.block(target).preds.contains(&b) {
                        findings.push(format!("{} branches to {} but is not in its predecessor list", b, target));
                    }
                }
            }

            // Each φ must carry exactly one incoming per predecessor.
            for phi in self.phis(b) {
                let mut incoming = self.phi_incoming_blocks(phi).to_vec();
                let mut preds = data.preds.clone();
                incoming.sort();
                preds.sort();
                if incoming != preds {
                    findings.push(format!(
                        "{} incoming blocks {:?} do not match predecessors {:?} of {}",
                        phi, incoming, preds, b
                    ));
                }
            }
        }

        // Use-list coherence over the whole arena.
        for v in self.value_ids() {
            if self.is_removed(v) {
                continue;
            }
            for (slot, &operand) in self.operands(v).iter().enumerate() {
                let count = self
                    .uses(operand)
                    .iter()
                    .filter(|u| u.user == v && u.slot == slot)
                    .count();
                if count != 1 {
                    findings.push(format!(
                        "operand slot {} of {} has {} matching use entries on {}",
                        slot, v, count, operand
                    ));
                }
            }
            for u in self.uses(v) {
                if self.operands(u.user).get(u.slot) != Some(&v) {
                    findings.push(format!(
                        "stale use entry ({}, {}) on {}",
                        u.user, u.slot, v
                    ));
                }
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::BinaryOp;

    fn add_inst(f: &mut Function, b: BlockId, op: Op, operands: Vec<ValueId>) -> ValueId {
        let v = f.create_inst(op, operands, IrType::Any);
        f.append(b, v);
        v
    }

    #[test]
    fn test_use_lists_track_operands() {
        let mut f = Function::new("t");
        let b = f.create_block();
        let three = f.const_i32(3);
        let four = f.const_i32(4);
        let add = add_inst(&mut f, b, Op::Binary(BinaryOp::Add), vec![three, four]);

        assert_eq!(f.uses(three), &[UseRef { user: add, slot: 0 }]);
        assert_eq!(f.uses(four), &[UseRef { user: add, slot: 1 }]);

        let five = f.const_i32(5);
        f.set_operand(add, 1, five);
        assert!(f.uses(four).is_empty());
        assert_eq!(f.uses(five), &[UseRef { user: add, slot: 1 }]);
    }

    #[test]
    fn test_constants_are_interned() {
        let mut f = Function::new("t");
        assert_eq!(f.const_i32(7), f.const_i32(7));
        assert_ne!(f.const_i32(7), f.const_i64(7));
        assert_eq!(f.const_str("a"), f.const_str("a"));
    }

    #[test]
    fn test_replace_all_uses_with_empties_use_list() {
        let mut f = Function::new("t");
        let b = f.create_block();
        let one = f.const_i32(1);
        let copy = add_inst(&mut f, b, Op::Copy, vec![one]);
        let a1 = add_inst(&mut f, b, Op::Binary(BinaryOp::Add), vec![copy, copy]);
        let a2 = add_inst(&mut f, b, Op::Binary(BinaryOp::Add), vec![copy, one]);

        let two = f.const_i32(2);
        f.replace_all_uses_with(copy, two);

        assert!(f.uses(copy).is_empty());
        assert_eq!(f.operands(a1), &[two, two]);
        assert_eq!(f.operands(a2), &[two, one]);
        assert_eq!(f.uses(two).len(), 3);
    }

    #[test]
    fn test_terminator_wires_edges() {
        let mut f = Function::new("t");
        let b0 = f.create_block();
        let b1 = f.create_block();
        let b2 = f.create_block();
        let cond = f.const_bool(true);
        let br = f.create_inst(
            Op::BrCond {
                then_dest: b1,
                else_dest: b2,
            },
            vec![cond],
            IrType::Void,
        );
        f.append(b0, br);

        assert_eq!(f.succs(b0), &[b1, b2]);
        assert_eq!(f.preds(b1), &[b0]);
        assert_eq!(f.preds(b2), &[b0]);

        f.remove_from_block(br);
        assert!(f.succs(b0).is_empty());
        assert!(f.preds(b1).is_empty());
    }

    #[test]
    #[should_panic(expected = "already has a terminator")]
    fn test_second_terminator_panics() {
        let mut f = Function::new("t");
        let b = f.create_block();
        let r1 = f.create_inst(Op::RetVoid, vec![], IrType::Void);
        f.append(b, r1);
        let r2 = f.create_inst(Op::RetVoid, vec![], IrType::Void);
        f.append(b, r2);
    }

    #[test]
    #[should_panic(expected = "already inserted")]
    fn test_double_insert_panics() {
        let mut f = Function::new("t");
        let b = f.create_block();
        let v = f.create_inst(Op::Nop, vec![], IrType::Void);
        f.append(b, v);
        f.append(b, v);
    }

    #[test]
    #[should_panic(expected = "not inserted in any block")]
    fn test_foreign_remove_panics() {
        let mut f = Function::new("t");
        let _b = f.create_block();
        let v = f.create_inst(Op::Nop, vec![], IrType::Void);
        f.remove_from_block(v);
    }

    #[test]
    fn test_phi_incoming_tracking() {
        let mut f = Function::new("t");
        let b0 = f.create_block();
        let b1 = f.create_block();
        let b2 = f.create_block();
        let join = f.create_block();

        for b in [b1, b2] {
            let br = f.create_inst(Op::Br { target: join }, vec![], IrType::Void);
            f.append(b, br);
        }
        let _ = b0;

        let phi = f.create_phi(join, IrType::Any);
        let one = f.const_i32(1);
        let two = f.const_i32(2);
        f.add_incoming(phi, one, b1);
        f.add_incoming(phi, two, b2);

        assert_eq!(f.phi_value_for_block(phi, b1), Some(one));
        assert_eq!(f.phi_value_for_block(phi, b2), Some(two));
        assert_eq!(f.phi_incoming_block(phi, 1), b2);

        let removed = f.phi_remove_incoming_for(phi, b1);
        assert_eq!(removed, Some(one));
        assert!(f.uses(one).is_empty());
        // Slot of the surviving operand shifted down and stays coherent.
        assert_eq!(f.uses(two), &[UseRef { user: phi, slot: 0 }]);
    }

    #[test]
    fn test_phis_stay_prefix() {
        let mut f = Function::new("t");
        let pred = f.create_block();
        let b = f.create_block();
        let br = f.create_inst(Op::Br { target: b }, vec![], IrType::Void);
        f.append(pred, br);

        let nop = f.create_inst(Op::Nop, vec![], IrType::Void);
        f.append(b, nop);
        let phi = f.create_phi(b, IrType::Any);
        let one = f.const_i32(1);
        f.add_incoming(phi, one, pred);
        assert_eq!(f.insts_of(b), &[phi, nop]);
        assert_eq!(f.first_non_phi(b), 1);
    }

    #[test]
    fn test_split_block_moves_tail_and_rewires() {
        let mut f = Function::new("t");
        let b = f.create_block();
        let exit = f.create_block();
        let one = f.const_i32(1);
        let c1 = add_inst(&mut f, b, Op::Copy, vec![one]);
        let c2 = add_inst(&mut f, b, Op::Copy, vec![c1]);
        let br = f.create_inst(Op::Br { target: exit }, vec![], IrType::Void);
        f.append(b, br);

        let nb = f.split_block(b, 1);
        assert_eq!(f.insts_of(b).len(), 2); // c1 + new br
        assert_eq!(f.insts_of(nb), &[c2, br]);
        assert_eq!(f.block_of(c2), Some(nb));
        assert_eq!(f.succs(b), &[nb]);
        assert_eq!(f.preds(exit), &[nb]);
        assert!(f.verify().is_empty());
    }

    #[test]
    fn test_verify_reports_unterminated_block() {
        let mut f = Function::new("t");
        let b = f.create_block();
        let v = f.create_inst(Op::Nop, vec![], IrType::Void);
        f.append(b, v);
        let findings = f.verify();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("not terminated"));
    }

    #[test]
    fn test_erase_requires_empty_uses() {
        let mut f = Function::new("t");
        let b = f.create_block();
        let one = f.const_i32(1);
        let c = add_inst(&mut f, b, Op::Copy, vec![one]);
        let user = add_inst(&mut f, b, Op::Copy, vec![c]);

        f.drop_operands(user);
        f.erase(user);
        assert!(f.is_removed(user));
        f.erase(c);
        assert!(f.uses(one).is_empty());
    }
}
