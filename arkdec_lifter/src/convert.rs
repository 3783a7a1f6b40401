//! Method-body conversion driver
//!
//! Drives the decoder and flow analyzer, then lowers the instruction
//! stream into SSA form block by block. The accumulator and the virtual
//! registers live in a [`RegisterMap`]; every accumulator write is
//! wrapped in an explicit `copy` so later passes can observe the value
//! traffic. Conversion never panics on malformed input: decode problems
//! and per-instruction failures end up as diagnostics on the
//! [`ConversionResult`].

use crate::regmap::{RegisterMap, ACC};
use crate::result::{ConversionResult, MethodRequest};
use arkdec_bytecode::{
    AluOp, CallRuntimeOpcode, CondOp, Decoder, DeprecatedOpcode, FlowGraph, Inst, InstKind,
    Lowering, Opcode, Operand, ThrowOpcode, UnaryAlu, WideOpcode,
};
use arkdec_common::DiagnosticBag;
use arkdec_ir::{
    BinaryOp, BlockId, CmpOp, Function, IrType, Module, Op, SpecialConst, UnaryOp, ValueId,
};
use std::collections::BTreeMap;

/// Synthetic global-symbol id of `globalThis`
const GLOBAL_THIS: u32 = u32::MAX;

/// Convert one method body into an SSA function registered in `module`.
///
/// Never fails as a call: decode errors, per-instruction conversion
/// failures and verifier findings are reported on the result, and the
/// module always ends up with a structurally sound function under the
/// requested name.
pub fn convert(module: &mut Module, request: &MethodRequest<'_>) -> ConversionResult {
    log::debug!(
        "converting method {} ({} bytes, {} params, {} vregs, {} args)",
        request.name,
        request.bytes.len(),
        request.param_count,
        request.num_vregs,
        request.num_args
    );
    let strings = module.numeric_string_ids();
    let mut converter = FunctionConverter::new(request, strings);
    converter.run(request);
    converter.finish(module)
}

struct FunctionConverter {
    func: Function,
    diags: DiagnosticBag,
    regs: RegisterMap,
    blocks: BTreeMap<usize, BlockId>,
    flow: FlowGraph,
    cur_block: BlockId,
    num_vregs: u32,
    /// Snapshot of the module's bytecode string table
    strings: hashbrown::HashMap<u16, String>,
}

impl FunctionConverter {
    fn new(request: &MethodRequest<'_>, strings: Vec<(u16, String)>) -> Self {
        let mut func = Function::new(request.name.clone());
        for _ in 0..request.num_args {
            func.add_arg(IrType::Any);
        }
        let entry = func.create_block();
        Self {
            func,
            diags: DiagnosticBag::new(),
            regs: RegisterMap::new(),
            blocks: BTreeMap::new(),
            flow: FlowGraph::default(),
            cur_block: entry,
            num_vregs: request.num_vregs,
            strings: strings.into_iter().collect(),
        }
    }

    fn run(&mut self, request: &MethodRequest<'_>) {
        let insts = Decoder::decode_all(request.bytes);

        if insts.is_empty() {
            if !request.bytes.is_empty() {
                self.diags
                    .error("bytecode could not be decoded; emitting an empty function");
            }
            self.seed_arguments(request);
            return;
        }

        let consumed: usize = insts.iter().map(Inst::size).sum();
        if consumed < request.bytes.len() {
            self.diags.warning_at(
                format!(
                    "bytecode truncated: {} of {} bytes decoded",
                    consumed,
                    request.bytes.len()
                ),
                consumed,
            );
        }

        self.flow = FlowGraph::analyze(&insts);
        for &(from, target) in &self.flow.invalid_edges.clone() {
            self.diags
                .warning_at(format!("jump to invalid target {}", target), from);
        }

        // One pre-created block per boundary; the entry block created in
        // `new` doubles as the block for offset 0.
        let mut first = true;
        for start in self.flow.block_starts().collect::<Vec<_>>() {
            let block = if first {
                first = false;
                self.cur_block
            } else {
                self.func.create_block()
            };
            self.blocks.insert(start, block);
        }

        self.seed_arguments(request);

        for inst in &insts {
            if let Some(&b) = self.blocks.get(&inst.offset) {
                self.cur_block = b;
            }
            if self.func.is_terminated(self.cur_block) {
                // Stray bytes between a terminator and the next leader;
                // nothing can execute here.
                continue;
            }
            if let Err(message) = self.convert_inst(inst) {
                self.diags.error_at(message, inst.offset);
            }
        }
    }

    /// Register the argument registers: parameters occupy the tail of the
    /// frame, starting at `numVRegs + numArgs - paramCount`; with no
    /// frame registers everything starts at register 0.
    fn seed_arguments(&mut self, request: &MethodRequest<'_>) {
        let entry = self.blocks.get(&0).copied().unwrap_or(self.cur_block);
        let base = self.num_vregs;
        for i in 0..request.num_args {
            let arg = self.func.args().get(i as usize).copied();
            if let Some(arg) = arg {
                self.regs.write(base + i, entry, arg);
            }
        }
    }

    fn finish(mut self, module: &mut Module) -> ConversionResult {
        // Any block without a terminator falls through to its first flow
        // successor, or returns.
        let starts: Vec<(usize, BlockId)> = self.blocks.iter().map(|(&o, &b)| (o, b)).collect();
        for &(start, block) in &starts {
            if self.func.is_terminated(block) {
                continue;
            }
            let succ = self
                .flow
                .successors_of(start)
                .first()
                .and_then(|s| self.blocks.get(s).copied());
            let term = match succ {
                Some(target) => self.func.create_inst(Op::Br { target }, vec![], IrType::Void),
                None => self.func.create_inst(Op::RetVoid, vec![], IrType::Void),
            };
            self.func.append(block, term);
        }
        if self.blocks.is_empty() && !self.func.is_terminated(self.cur_block) {
            let term = self.func.create_inst(Op::RetVoid, vec![], IrType::Void);
            self.func.append(self.cur_block, term);
        }

        // Seal in ascending id order, completing every pending φ.
        for block in self.func.block_order().to_vec() {
            self.regs.seal(&mut self.func, block);
        }

        for finding in self.func.verify() {
            self.diags.warning(format!("verifier: {}", finding));
        }

        let name = self.func.name.clone();
        log::debug!(
            "converted {}: {} blocks, {} diagnostics",
            name,
            self.func.block_order().len(),
            self.diags.len()
        );
        module.add_function(self.func);
        ConversionResult {
            function_name: name,
            diagnostics: self.diags,
        }
    }

    // ---- value plumbing -------------------------------------------------

    fn emit(&mut self, op: Op, operands: Vec<ValueId>, ty: IrType) -> ValueId {
        let v = self.func.create_inst(op, operands, ty);
        self.func.append(self.cur_block, v);
        v
    }

    fn read_reg(&mut self, reg: u32) -> ValueId {
        self.regs.read(&mut self.func, reg, self.cur_block)
    }

    fn write_reg(&mut self, reg: u32, value: ValueId) {
        self.regs.write(reg, self.cur_block, value);
    }

    fn read_acc(&mut self) -> ValueId {
        self.regs.read(&mut self.func, ACC, self.cur_block)
    }

    /// Every accumulator write goes through an explicit `copy`; the copy
    /// is the canonical handle later passes look for.
    fn write_acc(&mut self, value: ValueId) {
        let ty = self.func.ty(value);
        let copy = self.emit(Op::Copy, vec![value], ty);
        self.regs.write(ACC, self.cur_block, copy);
    }

    // ---- operand accessors ----------------------------------------------

    fn reg_operand(&self, inst: &Inst, index: usize) -> Result<u32, String> {
        inst.operands
            .get(index)
            .and_then(Operand::as_reg)
            .map(u32::from)
            .ok_or_else(|| format!("{}: missing register operand {}", inst.kind.mnemonic(), index))
    }

    fn imm_operand(&self, inst: &Inst, index: usize) -> Result<u64, String> {
        inst.operands
            .get(index)
            .and_then(Operand::as_imm)
            .ok_or_else(|| format!("{}: missing immediate operand {}", inst.kind.mnemonic(), index))
    }

    fn string_operand(&self, inst: &Inst) -> Result<String, String> {
        let id = inst
            .operands
            .iter()
            .find_map(Operand::as_string_id)
            .ok_or_else(|| format!("{}: missing string operand", inst.kind.mnemonic()))?;
        Ok(self
            .strings
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("str_{}", id)))
    }

    fn method_operand(&self, inst: &Inst) -> Result<u16, String> {
        inst.operands
            .iter()
            .find_map(Operand::as_method_id)
            .ok_or_else(|| format!("{}: missing method operand", inst.kind.mnemonic()))
    }

    fn literal_operand(&self, inst: &Inst) -> Result<u16, String> {
        inst.operands
            .iter()
            .find_map(Operand::as_literal_id)
            .ok_or_else(|| format!("{}: missing literal-array operand", inst.kind.mnemonic()))
    }

    /// First register operand, wherever the format put it
    fn first_reg(&self, inst: &Inst) -> Result<u32, String> {
        inst.operands
            .iter()
            .find_map(Operand::as_reg)
            .map(u32::from)
            .ok_or_else(|| format!("{}: missing register operand", inst.kind.mnemonic()))
    }

    fn jump_block(&self, inst: &Inst) -> Result<BlockId, String> {
        let target = inst
            .jump_target()
            .ok_or_else(|| format!("{}: missing jump displacement", inst.kind.mnemonic()))?;
        usize::try_from(target)
            .ok()
            .and_then(|t| self.blocks.get(&t).copied())
            .ok_or_else(|| format!("{}: jump target {} has no block", inst.kind.mnemonic(), target))
    }

    fn fallthrough_block(&self, inst: &Inst) -> Result<BlockId, String> {
        self.blocks
            .get(&inst.end_offset())
            .copied()
            .ok_or_else(|| {
                format!(
                    "{}: fall-through offset {} has no block",
                    inst.kind.mnemonic(),
                    inst.end_offset()
                )
            })
    }

    // ---- dispatch -------------------------------------------------------

    fn convert_inst(&mut self, inst: &Inst) -> Result<(), String> {
        log::trace!("lowering {} at offset {}", inst.kind.mnemonic(), inst.offset);
        match inst.kind {
            InstKind::Std(op) => self.convert_std(op, inst),
            InstKind::Wide(op) => self.convert_wide(op, inst),
            InstKind::Deprecated(op) => self.convert_deprecated(op, inst),
            InstKind::Throw(op) => self.convert_throw(op, inst),
            InstKind::CallRuntime(op) => self.convert_callruntime(op, inst),
            InstKind::Unknown { prefix, byte } => {
                self.diags.warning_at(
                    format!("unknown {} opcode 0x{:02x} treated as no-op", prefix, byte),
                    inst.offset,
                );
                Ok(())
            }
        }
    }

    fn lower_binary(&mut self, alu: AluOp, rhs_reg: u32) {
        let rhs = self.read_reg(rhs_reg);
        let lhs = self.read_acc();
        let op = map_alu(alu);
        let v = self.emit(Op::Binary(op), vec![lhs, rhs], IrType::Any);
        self.write_acc(v);
    }

    /// Comparisons are emitted `reg OP acc` for ordering predicates so
    /// that loop bounds read in source order; equality keeps the
    /// accumulator on the left.
    fn lower_compare(&mut self, cond: CondOp, reg: u32) {
        let reg_val = self.read_reg(reg);
        let acc = self.read_acc();
        let (lhs, rhs) = if cond.is_ordering() {
            (reg_val, acc)
        } else {
            (acc, reg_val)
        };
        let v = self.emit(Op::Cmp(map_cond(cond)), vec![lhs, rhs], IrType::Bool);
        self.write_acc(v);
    }

    fn lower_unary(&mut self, unary: UnaryAlu) {
        let operand = self.read_acc();
        let op = map_unary(unary);
        let ty = match op {
            UnaryOp::IsTrue | UnaryOp::IsFalse | UnaryOp::Not => IrType::Bool,
            UnaryOp::TypeOf => IrType::Str,
            _ => IrType::Any,
        };
        let v = self.emit(Op::Unary(op), vec![operand], ty);
        self.write_acc(v);
    }

    fn lower_cond_jump(&mut self, inst: &Inst, pred: CmpOp) -> Result<(), String> {
        let then_dest = self.jump_block(inst)?;
        let else_dest = self.fallthrough_block(inst)?;
        let acc = self.read_acc();
        let zero = self.func.const_i32(0);
        let boxed = self.emit(Op::Copy, vec![zero], IrType::I32);
        let cond = self.emit(Op::Cmp(pred), vec![acc, boxed], IrType::Bool);
        self.emit(
            Op::BrCond {
                then_dest,
                else_dest,
            },
            vec![cond],
            IrType::Void,
        );
        Ok(())
    }

    /// Contiguous register window `base .. base+len`
    fn read_window(&mut self, base: u32, len: u32) -> Vec<ValueId> {
        (0..len).map(|i| self.read_reg(base + i)).collect()
    }

    fn convert_std(&mut self, op: Opcode, inst: &Inst) -> Result<(), String> {
        match op.lowering() {
            Lowering::Binary(alu) => {
                let reg = self.first_reg(inst)?;
                self.lower_binary(alu, reg);
                return Ok(());
            }
            Lowering::Compare(cond) => {
                let reg = self.first_reg(inst)?;
                self.lower_compare(cond, reg);
                return Ok(());
            }
            Lowering::Unary(unary) => {
                self.lower_unary(unary);
                return Ok(());
            }
            Lowering::None => {}
        }

        match op {
            Opcode::LdUndefined => {
                let v = self.func.const_special(SpecialConst::Undefined);
                self.write_acc(v);
            }
            Opcode::LdNull => {
                let v = self.func.const_special(SpecialConst::Null);
                self.write_acc(v);
            }
            Opcode::LdTrue => {
                let v = self.func.const_bool(true);
                self.write_acc(v);
            }
            Opcode::LdFalse => {
                let v = self.func.const_bool(false);
                self.write_acc(v);
            }
            Opcode::LdNan => {
                let v = self.func.const_special(SpecialConst::NaN);
                self.write_acc(v);
            }
            Opcode::LdInfinity => {
                let v = self.func.const_special(SpecialConst::PosInf);
                self.write_acc(v);
            }
            Opcode::LdHole => {
                let v = self.func.const_special(SpecialConst::Hole);
                self.write_acc(v);
            }
            Opcode::Ldai => {
                let imm = self.imm_operand(inst, 0)? as u32;
                let v = self.func.const_i32(imm as i32);
                self.write_acc(v);
            }
            Opcode::Fldai => {
                let bits = self.imm_operand(inst, 0)?;
                let v = self.func.const_f64(f64::from_bits(bits));
                self.write_acc(v);
            }
            Opcode::Lda => {
                let reg = self.first_reg(inst)?;
                let v = self.read_reg(reg);
                self.write_acc(v);
            }
            Opcode::Sta => {
                let reg = self.first_reg(inst)?;
                let v = self.read_acc();
                self.write_reg(reg, v);
            }
            Opcode::Mov => {
                let dst = self.reg_operand(inst, 0)?;
                let src = self.reg_operand(inst, 1)?;
                let v = self.read_reg(src);
                self.write_reg(dst, v);
            }
            Opcode::LdaStr => {
                let text = self.string_operand(inst)?;
                let v = self.func.const_str(text);
                self.write_acc(v);
            }
            Opcode::LdGlobal => {
                let v = self
                    .func
                    .global_value(GLOBAL_THIS, Some("globalThis".to_string()), true);
                self.write_acc(v);
            }

            Opcode::Jmp | Opcode::Jmp16 | Opcode::Jmp32 => {
                let target = self.jump_block(inst)?;
                self.emit(Op::Br { target }, vec![], IrType::Void);
            }
            Opcode::Jeqz | Opcode::Jeqz16 | Opcode::Jeqz32 => {
                self.lower_cond_jump(inst, CmpOp::Eq)?;
            }
            Opcode::Jnez | Opcode::Jnez16 | Opcode::Jnez32 => {
                self.lower_cond_jump(inst, CmpOp::Ne)?;
            }

            Opcode::Return => {
                let v = self.read_acc();
                self.emit(Op::Ret, vec![v], IrType::Void);
            }
            Opcode::ReturnUndefined => {
                self.emit(Op::RetVoid, vec![], IrType::Void);
            }

            Opcode::CreateEmptyObject => {
                let v = self.emit(Op::CreateObject, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::CreateEmptyArray => {
                let v = self.emit(Op::CreateArray, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::CreateArrayWithBuffer => {
                let literal = self.literal_operand(inst)?;
                let v = self.emit(Op::CreateArrayWithBuffer { literal }, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::CreateObjectWithBuffer => {
                let literal = self.literal_operand(inst)?;
                let v = self.emit(Op::CreateObjectWithBuffer { literal }, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::CreateRegExpWithLiteral => {
                let pattern = self.string_operand(inst)?;
                let flags = self.imm_operand(inst, 2).unwrap_or(0) as u8;
                let v = self.emit(Op::CreateRegExp { pattern, flags }, vec![], IrType::Any);
                self.write_acc(v);
            }

            Opcode::LdObjByName => {
                let name = self.string_operand(inst)?;
                let obj = self.read_acc();
                let key = self.func.const_str(name);
                let v = self.emit(Op::GetProperty, vec![obj, key], IrType::Any);
                self.write_acc(v);
            }
            Opcode::StObjByName => {
                let name = self.string_operand(inst)?;
                let reg = self.first_reg(inst)?;
                let obj = self.read_reg(reg);
                let key = self.func.const_str(name);
                let value = self.read_acc();
                self.emit(Op::SetProperty, vec![obj, key, value], IrType::Void);
            }
            Opcode::LdObjByValue => {
                let reg = self.first_reg(inst)?;
                let obj = self.read_reg(reg);
                let key = self.read_acc();
                let v = self.emit(Op::GetElement, vec![obj, key], IrType::Any);
                self.write_acc(v);
            }
            Opcode::StObjByValue => {
                let obj_reg = self.reg_operand(inst, 1)?;
                let key_reg = self.reg_operand(inst, 2)?;
                let obj = self.read_reg(obj_reg);
                let key = self.read_reg(key_reg);
                let value = self.read_acc();
                self.emit(Op::SetElement, vec![obj, key, value], IrType::Void);
            }
            Opcode::DelObjProp => {
                let reg = self.first_reg(inst)?;
                let obj = self.read_reg(reg);
                let key = self.read_acc();
                let v = self.emit(Op::DeleteProperty, vec![obj, key], IrType::Bool);
                self.write_acc(v);
            }

            Opcode::TryLdGlobalByName => {
                let name = self.string_operand(inst)?;
                let v = self.emit(Op::TryLoadGlobal { name }, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::TryStGlobalByName => {
                let name = self.string_operand(inst)?;
                let value = self.read_acc();
                self.emit(Op::TryStoreGlobal { name }, vec![value], IrType::Void);
            }
            Opcode::LdGlobalVar => {
                let name = self.string_operand(inst)?;
                let v = self.emit(Op::LoadGlobal { name }, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::StGlobalVar => {
                let name = self.string_operand(inst)?;
                let value = self.read_acc();
                self.emit(Op::StoreGlobal { name }, vec![value], IrType::Void);
            }

            Opcode::CallArg0 => {
                let callee = self.read_acc();
                let v = self.emit(Op::Call, vec![callee], IrType::Any);
                self.write_acc(v);
            }
            Opcode::CallArg1 => {
                let reg = self.first_reg(inst)?;
                let arg = self.read_reg(reg);
                let callee = self.read_acc();
                let v = self.emit(Op::Call, vec![callee, arg], IrType::Any);
                self.write_acc(v);
            }
            Opcode::CallArgs2 => {
                let a = self.reg_operand(inst, 1)?;
                let b = self.reg_operand(inst, 2)?;
                let args = [self.read_reg(a), self.read_reg(b)];
                let callee = self.read_acc();
                let mut operands = vec![callee];
                operands.extend(args);
                let v = self.emit(Op::Call, operands, IrType::Any);
                self.write_acc(v);
            }
            Opcode::CallArgs3 => {
                let a = self.reg_operand(inst, 1)?;
                let b = self.reg_operand(inst, 2)?;
                let c = self.reg_operand(inst, 3)?;
                let args = [self.read_reg(a), self.read_reg(b), self.read_reg(c)];
                let callee = self.read_acc();
                let mut operands = vec![callee];
                operands.extend(args);
                let v = self.emit(Op::Call, operands, IrType::Any);
                self.write_acc(v);
            }
            Opcode::CallRange => {
                let argc = self.imm_operand(inst, 1)? as u32;
                let base = self.reg_operand(inst, 2)?;
                self.lower_call_range(argc, base);
            }
            Opcode::CallThis0 => {
                let this_reg = self.first_reg(inst)?;
                let this = self.read_reg(this_reg);
                let callee = self.read_acc();
                let v = self.emit(Op::CallThis, vec![callee, this], IrType::Any);
                self.write_acc(v);
            }
            Opcode::CallThis1 => {
                let this_reg = self.reg_operand(inst, 1)?;
                let arg_reg = self.reg_operand(inst, 2)?;
                let this = self.read_reg(this_reg);
                let arg = self.read_reg(arg_reg);
                let callee = self.read_acc();
                let v = self.emit(Op::CallThis, vec![callee, this, arg], IrType::Any);
                self.write_acc(v);
            }
            Opcode::CallThis2 => {
                let this_reg = self.reg_operand(inst, 1)?;
                let a = self.reg_operand(inst, 2)?;
                let b = self.reg_operand(inst, 3)?;
                let this = self.read_reg(this_reg);
                let args = [self.read_reg(a), self.read_reg(b)];
                let callee = self.read_acc();
                let mut operands = vec![callee, this];
                operands.extend(args);
                let v = self.emit(Op::CallThis, operands, IrType::Any);
                self.write_acc(v);
            }
            Opcode::CallThis3 => {
                let this_reg = self.reg_operand(inst, 1)?;
                let a = self.reg_operand(inst, 2)?;
                let b = self.reg_operand(inst, 3)?;
                let c = self.reg_operand(inst, 4)?;
                let this = self.read_reg(this_reg);
                let args = [self.read_reg(a), self.read_reg(b), self.read_reg(c)];
                let callee = self.read_acc();
                let mut operands = vec![callee, this];
                operands.extend(args);
                let v = self.emit(Op::CallThis, operands, IrType::Any);
                self.write_acc(v);
            }
            Opcode::CallThisRange => {
                let argc = self.imm_operand(inst, 1)? as u32;
                let base = self.reg_operand(inst, 2)?;
                self.lower_call_this_range(argc, base);
            }
            Opcode::NewObjRange => {
                let argc = self.imm_operand(inst, 1)? as u32;
                let base = self.reg_operand(inst, 2)?;
                self.lower_new_range(argc, base);
            }
            Opcode::SuperCallThisRange => {
                let argc = self.imm_operand(inst, 1)? as u32;
                let base = self.reg_operand(inst, 2)?;
                let args = self.read_window(base, argc);
                let v = self.emit(Op::CallSuper, args, IrType::Any);
                self.write_acc(v);
            }
            Opcode::Apply => {
                let this_reg = self.reg_operand(inst, 1)?;
                let args_reg = self.reg_operand(inst, 2)?;
                let this = self.read_reg(this_reg);
                let args = self.read_reg(args_reg);
                let callee = self.read_acc();
                let v = self.emit(Op::Apply, vec![callee, this, args], IrType::Any);
                self.write_acc(v);
            }

            Opcode::NewLexEnv => {
                let slots = self.imm_operand(inst, 0)? as u16;
                let v = self.emit(Op::NewLexEnv { slots }, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::PopLexEnv => {
                self.emit(Op::PopLexEnv, vec![], IrType::Void);
            }
            Opcode::LdLexVar => {
                let level = self.imm_operand(inst, 0)? as u16;
                let slot = self.imm_operand(inst, 1)? as u16;
                let v = self.emit(Op::LoadLexVar { level, slot }, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::StLexVar => {
                let level = self.imm_operand(inst, 0)? as u16;
                let slot = self.imm_operand(inst, 1)? as u16;
                let value = self.read_acc();
                self.emit(Op::StoreLexVar { level, slot }, vec![value], IrType::Void);
            }

            Opcode::LdExternalModuleVar => {
                let index = self.imm_operand(inst, 0)? as u32;
                let v = self.emit(Op::LoadModuleVar { index }, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::StModuleVar => {
                let index = self.imm_operand(inst, 0)? as u32;
                let value = self.read_acc();
                self.emit(Op::StoreModuleVar { index }, vec![value], IrType::Void);
            }
            Opcode::GetModuleNamespace => {
                let index = self.imm_operand(inst, 0)? as u32;
                let v = self.emit(Op::GetModuleNamespace { index }, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::DynamicImport => {
                let specifier = self.read_acc();
                let v = self.emit(Op::DynamicImport, vec![specifier], IrType::Any);
                self.write_acc(v);
            }

            Opcode::CreateGeneratorObj => {
                let reg = self.first_reg(inst)?;
                let func_obj = self.read_reg(reg);
                let v = self.emit(Op::CreateGenerator, vec![func_obj], IrType::Any);
                self.write_acc(v);
            }
            Opcode::ResumeGenerator => {
                let gen = self.read_acc();
                let v = self.emit(Op::ResumeGenerator, vec![gen], IrType::Any);
                self.write_acc(v);
            }
            Opcode::GetResumeMode => {
                let gen = self.read_acc();
                let v = self.emit(Op::GetResumeMode, vec![gen], IrType::Any);
                self.write_acc(v);
            }
            Opcode::SuspendGenerator => {
                let reg = self.first_reg(inst)?;
                let gen = self.read_reg(reg);
                let value = self.read_acc();
                let v = self.emit(Op::SuspendGenerator, vec![gen, value], IrType::Any);
                self.write_acc(v);
            }
            Opcode::AsyncFunctionEnter => {
                let v = self.emit(Op::AsyncFunctionEnter, vec![], IrType::Any);
                self.write_acc(v);
            }
            Opcode::AsyncFunctionResolve => {
                let reg = self.first_reg(inst)?;
                let obj = self.read_reg(reg);
                let value = self.read_acc();
                let v = self.emit(Op::AsyncFunctionResolve, vec![obj, value], IrType::Any);
                self.write_acc(v);
            }
            Opcode::AsyncFunctionReject => {
                let reg = self.first_reg(inst)?;
                let obj = self.read_reg(reg);
                let reason = self.read_acc();
                let v = self.emit(Op::AsyncFunctionReject, vec![obj, reason], IrType::Any);
                self.write_acc(v);
            }

            Opcode::DefineFunc => {
                let method = self.method_operand(inst)?;
                let param_count = self.imm_operand(inst, 2)? as u8;
                let v = self.emit(
                    Op::CreateClosure {
                        method,
                        param_count,
                    },
                    vec![],
                    IrType::Any,
                );
                self.write_acc(v);
            }
            Opcode::DefineClassWithBuffer => {
                let method = self.method_operand(inst)?;
                let literal = self.literal_operand(inst)?;
                let form_count = self.imm_operand(inst, 3)? as u16;
                let parent_reg = self.reg_operand(inst, 4)?;
                let parent = self.read_reg(parent_reg);
                let v = self.emit(
                    Op::CreateClass {
                        method,
                        literal,
                        form_count,
                    },
                    vec![parent],
                    IrType::Any,
                );
                self.write_acc(v);
            }

            Opcode::Nop => {}
            Opcode::Debugger => {
                self.emit(Op::Debugger, vec![], IrType::Void);
            }

            // Table-driven cases were handled above.
            _ => {
                return Err(format!(
                    "no lowering for standard opcode {}",
                    op.mnemonic()
                ))
            }
        }
        Ok(())
    }

    fn lower_call_range(&mut self, argc: u32, base: u32) {
        let args = self.read_window(base, argc);
        let callee = self.read_acc();
        let mut operands = vec![callee];
        operands.extend(args);
        let v = self.emit(Op::Call, operands, IrType::Any);
        self.write_acc(v);
    }

    fn lower_call_this_range(&mut self, argc: u32, base: u32) {
        let this = self.read_reg(base);
        let args = self.read_window(base + 1, argc);
        let callee = self.read_acc();
        let mut operands = vec![callee, this];
        operands.extend(args);
        let v = self.emit(Op::CallThis, operands, IrType::Any);
        self.write_acc(v);
    }

    /// The window covers constructor plus arguments
    fn lower_new_range(&mut self, argc: u32, base: u32) {
        let ctor = self.read_reg(base);
        let args = self.read_window(base + 1, argc.saturating_sub(1));
        let mut operands = vec![ctor];
        operands.extend(args);
        let v = self.emit(Op::New, operands, IrType::Any);
        self.write_acc(v);
    }

    fn convert_wide(&mut self, op: WideOpcode, inst: &Inst) -> Result<(), String> {
        match op {
            WideOpcode::Mov => {
                let dst = self.reg_operand(inst, 0)?;
                let src = self.reg_operand(inst, 1)?;
                let v = self.read_reg(src);
                self.write_reg(dst, v);
            }
            WideOpcode::Lda => {
                let reg = self.first_reg(inst)?;
                let v = self.read_reg(reg);
                self.write_acc(v);
            }
            WideOpcode::Sta => {
                let reg = self.first_reg(inst)?;
                let v = self.read_acc();
                self.write_reg(reg, v);
            }
            WideOpcode::CallRange => {
                let argc = self.imm_operand(inst, 0)? as u32;
                let base = self.reg_operand(inst, 1)?;
                self.lower_call_range(argc, base);
            }
            WideOpcode::CallThisRange => {
                let argc = self.imm_operand(inst, 0)? as u32;
                let base = self.reg_operand(inst, 1)?;
                self.lower_call_this_range(argc, base);
            }
            WideOpcode::NewObjRange => {
                let argc = self.imm_operand(inst, 0)? as u32;
                let base = self.reg_operand(inst, 1)?;
                self.lower_new_range(argc, base);
            }
            WideOpcode::NewLexEnv => {
                let slots = self.imm_operand(inst, 0)? as u16;
                let v = self.emit(Op::NewLexEnv { slots }, vec![], IrType::Any);
                self.write_acc(v);
            }
            WideOpcode::LdLexVar => {
                let level = self.imm_operand(inst, 0)? as u16;
                let slot = self.imm_operand(inst, 1)? as u16;
                let v = self.emit(Op::LoadLexVar { level, slot }, vec![], IrType::Any);
                self.write_acc(v);
            }
            WideOpcode::StLexVar => {
                let level = self.imm_operand(inst, 0)? as u16;
                let slot = self.imm_operand(inst, 1)? as u16;
                let value = self.read_acc();
                self.emit(Op::StoreLexVar { level, slot }, vec![value], IrType::Void);
            }
            WideOpcode::LdExternalModuleVar => {
                let index = self.imm_operand(inst, 0)? as u32;
                let v = self.emit(Op::LoadModuleVar { index }, vec![], IrType::Any);
                self.write_acc(v);
            }
            WideOpcode::StModuleVar => {
                let index = self.imm_operand(inst, 0)? as u32;
                let value = self.read_acc();
                self.emit(Op::StoreModuleVar { index }, vec![value], IrType::Void);
            }
            WideOpcode::GetModuleNamespace => {
                let index = self.imm_operand(inst, 0)? as u32;
                let v = self.emit(Op::GetModuleNamespace { index }, vec![], IrType::Any);
                self.write_acc(v);
            }
        }
        Ok(())
    }

    /// Deprecated encodings lower to their modern equivalents so old
    /// binaries decompile no differently from current ones.
    fn convert_deprecated(&mut self, op: DeprecatedOpcode, inst: &Inst) -> Result<(), String> {
        match op.lowering() {
            Lowering::Binary(alu) => {
                let reg = self.first_reg(inst)?;
                self.lower_binary(alu, reg);
                return Ok(());
            }
            Lowering::Unary(unary) => {
                self.lower_unary(unary);
                return Ok(());
            }
            Lowering::Compare(cond) => {
                let reg = self.first_reg(inst)?;
                self.lower_compare(cond, reg);
                return Ok(());
            }
            Lowering::None => {}
        }
        match op {
            DeprecatedOpcode::Lda => {
                let reg = self.first_reg(inst)?;
                let v = self.read_reg(reg);
                self.write_acc(v);
            }
            DeprecatedOpcode::Sta => {
                let reg = self.first_reg(inst)?;
                let v = self.read_acc();
                self.write_reg(reg, v);
            }
            DeprecatedOpcode::Ldai => {
                let imm = self.imm_operand(inst, 0)? as u32;
                let v = self.func.const_i32(imm as i32);
                self.write_acc(v);
            }
            DeprecatedOpcode::Fldai => {
                let bits = self.imm_operand(inst, 0)?;
                let v = self.func.const_f64(f64::from_bits(bits));
                self.write_acc(v);
            }
            DeprecatedOpcode::Return => {
                let v = self.read_acc();
                self.emit(Op::Ret, vec![v], IrType::Void);
            }
            _ => {
                return Err(format!(
                    "no lowering for deprecated opcode {}",
                    op.mnemonic()
                ))
            }
        }
        Ok(())
    }

    fn convert_throw(&mut self, op: ThrowOpcode, inst: &Inst) -> Result<(), String> {
        match op {
            ThrowOpcode::Throw => {
                let v = self.read_acc();
                self.emit(Op::Throw, vec![v], IrType::Void);
            }
            ThrowOpcode::NotExists
            | ThrowOpcode::PatternNonCoercible
            | ThrowOpcode::DeleteSuperProperty => {
                self.emit(
                    Op::CallRuntime {
                        intrinsic: op.mnemonic().to_string(),
                    },
                    vec![],
                    IrType::Void,
                );
                self.emit(Op::Unreachable, vec![], IrType::Void);
            }
            ThrowOpcode::ConstAssignment => {
                let reg = self.first_reg(inst)?;
                let name = self.read_reg(reg);
                self.emit(
                    Op::CallRuntime {
                        intrinsic: op.mnemonic().to_string(),
                    },
                    vec![name],
                    IrType::Void,
                );
                self.emit(Op::Unreachable, vec![], IrType::Void);
            }
            ThrowOpcode::IfNotObject => {
                let reg = self.first_reg(inst)?;
                let checked = self.read_reg(reg);
                self.emit(
                    Op::CallRuntime {
                        intrinsic: op.mnemonic().to_string(),
                    },
                    vec![checked],
                    IrType::Void,
                );
            }
            ThrowOpcode::UndefinedIfHole => {
                let a = self.reg_operand(inst, 0)?;
                let b = self.reg_operand(inst, 1)?;
                let checked = self.read_reg(a);
                let name = self.read_reg(b);
                self.emit(
                    Op::CallRuntime {
                        intrinsic: op.mnemonic().to_string(),
                    },
                    vec![checked, name],
                    IrType::Void,
                );
            }
            ThrowOpcode::IfSuperNotCorrectCall => {
                let kind = self.imm_operand(inst, 0)? as i64;
                let kind_const = self.func.const_i64(kind);
                let value = self.read_acc();
                self.emit(
                    Op::CallRuntime {
                        intrinsic: op.mnemonic().to_string(),
                    },
                    vec![value, kind_const],
                    IrType::Void,
                );
            }
            ThrowOpcode::UndefinedIfHoleWithName => {
                let name = self.string_operand(inst)?;
                let name_const = self.func.const_str(name);
                let checked = self.read_acc();
                self.emit(
                    Op::CallRuntime {
                        intrinsic: op.mnemonic().to_string(),
                    },
                    vec![checked, name_const],
                    IrType::Void,
                );
            }
        }
        Ok(())
    }

    fn convert_callruntime(&mut self, op: CallRuntimeOpcode, inst: &Inst) -> Result<(), String> {
        let intrinsic = op.mnemonic().to_string();
        match op {
            // The runtime truthiness intrinsics have exact unary
            // equivalents.
            CallRuntimeOpcode::IsTrue => self.lower_unary(UnaryAlu::IsTrue),
            CallRuntimeOpcode::IsFalse => self.lower_unary(UnaryAlu::IsFalse),
            CallRuntimeOpcode::ToPropertyKey => {
                let value = self.read_acc();
                let v = self.emit(Op::CallRuntime { intrinsic }, vec![value], IrType::Any);
                self.write_acc(v);
            }
            CallRuntimeOpcode::NotifyConcurrentResult => {
                let value = self.read_acc();
                self.emit(Op::CallRuntime { intrinsic }, vec![value], IrType::Void);
            }
            CallRuntimeOpcode::DefineFieldByValue => {
                let key_reg = self.reg_operand(inst, 1)?;
                let obj_reg = self.reg_operand(inst, 2)?;
                let key = self.read_reg(key_reg);
                let obj = self.read_reg(obj_reg);
                let value = self.read_acc();
                self.emit(
                    Op::CallRuntime { intrinsic },
                    vec![obj, key, value],
                    IrType::Void,
                );
            }
            CallRuntimeOpcode::CreatePrivateProperty => {
                self.emit(Op::CallRuntime { intrinsic }, vec![], IrType::Void);
            }
            CallRuntimeOpcode::DefinePrivateProperty => {
                let reg = self.first_reg(inst)?;
                let obj = self.read_reg(reg);
                let value = self.read_acc();
                self.emit(Op::CallRuntime { intrinsic }, vec![obj, value], IrType::Void);
            }
            CallRuntimeOpcode::CallInit => {
                let reg = self.first_reg(inst)?;
                let this = self.read_reg(reg);
                let callee = self.read_acc();
                let v = self.emit(Op::CallRuntime { intrinsic }, vec![callee, this], IrType::Any);
                self.write_acc(v);
            }
            CallRuntimeOpcode::DefineSendableClass => {
                let parent_reg = self.reg_operand(inst, 4)?;
                let parent = self.read_reg(parent_reg);
                let v = self.emit(Op::CallRuntime { intrinsic }, vec![parent], IrType::Any);
                self.write_acc(v);
            }
        }
        Ok(())
    }
}

fn map_alu(alu: AluOp) -> BinaryOp {
    match alu {
        AluOp::Add => BinaryOp::Add,
        AluOp::Sub => BinaryOp::Sub,
        AluOp::Mul => BinaryOp::Mul,
        AluOp::Div => BinaryOp::Div,
        AluOp::Mod => BinaryOp::Mod,
        AluOp::Exp => BinaryOp::Exp,
        AluOp::And => BinaryOp::And,
        AluOp::Or => BinaryOp::Or,
        AluOp::Xor => BinaryOp::Xor,
        AluOp::Shl => BinaryOp::Shl,
        AluOp::Shr => BinaryOp::Shr,
        AluOp::Ashr => BinaryOp::Ashr,
    }
}

fn map_cond(cond: CondOp) -> CmpOp {
    match cond {
        CondOp::Eq => CmpOp::Eq,
        CondOp::NotEq => CmpOp::Ne,
        CondOp::Less => CmpOp::Lt,
        CondOp::LessEq => CmpOp::Le,
        CondOp::Greater => CmpOp::Gt,
        CondOp::GreaterEq => CmpOp::Ge,
        CondOp::StrictEq => CmpOp::StrictEq,
        CondOp::StrictNotEq => CmpOp::StrictNe,
        CondOp::In => CmpOp::In,
        CondOp::InstanceOf => CmpOp::InstanceOf,
    }
}

fn map_unary(unary: UnaryAlu) -> UnaryOp {
    match unary {
        UnaryAlu::Neg => UnaryOp::Neg,
        UnaryAlu::BitNot => UnaryOp::BitNot,
        UnaryAlu::Inc => UnaryOp::Inc,
        UnaryAlu::Dec => UnaryOp::Dec,
        UnaryAlu::TypeOf => UnaryOp::TypeOf,
        UnaryAlu::ToNumber => UnaryOp::ToNumber,
        UnaryAlu::ToNumeric => UnaryOp::ToNumeric,
        UnaryAlu::IsTrue => UnaryOp::IsTrue,
        UnaryAlu::IsFalse => UnaryOp::IsFalse,
    }
}
