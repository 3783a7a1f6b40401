//! Opcode catalog for the ABC instruction set
//!
//! The instruction set is keyed by a single leading byte. Four reserved
//! byte values act as prefixes that switch the lookup into a secondary
//! namespace: wide re-encodings, deprecated legacy forms, throw intrinsics
//! and runtime intrinsics. Each namespace is a separate enum so that a
//! byte is only ever looked up against the table it belongs to.

use bitflags::bitflags;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix byte selecting the runtime-intrinsic namespace
pub const PREFIX_CALLRUNTIME: u8 = 0xfb;
/// Prefix byte selecting the deprecated namespace
pub const PREFIX_DEPRECATED: u8 = 0xfc;
/// Prefix byte selecting the wide (16-bit operand) namespace
pub const PREFIX_WIDE: u8 = 0xfd;
/// Prefix byte selecting the throw namespace
pub const PREFIX_THROW: u8 = 0xfe;

/// Operand layout of an opcode
///
/// Immediates are little-endian. `Jump*` layouts are signed displacements
/// relative to the start of the instruction; whether an immediate is a
/// displacement is decided by the opcode's [`OpFlags`], never by the byte
/// value alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandFormat {
    None,
    Imm8,
    Imm16,
    Imm32,
    Imm64,
    Reg8,
    Reg16,
    Reg8Reg8,
    Reg16Reg16,
    Imm8Reg8,
    Imm8Reg8Reg8,
    Imm8Reg8Reg8Reg8,
    Imm8Reg8Reg8Reg8Reg8,
    Imm8Imm8,
    Imm8Imm8Reg8,
    Imm16Imm16,
    Imm16Reg16,
    StrId16,
    Imm8StrId16,
    Imm16StrId16,
    Imm8StrId16Reg8,
    Imm8StrId16Imm8,
    Imm8MethodId16Imm8,
    Imm8LitId16,
    /// imm8 slot, method id16, literal id16, imm16 form count, reg8 parent
    ClassDef,
    Jump8,
    Jump16,
    Jump32,
}

bitflags! {
    /// Classification flags for an opcode
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpFlags: u8 {
        /// Ends its basic block unconditionally
        const TERMINATOR   = 0b0000_0001;
        /// Conditional branch with a fall-through edge
        const COND_JUMP    = 0b0000_0010;
        /// Unconditional branch
        const UNCOND_JUMP  = 0b0000_0100;
        /// May raise an exception at runtime
        const MAY_THROW    = 0b0000_1000;
        /// Observable side effect; never removable as dead code
        const SIDE_EFFECTS = 0b0001_0000;
    }
}

impl OpFlags {
    /// Any kind of jump, conditional or not
    pub fn is_jump(self) -> bool {
        self.intersects(OpFlags::COND_JUMP | OpFlags::UNCOND_JUMP)
    }

    /// Ends a basic block (return, throw or unconditional jump)
    pub fn ends_block(self) -> bool {
        self.intersects(OpFlags::TERMINATOR | OpFlags::UNCOND_JUMP)
    }
}

/// Arithmetic and bitwise operations the catalog can lower table-driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ashr,
}

/// Comparison operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CondOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    StrictEq,
    StrictNotEq,
    In,
    InstanceOf,
}

impl CondOp {
    /// Ordering comparisons get their operands swapped during lowering so
    /// high-level expressions come out in source order; equality kinds do
    /// not.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            CondOp::Less | CondOp::LessEq | CondOp::Greater | CondOp::GreaterEq
        )
    }
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryAlu {
    Neg,
    BitNot,
    Inc,
    Dec,
    TypeOf,
    ToNumber,
    ToNumeric,
    IsTrue,
    IsFalse,
}

/// Table-driven lowering hint for an opcode
///
/// Opcodes whose semantics are a plain accumulator-with-register ALU
/// operation carry their operation here; everything else answers
/// [`Lowering::None`] and is handled case by case in the lifter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lowering {
    None,
    Binary(AluOp),
    Compare(CondOp),
    Unary(UnaryAlu),
}

/// Standard-namespace opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// acc = undefined
    LdUndefined = 0x00,
    /// acc = null
    LdNull = 0x01,
    LdTrue = 0x02,
    LdFalse = 0x03,
    LdNan = 0x04,
    LdInfinity = 0x05,
    /// acc = the hole sentinel used for TDZ checks
    LdHole = 0x06,
    /// acc = signed 32-bit immediate
    Ldai = 0x07,
    /// acc = 64-bit float immediate
    Fldai = 0x08,
    /// acc = vN
    Lda = 0x09,
    /// vN = acc
    Sta = 0x0a,
    /// vA = vB
    Mov = 0x0b,
    /// acc = string constant
    LdaStr = 0x0c,
    /// acc = globalThis
    LdGlobal = 0x0d,

    // acc = acc OP vN; the leading imm8 is an inline-cache slot and is
    // ignored by the decompiler.
    Add2 = 0x10,
    Sub2 = 0x11,
    Mul2 = 0x12,
    Div2 = 0x13,
    Mod2 = 0x14,
    Exp = 0x15,
    And2 = 0x16,
    Or2 = 0x17,
    Xor2 = 0x18,
    Shl2 = 0x19,
    Shr2 = 0x1a,
    Ashr2 = 0x1b,

    // acc = acc CMP vN
    Eq = 0x20,
    NotEq = 0x21,
    Less = 0x22,
    LessEq = 0x23,
    Greater = 0x24,
    GreaterEq = 0x25,
    StrictEq = 0x26,
    StrictNotEq = 0x27,
    IsIn = 0x28,
    InstanceOf = 0x29,

    // Unary operations on the accumulator
    Neg = 0x30,
    /// Bitwise complement of acc
    Not = 0x31,
    Inc = 0x32,
    Dec = 0x33,
    TypeOf = 0x34,
    ToNumber = 0x35,
    ToNumeric = 0x36,
    IsTrue = 0x37,
    IsFalse = 0x38,

    // Jumps; displacements are signed and relative to the instruction start
    Jmp = 0x4d,
    Jmp16 = 0x4e,
    Jeqz = 0x4f,
    Jeqz16 = 0x50,
    Jnez = 0x51,
    Jnez16 = 0x52,
    Jmp32 = 0x53,
    Jeqz32 = 0x54,
    Jnez32 = 0x55,

    /// return acc
    Return = 0x60,
    /// return undefined
    ReturnUndefined = 0x61,

    CreateEmptyObject = 0x64,
    CreateEmptyArray = 0x65,
    CreateArrayWithBuffer = 0x66,
    CreateObjectWithBuffer = 0x67,
    CreateRegExpWithLiteral = 0x68,

    /// acc = acc.name
    LdObjByName = 0x70,
    /// vN.name = acc
    StObjByName = 0x71,
    /// acc = vN[acc]
    LdObjByValue = 0x72,
    /// vA[vB] = acc
    StObjByValue = 0x73,
    /// acc = delete vN[acc]
    DelObjProp = 0x74,

    TryLdGlobalByName = 0x75,
    TryStGlobalByName = 0x76,
    LdGlobalVar = 0x77,
    StGlobalVar = 0x78,

    // Calls; callee is the accumulator
    CallArg0 = 0x80,
    CallArg1 = 0x81,
    CallArgs2 = 0x82,
    CallArgs3 = 0x83,
    /// Contiguous register window: argc, base register
    CallRange = 0x84,
    CallThis0 = 0x85,
    CallThis1 = 0x86,
    CallThis2 = 0x87,
    CallThis3 = 0x88,
    /// Window: base = this, base+1.. = args
    CallThisRange = 0x89,
    /// Window: base = constructor, base+1.. = args
    NewObjRange = 0x8a,
    SuperCallThisRange = 0x8b,
    /// func = acc, this = vA, spread args = vB
    Apply = 0x8c,

    NewLexEnv = 0x90,
    PopLexEnv = 0x91,
    LdLexVar = 0x92,
    StLexVar = 0x93,

    LdExternalModuleVar = 0x94,
    StModuleVar = 0x95,
    GetModuleNamespace = 0x96,
    DynamicImport = 0x97,

    CreateGeneratorObj = 0xa0,
    ResumeGenerator = 0xa1,
    GetResumeMode = 0xa2,
    SuspendGenerator = 0xa3,
    AsyncFunctionEnter = 0xa4,
    AsyncFunctionResolve = 0xa5,
    AsyncFunctionReject = 0xa6,

    /// Create a closure over a method id
    DefineFunc = 0xb0,
    DefineClassWithBuffer = 0xb1,

    Nop = 0xbe,
    Debugger = 0xbf,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::LdUndefined => "ldundefined",
            Opcode::LdNull => "ldnull",
            Opcode::LdTrue => "ldtrue",
            Opcode::LdFalse => "ldfalse",
            Opcode::LdNan => "ldnan",
            Opcode::LdInfinity => "ldinfinity",
            Opcode::LdHole => "ldhole",
            Opcode::Ldai => "ldai",
            Opcode::Fldai => "fldai",
            Opcode::Lda => "lda",
            Opcode::Sta => "sta",
            Opcode::Mov => "mov",
            Opcode::LdaStr => "lda.str",
            Opcode::LdGlobal => "ldglobal",
            Opcode::Add2 => "add2",
            Opcode::Sub2 => "sub2",
            Opcode::Mul2 => "mul2",
            Opcode::Div2 => "div2",
            Opcode::Mod2 => "mod2",
            Opcode::Exp => "exp",
            Opcode::And2 => "and2",
            Opcode::Or2 => "or2",
            Opcode::Xor2 => "xor2",
            Opcode::Shl2 => "shl2",
            Opcode::Shr2 => "shr2",
            Opcode::Ashr2 => "ashr2",
            Opcode::Eq => "eq",
            Opcode::NotEq => "noteq",
            Opcode::Less => "less",
            Opcode::LessEq => "lesseq",
            Opcode::Greater => "greater",
            Opcode::GreaterEq => "greatereq",
            Opcode::StrictEq => "stricteq",
            Opcode::StrictNotEq => "strictnoteq",
            Opcode::IsIn => "isin",
            Opcode::InstanceOf => "instanceof",
            Opcode::Neg => "neg",
            Opcode::Not => "not",
            Opcode::Inc => "inc",
            Opcode::Dec => "dec",
            Opcode::TypeOf => "typeof",
            Opcode::ToNumber => "tonumber",
            Opcode::ToNumeric => "tonumeric",
            Opcode::IsTrue => "istrue",
            Opcode::IsFalse => "isfalse",
            Opcode::Jmp => "jmp",
            Opcode::Jmp16 => "jmp.16",
            Opcode::Jeqz => "jeqz",
            Opcode::Jeqz16 => "jeqz.16",
            Opcode::Jnez => "jnez",
            Opcode::Jnez16 => "jnez.16",
            Opcode::Jmp32 => "jmp.32",
            Opcode::Jeqz32 => "jeqz.32",
            Opcode::Jnez32 => "jnez.32",
            Opcode::Return => "return",
            Opcode::ReturnUndefined => "returnundefined",
            Opcode::CreateEmptyObject => "createemptyobject",
            Opcode::CreateEmptyArray => "createemptyarray",
            Opcode::CreateArrayWithBuffer => "createarraywithbuffer",
            Opcode::CreateObjectWithBuffer => "createobjectwithbuffer",
            Opcode::CreateRegExpWithLiteral => "createregexpwithliteral",
            Opcode::LdObjByName => "ldobjbyname",
            Opcode::StObjByName => "stobjbyname",
            Opcode::LdObjByValue => "ldobjbyvalue",
            Opcode::StObjByValue => "stobjbyvalue",
            Opcode::DelObjProp => "delobjprop",
            Opcode::TryLdGlobalByName => "tryldglobalbyname",
            Opcode::TryStGlobalByName => "trystglobalbyname",
            Opcode::LdGlobalVar => "ldglobalvar",
            Opcode::StGlobalVar => "stglobalvar",
            Opcode::CallArg0 => "callarg0",
            Opcode::CallArg1 => "callarg1",
            Opcode::CallArgs2 => "callargs2",
            Opcode::CallArgs3 => "callargs3",
            Opcode::CallRange => "callrange",
            Opcode::CallThis0 => "callthis0",
            Opcode::CallThis1 => "callthis1",
            Opcode::CallThis2 => "callthis2",
            Opcode::CallThis3 => "callthis3",
            Opcode::CallThisRange => "callthisrange",
            Opcode::NewObjRange => "newobjrange",
            Opcode::SuperCallThisRange => "supercallthisrange",
            Opcode::Apply => "apply",
            Opcode::NewLexEnv => "newlexenv",
            Opcode::PopLexEnv => "poplexenv",
            Opcode::LdLexVar => "ldlexvar",
            Opcode::StLexVar => "stlexvar",
            Opcode::LdExternalModuleVar => "ldexternalmodulevar",
            Opcode::StModuleVar => "stmodulevar",
            Opcode::GetModuleNamespace => "getmodulenamespace",
            Opcode::DynamicImport => "dynamicimport",
            Opcode::CreateGeneratorObj => "creategeneratorobj",
            Opcode::ResumeGenerator => "resumegenerator",
            Opcode::GetResumeMode => "getresumemode",
            Opcode::SuspendGenerator => "suspendgenerator",
            Opcode::AsyncFunctionEnter => "asyncfunctionenter",
            Opcode::AsyncFunctionResolve => "asyncfunctionresolve",
            Opcode::AsyncFunctionReject => "asyncfunctionreject",
            Opcode::DefineFunc => "definefunc",
            Opcode::DefineClassWithBuffer => "defineclasswithbuffer",
            Opcode::Nop => "nop",
            Opcode::Debugger => "debugger",
        }
    }

    pub fn format(self) -> OperandFormat {
        use OperandFormat as F;
        match self {
            Opcode::LdUndefined
            | Opcode::LdNull
            | Opcode::LdTrue
            | Opcode::LdFalse
            | Opcode::LdNan
            | Opcode::LdInfinity
            | Opcode::LdHole
            | Opcode::LdGlobal
            | Opcode::TypeOf
            | Opcode::IsTrue
            | Opcode::IsFalse
            | Opcode::Return
            | Opcode::ReturnUndefined
            | Opcode::CreateEmptyObject
            | Opcode::CreateEmptyArray
            | Opcode::PopLexEnv
            | Opcode::DynamicImport
            | Opcode::ResumeGenerator
            | Opcode::GetResumeMode
            | Opcode::AsyncFunctionEnter
            | Opcode::Nop
            | Opcode::Debugger => F::None,

            Opcode::Ldai => F::Imm32,
            Opcode::Fldai => F::Imm64,

            Opcode::Lda
            | Opcode::Sta
            | Opcode::DelObjProp
            | Opcode::CreateGeneratorObj
            | Opcode::SuspendGenerator
            | Opcode::AsyncFunctionResolve
            | Opcode::AsyncFunctionReject => F::Reg8,

            Opcode::Mov => F::Reg8Reg8,
            Opcode::LdaStr => F::StrId16,

            Opcode::Add2
            | Opcode::Sub2
            | Opcode::Mul2
            | Opcode::Div2
            | Opcode::Mod2
            | Opcode::Exp
            | Opcode::And2
            | Opcode::Or2
            | Opcode::Xor2
            | Opcode::Shl2
            | Opcode::Shr2
            | Opcode::Ashr2
            | Opcode::Eq
            | Opcode::NotEq
            | Opcode::Less
            | Opcode::LessEq
            | Opcode::Greater
            | Opcode::GreaterEq
            | Opcode::StrictEq
            | Opcode::StrictNotEq
            | Opcode::IsIn
            | Opcode::InstanceOf
            | Opcode::LdObjByValue
            | Opcode::CallArg1
            | Opcode::CallThis0 => F::Imm8Reg8,

            Opcode::Neg
            | Opcode::Not
            | Opcode::Inc
            | Opcode::Dec
            | Opcode::ToNumber
            | Opcode::ToNumeric
            | Opcode::CallArg0
            | Opcode::NewLexEnv
            | Opcode::LdExternalModuleVar
            | Opcode::StModuleVar
            | Opcode::GetModuleNamespace => F::Imm8,

            Opcode::Jmp => F::Jump8,
            Opcode::Jmp16 => F::Jump16,
            Opcode::Jmp32 => F::Jump32,
            Opcode::Jeqz | Opcode::Jnez => F::Jump8,
            Opcode::Jeqz16 | Opcode::Jnez16 => F::Jump16,
            Opcode::Jeqz32 | Opcode::Jnez32 => F::Jump32,

            Opcode::CreateArrayWithBuffer | Opcode::CreateObjectWithBuffer => F::Imm8LitId16,
            Opcode::CreateRegExpWithLiteral => F::Imm8StrId16Imm8,

            Opcode::LdObjByName => F::Imm8StrId16,
            Opcode::StObjByName => F::Imm8StrId16Reg8,
            Opcode::StObjByValue | Opcode::CallArgs2 | Opcode::CallThis1 | Opcode::Apply => {
                F::Imm8Reg8Reg8
            }

            Opcode::TryLdGlobalByName
            | Opcode::TryStGlobalByName
            | Opcode::LdGlobalVar
            | Opcode::StGlobalVar => F::Imm16StrId16,

            Opcode::CallArgs3 | Opcode::CallThis2 => F::Imm8Reg8Reg8Reg8,
            Opcode::CallThis3 => F::Imm8Reg8Reg8Reg8Reg8,
            Opcode::CallRange
            | Opcode::CallThisRange
            | Opcode::NewObjRange
            | Opcode::SuperCallThisRange => F::Imm8Imm8Reg8,

            Opcode::LdLexVar | Opcode::StLexVar => F::Imm8Imm8,

            Opcode::DefineFunc => F::Imm8MethodId16Imm8,
            Opcode::DefineClassWithBuffer => F::ClassDef,
        }
    }

    pub fn flags(self) -> OpFlags {
        match self {
            Opcode::Jmp | Opcode::Jmp16 | Opcode::Jmp32 => OpFlags::UNCOND_JUMP,
            Opcode::Jeqz
            | Opcode::Jeqz16
            | Opcode::Jeqz32
            | Opcode::Jnez
            | Opcode::Jnez16
            | Opcode::Jnez32 => OpFlags::COND_JUMP,

            Opcode::Return | Opcode::ReturnUndefined => OpFlags::TERMINATOR,

            Opcode::Sta | Opcode::Mov | Opcode::Nop | Opcode::Debugger => OpFlags::empty(),

            Opcode::StObjByName
            | Opcode::StObjByValue
            | Opcode::DelObjProp
            | Opcode::TryStGlobalByName
            | Opcode::StGlobalVar
            | Opcode::StModuleVar
            | Opcode::StLexVar
            | Opcode::NewLexEnv
            | Opcode::PopLexEnv
            | Opcode::SuspendGenerator
            | Opcode::AsyncFunctionResolve
            | Opcode::AsyncFunctionReject => OpFlags::SIDE_EFFECTS | OpFlags::MAY_THROW,

            Opcode::CallArg0
            | Opcode::CallArg1
            | Opcode::CallArgs2
            | Opcode::CallArgs3
            | Opcode::CallRange
            | Opcode::CallThis0
            | Opcode::CallThis1
            | Opcode::CallThis2
            | Opcode::CallThis3
            | Opcode::CallThisRange
            | Opcode::NewObjRange
            | Opcode::SuperCallThisRange
            | Opcode::Apply
            | Opcode::DynamicImport => OpFlags::SIDE_EFFECTS | OpFlags::MAY_THROW,

            Opcode::LdObjByName
            | Opcode::LdObjByValue
            | Opcode::TryLdGlobalByName
            | Opcode::LdGlobalVar
            | Opcode::LdExternalModuleVar
            | Opcode::GetModuleNamespace => OpFlags::MAY_THROW,

            _ => OpFlags::empty(),
        }
    }

    pub fn lowering(self) -> Lowering {
        match self {
            Opcode::Add2 => Lowering::Binary(AluOp::Add),
            Opcode::Sub2 => Lowering::Binary(AluOp::Sub),
            Opcode::Mul2 => Lowering::Binary(AluOp::Mul),
            Opcode::Div2 => Lowering::Binary(AluOp::Div),
            Opcode::Mod2 => Lowering::Binary(AluOp::Mod),
            Opcode::Exp => Lowering::Binary(AluOp::Exp),
            Opcode::And2 => Lowering::Binary(AluOp::And),
            Opcode::Or2 => Lowering::Binary(AluOp::Or),
            Opcode::Xor2 => Lowering::Binary(AluOp::Xor),
            Opcode::Shl2 => Lowering::Binary(AluOp::Shl),
            Opcode::Shr2 => Lowering::Binary(AluOp::Shr),
            Opcode::Ashr2 => Lowering::Binary(AluOp::Ashr),

            Opcode::Eq => Lowering::Compare(CondOp::Eq),
            Opcode::NotEq => Lowering::Compare(CondOp::NotEq),
            Opcode::Less => Lowering::Compare(CondOp::Less),
            Opcode::LessEq => Lowering::Compare(CondOp::LessEq),
            Opcode::Greater => Lowering::Compare(CondOp::Greater),
            Opcode::GreaterEq => Lowering::Compare(CondOp::GreaterEq),
            Opcode::StrictEq => Lowering::Compare(CondOp::StrictEq),
            Opcode::StrictNotEq => Lowering::Compare(CondOp::StrictNotEq),
            Opcode::IsIn => Lowering::Compare(CondOp::In),
            Opcode::InstanceOf => Lowering::Compare(CondOp::InstanceOf),

            Opcode::Neg => Lowering::Unary(UnaryAlu::Neg),
            Opcode::Not => Lowering::Unary(UnaryAlu::BitNot),
            Opcode::Inc => Lowering::Unary(UnaryAlu::Inc),
            Opcode::Dec => Lowering::Unary(UnaryAlu::Dec),
            Opcode::TypeOf => Lowering::Unary(UnaryAlu::TypeOf),
            Opcode::ToNumber => Lowering::Unary(UnaryAlu::ToNumber),
            Opcode::ToNumeric => Lowering::Unary(UnaryAlu::ToNumeric),
            Opcode::IsTrue => Lowering::Unary(UnaryAlu::IsTrue),
            Opcode::IsFalse => Lowering::Unary(UnaryAlu::IsFalse),

            _ => Lowering::None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Wide-namespace opcodes: 16-bit re-encodings of standard forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum WideOpcode {
    Mov = 0x00,
    Lda = 0x01,
    Sta = 0x02,
    CallRange = 0x03,
    CallThisRange = 0x04,
    NewObjRange = 0x05,
    NewLexEnv = 0x06,
    LdLexVar = 0x07,
    StLexVar = 0x08,
    LdExternalModuleVar = 0x09,
    StModuleVar = 0x0a,
    GetModuleNamespace = 0x0b,
}

impl WideOpcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            WideOpcode::Mov => "wide.mov",
            WideOpcode::Lda => "wide.lda",
            WideOpcode::Sta => "wide.sta",
            WideOpcode::CallRange => "wide.callrange",
            WideOpcode::CallThisRange => "wide.callthisrange",
            WideOpcode::NewObjRange => "wide.newobjrange",
            WideOpcode::NewLexEnv => "wide.newlexenv",
            WideOpcode::LdLexVar => "wide.ldlexvar",
            WideOpcode::StLexVar => "wide.stlexvar",
            WideOpcode::LdExternalModuleVar => "wide.ldexternalmodulevar",
            WideOpcode::StModuleVar => "wide.stmodulevar",
            WideOpcode::GetModuleNamespace => "wide.getmodulenamespace",
        }
    }

    pub fn format(self) -> OperandFormat {
        use OperandFormat as F;
        match self {
            WideOpcode::Mov => F::Reg16Reg16,
            WideOpcode::Lda | WideOpcode::Sta => F::Reg16,
            WideOpcode::CallRange | WideOpcode::CallThisRange | WideOpcode::NewObjRange => {
                F::Imm16Reg16
            }
            WideOpcode::NewLexEnv
            | WideOpcode::LdExternalModuleVar
            | WideOpcode::StModuleVar
            | WideOpcode::GetModuleNamespace => F::Imm16,
            WideOpcode::LdLexVar | WideOpcode::StLexVar => F::Imm16Imm16,
        }
    }

    pub fn flags(self) -> OpFlags {
        match self {
            WideOpcode::CallRange | WideOpcode::CallThisRange | WideOpcode::NewObjRange => {
                OpFlags::SIDE_EFFECTS | OpFlags::MAY_THROW
            }
            WideOpcode::NewLexEnv | WideOpcode::StLexVar | WideOpcode::StModuleVar => {
                OpFlags::SIDE_EFFECTS | OpFlags::MAY_THROW
            }
            WideOpcode::LdExternalModuleVar | WideOpcode::GetModuleNamespace => OpFlags::MAY_THROW,
            _ => OpFlags::empty(),
        }
    }
}

/// Deprecated-namespace opcodes: legacy encodings still seen in old
/// binaries, lowered to their modern equivalents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeprecatedOpcode {
    Lda = 0x00,
    Sta = 0x01,
    Ldai = 0x02,
    Fldai = 0x03,
    Return = 0x04,
    Add2 = 0x05,
    Sub2 = 0x06,
    Mul2 = 0x07,
    Div2 = 0x08,
    Mod2 = 0x09,
    ToNumber = 0x0a,
    Neg = 0x0b,
    Not = 0x0c,
    Inc = 0x0d,
    Dec = 0x0e,
}

impl DeprecatedOpcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            DeprecatedOpcode::Lda => "deprecated.lda",
            DeprecatedOpcode::Sta => "deprecated.sta",
            DeprecatedOpcode::Ldai => "deprecated.ldai",
            DeprecatedOpcode::Fldai => "deprecated.fldai",
            DeprecatedOpcode::Return => "deprecated.return",
            DeprecatedOpcode::Add2 => "deprecated.add2",
            DeprecatedOpcode::Sub2 => "deprecated.sub2",
            DeprecatedOpcode::Mul2 => "deprecated.mul2",
            DeprecatedOpcode::Div2 => "deprecated.div2",
            DeprecatedOpcode::Mod2 => "deprecated.mod2",
            DeprecatedOpcode::ToNumber => "deprecated.tonumber",
            DeprecatedOpcode::Neg => "deprecated.neg",
            DeprecatedOpcode::Not => "deprecated.not",
            DeprecatedOpcode::Inc => "deprecated.inc",
            DeprecatedOpcode::Dec => "deprecated.dec",
        }
    }

    pub fn format(self) -> OperandFormat {
        use OperandFormat as F;
        match self {
            DeprecatedOpcode::Lda | DeprecatedOpcode::Sta => F::Reg8,
            DeprecatedOpcode::Ldai => F::Imm32,
            DeprecatedOpcode::Fldai => F::Imm64,
            DeprecatedOpcode::Return => F::None,
            // Legacy binary forms carry no inline-cache slot
            DeprecatedOpcode::Add2
            | DeprecatedOpcode::Sub2
            | DeprecatedOpcode::Mul2
            | DeprecatedOpcode::Div2
            | DeprecatedOpcode::Mod2 => F::Reg8,
            DeprecatedOpcode::ToNumber
            | DeprecatedOpcode::Neg
            | DeprecatedOpcode::Not
            | DeprecatedOpcode::Inc
            | DeprecatedOpcode::Dec => F::None,
        }
    }

    pub fn flags(self) -> OpFlags {
        match self {
            DeprecatedOpcode::Return => OpFlags::TERMINATOR,
            _ => OpFlags::empty(),
        }
    }

    pub fn lowering(self) -> Lowering {
        match self {
            DeprecatedOpcode::Add2 => Lowering::Binary(AluOp::Add),
            DeprecatedOpcode::Sub2 => Lowering::Binary(AluOp::Sub),
            DeprecatedOpcode::Mul2 => Lowering::Binary(AluOp::Mul),
            DeprecatedOpcode::Div2 => Lowering::Binary(AluOp::Div),
            DeprecatedOpcode::Mod2 => Lowering::Binary(AluOp::Mod),
            DeprecatedOpcode::ToNumber => Lowering::Unary(UnaryAlu::ToNumber),
            DeprecatedOpcode::Neg => Lowering::Unary(UnaryAlu::Neg),
            DeprecatedOpcode::Not => Lowering::Unary(UnaryAlu::BitNot),
            DeprecatedOpcode::Inc => Lowering::Unary(UnaryAlu::Inc),
            DeprecatedOpcode::Dec => Lowering::Unary(UnaryAlu::Dec),
            _ => Lowering::None,
        }
    }
}

/// Throw-namespace opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum ThrowOpcode {
    /// throw acc
    Throw = 0x00,
    NotExists = 0x01,
    PatternNonCoercible = 0x02,
    DeleteSuperProperty = 0x03,
    ConstAssignment = 0x04,
    /// throws when vN is not an object
    IfNotObject = 0x05,
    /// throws when vA is the hole; vB names the binding
    UndefinedIfHole = 0x06,
    IfSuperNotCorrectCall = 0x07,
    UndefinedIfHoleWithName = 0x08,
}

impl ThrowOpcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ThrowOpcode::Throw => "throw",
            ThrowOpcode::NotExists => "throw.notexists",
            ThrowOpcode::PatternNonCoercible => "throw.patternnoncoercible",
            ThrowOpcode::DeleteSuperProperty => "throw.deletesuperproperty",
            ThrowOpcode::ConstAssignment => "throw.constassignment",
            ThrowOpcode::IfNotObject => "throw.ifnotobject",
            ThrowOpcode::UndefinedIfHole => "throw.undefinedifhole",
            ThrowOpcode::IfSuperNotCorrectCall => "throw.ifsupernotcorrectcall",
            ThrowOpcode::UndefinedIfHoleWithName => "throw.undefinedifholewithname",
        }
    }

    pub fn format(self) -> OperandFormat {
        use OperandFormat as F;
        match self {
            ThrowOpcode::Throw
            | ThrowOpcode::NotExists
            | ThrowOpcode::PatternNonCoercible
            | ThrowOpcode::DeleteSuperProperty => F::None,
            ThrowOpcode::ConstAssignment | ThrowOpcode::IfNotObject => F::Reg8,
            ThrowOpcode::UndefinedIfHole => F::Reg8Reg8,
            ThrowOpcode::IfSuperNotCorrectCall => F::Imm16,
            ThrowOpcode::UndefinedIfHoleWithName => F::StrId16,
        }
    }

    pub fn flags(self) -> OpFlags {
        match self {
            // Unconditional throws end the block
            ThrowOpcode::Throw
            | ThrowOpcode::NotExists
            | ThrowOpcode::PatternNonCoercible
            | ThrowOpcode::DeleteSuperProperty
            | ThrowOpcode::ConstAssignment => {
                OpFlags::TERMINATOR | OpFlags::SIDE_EFFECTS | OpFlags::MAY_THROW
            }
            // Guards only throw on a failed check and fall through otherwise
            _ => OpFlags::SIDE_EFFECTS | OpFlags::MAY_THROW,
        }
    }
}

/// CallRuntime-namespace opcodes: VM intrinsics surfaced as runtime calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum CallRuntimeOpcode {
    NotifyConcurrentResult = 0x00,
    DefineFieldByValue = 0x01,
    ToPropertyKey = 0x02,
    CreatePrivateProperty = 0x03,
    DefinePrivateProperty = 0x04,
    CallInit = 0x05,
    DefineSendableClass = 0x06,
    IsTrue = 0x07,
    IsFalse = 0x08,
}

impl CallRuntimeOpcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CallRuntimeOpcode::NotifyConcurrentResult => "callruntime.notifyconcurrentresult",
            CallRuntimeOpcode::DefineFieldByValue => "callruntime.definefieldbyvalue",
            CallRuntimeOpcode::ToPropertyKey => "callruntime.topropertykey",
            CallRuntimeOpcode::CreatePrivateProperty => "callruntime.createprivateproperty",
            CallRuntimeOpcode::DefinePrivateProperty => "callruntime.defineprivateproperty",
            CallRuntimeOpcode::CallInit => "callruntime.callinit",
            CallRuntimeOpcode::DefineSendableClass => "callruntime.definesendableclass",
            CallRuntimeOpcode::IsTrue => "callruntime.istrue",
            CallRuntimeOpcode::IsFalse => "callruntime.isfalse",
        }
    }

    pub fn format(self) -> OperandFormat {
        use OperandFormat as F;
        match self {
            CallRuntimeOpcode::NotifyConcurrentResult
            | CallRuntimeOpcode::ToPropertyKey
            | CallRuntimeOpcode::IsTrue
            | CallRuntimeOpcode::IsFalse => F::None,
            CallRuntimeOpcode::DefineFieldByValue => F::Imm8Reg8Reg8,
            CallRuntimeOpcode::CreatePrivateProperty => F::Imm8LitId16,
            CallRuntimeOpcode::DefinePrivateProperty => F::Imm8Imm8Reg8,
            CallRuntimeOpcode::CallInit => F::Imm8Reg8,
            CallRuntimeOpcode::DefineSendableClass => F::ClassDef,
        }
    }

    pub fn flags(self) -> OpFlags {
        match self {
            CallRuntimeOpcode::IsTrue | CallRuntimeOpcode::IsFalse => OpFlags::empty(),
            _ => OpFlags::SIDE_EFFECTS | OpFlags::MAY_THROW,
        }
    }
}
