//! Opcode set and per-opcode operand schemas.
//!
//! Opcodes are numbered densely from zero: every [`BaseOp`] in declaration
//! order, then one block of [`LvalOp`]s each for variables, fields and locals.

use std::fmt;

/// Operand layout of an opcode: how many words follow it and what they mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandSchema {
    /// No operands
    None,
    /// One raw integer
    Int,
    /// Two words forming a 64-bit integer
    Int64,
    /// Two words forming a 64-bit float
    Float64,
    /// One word holding a 32-bit float
    Float32,
    /// Two raw integers
    IntPair,
    /// Function id and (unprinted) return value count
    Return,
    /// Call-site offset of a function header
    Call,
    /// Call-site offset of a function header, then one type tag per argument
    CallMulti,
    /// Type index (unprinted) and element count
    NewVec,
    /// Type index whose descriptor names a struct
    NewStruct,
    /// Native function id
    Builtin,
    /// Specialized identifier index
    Ident,
    /// String table index
    Str,
    /// Function signature header
    FunStart,
    /// Coroutine header
    Coro,
    /// Multi-dispatch header
    FunMulti,
}

impl OperandSchema {
    /// Operand words consumed, if the count does not depend on the operands.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            OperandSchema::None => Some(0),
            OperandSchema::Int
            | OperandSchema::Float32
            | OperandSchema::NewStruct
            | OperandSchema::Builtin
            | OperandSchema::Ident
            | OperandSchema::Str
            | OperandSchema::Call => Some(1),
            OperandSchema::Int64
            | OperandSchema::Float64
            | OperandSchema::IntPair
            | OperandSchema::Return
            | OperandSchema::NewVec => Some(2),
            OperandSchema::CallMulti
            | OperandSchema::FunStart
            | OperandSchema::Coro
            | OperandSchema::FunMulti => None,
        }
    }
}

macro_rules! opcode_set {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $mnemonic:literal, $schema:ident;)+
        }
    ) => {
        opcode_set! {
            $(#[$meta])*
            pub enum $name {
                $($variant => $mnemonic;)+
            }
        }

        impl $name {
            /// Operand layout.
            pub fn schema(self) -> OperandSchema {
                match self {
                    $($name::$variant => OperandSchema::$schema,)+
                }
            }
        }
    };
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $mnemonic:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// Every variant, in numbering order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Upper-case mnemonic.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $mnemonic,)+
                }
            }

            fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }

            fn index(self) -> usize {
                self as usize
            }
        }
    };
}

opcode_set! {
    /// Opcodes outside the l-value families.
    pub enum BaseOp {
        PushInt => "PUSHINT", Int;
        PushInt64 => "PUSHINT64", Int64;
        PushFlt => "PUSHFLT", Float32;
        PushFlt64 => "PUSHFLT64", Float64;
        PushStr => "PUSHSTR", Str;
        PushNil => "PUSHNIL", None;
        PushVar => "PUSHVAR", Ident;
        PushFld => "PUSHFLD", Int;
        PushFldMref => "PUSHFLDMREF", Int;
        PushLoc => "PUSHLOC", Int;
        PushFun => "PUSHFUN", Int;
        VPushIdxI => "VPUSHIDXI", None;
        VPushIdxV => "VPUSHIDXV", None;
        NPushIdxI => "NPUSHIDXI", None;
        SPushIdxI => "SPUSHIDXI", None;
        BCallRet0 => "BCALLRET0", Builtin;
        BCallRet1 => "BCALLRET1", Builtin;
        BCallRet2 => "BCALLRET2", Builtin;
        BCallRet3 => "BCALLRET3", Builtin;
        BCallRet4 => "BCALLRET4", Builtin;
        BCallRet5 => "BCALLRET5", Builtin;
        BCallRet6 => "BCALLRET6", Builtin;
        BCallRef0 => "BCALLREF0", Builtin;
        BCallRef1 => "BCALLREF1", Builtin;
        BCallRef2 => "BCALLREF2", Builtin;
        BCallRef3 => "BCALLREF3", Builtin;
        BCallRef4 => "BCALLREF4", Builtin;
        BCallRef5 => "BCALLREF5", Builtin;
        BCallRef6 => "BCALLREF6", Builtin;
        BCallUnb0 => "BCALLUNB0", Builtin;
        BCallUnb1 => "BCALLUNB1", Builtin;
        BCallUnb2 => "BCALLUNB2", Builtin;
        BCallUnb3 => "BCALLUNB3", Builtin;
        BCallUnb4 => "BCALLUNB4", Builtin;
        BCallUnb5 => "BCALLUNB5", Builtin;
        BCallUnb6 => "BCALLUNB6", Builtin;
        Call => "CALL", Call;
        CallMulti => "CALLMULTI", CallMulti;
        CallV => "CALLV", None;
        CallVCond => "CALLVCOND", None;
        FunStart => "FUNSTART", FunStart;
        FunMulti => "FUNMULTI", FunMulti;
        Return => "RETURN", Return;
        EndStatement => "ENDSTATEMENT", None;
        Exit => "EXIT", Int;
        Abort => "ABORT", None;
        Coro => "CORO", Coro;
        CoCl => "COCL", None;
        CoEnd => "COEND", None;
        Cont1 => "CONT1", Int;
        LogRead => "LOGREAD", Int;
        LogWrite => "LOGWRITE", IntPair;
        IsType => "ISTYPE", Int;
        IncRef => "INCREF", Int;
        KeepRef => "KEEPREF", IntPair;
        NewVec => "NEWVEC", NewVec;
        NewStruct => "NEWSTRUCT", NewStruct;
        Pop => "POP", None;
        PopRef => "POPREF", None;
        Dup => "DUP", None;
        Jump => "JUMP", Int;
        JumpFail => "JUMPFAIL", Int;
        JumpFailR => "JUMPFAILR", Int;
        JumpFailN => "JUMPFAILN", Int;
        JumpNoFail => "JUMPNOFAIL", Int;
        JumpNoFailR => "JUMPNOFAILR", Int;
        IFor => "IFOR", Int;
        VFor => "VFOR", Int;
        SFor => "SFOR", Int;
        NFor => "NFOR", Int;
        IAdd => "IADD", None;
        ISub => "ISUB", None;
        IMul => "IMUL", None;
        IDiv => "IDIV", None;
        IMod => "IMOD", None;
        ILt => "ILT", None;
        IGt => "IGT", None;
        ILe => "ILE", None;
        IGe => "IGE", None;
        IEq => "IEQ", None;
        INe => "INE", None;
        IUMinus => "IUMINUS", None;
        FAdd => "FADD", None;
        FSub => "FSUB", None;
        FMul => "FMUL", None;
        FDiv => "FDIV", None;
        FMod => "FMOD", None;
        FLt => "FLT", None;
        FGt => "FGT", None;
        FLe => "FLE", None;
        FGe => "FGE", None;
        FEq => "FEQ", None;
        FNe => "FNE", None;
        FUMinus => "FUMINUS", None;
        SAdd => "SADD", None;
        SLt => "SLT", None;
        SGt => "SGT", None;
        SLe => "SLE", None;
        SGe => "SGE", None;
        SEq => "SEQ", None;
        SNe => "SNE", None;
        AEq => "AEQ", None;
        ANe => "ANE", None;
        LogNot => "LOGNOT", None;
        LogNotRef => "LOGNOTREF", None;
        BinAnd => "BINAND", None;
        BinOr => "BINOR", None;
        Xor => "XOR", None;
        Asl => "ASL", None;
        Asr => "ASR", None;
        Neg => "NEG", None;
        I2F => "I2F", None;
        A2S => "A2S", None;
        E2B => "E2B", None;
        E2BRef => "E2BREF", None;
        ST2S => "ST2S", None;
    }
}

opcode_set! {
    /// Operations applied to an l-value (variable, field or local slot).
    pub enum LvalOp {
        Write => "WRITE";
        WriteR => "WRITER";
        WriteRef => "WRITEREF";
        WriteRRef => "WRITERREF";
        WriteV => "WRITEV";
        WriteRV => "WRITERV";
        IAdd => "IADD";
        IAddR => "IADDR";
        ISub => "ISUB";
        ISubR => "ISUBR";
        IMul => "IMUL";
        IMulR => "IMULR";
        IDiv => "IDIV";
        IDivR => "IDIVR";
        IMod => "IMOD";
        IModR => "IMODR";
        FAdd => "FADD";
        FAddR => "FADDR";
        FSub => "FSUB";
        FSubR => "FSUBR";
        FMul => "FMUL";
        FMulR => "FMULR";
        FDiv => "FDIV";
        FDivR => "FDIVR";
        SAdd => "SADD";
        SAddR => "SADDR";
        IPP => "IPP";
        IPPR => "IPPR";
        IMM => "IMM";
        IMMR => "IMMR";
        IPPP => "IPPP";
        IPPPR => "IPPPR";
        IMMP => "IMMP";
        IMMPR => "IMMPR";
    }
}

/// A decoded opcode word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Base(BaseOp),
    /// L-value op on a variable; operand is an identifier
    Var(LvalOp),
    /// L-value op on a struct field; operand is a raw field index
    Fld(LvalOp),
    /// L-value op on a local slot; operand is a raw slot index
    Loc(LvalOp),
}

impl OpCode {
    /// Number of defined opcodes; valid words are `0..MAX_OPS`.
    pub const MAX_OPS: i32 = (BaseOp::ALL.len() + 3 * LvalOp::ALL.len()) as i32;

    /// Decode an opcode word, `None` if it is out of range.
    pub fn from_word(word: i32) -> Option<OpCode> {
        let index = usize::try_from(word).ok()?;
        if let Some(op) = BaseOp::from_index(index) {
            return Some(OpCode::Base(op));
        }
        let rest = index - BaseOp::ALL.len();
        let op = LvalOp::from_index(rest % LvalOp::ALL.len())?;
        match rest / LvalOp::ALL.len() {
            0 => Some(OpCode::Var(op)),
            1 => Some(OpCode::Fld(op)),
            2 => Some(OpCode::Loc(op)),
            _ => None,
        }
    }

    /// The opcode word this opcode is encoded as.
    pub fn to_word(self) -> i32 {
        let base = BaseOp::ALL.len();
        let lvals = LvalOp::ALL.len();
        let index = match self {
            OpCode::Base(op) => op.index(),
            OpCode::Var(op) => base + op.index(),
            OpCode::Fld(op) => base + lvals + op.index(),
            OpCode::Loc(op) => base + 2 * lvals + op.index(),
        };
        index as i32
    }

    /// Operand layout of this opcode.
    pub fn schema(self) -> OperandSchema {
        match self {
            OpCode::Base(op) => op.schema(),
            OpCode::Var(_) => OperandSchema::Ident,
            OpCode::Fld(_) | OpCode::Loc(_) => OperandSchema::Int,
        }
    }

    /// Every opcode, in numbering order.
    pub fn all() -> impl Iterator<Item = OpCode> {
        (0..Self::MAX_OPS).filter_map(OpCode::from_word)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpCode::Base(op) => f.write_str(op.name()),
            OpCode::Var(op) => write!(f, "VAR_{}", op.name()),
            OpCode::Fld(op) => write!(f, "FLD_{}", op.name()),
            OpCode::Loc(op) => write!(f, "LOC_{}", op.name()),
        }
    }
}
