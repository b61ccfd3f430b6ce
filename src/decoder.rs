//! Opcode-schema driven decoder for the VM instruction stream.
//!
//! Each opcode's [`OperandSchema`] decides both how its operands are rendered
//! and how many words it consumes, so every later instruction boundary depends
//! on these layouts being exact.

use std::fmt;

use crate::image::{
    CodeOffset, FunctionIdx, NativeId, ProgramImage, SpecIdentIdx, StringIdx, TypeIdx,
};
use crate::natreg::NativeRegistry;
use crate::opcode::{BaseOp, OpCode, OperandSchema};
use crate::{Cursor, Decoder, Insn};

/// Errors that end a sweep. They are reported in-band, as the last line of
/// the listing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Opcode word outside `0..OpCode::MAX_OPS`
    #[error("ILLEGAL INSTRUCTION: {0}")]
    IllegalOpcode(i32),

    /// Operands of the instruction at `offset` run past the end of the stream
    #[error("TRUNCATED INSTRUCTION: needs {needed} more word(s)")]
    Truncated { offset: Cursor, needed: usize },

    /// A call operand that doesn't point at a function header
    #[error("BAD CALL TARGET: {0}")]
    BadCallTarget(i32),
}

impl DecodeError {
    /// Short tag used where a sweep stop is shown as a record.
    pub fn marker(&self) -> &'static str {
        match self {
            DecodeError::IllegalOpcode(_) => "ILLEGAL",
            DecodeError::Truncated { .. } => "TRUNCATED",
            DecodeError::BadCallTarget(_) => "BADCALL",
        }
    }
}

/// Bounds-checked reader over the operand words of one instruction.
struct Words<'a> {
    code: &'a [i32],
    start: Cursor,
    pos: Cursor,
}

impl<'a> Words<'a> {
    fn new(code: &'a [i32], start: Cursor) -> Self {
        Self { code, start, pos: start }
    }

    fn truncated(&self, end: Cursor) -> DecodeError {
        DecodeError::Truncated { offset: self.start, needed: end - self.code.len() }
    }

    fn next(&mut self) -> Result<i32, DecodeError> {
        let word = self.code.get(self.pos).copied().ok_or_else(|| self.truncated(self.pos + 1))?;
        self.pos += 1;
        Ok(word)
    }

    /// A length prefix; negative counts are read as zero.
    fn count(&mut self) -> Result<usize, DecodeError> {
        Ok(usize::try_from(self.next()?).unwrap_or(0))
    }

    fn skip(&mut self, count: usize) -> Result<(), DecodeError> {
        let end = self.pos.saturating_add(count);
        if end > self.code.len() {
            return Err(self.truncated(end));
        }
        self.pos = end;
        Ok(())
    }

    /// Two words, low half first.
    fn next_i64(&mut self) -> Result<i64, DecodeError> {
        let low = self.next()? as u32 as u64;
        let high = self.next()? as u32 as u64;
        Ok(((high << 32) | low) as i64)
    }
}

/// Decode the instruction at `at`.
///
/// # Returns
/// The instruction with its rendered operands and the offset of the next
/// instruction, or the error that must stop the sweep. An illegal opcode
/// consumes nothing.
pub fn decode_one(
    at: Cursor,
    image: &ProgramImage,
    natives: &NativeRegistry,
) -> Result<Insn, DecodeError> {
    let mut words = Words::new(&image.code, at);
    let word = words.next()?;
    let opcode = OpCode::from_word(word).ok_or(DecodeError::IllegalOpcode(word))?;

    let operands = match opcode.schema() {
        OperandSchema::None => String::new(),
        OperandSchema::Int => words.next()?.to_string(),
        OperandSchema::Int64 => words.next_i64()?.to_string(),
        OperandSchema::Float64 => f64::from_bits(words.next_i64()? as u64).to_string(),
        OperandSchema::Float32 => f32::from_bits(words.next()? as u32).to_string(),
        OperandSchema::IntPair => {
            let a = words.next()?;
            let b = words.next()?;
            format!("{} {}", a, b)
        }
        OperandSchema::Return => {
            let id = FunctionIdx(words.next()?);
            words.skip(1)?; // retvals
            function_name(image, id)
        }
        OperandSchema::Call => call(image, &mut words, false)?,
        OperandSchema::CallMulti => call(image, &mut words, true)?,
        OperandSchema::NewVec => {
            words.skip(1)?; // type index
            format!("vector {}", words.next()?)
        }
        OperandSchema::NewStruct => struct_of_type(image, TypeIdx(words.next()?)),
        OperandSchema::Builtin => {
            let id = NativeId(words.next()?);
            or_missing(natives.name(id), id)
        }
        OperandSchema::Ident => ident_name(image, SpecIdentIdx(words.next()?)),
        OperandSchema::Str => {
            let idx = StringIdx(words.next()?);
            match image.string(idx) {
                Some(text) => escape_and_quote(text),
                None => format!("?{}", idx),
            }
        }
        OperandSchema::FunStart => fun_start(image, &mut words)?,
        OperandSchema::Coro => coro(&mut words)?,
        OperandSchema::FunMulti => fun_multi(image, &mut words)?,
    };

    Ok(Insn { offset: at, opcode, operands, next: words.pos })
}

fn or_missing(name: Option<&str>, idx: impl fmt::Display) -> String {
    match name {
        Some(name) => name.to_string(),
        None => format!("?{}", idx),
    }
}

fn function_name(image: &ProgramImage, id: FunctionIdx) -> String {
    or_missing(image.function_name(id), id)
}

fn ident_name(image: &ProgramImage, idx: SpecIdentIdx) -> String {
    or_missing(image.ident_name(idx), idx)
}

fn struct_of_type(image: &ProgramImage, ti: TypeIdx) -> String {
    match image.type_descriptor(ti).and_then(|t| t.struct_idx) {
        Some(sidx) => or_missing(image.struct_name(sidx), sidx),
        None => format!("?{}", ti),
    }
}

/// Render a call, reading the callee's id and argument count back out of the
/// function header the call site points at.
fn call(image: &ProgramImage, words: &mut Words<'_>, multi: bool) -> Result<String, DecodeError> {
    let bc = CodeOffset(words.next()?);
    let header = |k: i32| {
        bc.0
            .checked_add(k)
            .and_then(|at| image.word(CodeOffset(at)))
            .ok_or(DecodeError::BadCallTarget(bc.0))
    };
    let nargs_slot = match OpCode::from_word(header(0)?) {
        Some(OpCode::Base(BaseOp::FunStart)) => 2,
        Some(OpCode::Base(BaseOp::FunMulti)) => 3,
        _ => return Err(DecodeError::BadCallTarget(bc.0)),
    };
    let id = FunctionIdx(header(1)?);
    let nargs = header(nargs_slot)?;
    if multi {
        words.skip(usize::try_from(nargs).unwrap_or(0))?; // arg types
    }
    Ok(format!("{} {} {}", nargs, function_name(image, id), bc))
}

/// `name(params => rets [keep]owned )`, each listed identifier followed by a
/// space.
fn fun_start(image: &ProgramImage, words: &mut Words<'_>) -> Result<String, DecodeError> {
    let fidx = FunctionIdx(words.next()?);
    let mut out = if fidx.0 >= 0 { function_name(image, fidx) } else { "__dummy".to_string() };
    out.push('(');
    for _ in 0..words.count()? {
        out.push_str(&ident_name(image, SpecIdentIdx(words.next()?)));
        out.push(' ');
    }
    out.push_str("=> ");
    for _ in 0..words.count()? {
        out.push_str(&ident_name(image, SpecIdentIdx(words.next()?)));
        out.push(' ');
    }
    let keep = words.next()?;
    out.push_str(&format!("[{}]", keep));
    for _ in 0..words.count()? {
        out.push_str(&ident_name(image, SpecIdentIdx(words.next()?)));
        out.push(' ');
    }
    out.push(')');
    Ok(out)
}

fn coro(words: &mut Words<'_>) -> Result<String, DecodeError> {
    let mut out = words.next()?.to_string();
    words.skip(1)?; // typeinfo
    for _ in 0..words.count()? {
        out.push_str(&format!(" v{}", words.next()?));
    }
    Ok(out)
}

/// The per-case dispatch table that follows the header is skipped, not
/// rendered.
fn fun_multi(image: &ProgramImage, words: &mut Words<'_>) -> Result<String, DecodeError> {
    let name = function_name(image, FunctionIdx(words.next()?));
    let ncases = words.next()?;
    let nargs = words.next()?;
    let table_len = usize::try_from(nargs)
        .unwrap_or(0)
        .saturating_add(1)
        .saturating_mul(usize::try_from(ncases).unwrap_or(0));
    words.skip(table_len)?;
    Ok(format!("{} (multi_start) {} {}", name, ncases, nargs))
}

/// Quote `text` and escape quotes, backslashes and control characters.
pub fn escape_and_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// The bytecode decoder, bound to the host's native registry.
#[derive(Debug, Clone, Copy)]
pub struct IlDecoder<'a> {
    natives: &'a NativeRegistry,
}

impl<'a> IlDecoder<'a> {
    pub fn new(natives: &'a NativeRegistry) -> Self {
        Self { natives }
    }
}

impl fmt::Display for IlDecoder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IlDecoder({} natives)", self.natives.len())
    }
}

impl Decoder for IlDecoder<'_> {
    fn decode(&self, image: &ProgramImage, at: Cursor) -> Result<Insn, DecodeError> {
        decode_one(at, image, self.natives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{
        IdentIdx, Identifier, LineEntry, NamedEntry, SpecIdent, StructIdx, TypeDescriptor,
        TypeKind,
    };
    use crate::opcode::LvalOp;
    use rstest::rstest;

    fn op(op: BaseOp) -> i32 {
        OpCode::Base(op).to_word()
    }

    fn image_with(code: Vec<i32>) -> ProgramImage {
        ProgramImage {
            code,
            line_info: vec![LineEntry::new(0, 1)],
            identifiers: vec![
                Identifier { name: "x".to_string() },
                Identifier { name: "y".to_string() },
                Identifier { name: "r".to_string() },
            ],
            spec_idents: (0..3).map(|i| SpecIdent { ident: IdentIdx(i) }).collect(),
            functions: vec![NamedEntry::new("main"), NamedEntry::new("area")],
            structs: vec![NamedEntry::new("vec2")],
            type_table: vec![
                TypeDescriptor { kind: TypeKind::Int, struct_idx: None },
                TypeDescriptor { kind: TypeKind::Struct, struct_idx: Some(StructIdx(0)) },
            ],
            string_table: vec!["plain".to_string(), "say \"hi\"".to_string()],
            ..ProgramImage::default()
        }
    }

    fn natives() -> NativeRegistry {
        ["print", "sqrt"].into_iter().collect()
    }

    fn decode(code: Vec<i32>, at: Cursor) -> Result<Insn, DecodeError> {
        decode_one(at, &image_with(code), &natives())
    }

    #[test]
    fn test_single_int_advances_two_words() {
        let code =
            vec![op(BaseOp::PushNil), op(BaseOp::Pop), op(BaseOp::Dup), op(BaseOp::PushInt), 42];
        let insn = decode(code, 3).unwrap();
        assert_eq!(insn.to_string(), "PUSHINT 42");
        assert_eq!(insn.next, 5);
    }

    #[rstest]
    #[case(-1)]
    #[case(OpCode::MAX_OPS)]
    #[case(i32::MAX)]
    fn test_illegal_opcode(#[case] word: i32) {
        assert_eq!(decode(vec![word, 1, 2], 0), Err(DecodeError::IllegalOpcode(word)));
    }

    #[test]
    fn test_zero_operand_opcode() {
        let insn = decode(vec![op(BaseOp::IAdd)], 0).unwrap();
        assert_eq!(insn.operands, "");
        assert_eq!(insn.next, 1);
    }

    #[test]
    fn test_int64_reassembly() {
        let big: i64 = 0x1_0000_0002;
        let insn = decode(vec![op(BaseOp::PushInt64), big as i32, (big >> 32) as i32], 0).unwrap();
        assert_eq!(insn.operands, "4294967298");
        assert_eq!(insn.width(), 3);

        let neg: i64 = -5;
        let insn = decode(vec![op(BaseOp::PushInt64), neg as i32, (neg >> 32) as i32], 0).unwrap();
        assert_eq!(insn.operands, "-5");
    }

    #[test]
    fn test_float_immediates() {
        let bits = 1.5f64.to_bits();
        let code = vec![op(BaseOp::PushFlt64), bits as u32 as i32, (bits >> 32) as u32 as i32];
        let insn = decode(code, 0).unwrap();
        assert_eq!(insn.operands, "1.5");

        let insn = decode(vec![op(BaseOp::PushFlt), 2.25f32.to_bits() as i32], 0).unwrap();
        assert_eq!(insn.operands, "2.25");
        assert_eq!(insn.next, 2);
    }

    #[test]
    fn test_int_pair_and_return() {
        let insn = decode(vec![op(BaseOp::LogWrite), 3, 4], 0).unwrap();
        assert_eq!(insn.operands, "3 4");

        let insn = decode(vec![op(BaseOp::Return), 1, 2], 0).unwrap();
        assert_eq!(insn.operands, "area");
        assert_eq!(insn.next, 3);
    }

    #[test]
    fn test_call_reads_funstart_header() {
        // main(x y => [0])
        let mut code = vec![op(BaseOp::FunStart), 0, 2, 0, 1, 0, 0, 0];
        code.extend([op(BaseOp::Call), 0]);
        let insn = decode(code, 8).unwrap();
        assert_eq!(insn.operands, "2 main 0");
        assert_eq!(insn.next, 10);
    }

    #[test]
    fn test_callmulti_consumes_arg_types() {
        // area, 1 case, 2 args, then (2 + 1) * 1 dispatch words
        let mut code = vec![op(BaseOp::FunMulti), 1, 1, 2, 7, 7, 7];
        code.extend([op(BaseOp::CallMulti), 0, 11, 12, op(BaseOp::Pop)]);
        let insn = decode(code, 7).unwrap();
        assert_eq!(insn.operands, "2 area 0");
        assert_eq!(insn.next, 11);
    }

    #[test]
    fn test_bad_call_target() {
        assert_eq!(decode(vec![op(BaseOp::Call), 0], 0), Err(DecodeError::BadCallTarget(0)));
        assert_eq!(decode(vec![op(BaseOp::Call), 50], 0), Err(DecodeError::BadCallTarget(50)));
        assert_eq!(decode(vec![op(BaseOp::Call), -2], 0), Err(DecodeError::BadCallTarget(-2)));
    }

    #[test]
    fn test_construction() {
        let insn = decode(vec![op(BaseOp::NewVec), 0, 3], 0).unwrap();
        assert_eq!(insn.operands, "vector 3");
        assert_eq!(insn.next, 3);

        let insn = decode(vec![op(BaseOp::NewStruct), 1], 0).unwrap();
        assert_eq!(insn.operands, "vec2");

        // an int type has no struct to name
        let insn = decode(vec![op(BaseOp::NewStruct), 0], 0).unwrap();
        assert_eq!(insn.operands, "?0");
    }

    #[test]
    fn test_builtins() {
        let insn = decode(vec![op(BaseOp::BCallRet1), 1], 0).unwrap();
        assert_eq!(insn.to_string(), "BCALLRET1 sqrt");

        let insn = decode(vec![op(BaseOp::BCallUnb0), 7], 0).unwrap();
        assert_eq!(insn.operands, "?7");
    }

    #[test]
    fn test_variables_fields_locals() {
        let insn = decode(vec![op(BaseOp::PushVar), 1], 0).unwrap();
        assert_eq!(insn.operands, "y");

        let insn = decode(vec![OpCode::Var(LvalOp::IAdd).to_word(), 2], 0).unwrap();
        assert_eq!(insn.to_string(), "VAR_IADD r");

        let insn = decode(vec![OpCode::Fld(LvalOp::Write).to_word(), 2], 0).unwrap();
        assert_eq!(insn.to_string(), "FLD_WRITE 2");

        let insn = decode(vec![OpCode::Loc(LvalOp::IPP).to_word(), 5], 0).unwrap();
        assert_eq!(insn.to_string(), "LOC_IPP 5");

        let insn = decode(vec![op(BaseOp::PushLoc), 9], 0).unwrap();
        assert_eq!(insn.operands, "9");
    }

    #[test]
    fn test_string_is_escaped_and_quoted() {
        let insn = decode(vec![op(BaseOp::PushStr), 1], 0).unwrap();
        assert_eq!(insn.operands, r#""say \"hi\"""#);

        let insn = decode(vec![op(BaseOp::PushStr), 0], 0).unwrap();
        assert_eq!(insn.operands, "\"plain\"");
    }

    #[rstest]
    #[case("", "\"\"")]
    #[case("a\\b", "\"a\\\\b\"")]
    #[case("line\nnext\t!", "\"line\\nnext\\t!\"")]
    #[case("\u{1}", "\"\\x01\"")]
    #[case("héllo", "\"héllo\"")]
    fn test_escape_and_quote(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(escape_and_quote(raw), expected);
    }

    #[test]
    fn test_funstart_signature() {
        let code = vec![op(BaseOp::FunStart), 0, 2, 0, 1, 1, 2, 1, 1, 0, op(BaseOp::Pop)];
        let insn = decode(code, 0).unwrap();
        assert_eq!(insn.operands, "main(x y => r [1]x )");
        assert_eq!(insn.next, 10);
    }

    #[test]
    fn test_funstart_dummy() {
        let insn = decode(vec![op(BaseOp::FunStart), -1, 0, 0, 0, 0], 0).unwrap();
        assert_eq!(insn.operands, "__dummy(=> [0])");
        assert_eq!(insn.next, 6);
    }

    #[test]
    fn test_coro() {
        let insn = decode(vec![op(BaseOp::Coro), 7, 99, 2, 3, 4], 0).unwrap();
        assert_eq!(insn.operands, "7 v3 v4");
        assert_eq!(insn.next, 6);
    }

    #[test]
    fn test_funmulti_skips_dispatch_table() {
        let code = vec![op(BaseOp::FunMulti), 0, 2, 1, 0, 0, 0, 0, op(BaseOp::Pop)];
        let insn = decode(code, 0).unwrap();
        assert_eq!(insn.operands, "main (multi_start) 2 1");
        assert_eq!(insn.next, 8);
    }

    #[test]
    fn test_truncated_operands() {
        assert_eq!(
            decode(vec![op(BaseOp::PushInt)], 0),
            Err(DecodeError::Truncated { offset: 0, needed: 1 })
        );
        assert_eq!(
            decode(vec![op(BaseOp::PushInt64), 1], 0),
            Err(DecodeError::Truncated { offset: 0, needed: 1 })
        );
        assert_eq!(
            decode(vec![op(BaseOp::FunMulti), 0, 4, 1, 0], 0),
            Err(DecodeError::Truncated { offset: 0, needed: 7 })
        );
    }

    #[test]
    fn test_truncated_reports_instruction_start() {
        let code = vec![op(BaseOp::Pop), op(BaseOp::Dup), op(BaseOp::PushInt64), 1];
        let err = decode(code, 2).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { offset: 2, needed: 1 });
        assert_eq!(err.to_string(), "TRUNCATED INSTRUCTION: needs 1 more word(s)");
        assert_eq!(err.marker(), "TRUNCATED");
    }

    #[test]
    fn test_fixed_widths_hold_for_every_opcode() {
        for opcode in OpCode::all() {
            let schema = opcode.schema();
            let Some(width) = schema.fixed_width() else { continue };
            if schema == OperandSchema::Call {
                continue;
            }
            let mut code = vec![opcode.to_word()];
            code.extend(std::iter::repeat(0).take(width + 2));
            let insn = decode(code, 0).unwrap();
            assert_eq!(insn.width(), 1 + width, "{}", opcode);
        }
    }

    #[test]
    fn test_decoder_trait() {
        let natives = natives();
        let decoder = IlDecoder::new(&natives);
        let image = image_with(vec![op(BaseOp::BCallRet0), 0]);
        assert_eq!(decoder.decode(&image, 0).unwrap().operands, "print");
        assert_eq!(decoder.to_string(), "IlDecoder(2 natives)");
    }
}
