//! Read-only view over a parsed program image.
//!
//! The image is a set of parallel tables: the instruction stream plus the
//! metadata the decoder cross-references (types, line breakpoints, names).
//! Operands that index those tables are wrapped in distinct newtypes so an
//! identifier index can't be handed to the string table by accident.

use std::fmt;
use serde::{Deserialize, Serialize};

macro_rules! table_index {
    ($($(#[$meta:meta])* $name:ident,)+) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub i32);

            impl $name {
                /// Position in the backing table, `None` if negative.
                pub fn slot(self) -> Option<usize> {
                    usize::try_from(self.0).ok()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

table_index! {
    /// Index into [`ProgramImage::functions`].
    FunctionIdx,
    /// Index into [`ProgramImage::structs`].
    StructIdx,
    /// Index into [`ProgramImage::string_table`].
    StringIdx,
    /// Index into [`ProgramImage::type_table`].
    TypeIdx,
    /// Index into [`ProgramImage::spec_idents`].
    SpecIdentIdx,
    /// Index into [`ProgramImage::identifiers`].
    IdentIdx,
    /// Index into the native function registry.
    NativeId,
    /// Word offset into [`ProgramImage::code`].
    CodeOffset,
}

/// Value kind of a type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Int,
    Float,
    String,
    Vector,
    Struct,
    Class,
    Function,
    Resource,
    Nil,
    Any,
}

/// One entry of the type table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    /// Back-reference into the struct table for struct and class types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub struct_idx: Option<StructIdx>,
}

/// First instruction offset at which `line` becomes the active source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEntry {
    pub bytecode_start: i32,
    pub line: i32,
    /// Index into [`ProgramImage::filenames`]
    #[serde(default)]
    pub file_idx: i32,
}

impl LineEntry {
    pub fn new(bytecode_start: i32, line: i32) -> Self {
        Self { bytecode_start, line, file_idx: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
}

/// A specialization of an identifier, which is what variable operands name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecIdent {
    pub ident: IdentIdx,
}

/// A function or struct table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntry {
    pub name: String,
}

impl NamedEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Errors that make an image unusable for disassembly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    /// No line breakpoints at all
    #[error("line info table is empty")]
    EmptyLineInfo,

    /// Breakpoints out of order
    #[error("line info entry {index} starts before its predecessor")]
    UnsortedLineInfo { index: usize },

    /// The first breakpoint must cover instruction 0
    #[error("line info starts at offset {0}, expected 0")]
    LineInfoNotAtZero(i32),
}

/// A fully parsed program image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramImage {
    /// Flat instruction stream
    pub code: Vec<i32>,
    pub type_table: Vec<TypeDescriptor>,
    /// Sorted ascending by `bytecode_start`
    pub line_info: Vec<LineEntry>,
    pub filenames: Vec<String>,
    pub identifiers: Vec<Identifier>,
    pub spec_idents: Vec<SpecIdent>,
    pub functions: Vec<NamedEntry>,
    pub structs: Vec<NamedEntry>,
    pub string_table: Vec<String>,
}

impl ProgramImage {
    /// Check the line-info invariants the sweep relies on.
    pub fn validate(&self) -> Result<(), ImageError> {
        let first = self.line_info.first().ok_or(ImageError::EmptyLineInfo)?;
        if first.bytecode_start != 0 {
            return Err(ImageError::LineInfoNotAtZero(first.bytecode_start));
        }
        for (index, pair) in self.line_info.windows(2).enumerate() {
            if pair[1].bytecode_start < pair[0].bytecode_start {
                return Err(ImageError::UnsortedLineInfo { index: index + 1 });
            }
        }
        Ok(())
    }

    /// Word at `at`, if inside the stream.
    pub fn word(&self, at: CodeOffset) -> Option<i32> {
        self.code.get(at.slot()?).copied()
    }

    pub fn function_name(&self, idx: FunctionIdx) -> Option<&str> {
        self.functions.get(idx.slot()?).map(|f| f.name.as_str())
    }

    pub fn struct_name(&self, idx: StructIdx) -> Option<&str> {
        self.structs.get(idx.slot()?).map(|s| s.name.as_str())
    }

    pub fn string(&self, idx: StringIdx) -> Option<&str> {
        self.string_table.get(idx.slot()?).map(String::as_str)
    }

    pub fn type_descriptor(&self, idx: TypeIdx) -> Option<&TypeDescriptor> {
        self.type_table.get(idx.slot()?)
    }

    /// Display name of a variable operand, through the spec-ident indirection.
    pub fn ident_name(&self, idx: SpecIdentIdx) -> Option<&str> {
        let spec = self.spec_idents.get(idx.slot()?)?;
        self.identifiers.get(spec.ident.slot()?).map(|i| i.name.as_str())
    }

    pub fn filename(&self, file_idx: i32) -> Option<&str> {
        let slot = usize::try_from(file_idx).ok()?;
        self.filenames.get(slot).map(String::as_str)
    }
}
