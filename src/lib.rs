//! Core IR, traits, and dispatch for the `ildis` bytecode disassembler.
//!
//! This library renders the instruction stream of a compiled stack-VM program
//! image as text, one instruction per line, annotated with the source line the
//! instruction came from. It never executes the bytecode; it only describes it.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::fs;
//! use ildis::{
//!     parser::JsonImageParser,
//!     natreg::NativeRegistry,
//!     sweep,
//!     ImageParser, // Import the trait to bring parse() method into scope
//! };
//!
//! // Read a serialized program image
//! let image_data = fs::read("path/to/program.json").unwrap();
//!
//! // Parse and validate it
//! let parser = JsonImageParser::new();
//! let image = parser.parse(&image_data).unwrap();
//!
//! // Builtins are resolved through the host's native registry
//! let natives = NativeRegistry::new(vec!["print".to_string()]);
//!
//! // One `I <offset> L <line> <mnemonic> <operands>` line per instruction
//! let text = sweep::disassemble(&image, &natives);
//! print!("{}", text);
//! ```

pub mod decoder;
pub mod format;
pub mod image;
pub mod line;
pub mod natreg;
pub mod opcode;
pub mod parser;
pub mod sweep;
#[cfg(feature = "extension-module")]
pub mod python;

use std::fmt;

pub use crate::decoder::{DecodeError, IlDecoder};
pub use crate::image::{ImageError, ProgramImage};
pub use crate::opcode::OpCode;

/// Read position within the instruction stream, in 32-bit words.
pub type Cursor = usize;

/// One decoded instruction.
///
/// Lives only as long as one decode step; the sweep turns it into a
/// [`ListingLine`] straight away.
#[derive(Debug, Clone, PartialEq)]
pub struct Insn {
    /// Offset of the opcode word
    pub offset: Cursor,
    /// Decoded opcode
    pub opcode: OpCode,
    /// Rendered operand text, possibly empty
    pub operands: String,
    /// Offset of the next instruction
    pub next: Cursor,
}

impl Insn {
    /// Number of words consumed, opcode included.
    pub fn width(&self) -> usize {
        self.next - self.offset
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands)?;
        }
        Ok(())
    }
}

/// Decoder trait: opcode-schema aware instruction decoder.
pub trait Decoder: Send + Sync {
    /// Decode a single instruction at word offset `at`.
    ///
    /// # Arguments
    /// * `image` - The program image to decode from
    /// * `at` - Word offset of the opcode
    ///
    /// # Returns
    /// The decoded instruction, whose `next` is strictly greater than `at`,
    /// or the terminal error that stops the sweep.
    fn decode(&self, image: &ProgramImage, at: Cursor) -> Result<Insn, DecodeError>;
}

/// One rendered line of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingLine {
    /// Offset of the instruction
    pub offset: Cursor,
    /// Active source line
    pub line: i32,
    /// Source file the line belongs to, if the image names one
    pub file: Option<String>,
    /// Instruction mnemonic (e.g., "PUSHINT", "VAR_WRITE")
    pub mnemonic: String,
    /// Operands as string representation
    pub operands: String,
}

impl fmt::Display for ListingLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I {} L {} {}", self.offset, self.line, self.mnemonic)?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands)?;
        }
        Ok(())
    }
}

/// Where and why a sweep stopped before the end of the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub offset: Cursor,
    pub line: i32,
    pub file: Option<String>,
    pub error: DecodeError,
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I {} L {} {}", self.offset, self.line, self.error)
    }
}

/// Output of one disassembly pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Disassembly {
    /// Successfully decoded instructions, in stream order
    pub lines: Vec<ListingLine>,
    /// Set when the pass hit an illegal or truncated instruction
    pub stop: Option<Stop>,
}

impl Disassembly {
    /// Get the number of decoded instructions
    pub fn instruction_count(&self) -> usize {
        self.lines.len()
    }

    /// True when the whole stream was decoded
    pub fn is_complete(&self) -> bool {
        self.stop.is_none()
    }
}

/// Parser trait: turn a serialized program image into a `ProgramImage`.
pub trait ImageParser: Send + Sync {
    /// Parse image data
    ///
    /// # Arguments
    /// * `data` - The serialized image
    ///
    /// # Returns
    /// Result containing a validated ProgramImage
    fn parse(&self, data: &[u8]) -> Result<ProgramImage, DisassemblyError>;
}

/// Error type for disassembly operations
#[derive(Debug, thiserror::Error)]
pub enum DisassemblyError {
    /// Failed to parse the image container
    #[error("Failed to parse program image: {0}")]
    ParsingError(String),

    /// The image parsed but breaks a table invariant
    #[error("Invalid program image: {0}")]
    InvalidImage(#[from] ImageError),

    /// Output formatting failed
    #[error("Format error: {0}")]
    FormatError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
