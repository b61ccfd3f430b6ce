//! serde_json-based program image loader.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::image::ProgramImage;
use crate::natreg::NativeRegistry;
use crate::{DisassemblyError, ImageParser};

/// A parser for program images serialized as JSON.
#[derive(Debug, Default)]
pub struct JsonImageParser;

impl JsonImageParser {
    /// Construct a new JsonImageParser.
    pub fn new() -> Self {
        JsonImageParser
    }

    /// Read and parse an image file.
    pub fn parse_file(&self, path: &Path) -> Result<ProgramImage, DisassemblyError> {
        let data = fs::read(path)?;
        log::debug!("Read {} bytes from {}", data.len(), path.display());
        self.parse(&data)
    }
}

impl fmt::Display for JsonImageParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonImageParser")
    }
}

impl ImageParser for JsonImageParser {
    fn parse(&self, data: &[u8]) -> Result<ProgramImage, DisassemblyError> {
        let image: ProgramImage = serde_json::from_slice(data)
            .map_err(|e| DisassemblyError::ParsingError(e.to_string()))?;
        image.validate()?;
        log::debug!(
            "Parsed image: {} code words, {} line entries, {} functions",
            image.code.len(),
            image.line_info.len(),
            image.functions.len()
        );
        Ok(image)
    }
}

/// Parse a native registry from a JSON array of builtin names.
pub fn load_native_registry(data: &[u8]) -> Result<NativeRegistry, DisassemblyError> {
    serde_json::from_slice(data).map_err(|e| DisassemblyError::ParsingError(e.to_string()))
}
