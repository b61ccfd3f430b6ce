//! Python bindings for the ildis disassembler

use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::exceptions::{PyIOError, PyValueError};
use crate::format::OutputFormat;
use crate::natreg::NativeRegistry;
use crate::parser::JsonImageParser;
use crate::{sweep, IlDecoder, ImageParser};

/// Disassemble a JSON program image with the given builtin names and output format
#[pyfunction]
#[pyo3(signature = (image_json, natives=Vec::new(), output_format="text"))]
fn disassemble(image_json: &str, natives: Vec<String>, output_format: &str) -> PyResult<String> {
    let image = JsonImageParser::new()
        .parse(image_json.as_bytes())
        .map_err(|e| PyValueError::new_err(format!("Failed to parse image: {}", e)))?;

    let output_format: OutputFormat = output_format
        .parse()
        .map_err(|e: String| PyValueError::new_err(e))?;

    let natives = NativeRegistry::new(natives);
    let disassembly = sweep::run(&image, &IlDecoder::new(&natives));

    output_format
        .get_formatter()
        .format(&disassembly)
        .map_err(|e| PyValueError::new_err(format!("Failed to format output: {}", e)))
}

/// Disassemble a JSON program image file
#[pyfunction]
#[pyo3(signature = (file_path, natives=Vec::new(), output_format="text"))]
fn disassemble_file(
    file_path: &str,
    natives: Vec<String>,
    output_format: &str,
) -> PyResult<String> {
    let data = std::fs::read_to_string(file_path)
        .map_err(|e| PyIOError::new_err(format!("Failed to read file {}: {}", file_path, e)))?;

    log::debug!("Disassembling file: {}", file_path);
    disassemble(&data, natives, output_format)
}

/// Python module initialization
#[pymodule]
fn ildis(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(disassemble, m)?)?;
    m.add_function(wrap_pyfunction!(disassemble_file, m)?)?;

    // Create the OutputFormat class as a dict
    let output_format = PyDict::new(m.py());
    for format in OutputFormat::available_formats() {
        output_format.set_item(format.to_string().to_uppercase(), format.to_string())?;
    }
    m.setattr("OutputFormat", output_format)?;

    Ok(())
}
