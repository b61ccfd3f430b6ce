//! JSON and JSON Lines output formatters

use serde::Serialize;
use serde_json::{json, Value};

use crate::{Disassembly, DisassemblyError, ListingLine, Stop};
use super::DisassemblyFormatter;

/// Serializable instruction for JSON output
#[derive(Serialize)]
struct InstructionJson {
    /// Word offset of the instruction
    offset: usize,
    /// Active source line
    line: i32,
    /// Source file, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    mnemonic: String,
    operands: String,
}

/// Serializable early stop for JSON output
#[derive(Serialize)]
struct StopJson {
    offset: usize,
    line: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    /// "ILLEGAL", "TRUNCATED" or "BADCALL"
    kind: String,
    message: String,
}

/// Serializable disassembly result for JSON output
#[derive(Serialize)]
struct DisassemblyJson {
    /// Image the listing came from, set in batch output
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    complete: bool,
    instructions: Vec<InstructionJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<StopJson>,
}

fn json_error(e: serde_json::Error) -> DisassemblyError {
    DisassemblyError::FormatError(format!("JSON serialization error: {}", e))
}

fn disassembly_to_json(image: Option<&str>, disassembly: &Disassembly) -> DisassemblyJson {
    DisassemblyJson {
        image: image.map(str::to_string),
        complete: disassembly.is_complete(),
        instructions: disassembly.lines.iter().map(instruction_to_json).collect(),
        stop: disassembly.stop.as_ref().map(stop_to_json),
    }
}

impl DisassemblyFormatter for super::JsonFormatter {
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError> {
        serde_json::to_string_pretty(&disassembly_to_json(None, disassembly)).map_err(json_error)
    }

    /// One array holding a document per image.
    fn format_batch(&self, batch: &[(&str, &Disassembly)]) -> Result<String, DisassemblyError> {
        let docs: Vec<DisassemblyJson> = batch
            .iter()
            .map(|(image, disassembly)| disassembly_to_json(Some(*image), disassembly))
            .collect();
        let mut output = serde_json::to_string_pretty(&docs).map_err(json_error)?;
        output.push('\n');
        Ok(output)
    }
}

/// Instruction records followed by the stop record, if any.
fn records(image: Option<&str>, disassembly: &Disassembly) -> Vec<Value> {
    let mut records: Vec<Value> = disassembly
        .lines
        .iter()
        .map(|insn| json!({ "type": "instruction", "instruction": instruction_to_json(insn) }))
        .chain(
            disassembly
                .stop
                .iter()
                .map(|stop| json!({ "type": "stop", "stop": stop_to_json(stop) })),
        )
        .collect();
    if let Some(image) = image {
        for record in &mut records {
            record["image"] = json!(image);
        }
    }
    records
}

fn write_lines(records: Vec<Value>) -> Result<String, DisassemblyError> {
    let mut output = String::new();
    for record in records {
        output.push_str(&serde_json::to_string(&record).map_err(json_error)?);
        output.push('\n');
    }
    Ok(output)
}

impl DisassemblyFormatter for super::JsonLinesFormatter {
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError> {
        write_lines(records(None, disassembly))
    }

    /// Every record carries an `image` field.
    fn format_batch(&self, batch: &[(&str, &Disassembly)]) -> Result<String, DisassemblyError> {
        write_lines(
            batch
                .iter()
                .flat_map(|(image, disassembly)| records(Some(*image), disassembly))
                .collect(),
        )
    }
}

/// Convert an instruction to JSON format
fn instruction_to_json(insn: &ListingLine) -> InstructionJson {
    InstructionJson {
        offset: insn.offset,
        line: insn.line,
        file: insn.file.clone(),
        mnemonic: insn.mnemonic.clone(),
        operands: insn.operands.clone(),
    }
}

fn stop_to_json(stop: &Stop) -> StopJson {
    StopJson {
        offset: stop.offset,
        line: stop.line,
        file: stop.file.clone(),
        kind: stop.error.marker().to_string(),
        message: stop.error.to_string(),
    }
}
