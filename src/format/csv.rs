//! CSV output formatter

use crate::{Disassembly, DisassemblyError};
use super::DisassemblyFormatter;

const HEADER: [&str; 5] = ["offset", "line", "file", "mnemonic", "operands"];

fn csv_error(e: impl std::fmt::Display) -> DisassemblyError {
    DisassemblyError::FormatError(format!("CSV serialization error: {}", e))
}

/// One row per instruction, then a stop row tagged by its marker.
fn rows(disassembly: &Disassembly) -> impl Iterator<Item = [String; 5]> + '_ {
    let insns = disassembly.lines.iter().map(|insn| {
        [
            insn.offset.to_string(),
            insn.line.to_string(),
            insn.file.clone().unwrap_or_default(),
            insn.mnemonic.clone(),
            insn.operands.clone(),
        ]
    });
    let stop = disassembly.stop.iter().map(|stop| {
        [
            stop.offset.to_string(),
            stop.line.to_string(),
            stop.file.clone().unwrap_or_default(),
            stop.error.marker().to_string(),
            stop.error.to_string(),
        ]
    });
    insns.chain(stop)
}

fn writer() -> csv::Writer<Vec<u8>> {
    // The header is written by hand so an empty listing still gets one
    csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, DisassemblyError> {
    let bytes = writer.into_inner().map_err(csv_error)?;
    String::from_utf8(bytes).map_err(csv_error)
}

impl DisassemblyFormatter for super::CsvFormatter {
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError> {
        let mut writer = writer();
        writer.write_record(HEADER).map_err(csv_error)?;
        for row in rows(disassembly) {
            writer.write_record(&row).map_err(csv_error)?;
        }
        finish(writer)
    }

    /// One table for all images, with a leading `image` column.
    fn format_batch(&self, batch: &[(&str, &Disassembly)]) -> Result<String, DisassemblyError> {
        let mut writer = writer();
        writer.write_record(std::iter::once("image").chain(HEADER)).map_err(csv_error)?;
        for (image, disassembly) in batch {
            for row in rows(disassembly) {
                let record = std::iter::once(*image).chain(row.iter().map(String::as_str));
                writer.write_record(record).map_err(csv_error)?;
            }
        }
        finish(writer)
    }
}
