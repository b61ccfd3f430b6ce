//! Linear sweep over the instruction stream.

use std::time::Instant;
use rayon::prelude::*;

use crate::decoder::IlDecoder;
use crate::format::render_text;
use crate::image::ProgramImage;
use crate::line::locate_line;
use crate::natreg::NativeRegistry;
use crate::{Cursor, Decoder, Disassembly, ListingLine, Stop};

/// Linear-sweep disassembly of one image
///
/// Decodes from offset 0 to the end of the stream, tagging each instruction
/// with its active source line. Stops early, without error, at the first
/// illegal or truncated instruction; that instruction is recorded in
/// [`Disassembly::stop`].
///
/// # Panics
/// If the image has no line info.
pub fn run(image: &ProgramImage, decoder: &dyn Decoder) -> Disassembly {
    log::debug!("Starting linear sweep over {} words", image.code.len());
    let start_time = Instant::now();

    let mut disasm = Disassembly::default();
    let mut at: Cursor = 0;

    while at < image.code.len() {
        let entry = locate_line(at, &image.line_info);
        let file = image.filename(entry.file_idx).map(str::to_string);
        match decoder.decode(image, at) {
            Ok(insn) => {
                log::trace!("{:>6}: {}", at, insn);
                disasm.lines.push(ListingLine {
                    offset: at,
                    line: entry.line,
                    file,
                    mnemonic: insn.opcode.to_string(),
                    operands: insn.operands,
                });
                at = insn.next;
            }
            Err(error) => {
                log::warn!("Sweep stopped at offset {}: {}", at, error);
                disasm.stop = Some(Stop { offset: at, line: entry.line, file, error });
                break;
            }
        }
    }

    log::debug!(
        "Linear sweep completed in {:?}: {} instructions",
        start_time.elapsed(),
        disasm.instruction_count()
    );
    disasm
}

/// Sweep independent images in parallel, one result per image in input order.
pub fn run_all(images: &[ProgramImage], decoder: &dyn Decoder) -> Vec<Disassembly> {
    log::debug!("Sweeping {} images in parallel", images.len());
    images.par_iter().map(|image| run(image, decoder)).collect()
}

/// Disassemble `image` to text, one `I <offset> L <line> <mnemonic> <operands>`
/// line per instruction.
pub fn disassemble(image: &ProgramImage, natives: &NativeRegistry) -> String {
    render_text(&run(image, &IlDecoder::new(natives)))
}

/// Text disassembly of each image, each with its own output buffer.
pub fn disassemble_all(images: &[ProgramImage], natives: &NativeRegistry) -> Vec<String> {
    run_all(images, &IlDecoder::new(natives)).iter().map(render_text).collect()
}
