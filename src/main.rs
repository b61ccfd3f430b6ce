use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use ildis::format::OutputFormat;
use ildis::natreg::NativeRegistry;
use ildis::parser::{load_native_registry, JsonImageParser};
use ildis::{sweep, Disassembly, IlDecoder};

/// Disassemble stack VM program images into line-annotated text.
#[derive(Parser, Debug)]
#[command(name = "ildis", version, about)]
struct Args {
    /// Program image files (JSON)
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// JSON array of native function names, indexed by builtin id
    #[arg(short, long)]
    natives: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let natives = match &args.natives {
        Some(path) => {
            let data = fs::read(path)
                .with_context(|| format!("Failed to read native registry {}", path.display()))?;
            load_native_registry(&data)
                .with_context(|| format!("Failed to parse native registry {}", path.display()))?
        }
        None => NativeRegistry::default(),
    };

    let parser = JsonImageParser::new();
    let images = args
        .images
        .iter()
        .map(|path| {
            parser
                .parse_file(path)
                .with_context(|| format!("Failed to load image {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let decoder = IlDecoder::new(&natives);
    log::info!("Disassembling {} image(s) with {}", images.len(), decoder);
    let results = sweep::run_all(&images, &decoder);

    let names: Vec<String> = args.images.iter().map(|p| p.display().to_string()).collect();
    for (name, disassembly) in names.iter().zip(&results) {
        if let Some(stop) = &disassembly.stop {
            log::warn!("{}: stopped early at offset {}", name, stop.offset);
        }
    }

    let formatter = args.format.get_formatter();
    let mut all_output = match results.as_slice() {
        [single] => formatter
            .format(single)
            .with_context(|| format!("Failed to format {}", names[0]))?,
        _ => {
            let batch: Vec<(&str, &Disassembly)> =
                names.iter().map(String::as_str).zip(&results).collect();
            formatter.format_batch(&batch).context("Failed to format listings")?
        }
    };
    if !all_output.is_empty() && !all_output.ends_with('\n') {
        all_output.push('\n');
    }

    match &args.output {
        Some(path) => fs::write(path, all_output)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", all_output),
    }

    Ok(())
}
