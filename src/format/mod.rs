//! Output format module implementation

mod json;
mod csv;

pub use self::json::*;
pub use self::csv::*;

use crate::{Disassembly, DisassemblyError};
use std::fmt;
use std::str::FromStr;
use clap::ValueEnum;

/// Supported output formats for disassembly results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `I <offset> L <line> <mnemonic> <operands>` lines (default)
    Text,
    /// JSON format (one document)
    Json,
    /// JSON Lines format (one JSON object per line)
    #[value(name = "jsonl", alias = "jsonlines")]
    JsonLines,
    /// CSV format (comma-separated values)
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Text
    }
}

impl OutputFormat {
    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Csv,
        ]
    }

    /// Get a formatter for this output format
    pub fn get_formatter(&self) -> Box<dyn DisassemblyFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter),
            OutputFormat::Csv => Box::new(CsvFormatter),
        }
    }
}

/// Formatter trait for disassembly output
pub trait DisassemblyFormatter: Send + Sync {
    /// Format a disassembly result
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError>;

    /// Format the listings of several images, in order, as one output.
    ///
    /// The default concatenates each listing's [`format`](Self::format)
    /// output, one after the other.
    fn format_batch(&self, batch: &[(&str, &Disassembly)]) -> Result<String, DisassemblyError> {
        let mut output = String::new();
        for (_, disassembly) in batch {
            output.push_str(&self.format(disassembly)?);
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
        }
        Ok(output)
    }
}

/// Format disassembly in plain text
pub struct TextFormatter;

/// Format disassembly in JSON
pub struct JsonFormatter;

/// Format disassembly in JSON Lines
pub struct JsonLinesFormatter;

/// Format disassembly in CSV
pub struct CsvFormatter;

/// Canonical text listing. A sweep that stopped early ends with its marker
/// line.
pub fn render_text(disassembly: &Disassembly) -> String {
    let mut output = String::new();
    for line in &disassembly.lines {
        output.push_str(&line.to_string());
        output.push('\n');
    }
    if let Some(stop) = &disassembly.stop {
        output.push_str(&stop.to_string());
        output.push('\n');
    }
    output
}

impl DisassemblyFormatter for TextFormatter {
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError> {
        Ok(render_text(disassembly))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DecodeError, ListingLine, Stop};

    pub(super) fn sample_disassembly() -> Disassembly {
        Disassembly {
            lines: vec![
                ListingLine {
                    offset: 0,
                    line: 1,
                    file: Some("main.lobster".to_string()),
                    mnemonic: "PUSHSTR".to_string(),
                    operands: "\"a, \\\"b\\\"\"".to_string(),
                },
                ListingLine {
                    offset: 2,
                    line: 2,
                    file: Some("main.lobster".to_string()),
                    mnemonic: "POP".to_string(),
                    operands: String::new(),
                },
            ],
            stop: Some(Stop {
                offset: 3,
                line: 2,
                file: Some("main.lobster".to_string()),
                error: DecodeError::IllegalOpcode(-7),
            }),
        }
    }

    #[test]
    fn test_text_formatter() {
        let result = TextFormatter.format(&sample_disassembly()).unwrap();
        let lines: Vec<&str> = result.lines().collect();

        assert_eq!(lines[0], "I 0 L 1 PUSHSTR \"a, \\\"b\\\"\"");
        assert_eq!(lines[1], "I 2 L 2 POP");
        assert_eq!(lines[2], "I 3 L 2 ILLEGAL INSTRUCTION: -7");
        assert!(result.ends_with('\n'));
    }

    #[test]
    fn test_text_batch_concatenates_in_order() {
        let sample = sample_disassembly();
        let mut complete = sample_disassembly();
        complete.stop = None;
        let batch = [("a.json", &complete), ("b.json", &sample)];

        let output = TextFormatter.format_batch(&batch).unwrap();
        let expected = format!("{}{}", render_text(&complete), render_text(&sample));
        assert_eq!(output, expected);
        assert_eq!(output.lines().count(), 5);
    }

    #[test]
    fn test_format_names_roundtrip() {
        for format in OutputFormat::available_formats() {
            assert_eq!(format.to_string().parse::<OutputFormat>(), Ok(*format));
        }
        assert_eq!("JSONLINES".parse::<OutputFormat>(), Ok(OutputFormat::JsonLines));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_every_format_renders() {
        let disasm = sample_disassembly();
        for format in OutputFormat::available_formats() {
            let output = format.get_formatter().format(&disasm).unwrap();
            assert!(!output.is_empty(), "Empty output for format {:?}", format);
        }
    }
}
