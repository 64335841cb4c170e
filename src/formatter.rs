//! Output formatters for scan results.
//!
//! This module provides trait-based formatters for rendering recognized files
//! in various output formats (human-readable, JSON, compact), plus the
//! histogram view that counts files per distinct format.

use crate::scanner::ScanReport;
use crate::types::{FormatSummary, RecognizedFile};

/// Trait for formatting scan results.
pub trait ReportFormatter {
    /// Format one recognized file.
    fn format_file(&self, file: &RecognizedFile) -> String;

    /// Format the whole report.
    ///
    /// Default implementation concatenates the per-file output.
    fn format_report(&self, report: &ScanReport) -> String {
        report
            .files
            .iter()
            .map(|file| self.format_file(file))
            .collect()
    }
}

/// Human-readable output formatter.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    /// Show faults attached to unrecognized files
    pub verbose: bool,
    /// Quiet mode (one line per file)
    pub quiet: bool,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose() -> Self {
        Self {
            verbose: true,
            quiet: false,
        }
    }

    pub fn quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }
}

impl ReportFormatter for HumanFormatter {
    fn format_file(&self, file: &RecognizedFile) -> String {
        if self.quiet {
            return format!("{}: {}\n", file.path.display(), file.summary.kind());
        }

        let mut s = format!("File: {}\n", file.path.display());
        s.push_str(&format!("  Format:     {}\n", file.summary.kind()));
        for (name, value) in file.summary.fields() {
            s.push_str(&format!("  {:<24}{}\n", format!("{}:", name), value));
        }
        if self.verbose {
            if let Some(ref error) = file.error {
                s.push_str(&format!("  [error] {}\n", error));
            }
        }
        s.push('\n');
        s
    }

    fn format_report(&self, report: &ScanReport) -> String {
        let mut s: String = report.files.iter().map(|f| self.format_file(f)).collect();
        if !self.quiet {
            s.push_str(&format!(
                "{} files, {} recognized, {} unrecognized",
                report.files.len(),
                report.recognized(),
                report.unrecognized()
            ));
            if report.skipped > 0 {
                s.push_str(&format!(", {} skipped", report.skipped));
            }
            if report.cancelled {
                s.push_str(" (cancelled)");
            }
            s.push('\n');
        }
        s
    }
}

/// JSON output formatter.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    /// Pretty-print JSON
    pub pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact JSON formatter.
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    fn render<T: serde::Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|_| "{}".to_string())
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_file(&self, file: &RecognizedFile) -> String {
        format!("{}\n", self.render(file))
    }

    fn format_report(&self, report: &ScanReport) -> String {
        #[derive(serde::Serialize)]
        struct JsonReport<'a> {
            files: &'a [RecognizedFile],
            recognized: usize,
            unrecognized: usize,
            skipped: usize,
            cancelled: bool,
        }

        let output = JsonReport {
            files: &report.files,
            recognized: report.recognized(),
            unrecognized: report.unrecognized(),
            skipped: report.skipped,
            cancelled: report.cancelled,
        };
        format!("{}\n", self.render(&output))
    }
}

/// Compact single-line output formatter.
#[derive(Debug, Clone, Default)]
pub struct ShortFormatter;

impl ShortFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportFormatter for ShortFormatter {
    fn format_file(&self, file: &RecognizedFile) -> String {
        let detail = match &file.summary {
            FormatSummary::Pe(pe) => format!("{}\t{}\t{}", pe.architecture, pe.bits, pe.endianness),
            FormatSummary::Elf(elf) => {
                format!("{}\t{}\t{}", elf.architecture, elf.bits, elf.endianness)
            }
            FormatSummary::MachO(macho) if macho.is_fat => {
                let arches: Vec<String> = macho
                    .inner_apps
                    .iter()
                    .map(|app| {
                        app.architecture
                            .map_or_else(|| "fat".to_string(), |a| a.to_string())
                    })
                    .collect();
                format!("fat\t[{}]", arches.join(","))
            }
            FormatSummary::MachO(macho) => format!(
                "{}\t{}\t{}",
                macho
                    .architecture
                    .map_or_else(|| "-".to_string(), |a| a.to_string()),
                macho.bits,
                macho.endianness
            ),
            FormatSummary::Text(text) => text_detail(text.encoding_name.as_str(), text.has_bom),
            FormatSummary::Xml(xml) => {
                text_detail(xml.text.encoding_name.as_str(), xml.text.has_bom)
            }
            FormatSummary::Unknown => "-".to_string(),
        };
        format!("{}\t{}\t{}\n", file.path.display(), file.summary.kind(), detail)
    }
}

fn text_detail(encoding: &str, has_bom: bool) -> String {
    if has_bom {
        format!("{}\tbom", encoding)
    } else {
        encoding.to_string()
    }
}

/// Render `(summary, count)` rows, one per line, count first.
pub fn format_histogram(rows: &[(FormatSummary, usize)]) -> String {
    let width = rows
        .iter()
        .map(|(_, count)| count.to_string().len())
        .max()
        .unwrap_or(1);
    rows.iter()
        .map(|(summary, count)| format!("{:>width$}  {}\n", count, summary, width = width))
        .collect()
}
