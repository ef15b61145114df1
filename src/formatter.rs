//! Output formatters for extraction reports.
//!
//! This module provides trait-based formatters for rendering segment reports
//! in various output formats (human-readable, JSON, compact).

use crate::types::SegmentReport;
use std::path::Path;

/// Trait for formatting the segment reports of one tape image.
///
/// Implementors render the image header and each segment; the default
/// `format_image` joins them.
pub trait SegmentFormatter {
    /// Format the file path header.
    fn format_file(&self, path: &Path) -> String;

    /// Format one segment.
    fn format_segment(&self, report: &SegmentReport) -> Option<String>;

    /// Format the files written for one segment.
    fn format_outputs(&self, outputs: &[String]) -> Option<String>;

    /// Format every segment of an image.
    fn format_image(&self, reports: &[SegmentReport], path: &Path) -> String {
        let mut parts = vec![self.format_file(path)];
        for report in reports {
            if let Some(s) = self.format_segment(report) {
                parts.push(s);
            }
            if let Some(s) = self.format_outputs(&report.outputs) {
                parts.push(s);
            }
        }
        parts.join("")
    }
}

/// Human-readable output formatter.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    /// Show verbose output (marker offsets, family details)
    pub verbose: bool,
    /// Quiet mode (output file names only)
    pub quiet: bool,
}

impl HumanFormatter {
    /// Create a new human formatter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verbose formatter.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            quiet: false,
        }
    }

    /// Create a quiet formatter.
    pub fn quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }
}

impl SegmentFormatter for HumanFormatter {
    fn format_file(&self, path: &Path) -> String {
        if self.quiet {
            String::new()
        } else {
            format!("File: {}\n", path.display())
        }
    }

    fn format_segment(&self, report: &SegmentReport) -> Option<String> {
        if self.quiet {
            return None;
        }

        let mut s = format!("  Segment {}:\n", report.index);
        s.push_str(&format!("    Loader:  {}\n", report.family.name()));
        s.push_str(&format!("    Start:   0x{:04X}\n", report.addresses.start));
        s.push_str(&format!("    Stop:    0x{:04X}\n", report.addresses.stop_exclusive));
        s.push_str(&format!("    Entry:   0x{:04X}\n", report.addresses.entry));
        if let Some(ref name) = report.load_name {
            s.push_str(&format!("    Name:    {name}\n"));
        }
        if self.verbose {
            s.push_str(&format!("    Offset:  0x{:X}\n", report.offset));
            s.push_str(&format!("    Length:  {} bytes\n", report.payload_len));
        }
        Some(s)
    }

    fn format_outputs(&self, outputs: &[String]) -> Option<String> {
        if outputs.is_empty() {
            return None;
        }
        if self.quiet {
            return Some(outputs.iter().map(|o| format!("{o}\n")).collect());
        }
        Some(
            outputs
                .iter()
                .map(|o| format!("    Wrote:   {o}\n"))
                .collect(),
        )
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
    /// Create a new JSON formatter with pretty printing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact JSON formatter.
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl SegmentFormatter for JsonFormatter {
    fn format_file(&self, _path: &Path) -> String {
        String::new() // Handled in format_image
    }

    fn format_segment(&self, _report: &SegmentReport) -> Option<String> {
        None // Handled in format_image
    }

    fn format_outputs(&self, _outputs: &[String]) -> Option<String> {
        None // Handled in format_image
    }

    fn format_image(&self, reports: &[SegmentReport], path: &Path) -> String {
        #[derive(serde::Serialize)]
        struct JsonOutput<'a> {
            file: String,
            segments: &'a [SegmentReport],
        }

        let output = JsonOutput {
            file: path.display().to_string(),
            segments: reports,
        };

        let json = if self.pretty {
            serde_json::to_string_pretty(&output)
        } else {
            serde_json::to_string(&output)
        };
        let mut s = json.unwrap_or_else(|_| "{}".to_string());
        s.push('\n');
        s
    }
}

/// Compact single-line-per-segment output formatter.
#[derive(Debug, Clone, Default)]
pub struct ShortFormatter;

impl ShortFormatter {
    /// Create a new short formatter.
    pub fn new() -> Self {
        Self
    }
}

impl SegmentFormatter for ShortFormatter {
    fn format_file(&self, _path: &Path) -> String {
        String::new() // Handled in format_image
    }

    fn format_segment(&self, _report: &SegmentReport) -> Option<String> {
        None
    }

    fn format_outputs(&self, _outputs: &[String]) -> Option<String> {
        None
    }

    fn format_image(&self, reports: &[SegmentReport], path: &Path) -> String {
        reports
            .iter()
            .map(|r| {
                format!(
                    "{}\t{}\t{}\t{}\t{}\n",
                    path.display(),
                    r.index,
                    r.family,
                    r.addresses.file_suffix(),
                    r.load_name.as_deref().unwrap_or("-")
                )
            })
            .collect()
    }
}
