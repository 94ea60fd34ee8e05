//! Shared colored output utilities for CLI commands.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects `NO_COLOR` environment variable and `--color` flag.

use chtl_modules::ModuleRecord;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Styled output writer for terminal.
pub struct StyledOutput {
    stdout: StandardStream,
    stderr: StandardStream,
}

impl StyledOutput {
    /// Create a new styled output with the given color choice.
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
        }
    }

    /// Write text with a specific color and style.
    pub fn write_styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = self.stdout.set_color(&spec);
        let _ = write!(self.stdout, "{}", text);
        let _ = self.stdout.reset();
    }

    /// Green bold text.
    pub fn success(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Green), true);
    }

    /// Yellow bold text.
    pub fn warning(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Yellow), true);
    }

    /// Cyan text.
    pub fn info(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Cyan), false);
    }

    /// Dim/gray text.
    pub fn dim(&mut self, text: &str) {
        self.write_styled(text, Some(Color::White), false);
    }

    /// Bold text.
    pub fn bold(&mut self, text: &str) {
        self.write_styled(text, None, true);
    }

    /// Plain text (no color).
    pub fn plain(&mut self, text: &str) {
        let _ = write!(self.stdout, "{}", text);
    }

    pub fn newline(&mut self) {
        let _ = writeln!(self.stdout);
    }

    /// Aligned `label: value` line.
    pub fn field(&mut self, label: &str, value: &str) {
        self.dim(&format!("  {:<14}", format!("{}:", label)));
        self.plain(value);
        self.newline();
    }

    /// One-line summary of a record: name, type, path and flags.
    pub fn record_line(&mut self, record: &ModuleRecord) {
        self.bold(&record.name);
        self.plain(" ");
        self.info(&format!("[{}]", record.file_type));
        self.plain(" ");
        self.dim(&record.path.display().to_string());
        if record.official {
            self.plain(" ");
            self.success("official");
        }
        self.newline();
    }

    /// Full record listing with exports and dependencies.
    pub fn record_details(&mut self, record: &ModuleRecord) {
        self.record_line(record);
        self.field("kind", &format!("{:?}", record.kind));
        self.field("location", &format!("{:?}", record.location));
        if let Some(version) = &record.version {
            self.field("version", version);
        }
        if let Some(description) = &record.description {
            self.field("description", description);
        }
        self.field("size", &format!("{} bytes", record.size_bytes));
        if !record.dependencies.is_empty() {
            self.field("dependencies", &record.dependencies.join(", "));
        }
        if let Some(payload) = &record.payload {
            self.field("content", payload);
        }
        if !record.exports.is_empty() {
            self.dim("  exports:");
            self.newline();
            for export in &record.exports {
                self.plain(&format!("    {} ", export.name));
                self.info(export.kind.as_str());
                if let Some(signature) = &export.signature {
                    self.dim(&format!("  {}", signature));
                }
                self.newline();
            }
        }
    }

    /// JSON value, pretty-printed.
    pub fn json(&mut self, value: &serde_json::Value) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut self.stdout, value)?;
        self.newline();
        Ok(())
    }

    /// Write error message to stderr.
    pub fn stderr_error(&mut self, text: &str) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Red)).set_bold(true);
        let _ = self.stderr.set_color(&spec);
        let _ = write!(self.stderr, "{}", text);
        let _ = self.stderr.reset();
    }
}
