use anyhow::Result;
use clap::ValueEnum;
use colored::{Color, Colorize};
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;
use std::io::Write;

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Trait for data that can be displayed as a table
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

/// Output manager handles formatting and display
pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    fn paint(&self, icon: &str, color: Color, message: &str) -> String {
        if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        }
    }

    pub fn success(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.paint(ICONS.success, THEME.success, message));
        }
    }

    /// Errors always print, even in quiet mode.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.paint(ICONS.error, THEME.error, message));
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.paint(ICONS.warning, THEME.warning, message));
        }
    }

    pub fn info(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.paint(ICONS.info, THEME.info, message));
        }
    }

    /// Verbose diagnostics, only with --verbose
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.paint(ICONS.arrow, THEME.muted, message));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.options.quiet {
            if self.options.no_color {
                println!("\n{text}\n{}", "=".repeat(text.len()));
            } else {
                println!("\n{}", text.color(THEME.primary).bold());
            }
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if !self.options.quiet {
            if self.options.no_color {
                println!("{key}: {value}");
            } else {
                println!("{}: {}", key.color(THEME.key).bold(), value.color(THEME.value));
            }
        }
    }

    pub fn bullet(&self, text: &str) {
        if !self.options.quiet {
            if self.options.no_color {
                println!("  {} {text}", ICONS.bullet);
            } else {
                println!("  {} {text}", ICONS.bullet.color(THEME.muted));
            }
        }
    }

    /// Indented detail line with a custom prefix icon
    pub fn indented(&self, icon: &str, text: &str) {
        if !self.options.quiet {
            if self.options.no_color {
                println!("    {icon} {text}");
            } else {
                println!("    {} {text}", icon.color(THEME.muted));
            }
        }
    }

    /// Create a themed table
    pub fn create_table(&self) -> Table {
        let mut table = Table::new();
        if self.options.no_color {
            table.load_preset(comfy_table::presets::ASCII_FULL);
        } else {
            table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        }
        table
    }

    /// Add themed header to table
    pub fn add_table_header(&self, table: &mut Table, headers: Vec<&str>) {
        let header_cells: Vec<Cell> = headers
            .iter()
            .map(|h| {
                let cell = Cell::new(h).add_attribute(Attribute::Bold);
                if self.options.no_color {
                    cell
                } else {
                    cell.fg(TableColor::Cyan)
                }
            })
            .collect();
        table.set_header(header_cells);
    }

    /// Display progress indicator
    pub fn progress(&self, message: &str) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }

        let line = self.paint(ICONS.loading, THEME.highlight, message);
        print!("\r{line}...");
        std::io::stdout().flush().ok();
    }

    /// Clear the current line (useful after progress indicators)
    pub fn clear_line(&self) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }

        print!("\r{}\r", " ".repeat(80));
        std::io::stdout().flush().ok();
    }
}
