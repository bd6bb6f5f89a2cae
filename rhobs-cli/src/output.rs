//! Output formatting for CLI
//!
//! Command results go to stdout in the selected format. Status lines go to
//! stderr whenever stdout carries JSON or YAML so the result stays parseable.

use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    fn is_machine_readable(self) -> bool {
        self != OutputFormat::Table
    }
}

/// Prints command results and status lines for one output format
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print rows as a table, or as a JSON/YAML list
    pub fn rows<T: Tabled + Serialize>(&self, rows: Vec<T>) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Table if rows.is_empty() => println!("{}", "Nothing to show".yellow()),
            OutputFormat::Table => println!("{}", Table::new(rows)),
            format => print!("{}", encode(&rows, format)?),
        }
        Ok(())
    }

    /// Print a nested document. Tables have no sensible shape for these, so
    /// the table format falls back to JSON.
    pub fn document<T: Serialize>(&self, data: &T) -> anyhow::Result<()> {
        let format = match self.format {
            OutputFormat::Table => OutputFormat::Json,
            format => format,
        };
        print!("{}", encode(data, format)?);
        Ok(())
    }

    pub fn success(&self, message: &str) {
        self.status(format!("{} {}", "✓".green().bold(), message.green()));
    }

    pub fn info(&self, message: &str) {
        self.status(format!("{} {}", "ℹ".blue().bold(), message));
    }

    fn status(&self, line: String) {
        if self.format.is_machine_readable() {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

/// Encode `data` as newline-terminated JSON or YAML
fn encode<T: Serialize + ?Sized>(data: &T, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Json | OutputFormat::Table => {
            let mut json = serde_json::to_string_pretty(data)?;
            json.push('\n');
            json
        }
    })
}

/// Print an error message with red X
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Join a list for a table cell, shortening long lists
pub fn join_limited(items: &[String], max: usize) -> String {
    if items.len() <= max {
        items.join(", ")
    } else {
        format!("{}, ... (+{})", items[..max].join(", "), items.len() - max)
    }
}

/// Truncate a string to max length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        cluster: &'static str,
        files: usize,
    }

    #[test]
    fn test_encode_formats() {
        let rows = vec![Row { cluster: "rhobsp01ue1", files: 3 }];

        let json = encode(&rows, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["cluster"], "rhobsp01ue1");
        assert!(json.ends_with('\n'));

        let yaml = encode(&rows, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("cluster: rhobsp01ue1"));
        assert!(yaml.contains("files: 3"));
    }

    #[test]
    fn test_status_stays_off_machine_output() {
        assert!(!OutputFormat::Table.is_machine_readable());
        assert!(OutputFormat::Json.is_machine_readable());
        assert!(OutputFormat::Yaml.is_machine_readable());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("observatorium", 20), "observatorium");
        assert_eq!(truncate("observatorium", 8), "obser...");
        assert_eq!(truncate("observatorium", 2), "ob");
    }

    #[test]
    fn test_join_limited() {
        let items: Vec<String> = ["a", "b", "c"].map(String::from).to_vec();
        assert_eq!(join_limited(&items, 3), "a, b, c");
        assert_eq!(join_limited(&items, 1), "a, ... (+2)");
    }
}
