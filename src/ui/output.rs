use std::io::{self, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use crossterm::style::{self, Color, Stylize};
use unicode_width::UnicodeWidthStr;

const COLUMN_GAP: usize = 2;
const MAX_CELL_WIDTH: usize = 48;

/// Get display width of a string (accounts for wide chars like emojis)
fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    text: String,
    color: Option<Color>,
}

impl Cell {
    pub fn colored(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color: Some(color),
        }
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Self { text, color: None }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        text.to_string().into()
    }
}

/// Column-aligned table for terminal output.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, cells: Vec<Cell>) {
        let cells = cells
            .into_iter()
            .map(|c| Cell {
                text: truncate(&c.text, MAX_CELL_WIDTH),
                color: c.color,
            })
            .collect();
        self.rows.push(cells);
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| display_width(h)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let w = display_width(&cell.text);
                match widths.get_mut(i) {
                    Some(existing) => *existing = (*existing).max(w),
                    None => widths.push(w),
                }
            }
        }
        widths
    }

    /// Plain-text rendering, header first.
    pub fn lines(&self) -> Vec<String> {
        let widths = self.column_widths();
        let header: Vec<Cell> = self.headers.iter().map(|h| h.as_str().into()).collect();

        std::iter::once(&header)
            .chain(self.rows.iter())
            .map(|row| {
                let mut line = String::new();
                for (i, cell) in row.iter().enumerate() {
                    line.push_str(&cell.text);
                    if i + 1 < row.len() {
                        line.push_str(&" ".repeat(widths[i] - display_width(&cell.text) + COLUMN_GAP));
                    }
                }
                line.trim_end().to_string()
            })
            .collect()
    }

    pub fn print(&self) -> Result<()> {
        let widths = self.column_widths();
        let mut stdout = io::stdout();

        for (i, header) in self.headers.iter().enumerate() {
            print_colored(header, Color::DarkGrey)?;
            if i + 1 < self.headers.len() {
                print!("{}", " ".repeat(widths[i] - display_width(header) + COLUMN_GAP));
            }
        }
        println!();

        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                match cell.color {
                    Some(color) => print_colored(&cell.text, color)?,
                    None => print!("{}", cell.text),
                }
                if i + 1 < row.len() {
                    print!("{}", " ".repeat(widths[i] - display_width(&cell.text) + COLUMN_GAP));
                }
            }
            println!();
        }

        stdout.flush()?;
        Ok(())
    }
}

/// `✓ message` in green
pub fn success(message: &str) -> Result<()> {
    print_colored("✓ ", Color::Green)?;
    println!("{}", message);
    Ok(())
}

/// Aligned `label: value` line
pub fn field(label: &str, value: &str) {
    println!("  {} {}", format!("{label}:").dark_grey(), value);
}

pub fn hint(message: &str) {
    println!("{}", message.dark_grey());
}

/// Render an error message on stderr
pub fn render_error(message: &str) {
    let width = 68;
    let mut stderr = io::stderr();

    let _ = writeln!(stderr, "{}", format!("╭{}╮", "─".repeat(width)).red());

    let title = " Error ";
    let _ = writeln!(
        stderr,
        "{}{}{}",
        format!("│{title}").red(),
        " ".repeat(width - display_width(title)),
        "│".red()
    );
    let _ = writeln!(stderr, "{}", format!("├{}┤", "─".repeat(width)).red());

    // Message (may span multiple lines)
    for line in wrap_text(message, width - 4) {
        let _ = writeln!(
            stderr,
            "{}  {}{}{}",
            "│".red(),
            line.clone().red(),
            " ".repeat(width - 2 - display_width(&line)),
            "│".red()
        );
    }

    let _ = writeln!(stderr, "{}", format!("╰{}╯", "─".repeat(width)).red());
    let _ = stderr.flush();
}

/// Top-level message plus any causes it does not already spell out.
pub fn error_message(err: &anyhow::Error) -> String {
    let mut message = err.to_string();
    for cause in err.chain().skip(1) {
        let cause = cause.to_string();
        if !message.contains(&cause) {
            message.push_str("\n\nCaused by: ");
            message.push_str(&cause);
        }
    }
    message
}

/// "3 hours ago", or `fallback` when there is no timestamp
pub fn time_ago(timestamp: Option<DateTime<Utc>>, fallback: &str) -> String {
    match timestamp {
        Some(dt) => HumanTime::from(dt).to_string(),
        None => fallback.to_string(),
    }
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else {
        format!("{} MB", bytes / MB)
    }
}

fn print_colored(text: &str, color: Color) -> Result<()> {
    print!("{}", style::style(text).with(color));
    Ok(())
}

fn truncate(s: &str, max_width: usize) -> String {
    if display_width(s) <= max_width {
        s.to_string()
    } else {
        let mut result = String::new();
        let mut current_width = 0;
        for c in s.chars() {
            let char_width = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
            if current_width + char_width + 3 > max_width {
                break;
            }
            result.push(c);
            current_width += char_width;
        }
        result.push_str("...");
        result
    }
}

/// Word-wrap each line of `s`, keeping blank lines.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in s.lines() {
        let mut current = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word = truncate(word, max_width);
            let word_width = display_width(&word);
            if current.is_empty() {
                current = word;
                current_width = word_width;
            } else if current_width + 1 + word_width <= max_width {
                current.push(' ');
                current.push_str(&word);
                current_width += 1 + word_width;
            } else {
                lines.push(current);
                current = word;
                current_width = word_width;
            }
        }

        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}
