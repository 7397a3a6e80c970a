use std::io::{self, Write};

const STATUS_COLUMN: usize = 70;

/// Writes `text` and `status` on one line, aligning the status column.
pub fn print_status(out: &mut dyn Write, text: &str, status: &str) -> io::Result<()> {
    let width = text.chars().count();
    let spaces = STATUS_COLUMN.saturating_sub(width).max(2);
    writeln!(out, "{text}{:spaces$}{status}", "")
}

pub fn print_header(out: &mut dyn Write, title: &str) -> io::Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out)
}
