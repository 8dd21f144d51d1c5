use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;

const ACCEPTED: &[&str] = &["y", "yes"];

/// list `files` 1-indexed on `output` and ask whether the order is right
pub fn confirm_files(
    files: &[PathBuf],
    mut input: impl BufRead,
    mut output: impl Write,
) -> Result<bool> {
    for (i, file) in files.iter().enumerate() {
        writeln!(output, "{}. {}", i + 1, file.display())?;
    }
    write!(output, "Are these the files in correct order? (y/n) ")?;
    output.flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(ACCEPTED.contains(&answer.trim().to_lowercase().as_str()))
}
