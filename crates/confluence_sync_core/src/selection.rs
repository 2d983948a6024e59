use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelection {
    All,
    One(usize),
}

/// Parse a zero-based index into a list of `len` entries.
pub fn parse_index(input: &str, len: usize) -> Result<usize> {
    let trimmed = input.trim();
    let index = trimmed
        .parse::<usize>()
        .map_err(|_| anyhow::anyhow!("invalid selection: '{trimmed}' is not a number"))?;
    if index >= len {
        bail!("invalid selection: {index} is out of range (0..{len})");
    }
    Ok(index)
}

/// `all` (any case) selects every page; anything else must be a valid index.
pub fn parse_page_selection(input: &str, len: usize) -> Result<PageSelection> {
    if input.trim().eq_ignore_ascii_case("all") {
        return Ok(PageSelection::All);
    }
    parse_index(input, len).map(PageSelection::One)
}

/// Print `message`, then block for one line of operator input.
pub fn prompt<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, message: &str) -> Result<String> {
    write!(writer, "{message}")?;
    writer.flush().context("failed to flush prompt")?;

    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .context("failed to read selection")?;
    if read == 0 {
        bail!("invalid selection: no input received");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
