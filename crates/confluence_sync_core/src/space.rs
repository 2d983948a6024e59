use std::fmt::Write as _;
use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::client::{ConfluenceApi, Space};
use crate::selection::{parse_index, prompt};

/// Argument value that lists every space instead of selecting one.
pub const LIST_FLAG: &str = "--list";

const NAME_DISPLAY_CHARS: usize = 38;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceResolution {
    ListAll,
    Exact(Space),
    Candidates(Vec<Space>),
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceOutcome {
    Listed,
    Selected(Space),
}

/// Match user input against the space list.
///
/// An exact (case-sensitive) key match wins over any name match. Otherwise every
/// space whose name contains the input, ignoring case, is a candidate.
pub fn resolve_space(input: &str, spaces: &[Space]) -> SpaceResolution {
    if input == LIST_FLAG {
        return SpaceResolution::ListAll;
    }
    if let Some(space) = spaces.iter().find(|space| space.key == input) {
        return SpaceResolution::Exact(space.clone());
    }

    let needle = input.to_lowercase();
    let candidates = spaces
        .iter()
        .filter(|space| space.name.to_lowercase().contains(&needle))
        .cloned()
        .collect::<Vec<_>>();
    if candidates.is_empty() {
        SpaceResolution::NoMatch
    } else {
        SpaceResolution::Candidates(candidates)
    }
}

pub fn format_space_table(spaces: &[Space]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "\n--- All spaces ({}) ---", spaces.len());
    let _ = writeln!(
        output,
        "{:<5} {:<40} | {:<20}",
        "[No]", "Space Name", "Space Key"
    );
    let _ = writeln!(output, "{}", "-".repeat(70));
    for (index, space) in spaces.iter().enumerate() {
        let name = space
            .name
            .chars()
            .take(NAME_DISPLAY_CHARS)
            .collect::<String>();
        let _ = writeln!(
            output,
            "[{index:3}] {name:<40} | {:<20}",
            space.key
        );
    }
    output
}

pub fn format_candidates(spaces: &[Space]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "\n--- Matching spaces ({}) ---", spaces.len());
    for (index, space) in spaces.iter().enumerate() {
        let _ = writeln!(output, "[{index}] {} (Key: {})", space.name, space.key);
    }
    output
}

/// Enumerate spaces and turn `input` into one space, prompting when the name is ambiguous.
///
/// Returns [`SpaceOutcome::Listed`] after printing the table for `--list`.
/// Invalid selections are errors; there is no retry.
pub fn select_space<A, R, W>(
    api: &mut A,
    input: &str,
    space_limit: usize,
    reader: &mut R,
    writer: &mut W,
) -> Result<SpaceOutcome>
where
    A: ConfluenceApi,
    R: BufRead,
    W: Write,
{
    writeln!(writer, "Fetching spaces...")?;
    let spaces = api
        .list_spaces(space_limit)
        .context("failed to connect to Confluence; check URL and token")?;

    match resolve_space(input, &spaces) {
        SpaceResolution::ListAll => {
            write!(writer, "{}", format_space_table(&spaces))?;
            Ok(SpaceOutcome::Listed)
        }
        SpaceResolution::Exact(space) => {
            info!(key = %space.key, "space selected by key");
            Ok(SpaceOutcome::Selected(space))
        }
        SpaceResolution::NoMatch => bail!("no space matches '{input}'"),
        SpaceResolution::Candidates(mut candidates) => {
            write!(writer, "{}", format_candidates(&candidates))?;
            let answer = prompt(reader, writer, "\nEnter the number of the target space: ")?;
            let index = parse_index(&answer, candidates.len())?;
            let space = candidates.swap_remove(index);
            info!(key = %space.key, "space selected by name");
            Ok(SpaceOutcome::Selected(space))
        }
    }
}
