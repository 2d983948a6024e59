use std::fmt::Write as _;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::client::{ConfluenceApi, PageStatus, PageSummary, Space};
use crate::config::Settings;
use crate::extract::{extract_text, render_page_file};
use crate::filesystem::{normalize_path, page_output_path, write_page_file};
use crate::selection::{PageSelection, parse_page_selection, prompt};
use crate::space::{SpaceOutcome, select_space};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFailure {
    pub page_id: String,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub success: bool,
    pub attempted: usize,
    pub written: Vec<PathBuf>,
    pub failures: Vec<DownloadFailure>,
    pub request_count: usize,
}

#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    Listed,
    NoPages { space: Space },
    Downloaded { space: Space, report: DownloadReport },
}

/// List current pages, then drafts, each under its own page-size cap.
pub fn collect_pages<A: ConfluenceApi>(
    api: &mut A,
    space_key: &str,
    limit: usize,
) -> Result<Vec<PageSummary>> {
    let mut pages = Vec::new();
    for status in PageStatus::LISTED {
        let mut listed = api
            .list_pages(space_key, status, limit)
            .with_context(|| format!("failed to list {status} pages in space {space_key}"))?;
        pages.append(&mut listed);
    }
    Ok(pages)
}

pub fn format_page_list(pages: &[PageSummary]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "\n--- Pages ([D] = draft) ---");
    for (index, page) in pages.iter().enumerate() {
        let prefix = match page.status {
            PageStatus::Draft => "[D] ",
            PageStatus::Current => "    ",
        };
        let _ = writeln!(output, "[{index:2}] {prefix}{}", page.title);
    }
    output
}

/// Fetch one page's storage body for its own status, extract text, and write it.
pub fn download_page<A: ConfluenceApi>(
    api: &mut A,
    page: &PageSummary,
    space_name: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    let markup = api
        .get_page_content(&page.id, page.status)
        .with_context(|| format!("failed to fetch page {}", page.id))?;
    let text = extract_text(&markup);
    let path = page_output_path(output_dir, space_name, &page.title);
    write_page_file(
        &path,
        &render_page_file(&page.title, page.status, &page.id, &text),
    )?;
    info!(page_id = %page.id, path = %normalize_path(&path), "page saved");
    Ok(path)
}

/// Download each page in order. A failing page is recorded and the loop moves on.
pub fn download_pages<A, W>(
    api: &mut A,
    pages: &[PageSummary],
    space_name: &str,
    output_dir: &Path,
    writer: &mut W,
) -> Result<DownloadReport>
where
    A: ConfluenceApi,
    W: Write,
{
    let mut report = DownloadReport {
        attempted: pages.len(),
        ..DownloadReport::default()
    };

    for page in pages {
        match download_page(api, page, space_name, output_dir) {
            Ok(path) => {
                writeln!(writer, "Saved '{}'", normalize_path(&path))?;
                report.written.push(path);
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(page_id = %page.id, error = %message, "page download failed");
                writeln!(writer, "Failed to download page {}: {message}", page.id)?;
                report.failures.push(DownloadFailure {
                    page_id: page.id.clone(),
                    title: page.title.clone(),
                    message,
                });
            }
        }
    }

    report.request_count = api.request_count();
    report.success = report.failures.is_empty();
    Ok(report)
}

/// Download flow: resolve the space, list its pages, prompt for `all` or an index, download.
pub fn run_download<A, R, W>(
    api: &mut A,
    settings: &Settings,
    input: &str,
    reader: &mut R,
    writer: &mut W,
) -> Result<DownloadOutcome>
where
    A: ConfluenceApi,
    R: BufRead,
    W: Write,
{
    let space = match select_space(api, input, settings.space_limit, reader, writer)? {
        SpaceOutcome::Listed => return Ok(DownloadOutcome::Listed),
        SpaceOutcome::Selected(space) => space,
    };

    writeln!(
        writer,
        "\nFetching page list for space [{}] (Key: {})...",
        space.name, space.key
    )?;
    let pages = collect_pages(api, &space.key, settings.page_limit)?;
    if pages.is_empty() {
        writeln!(writer, "No pages to show.")?;
        return Ok(DownloadOutcome::NoPages { space });
    }

    write!(writer, "{}", format_page_list(&pages))?;
    let answer = prompt(reader, writer, "\nNumber to download (or 'all'): ")?;
    let selected = match parse_page_selection(&answer, pages.len())? {
        PageSelection::All => &pages[..],
        PageSelection::One(index) => &pages[index..=index],
    };

    let report = download_pages(api, selected, &space.name, &settings.output_dir, writer)?;
    Ok(DownloadOutcome::Downloaded { space, report })
}
