use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use quick_xml::escape::escape;
use tracing::info;

use crate::client::{ConfluenceApi, CreatePageRequest, CreatedPage};
use crate::config::Settings;
use crate::filesystem::normalize_path;
use crate::space::{SpaceOutcome, select_space};

pub const UPLOAD_NOTICE: &str = "This page was created automatically from a local file. \
It is meant to be restructured manually afterwards.";

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub file: PathBuf,
    pub space: String,
    pub title: Option<String>,
    pub parent_id: Option<String>,
    pub use_llm: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPage {
    pub space_key: String,
    pub space_name: String,
    pub title: String,
    pub page_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Listed,
    Created(UploadedPage),
}

/// Rewrites a storage body before it is submitted.
///
/// Only consulted when the caller opts in with `--use-llm`.
pub trait BodyTransform {
    fn transform(&self, storage_body: String) -> Result<String>;
}

/// Pass-through hook. Reserved for external content rewriting.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl BodyTransform for IdentityTransform {
    fn transform(&self, storage_body: String) -> Result<String> {
        Ok(storage_body)
    }
}

/// Wrap raw text as storage markup: a note panel, an empty paragraph, then the
/// escaped text verbatim inside `<pre>`.
pub fn make_storage_body(text: &str) -> String {
    let escaped = escape(text);
    format!(
        "<ac:structured-macro ac:name=\"note\">\
         <ac:rich-text-body><p>{UPLOAD_NOTICE}</p></ac:rich-text-body>\
         </ac:structured-macro><p></p><pre>{escaped}</pre>"
    )
}

/// File name without its extension.
pub fn default_title(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| anyhow::anyhow!("cannot derive a title from {}", path.display()))
}

/// Viewable URL for a created page: base URL plus the web UI link, or `/pages/<id>`.
pub fn page_url(base_url: &str, created: &CreatedPage) -> String {
    let base = base_url.trim_end_matches('/');
    match created.webui.as_deref() {
        Some(link) if !link.is_empty() => format!("{base}{link}"),
        _ => format!("{base}/pages/{}", created.id),
    }
}

/// Hook consulted for `--use-llm`; `None` leaves the body untouched.
pub fn body_transform(use_llm: bool) -> Option<Box<dyn BodyTransform>> {
    use_llm.then(|| Box::new(IdentityTransform) as Box<dyn BodyTransform>)
}

/// Upload flow: validate the file, resolve the space, build the body, create the page.
pub fn run_upload<A, R, W>(
    api: &mut A,
    settings: &Settings,
    options: &UploadOptions,
    reader: &mut R,
    writer: &mut W,
) -> Result<UploadOutcome>
where
    A: ConfluenceApi,
    R: BufRead,
    W: Write,
{
    let transform = body_transform(options.use_llm);
    run_upload_with(api, settings, options, transform.as_deref(), reader, writer)
}

/// [`run_upload`] with an explicit body hook instead of the one chosen by `use_llm`.
pub fn run_upload_with<A, R, W>(
    api: &mut A,
    settings: &Settings,
    options: &UploadOptions,
    transform: Option<&dyn BodyTransform>,
    reader: &mut R,
    writer: &mut W,
) -> Result<UploadOutcome>
where
    A: ConfluenceApi,
    R: BufRead,
    W: Write,
{
    if !options.file.is_file() {
        bail!("file does not exist: {}", normalize_path(&options.file));
    }

    let space = match select_space(api, &options.space, settings.space_limit, reader, writer)? {
        SpaceOutcome::Listed => return Ok(UploadOutcome::Listed),
        SpaceOutcome::Selected(space) => space,
    };
    writeln!(writer, "\nSelected space: {} (Key: {})", space.name, space.key)?;

    let title = match options.title.as_deref() {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => default_title(&options.file)?,
    };
    writeln!(writer, "Page title: {title}")?;

    let text = fs::read_to_string(&options.file)
        .with_context(|| format!("failed to read {}", options.file.display()))?;
    let mut storage_body = make_storage_body(&text);
    if let Some(transform) = transform {
        storage_body = transform
            .transform(storage_body)
            .context("body transform failed")?;
    }

    let created = api.create_page(&CreatePageRequest {
        space_key: space.key.clone(),
        title: title.clone(),
        body: storage_body,
        parent_id: options.parent_id.clone(),
    })?;
    let url = page_url(settings.trimmed_base_url(), &created);
    info!(page_id = %created.id, %url, "page created");

    let uploaded = UploadedPage {
        space_key: space.key,
        space_name: space.name,
        title,
        page_id: created.id,
        url,
    };
    print_created(writer, &uploaded)?;
    Ok(UploadOutcome::Created(uploaded))
}

fn print_created<W: Write>(writer: &mut W, page: &UploadedPage) -> Result<()> {
    writeln!(writer, "\nPage created.")?;
    writeln!(writer, "Space  : {} (Key: {})", page.space_name, page.space_key)?;
    writeln!(writer, "Title  : {}", page.title)?;
    writeln!(writer, "Page ID: {}", page.page_id)?;
    writeln!(writer, "URL    : {}", page.url)?;
    writeln!(writer)?;
    writeln!(
        writer,
        "The file content was stored as a single <pre> block; open the page to restructure it."
    )?;
    Ok(())
}
