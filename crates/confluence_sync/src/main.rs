use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use confluence_sync_core::client::ConfluenceClient;
use confluence_sync_core::config::{DEFAULT_CONFIG_FILENAME, Settings, load_config};
use confluence_sync_core::download::{DownloadOutcome, run_download};
use confluence_sync_core::filesystem::normalize_path;
use confluence_sync_core::space::LIST_FLAG;
use confluence_sync_core::upload::{UploadOptions, run_upload};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "confluence-sync",
    version,
    about = "Download Confluence pages as plain text and create pages from local files"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Config file (default: ./.confluence-sync.toml)"
    )]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log progress to stderr")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Download current and draft pages of a space as text files")]
    Download(DownloadArgs),
    #[command(about = "Create a page from a local text file")]
    Upload(UploadArgs),
}

#[derive(Debug, Args)]
struct DownloadArgs {
    #[arg(long, conflicts_with = "space", help = "List every space and exit")]
    list: bool,
    #[arg(
        value_name = "SPACE",
        required_unless_present = "list",
        help = "Space key, or part of a space name"
    )]
    space: Option<String>,
}

#[derive(Debug, Args)]
struct UploadArgs {
    #[arg(long, value_name = "PATH", help = "Local file to upload")]
    file: PathBuf,
    #[arg(
        long,
        value_name = "SPACE",
        allow_hyphen_values = true,
        help = "Target space key, part of a space name, or --list"
    )]
    space: String,
    #[arg(long, help = "Page title (default: file name without extension)")]
    title: Option<String>,
    #[arg(long, value_name = "ID", help = "Create the page under this parent page")]
    parent_id: Option<String>,
    #[arg(long, help = "Run the body transform hook before upload (currently a pass-through)")]
    use_llm: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(cli.config.as_deref())?;
    debug!(?settings, "resolved settings");

    match cli.command {
        Commands::Download(args) => run_download_command(&settings, args),
        Commands::Upload(args) => run_upload_command(&settings, args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_settings(config: Option<&Path>) -> Result<Settings> {
    dotenvy::dotenv().ok();

    let config_path = match config {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", normalize_path(path));
            }
            path.to_path_buf()
        }
        None => PathBuf::from(DEFAULT_CONFIG_FILENAME),
    };
    let file_config = load_config(&config_path)?;
    Settings::from_env(&file_config)
}

fn run_download_command(settings: &Settings, args: DownloadArgs) -> Result<()> {
    let input = match (args.list, args.space) {
        (true, _) => LIST_FLAG.to_string(),
        (false, Some(space)) => space,
        (false, None) => bail!("a space key or name is required (or use --list)"),
    };

    let mut client = ConfluenceClient::new(settings)?;
    let mut reader = io::stdin().lock();
    let mut writer = io::stdout().lock();

    match run_download(&mut client, settings, &input, &mut reader, &mut writer)? {
        DownloadOutcome::Listed | DownloadOutcome::NoPages { .. } => Ok(()),
        DownloadOutcome::Downloaded { space, report } => {
            info!(
                space = %space.key,
                written = report.written.len(),
                failed = report.failures.len(),
                requests = report.request_count,
                "download finished"
            );
            if report.success {
                return Ok(());
            }
            bail!(
                "{} of {} page(s) failed to download",
                report.failures.len(),
                report.attempted
            );
        }
    }
}

fn run_upload_command(settings: &Settings, args: UploadArgs) -> Result<()> {
    let options = UploadOptions {
        file: args.file,
        space: args.space,
        title: args.title,
        parent_id: args.parent_id,
        use_llm: args.use_llm,
    };

    let mut client = ConfluenceClient::new(settings)?;
    let mut reader = io::stdin().lock();
    let mut writer = io::stdout().lock();

    run_upload(&mut client, settings, &options, &mut reader, &mut writer)?;
    Ok(())
}
