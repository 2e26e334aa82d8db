use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use dxda::downloader::{ConsoleProgressReporter, IntoProgressCallback};
use dxda::{get_token, read_manifest, DownloadConfig, Downloader, Manifest, TokenSource};

/// All files downloaded and verified
pub const EXIT_OK: i32 = 0;
/// At least one file failed; the others completed
pub const EXIT_FILES_FAILED: i32 = 1;
/// Nothing ran: bad manifest, missing token or invalid settings
pub const EXIT_NOT_STARTED: i32 = 2;

#[derive(Subcommand)]
pub enum Commands {
    /// Download every file listed in a manifest
    Download(DownloadArgs),
    /// Show what a manifest would download without fetching anything
    Inspect {
        /// Manifest file (.json, .json.gz or .json.bz2)
        manifest: PathBuf,
    },
    /// Show the identity behind the configured API token
    Whoami {
        #[command(flatten)]
        api: ApiArgs,
    },
}

#[derive(Args)]
pub struct ApiArgs {
    /// Platform API base URL
    #[arg(long, default_value = dxda::downloader::DEFAULT_API_BASE_URL)]
    pub api_url: String,
}

#[derive(Args)]
pub struct DownloadArgs {
    /// Manifest file (.json, .json.gz or .json.bz2)
    pub manifest: PathBuf,
    /// Directory the manifest folders are created under
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,
    /// Files downloaded at once
    #[arg(long, short = 'j', default_value_t = 1)]
    pub concurrency: usize,
    /// Part requests in flight per file (0 = all parts at once)
    #[arg(long, default_value_t = 0)]
    pub parts: usize,
    /// Retries per request after the first attempt
    #[arg(long, default_value_t = 5)]
    pub max_retries: usize,
    /// Seconds a request may stall (connecting or between reads) before retrying
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
    /// Stop a file's remaining parts as soon as one part fails
    #[arg(long)]
    pub fail_fast: bool,
    #[command(flatten)]
    pub api: ApiArgs,
}

fn require_token() -> Result<TokenSource> {
    get_token().ok_or_else(|| {
        anyhow!("no API token found: set DX_API_TOKEN or log in with the platform CLI")
    })
}

pub async fn handle_download(args: DownloadArgs, verbose: bool) -> Result<i32> {
    let manifest = match read_manifest(&args.manifest).await {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("{}", e.detailed_report());
            return Ok(EXIT_NOT_STARTED);
        }
    };
    let token = require_token()?;
    println!("Obtained token using {}", token.origin);

    let config = DownloadConfig::builder()
        .api_base_url(args.api.api_url)
        .max_concurrent_files(args.concurrency)
        .max_concurrent_parts(args.parts)
        .max_retries(args.max_retries)
        .timeout(Duration::from_secs(args.timeout))
        .cancel_on_part_failure(args.fail_fast)
        .build();

    let downloader = Downloader::new(config)
        .context("invalid download settings")?
        .with_output_root(&args.output)
        .with_progress(ConsoleProgressReporter::new(verbose).into_callback())
        .context("failed to install progress reporting")?;

    let report = match downloader.download_manifest(&manifest, &token.token).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", e.detailed_report());
            return Ok(EXIT_NOT_STARTED);
        }
    };

    println!(
        "\n{} of {} files downloaded ({} bytes) in {:.1}s",
        report.successful(),
        report.total(),
        report.bytes_downloaded(),
        report.duration.as_secs_f64()
    );
    for failure in report.failures() {
        if let Some(error) = failure.error() {
            eprintln!("  {} ({}): {}", failure.path.display(), failure.file_id, error);
            if let Some(suggestion) = error.suggestion() {
                eprintln!("    hint: {}", suggestion);
            }
        }
    }

    Ok(if report.is_success() { EXIT_OK } else { EXIT_FILES_FAILED })
}

pub async fn handle_inspect(path: PathBuf) -> Result<i32> {
    let manifest = match read_manifest(&path).await {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("{}", e.detailed_report());
            return Ok(EXIT_NOT_STARTED);
        }
    };
    print_manifest(&manifest);
    Ok(EXIT_OK)
}

fn print_manifest(manifest: &Manifest) {
    let root = PathBuf::from(".");
    for (project, file) in manifest.iter_files() {
        println!(
            "{}  {}  {}  {} parts  {} bytes",
            project,
            file.id,
            file.local_path(&root).display(),
            file.parts.len(),
            file.total_size()
        );
    }
    println!(
        "\n{} files, {} parts, {} bytes",
        manifest.file_count(),
        manifest.part_count(),
        manifest.total_size()
    );
}

pub async fn handle_whoami(api: ApiArgs) -> Result<i32> {
    let token = require_token()?;
    let config = DownloadConfig::builder().api_base_url(api.api_url).build();
    let downloader = Downloader::new(config).context("invalid API settings")?;

    let who = downloader.api().whoami(&token.token).await.context("whoami request failed")?;
    println!("{} (token from {})", who.id, token.origin);
    Ok(EXIT_OK)
}
