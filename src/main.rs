//! drive_folder CLI - manage the files of a Google Drive folder.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use glob::glob;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use drive_folder::models::format_size;
use drive_folder::{Authenticator, BulkDownloadOptions, ClientConfig, DriveId, FolderClient};

/// CLI tool for managing the files of a Google Drive folder.
#[derive(Parser)]
#[command(name = "drive_folder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to service account JSON credentials file.
    #[arg(
        long,
        env = "GOOGLE_APPLICATION_CREDENTIALS",
        required_unless_present = "access_token"
    )]
    credentials: Option<PathBuf>,

    /// Use this OAuth access token instead of a service account. Takes
    /// precedence over --credentials.
    #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Entries requested per listing call.
    #[arg(long, env = "DRIVE_FOLDER_PAGE_SIZE", default_value_t = drive_folder::config::DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files in a folder.
    List {
        /// Folder URL or ID.
        folder: DriveId,
    },

    /// Download a single file.
    Download {
        /// File URL or ID to download.
        file: DriveId,

        /// Local destination file. Writes to stdout when omitted.
        #[arg(long, short = 't')]
        to: Option<PathBuf>,
    },

    /// Download every file of a folder into a local directory.
    DownloadAll {
        /// Folder URL or ID.
        folder: DriveId,

        /// Local destination directory (created if missing).
        #[arg(long, short = 't')]
        to: PathBuf,

        /// Number of simultaneous downloads.
        #[arg(long, env = "DRIVE_FOLDER_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Do not draw a progress bar.
        #[arg(long)]
        no_progress: bool,
    },

    /// Upload files to a folder.
    Upload {
        /// File patterns to upload (supports glob patterns like *.png, img_{1,2,3}.jpg).
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Destination folder URL or ID.
        #[arg(long, short = 't')]
        to: DriveId,

        /// Remote name for the uploaded file (single file only).
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete every file in a folder, keeping the folder itself.
    Clear {
        /// Folder URL or ID.
        folder: DriveId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let auth = match (&cli.credentials, &cli.access_token) {
        (_, Some(token)) => Authenticator::from_access_token(token.clone()),
        (Some(path), None) => Authenticator::from_file(path)
            .with_context(|| format!("Failed to load credentials from {:?}", path))?,
        (None, None) => anyhow::bail!("Either --credentials or --access-token is required"),
    };

    let config = ClientConfig::default().with_page_size(cli.page_size);
    let client = FolderClient::new(auth, config).context("Failed to build HTTP client")?;

    match cli.command {
        Commands::List { folder } => {
            let files = client
                .list_all(folder.as_str(), client.config().page_size)
                .await
                .with_context(|| format!("Failed to list files in folder: {}", folder))?;

            if files.is_empty() {
                println!("No files found.");
            } else {
                println!("{:<44} {:<6} {}", "ID", "TYPE", "NAME");
                println!("{}", "-".repeat(80));
                for file in files {
                    println!("{}", file);
                }
            }
        }

        Commands::Download { file, to } => match to {
            Some(path) => {
                let bytes = client
                    .download_to(file.as_str(), &path)
                    .await
                    .with_context(|| format!("Failed to download file: {}", file))?;
                println!("Saved {} to {:?}", format_size(bytes), path);
            }
            None => {
                let content = client
                    .download_bytes(file.as_str())
                    .await
                    .with_context(|| format!("Failed to download file: {}", file))?;
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&content).await?;
                stdout.flush().await?;
            }
        },

        Commands::DownloadAll {
            folder,
            to,
            concurrency,
            no_progress,
        } => {
            let mut options = BulkDownloadOptions::default().with_progress_bar(!no_progress);
            if let Some(concurrency) = concurrency {
                options = options.with_concurrency(concurrency);
            }

            let report = client
                .download_images(folder.as_str(), &to, options)
                .await
                .with_context(|| format!("Failed to download folder: {}", folder))?;

            for (file, error) in report.failed() {
                eprintln!("FAILED {} ({}): {}", file.name, file.id, error);
            }
            println!(
                "Downloaded {} of {} file(s) to {:?}",
                report.total() - report.failure_count(),
                report.total(),
                to
            );
            report.into_result()?;
        }

        Commands::Upload { patterns, to, name } => {
            let files_to_upload = expand_patterns(&patterns)?;

            if files_to_upload.is_empty() {
                anyhow::bail!("No files to upload");
            }
            if name.is_some() && files_to_upload.len() > 1 {
                anyhow::bail!(
                    "--name can only be used with a single file, {} matched",
                    files_to_upload.len()
                );
            }

            println!("Uploading {} file(s) to {}...", files_to_upload.len(), to);

            let mut failures = 0;
            for (idx, file_path) in files_to_upload.iter().enumerate() {
                let filename = file_path.file_name().unwrap_or_default().to_string_lossy();
                announce_upload(
                    &mut std::io::stdout(),
                    idx + 1,
                    files_to_upload.len(),
                    &filename,
                )?;

                match client
                    .upload_file(file_path, to.as_str(), name.as_deref())
                    .await
                {
                    Ok(uploaded) => {
                        println!("OK ({})", uploaded.id);
                    }
                    Err(e) => {
                        failures += 1;
                        println!("FAILED");
                        eprintln!("  Error: {}", e);
                    }
                }
            }

            if failures > 0 {
                anyhow::bail!("{} of {} upload(s) failed", failures, files_to_upload.len());
            }
            println!("Done.");
        }

        Commands::Clear { folder } => {
            let report = client
                .delete_folder_contents(folder.as_str())
                .await
                .with_context(|| format!("Failed to list folder: {}", folder))?;

            for (file, error) in report.failed() {
                eprintln!("FAILED {} ({}): {}", file.name, file.id, error);
            }
            println!(
                "Deleted {} of {} file(s) from {}",
                report.total() - report.failure_count(),
                report.total(),
                folder
            );
            report.into_result()?;
        }
    }

    Ok(())
}

/// Print the upload line without a newline; the result is appended later.
fn announce_upload<W: Write>(
    out: &mut W,
    current: usize,
    total: usize,
    filename: &str,
) -> std::io::Result<()> {
    write!(out, "[{}/{}] Uploading {}... ", current, total, filename)?;
    out.flush()
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("drive_folder={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve upload patterns into a sorted, deduplicated list of files.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        for expanded in expand_braces(pattern) {
            let matches: Vec<PathBuf> = glob(&expanded)
                .with_context(|| format!("Invalid glob pattern: {}", expanded))?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file())
                .collect();

            if matches.is_empty() {
                // No glob match: fall back to a literal path
                let path = PathBuf::from(&expanded);
                if path.is_file() {
                    files.push(path);
                } else {
                    tracing::warn!(pattern = %expanded, "no files matched pattern");
                }
            } else {
                files.extend(matches);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Expand brace patterns like img_{1,2,3}.jpg into multiple patterns.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(start) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(len) = pattern[start..].find('}') else {
        return vec![pattern.to_string()];
    };

    let end = start + len;
    let (prefix, suffix) = (&pattern[..start], &pattern[end + 1..]);

    pattern[start + 1..end]
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{}{}{}", prefix, alt.trim(), suffix)))
        .collect()
}
