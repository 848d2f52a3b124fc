//! drive_embed CLI - Store watermark embedding results on Google Drive.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::GrayImage;
use tracing_subscriber::EnvFilter;

use drive_embed::{
    extract_id, DriveClient, DriveConfig, DriveSession, EmbeddingImages, InstalledAppFlow,
};

/// CLI tool for storing watermark embedding results on Google Drive.
#[derive(Parser)]
#[command(name = "drive_embed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the OAuth client secrets JSON file.
    #[arg(long, env = "DRIVE_CLIENT_SECRET", default_value = "credentials.json")]
    client_secret: PathBuf,

    /// Directory holding the cached token file.
    #[arg(long, env = "DRIVE_TOKEN_DIR", default_value = ".")]
    token_dir: PathBuf,

    #[arg(long, default_value = "drive")]
    api_name: String,

    #[arg(long, default_value = "v3")]
    api_version: String,

    /// Default parent folder (URL or ID) for mkdir and upload-mixed.
    #[arg(long, env = "DRIVE_ROOT_FOLDER")]
    root_folder: Option<String>,

    /// Print the consent URL instead of opening a browser.
    #[arg(long)]
    no_browser: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create folders, in order, under a parent.
    Mkdir {
        #[arg(required = true)]
        names: Vec<String>,

        /// Parent folder URL or ID (defaults to the root folder).
        #[arg(long, short = 'p')]
        parent: Option<String>,
    },

    /// Check whether a folder with this exact name exists.
    Exists {
        name: String,

        /// Only look inside this folder (defaults to the root folder).
        #[arg(long, short = 'p')]
        parent: Option<String>,
    },

    /// Upload the three images of an embedding run, plus a zip of all three.
    UploadMixed {
        watermarked_image: PathBuf,
        key_image: PathBuf,
        block_position: PathBuf,

        /// Destination folder URL or ID (defaults to the root folder).
        #[arg(long, short = 't')]
        to: Option<String>,

        /// Share every uploaded file with this address as a reader.
        #[arg(long)]
        email: Option<String>,
    },

    /// Show the view and download links of a file.
    Links {
        /// File URL or ID.
        file: String,
    },

    /// List files in a folder.
    List {
        /// Folder URL or ID.
        folder: String,

        /// Also resolve each file's view and download links.
        #[arg(long)]
        links: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let root_folder = cli
        .root_folder
        .as_deref()
        .map(extract_id)
        .transpose()
        .context("Invalid root folder")?;

    let config = DriveConfig {
        client_secret_path: cli.client_secret.clone(),
        api_name: cli.api_name.clone(),
        api_version: cli.api_version.clone(),
        root_folder,
        token_dir: cli.token_dir.clone(),
        ..DriveConfig::default()
    };

    // The secrets file is read only if the cached token cannot be used.
    let mut flow = InstalledAppFlow::from_client_secrets_file(&config.client_secret_path);
    if cli.no_browser {
        flow = flow.without_browser();
    }

    let session = DriveSession::connect(&config, &flow)
        .await
        .context("Unable to connect to Google Drive")?;
    let client = DriveClient::new(session);

    match cli.command {
        Commands::Mkdir { names, parent } => {
            let parent_id = resolve_parent(parent.as_deref(), &config)?;
            let folders = client
                .create_folders(names.as_slice(), parent_id.as_deref())
                .await
                .context("Failed to create folders")?;

            for folder in folders {
                println!("{}\t{}", folder.id, folder.name);
            }
        }

        Commands::Exists { name, parent } => {
            let parent_id = resolve_parent(parent.as_deref(), &config)?;
            let exists = client
                .folder_exists(&name, parent_id.as_deref())
                .await
                .with_context(|| format!("Failed to look up folder: {}", name))?;
            println!("{}", exists);
        }

        Commands::UploadMixed {
            watermarked_image,
            key_image,
            block_position,
            to,
            email,
        } => {
            let parent_id = resolve_parent(to.as_deref(), &config)?
                .context("No destination folder: pass --to or set --root-folder")?;

            let watermarked_image = load_grayscale(&watermarked_image)?;
            let key_image = load_grayscale(&key_image)?;
            let block_position = load_grayscale(&block_position)?;
            let images = EmbeddingImages::new(&watermarked_image, &key_image, &block_position);

            let report = client
                .upload_mixed_files(&parent_id, &images, email.as_deref())
                .await;

            for (label, result) in report.iter() {
                match result {
                    Ok(file) => println!("{:<22} OK ({})", label, file.id),
                    Err(e) => {
                        println!("{:<22} FAILED", label);
                        eprintln!("  Error: {}", e);
                    }
                }
            }

            if !report.all_succeeded() {
                anyhow::bail!("Some uploads failed");
            }
        }

        Commands::Links { file } => {
            let file_id =
                extract_id(&file).with_context(|| format!("Invalid file URL or ID: {}", file))?;
            let links = client
                .get_file_links(&file_id)
                .await
                .with_context(|| format!("Failed to retrieve links of: {}", file_id))?;

            println!("Web View Link: {}", links.view.as_deref().unwrap_or("-"));
            println!("Download Link: {}", links.download.as_deref().unwrap_or("-"));
        }

        Commands::List { folder, links } => {
            let folder_id = extract_id(&folder)
                .with_context(|| format!("Invalid folder URL or ID: {}", folder))?;

            let files = client
                .list_files(&folder_id)
                .await
                .with_context(|| format!("Failed to list files in folder: {}", folder_id))?;

            if files.is_empty() {
                println!("No files found.");
            } else if links {
                for file in files {
                    let file_links = client
                        .get_file_links(&file.id)
                        .await
                        .with_context(|| format!("Failed to retrieve links of: {}", file.id))?;

                    println!("File Name: {}, ID: {}", file.name, file.id);
                    println!("Web View Link: {}", file_links.view.as_deref().unwrap_or("-"));
                    println!("Download Link: {}", file_links.download.as_deref().unwrap_or("-"));
                    println!("{}", "-".repeat(100));
                }
            } else {
                println!("{:<44} {:>10} {:<30} {}", "ID", "SIZE", "TYPE", "NAME");
                println!("{}", "-".repeat(100));
                for file in files {
                    println!("{}", file);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit parent if given, else the configured root folder.
fn resolve_parent(parent: Option<&str>, config: &DriveConfig) -> Result<Option<String>> {
    match parent {
        Some(parent) => Ok(Some(
            extract_id(parent).with_context(|| format!("Invalid folder URL or ID: {}", parent))?,
        )),
        None => Ok(config.root_folder().map(str::to_string)),
    }
}

/// Read an image from disk as 8-bit grayscale.
fn load_grayscale(path: &Path) -> Result<GrayImage> {
    let image = image::open(path).with_context(|| format!("Failed to read image {:?}", path))?;
    Ok(image.to_luma8())
}
