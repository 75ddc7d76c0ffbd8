use std::path::PathBuf;

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pixeldedup::{
    application::{
        builder::{Application, ApplicationBuilder},
        dto::{ImageRecordDto, IngestRequest},
    },
    value_objects::PerceptualHash,
    Config,
};

/// Operator tool for the image deduplication store
#[derive(Parser)]
#[command(name = "pixeldedup", version)]
struct Cli {
    /// TOML config file; environment variables are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sweep pass and print the result
    Sweep,
    /// Sweep periodically until interrupted
    Watch,
    /// Print duplicate statistics
    Stats,
    /// List active images similar to a file or a hex perceptual hash
    Similar {
        #[arg(long, conflicts_with = "hash", required_unless_present = "hash")]
        file: Option<PathBuf>,
        #[arg(long)]
        hash: Option<String>,
        #[arg(long)]
        threshold: Option<u32>,
    },
    /// Print the canonical form and public URL of stored paths or URLs
    Normalize {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Store local files, deduplicating against existing records
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "posts")]
        folder: String,
        #[arg(long, default_value = "post")]
        context: String,
        #[arg(long, default_value_t = 0)]
        uploader_id: i64,
    },
}

#[derive(Serialize)]
struct NormalizedPath {
    input: String,
    canonical: String,
    url: String,
}

#[derive(Serialize)]
struct SimilarEntry {
    distance: u32,
    url: String,
    record: ImageRecordDto,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn mime_type_for(path: &std::path::Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

async fn build(config: Config) -> anyhow::Result<Application> {
    let app = ApplicationBuilder::new(config)
        .with_database()
        .await?
        .with_storage()
        .await?
        .build()?;
    Ok(app)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env(),
    };
    config.validate()?;
    info!("Configuration loaded and validated");

    let app = build(config).await?;
    let service = &app.service;

    match cli.command {
        Command::Sweep => {
            let result = service.sweeper().sweep_once().await?;
            info!("{}", result.summary());
            print_json(&result)?;
        }
        Command::Watch => {
            let sweeper = service.sweeper();
            info!(
                interval_secs = sweeper.config().interval.as_secs(),
                "Watching for orphaned images"
            );
            tokio::select! {
                _ = sweeper.run() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping sweeper");
                }
            }
        }
        Command::Stats => {
            print_json(&service.duplicate_statistics().await?)?;
        }
        Command::Similar {
            file,
            hash,
            threshold,
        } => {
            let matches = match (file, hash) {
                (Some(file), _) => {
                    let bytes = tokio::fs::read(&file)
                        .await
                        .with_context(|| format!("reading {}", file.display()))?;
                    service
                        .find_similar_to_bytes(Bytes::from(bytes), threshold)
                        .await?
                }
                (None, Some(hex)) => {
                    let query = PerceptualHash::from_hex(&hex)?;
                    let threshold =
                        threshold.unwrap_or(service.config().default_similarity_threshold);
                    service.find_similar(&query, threshold).await?
                }
                (None, None) => bail!("either --file or --hash is required"),
            };

            let entries: Vec<SimilarEntry> = matches
                .iter()
                .map(|m| SimilarEntry {
                    distance: m.distance,
                    url: app.storage.url_for(m.record.canonical_path().as_str()),
                    record: ImageRecordDto::from(&m.record),
                })
                .collect();
            print_json(&entries)?;
        }
        Command::Normalize { paths } => {
            let normalized: Vec<NormalizedPath> = paths
                .into_iter()
                .map(|input| {
                    let canonical = app.storage.normalize(&input);
                    NormalizedPath {
                        url: app.storage.url_for(canonical.as_str()),
                        canonical: canonical.to_string(),
                        input,
                    }
                })
                .collect();
            print_json(&normalized)?;
        }
        Command::Ingest {
            files,
            folder,
            context,
            uploader_id,
        } => {
            for file in files {
                let bytes = tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("reading {}", file.display()))?;
                let original_filename = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                let stored = service
                    .ingest(IngestRequest {
                        bytes: Bytes::from(bytes),
                        original_filename,
                        folder: folder.clone(),
                        mime_type: mime_type_for(&file).to_string(),
                        context: context.clone(),
                        uploader_id,
                    })
                    .await
                    .with_context(|| format!("ingesting {}", file.display()))?;

                info!(
                    file = %file.display(),
                    outcome = ?stored.outcome,
                    path = %stored.record.canonical_path(),
                    reference_count = stored.record.reference_count(),
                    "Ingested"
                );
                print_json(&ImageRecordDto::from(&stored.record))?;
            }
        }
    }

    Ok(())
}
