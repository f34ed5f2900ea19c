use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::Stream;
use photostore_core::{
    config::max_upload_bytes_from_env_value, CoreConfig, Filename, IngestService, SubmitOutcome,
    DEFAULT_DATABASE_PATH, DEFAULT_UPLOAD_DIR,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "photostore")]
#[command(about = "Photostore media catalog CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a filename is stored
    Check {
        /// Filename as it was submitted
        filename: String,
    },
    /// Store a local file, unless its name is already taken
    Ingest {
        /// Path of the file to store
        path: PathBuf,
        /// Store under this name instead of the file's own name
        #[arg(long)]
        name: Option<String>,
    },
    /// List all stored files
    List,
    /// Compare the upload directory with the catalog (run while the server is stopped)
    Reconcile {
        /// Delete orphaned and temporary files instead of only reporting them
        #[arg(long)]
        remove: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("photostore_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'photostore --help' for commands");
        return Ok(ExitCode::SUCCESS);
    };

    let service = IngestService::from_config(&config_from_env()?)?;

    match command {
        Commands::Check { filename } => {
            let filename = Filename::new(filename)?;
            match service.lookup(&filename).await? {
                Some(record) => println!("Found: {}", record.storage_path.display()),
                None => {
                    println!("Not found: {}", filename);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Ingest { path, name } => {
            let filename = match name {
                Some(name) => Filename::new(name)?,
                None => filename_of(&path)?,
            };
            let file = tokio::fs::File::open(&path).await?;
            match service.submit(filename, file_chunks(file)).await? {
                SubmitOutcome::Created { record } => println!(
                    "Stored {} ({} bytes) at {}",
                    record.filename,
                    record.size_bytes,
                    record.storage_path.display()
                ),
                SubmitOutcome::Conflict { existing } => {
                    println!(
                        "Already exists: {} at {}",
                        existing.filename,
                        existing.storage_path.display()
                    );
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::List => {
            let records = service.list().await?;
            if records.is_empty() {
                println!("No files stored.");
            } else {
                for record in records {
                    println!(
                        "{}\t{} bytes\t{}\t{}",
                        record.filename,
                        record.size_bytes,
                        record.created_at.to_rfc3339(),
                        record.storage_path.display()
                    );
                }
            }
        }
        Commands::Reconcile { remove } => {
            let report = service.reconcile(remove).await?;
            for path in &report.orphaned_files {
                println!("orphaned: {}", path.display());
            }
            for path in &report.stale_temp_files {
                println!("temporary: {}", path.display());
            }
            for filename in &report.missing_content {
                println!("missing content: {}", filename);
            }
            if remove {
                println!("Removed {} file(s)", report.removed);
            }
            if report.is_clean() {
                println!("Upload directory and catalog agree.");
            } else if !remove {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn config_from_env() -> anyhow::Result<CoreConfig> {
    let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.into());
    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.into());
    let max_upload_bytes = max_upload_bytes_from_env_value(std::env::var("MAX_UPLOAD_BYTES").ok())?;

    Ok(CoreConfig::new(
        PathBuf::from(upload_dir),
        PathBuf::from(database_path),
        max_upload_bytes,
    )?)
}

fn filename_of(path: &Path) -> anyhow::Result<Filename> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        anyhow::bail!("{} has no usable file name; pass --name", path.display());
    };
    Ok(Filename::new(name)?)
}

fn file_chunks(
    file: tokio::fs::File,
) -> impl Stream<Item = std::io::Result<Bytes>> + Unpin {
    Box::pin(futures::stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), file)))
    }))
}
