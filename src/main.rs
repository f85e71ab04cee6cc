//! datalake-blob command line entry point

use std::path::PathBuf;
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use datalake_blob::backend::{
    GetBlobInput, ListBlobsInput, ListBlobsOutput, MultipartCommit, PutBlobInput,
};
use datalake_blob::config::Config;
use datalake_blob::{AdlBackend, BlobBackend};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Print usage information
fn print_usage() {
    eprintln!("Usage: datalake-blob <config.yaml> <command> [args]");
    eprintln!();
    eprintln!("datalake-blob - object-store operations against a data lake account");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  ls [prefix]          List one level below prefix");
    eprintln!("  find [prefix]        List every object below prefix");
    eprintln!("  stat <key>           Show size, type and modification time");
    eprintln!("  cat <key>            Write object contents to stdout");
    eprintln!("  put <file> <key>     Upload a local file in parts");
    eprintln!("  mkdir <key>          Create a directory");
    eprintln!("  rm <key>...          Delete keys, children first");
    eprintln!("  mv <src> <dst>       Rename, replacing dst");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  datalake-blob /etc/datalake-blob/config.yaml ls logs/");
}

#[tokio::main]
async fn main() {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        print_usage();
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);

    // Load configuration
    let config = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging; stdout is reserved for command output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("Loaded configuration from {:?}", config_path);

    if let Err(e) = run(&config, &args[2], &args[3..]).await {
        error!("{} failed: {}", args[2], e);
        eprintln!("datalake-blob: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: &Config, command: &str, args: &[String]) -> CliResult<()> {
    let backend = AdlBackend::new(&config.backend, config.backend.credentials())?;
    info!(
        "Using account {} bucket {:?}",
        backend.account(),
        backend.bucket()
    );
    backend.init("").await?;

    match (command, args) {
        ("ls", [prefix @ ..]) if prefix.len() <= 1 => {
            let input = ListBlobsInput {
                prefix: prefix.first().cloned(),
                delimiter: Some("/".to_string()),
                ..Default::default()
            };
            print_listing(&backend.list_blobs(&input).await?);
        }
        ("find", [prefix @ ..]) if prefix.len() <= 1 => {
            let input = ListBlobsInput {
                prefix: prefix.first().cloned(),
                ..Default::default()
            };
            print_listing(&backend.list_blobs(&input).await?);
        }
        ("stat", [key]) => {
            let head = backend.head_blob(key).await?;
            let kind = if head.is_dir_blob { "directory" } else { "file" };
            println!(
                "{}\t{}\t{}\t{}",
                kind,
                head.item.size,
                format_time(head.item.last_modified),
                head.item.key
            );
        }
        ("cat", [key]) => {
            let output = backend
                .get_blob(&GetBlobInput {
                    key: key.clone(),
                    ..Default::default()
                })
                .await?;
            let mut body = output.body;
            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = body.try_next().await? {
                stdout.write_all(&chunk).await?;
            }
            stdout.flush().await?;
        }
        ("put", [file, key]) => {
            upload(&backend, file, key, config.backend.upload_part_size).await?;
        }
        ("mkdir", [key]) => {
            backend
                .put_blob(PutBlobInput {
                    key: key.clone(),
                    body: Bytes::new(),
                    dir_blob: true,
                })
                .await?;
        }
        ("rm", keys) if !keys.is_empty() => {
            backend.delete_blobs(keys.to_vec()).await?;
        }
        ("mv", [source, destination]) => {
            backend.rename_blob(source, destination).await?;
        }
        _ => {
            print_usage();
            return Err(format!("invalid command: {} {}", command, args.join(" ")).into());
        }
    }

    Ok(())
}

/// Multipart upload of a local file, aborting the upload on any failure
async fn upload(backend: &AdlBackend, file: &str, key: &str, part_size: u64) -> CliResult<()> {
    let mut source = tokio::fs::File::open(file).await?;
    let mut commit = backend.multipart_begin(key).await?;

    let result = upload_parts(backend, &mut source, &mut commit, part_size).await;

    if let Err(e) = &result {
        error!("Upload of {} failed, releasing lease: {}", key, e);
        if let Err(abort_err) = backend.multipart_abort(&commit).await {
            error!("Abort of {} failed: {}", key, abort_err);
        }
    } else {
        info!("Uploaded {} ({} bytes)", key, commit.appended());
    }
    result
}

async fn upload_parts(
    backend: &AdlBackend,
    source: &mut tokio::fs::File,
    commit: &mut MultipartCommit,
    part_size: u64,
) -> CliResult<()> {
    loop {
        let mut part = Vec::new();
        (&mut *source).take(part_size).read_to_end(&mut part).await?;
        if part.is_empty() {
            break;
        }
        let size = part.len() as u64;
        backend.multipart_add(commit, Bytes::from(part), size).await?;
        debug!("Uploaded {} bytes to {}", commit.appended(), commit.key);
    }
    backend.multipart_commit(commit).await?;
    Ok(())
}

fn print_listing(listing: &ListBlobsOutput) {
    for prefix in &listing.prefixes {
        println!("{:>12}  {:<20}  {}", "PRE", "", prefix.prefix);
    }
    for item in &listing.items {
        println!(
            "{:>12}  {:<20}  {}",
            item.size,
            format_time(item.last_modified),
            item.key
        );
    }
}

fn format_time(time: Option<SystemTime>) -> String {
    match time {
        Some(t) => DateTime::<Utc>::from(t).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}
