use anyhow::Result;
use axsync::cli::CreateDirs;
use axsync::{Batch, BatchReport, ConsoleProgress, Downloader, EngineConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Download files and directory indexes over HTTP", long_about = None)]
struct Args {
    /// Text file with directory URLs (one per line)
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Base destination folder
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Number of parallel workers per file (must be greater than 0)
    #[arg(short = 't', long, default_value_t = 8, env = "AXSYNC_THREADS", value_parser = positive_workers)]
    threads: usize,

    /// URL of a directory whose files should all be downloaded
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// URL of a single file to download into the destination folder
    #[arg(short = 'f', long)]
    file: Option<String>,

    /// What to do when a destination folder does not exist
    #[arg(long = "create-dirs", value_enum, default_value = "prompt")]
    create_dirs: CreateDirs,

    /// Connect timeout in seconds (transport default when omitted)
    #[arg(long = "connect-timeout")]
    connect_timeout: Option<u64>,

    /// Whole-request timeout in seconds (transport default when omitted)
    #[arg(long)]
    timeout: Option<u64>,

    /// Download files that already exist at the destination again
    #[arg(long)]
    overwrite: bool,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn positive_workers(value: &str) -> Result<usize, String> {
    let workers: usize = value
        .parse()
        .map_err(|_| format!("{:?} is not a number", value))?;
    if workers == 0 {
        return Err("the number of threads must be greater than 0".to_string());
    }
    Ok(workers)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_configuration(args: &Args) {
    info!("Download configuration:");
    info!("- Destination folder: {:?}", args.output);
    info!("- Workers per file: {}", args.threads);
    if let Some(url) = &args.url {
        info!("- Directory URL: {}", url);
    } else if let Some(input) = &args.input {
        info!("- URL list: {:?}", input);
    } else if let Some(file) = &args.file {
        info!("- File URL: {}", file);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.url.is_none() && args.input.is_none() && args.file.is_none() {
        error!("You must provide --input, --url or --file");
        std::process::exit(1);
    }

    print_configuration(&args);

    let config = EngineConfig {
        connect_timeout: args.connect_timeout.map(Duration::from_secs),
        request_timeout: args.timeout.map(Duration::from_secs),
        ..EngineConfig::default().with_workers(args.threads)
    };

    let downloader = Downloader::new(config, Arc::new(ConsoleProgress::new()))?;
    let batch = Batch::new(downloader, Arc::new(args.create_dirs), args.overwrite);

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        if let Some(url) = &args.url {
            batch.run_directory_into(url, &args.output).await
        } else if let Some(input) = &args.input {
            batch.run_url_list(input, &args.output).await
        } else if let Some(file) = &args.file {
            batch.run_single_file(file, &args.output).await
        } else {
            Ok(BatchReport::default())
        }
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for failed in &report.failed {
            error!("Failed: {} ({})", failed.name, failed.error);
        }
        info!("{}", report.summary());
    }
    info!("Download finished!");

    Ok(())
}
