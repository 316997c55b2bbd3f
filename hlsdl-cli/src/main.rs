use std::time::Duration;

use clap::Parser;
use error::AppError;
use hlsdl_engine::protocol_builder::ProtocolBuilder;
use hlsdl_engine::{DownloaderConfig, HlsProtocolBuilder, TransientErrorPolicy};
use indicatif::MultiProgress;
use mimalloc::MiMalloc;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod error;
mod utils;

use cli::CliArgs;
use utils::progress::ProgressManager;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("hlsdl.log")?;

    let multi_writer = MakeWriterExt::and(std::io::stdout, log_file);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!(
        "HTTP timeout configuration: overall={}s, connect={}s, segment={}s, key={}s",
        args.timeout, args.connect_timeout, args.segment_timeout, args.key_timeout
    );

    // Create common download configuration
    let download_config = {
        let mut builder = DownloaderConfig::builder()
            .with_timeout(Duration::from_secs(args.timeout))
            .with_connect_timeout(Duration::from_secs(args.connect_timeout))
            .with_headers(utils::parse_headers(&args.headers));
        if let Some(user_agent) = &args.user_agent {
            builder = builder.with_user_agent(user_agent);
        }
        builder.build()
    };

    let mut hls_builder = HlsProtocolBuilder::new()
        .with_base_config(download_config)
        .workers(args.workers.into())
        .segment_download_timeout(Duration::from_secs(args.segment_timeout))
        .key_download_timeout(Duration::from_secs(args.key_timeout))
        .max_segment_retries(args.segment_retries)
        .segment_retry_delay(Duration::from_millis(args.retry_delay_ms))
        .transient_errors(TransientErrorPolicy {
            connection_reset: true,
            timeouts: args.retry_on_timeout,
            connect_failures: args.retry_on_connect_error,
        })
        .output_dir(&args.output_dir)
        .keep_segments(args.keep_segments)
        .max_attempts(args.attempts)
        .attempt_delay(Duration::from_secs(args.attempt_delay));
    if let Some(work_dir) = &args.work_dir {
        hls_builder = hls_builder.work_dir(work_dir);
    }
    let downloader = hls_builder.build()?;

    // Ctrl-C stops the running download and skips the rest
    let cancel = downloader.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling downloads");
            cancel.cancel();
        }
    });

    // Create a progress manager based on show_progress flag
    let multi = MultiProgress::new();
    let progress_manager = if args.show_progress {
        ProgressManager::new(multi)
    } else {
        ProgressManager::new_disabled(multi)
    };

    let base_title = match &args.title {
        Some(title) => title.clone(),
        None => utils::title_from_url(&args.urls[0])?,
    };
    let titles = utils::output_titles(&base_title, args.urls.len());

    let total = args.urls.len();
    let mut failed = 0usize;
    for (index, (url, title)) in args.urls.iter().zip(&titles).enumerate() {
        info!(url, title, "Processing playlist");
        let tracker = progress_manager.track(title, downloader.subscribe_progress());

        let result = downloader.download_with_retry(url, title).await;
        match result {
            Ok(path) => {
                if let Some(tracker) = tracker {
                    tracker.finish(format!("{title}: saved to {}", path.display()));
                }
                info!(url, path = %path.display(), "Download complete");
            }
            Err(e) => {
                if let Some(tracker) = tracker {
                    tracker.finish(format!("{title}: failed"));
                }
                error!(url, error = %e, "Download failed");
                println!("{url} cannot be downloaded");
                failed += 1;
            }
        }

        if downloader.cancellation_token().is_cancelled() {
            warn!("Cancelled, skipping remaining URLs");
            failed += total - index - 1;
            break;
        }
    }

    if failed > 0 {
        return Err(AppError::Incomplete { failed, total });
    }
    Ok(())
}
