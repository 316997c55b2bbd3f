use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "HLS media playlist downloader",
    long_about = "Downloads every segment of an HLS media playlist with a pool of workers,\n\
                  decrypts AES-128 segments and joins them into a single .ts file.\n\
                  \n\
                  Each URL gets several full attempts; a URL that still fails is reported\n\
                  and the remaining URLs are processed anyway."
)]
pub struct CliArgs {
    /// Media playlist URL(s) to download
    #[arg(required = true, help = "URL(s) of HLS media playlists (.m3u8)")]
    pub urls: Vec<String>,

    /// Base title for output files
    #[arg(
        short,
        long,
        help = "Output title (default: playlist file name). With several URLs, \"<title> <n>\" is used"
    )]
    pub title: Option<String>,

    /// Output directory
    #[arg(
        short,
        long,
        default_value = "download",
        help = "Directory where joined files will be saved"
    )]
    pub output_dir: PathBuf,

    /// Segment scratch directory
    #[arg(
        long,
        help = "Directory for raw segment files (default: <output-dir>/.segments)"
    )]
    pub work_dir: Option<PathBuf>,

    /// Number of download workers
    #[arg(
        short,
        long,
        default_value = "10",
        value_parser = clap::value_parser!(u16).range(1..),
        help = "Number of segments downloaded concurrently"
    )]
    pub workers: u16,

    /// Custom HTTP headers
    #[arg(
        short = 'H',
        long = "header",
        help = "Add custom HTTP header (can be used multiple times). Format: 'Name: Value'"
    )]
    pub headers: Vec<String>,

    #[arg(
        long,
        default_value = "0",
        help = "Overall timeout in seconds for HTTP requests (0 disables it)"
    )]
    pub timeout: u64,

    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    #[arg(
        long,
        default_value = "60",
        help = "Timeout in seconds for a single segment download (0 disables it)"
    )]
    pub segment_timeout: u64,

    #[arg(
        long,
        default_value = "10",
        help = "Timeout in seconds for fetching a decryption key (0 disables it)"
    )]
    pub key_timeout: u64,

    /// In-place retries for a segment hitting a transient error
    #[arg(
        long,
        default_value = "2",
        help = "Retries per segment after a transient network error"
    )]
    pub segment_retries: u32,

    #[arg(
        long,
        default_value = "1000",
        help = "Delay between segment retries in milliseconds"
    )]
    pub retry_delay_ms: u64,

    #[arg(long, help = "Also retry segments whose request timed out")]
    pub retry_on_timeout: bool,

    #[arg(long, help = "Also retry segments whose connection could not be established")]
    pub retry_on_connect_error: bool,

    /// Full download attempts per URL
    #[arg(
        long,
        default_value = "10",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Number of full download attempts per URL"
    )]
    pub attempts: u32,

    #[arg(
        long,
        default_value = "5",
        help = "Delay in seconds between full download attempts"
    )]
    pub attempt_delay: u64,

    #[arg(long, help = "Keep raw segment files after joining")]
    pub keep_segments: bool,

    /// Show progress bars
    #[arg(short = 'P', long = "progress", help = "Show progress bars for downloads")]
    pub show_progress: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    #[arg(long, help = "Override the User-Agent header")]
    pub user_agent: Option<String>,
}
