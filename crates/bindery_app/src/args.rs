use std::path::PathBuf;

use clap::Parser;

/// Bundle paginated web articles into one EPUB
#[derive(Parser, Debug)]
#[command(name = "bindery")]
#[command(author = "Bindery Contributors")]
#[command(version)]
#[command(about = "Download paginated articles and bind them into one EPUB", long_about = None)]
pub struct Args {
    /// Article URLs, bound in the order given
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// File with one article URL per line ("-" for stdin, "#" starts a comment)
    #[arg(long, value_name = "FILE")]
    pub urls_file: Option<PathBuf>,

    /// Archive file name (default: golem_<timestamp>.epub)
    #[arg(short, long, value_name = "NAME")]
    pub output: Option<String>,

    /// Directory the archive is written to
    #[arg(short = 'd', long, default_value = "downloads", value_name = "DIR")]
    pub download_dir: PathBuf,

    /// Book title shown by readers
    #[arg(short, long)]
    pub title: Option<String>,

    /// Attempt at most this many articles
    #[arg(short = 'n', long, value_name = "NUM")]
    pub max_articles: Option<usize>,

    /// Cookie export (JSON) carrying the logged-in session
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Extraction rules (RON); defaults to the built-in golem.de rules
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Print the effective extraction rules as RON and exit
    #[arg(long)]
    pub print_rules: bool,

    /// Pause between consecutive requests
    #[arg(long, default_value = "1000", value_name = "MS")]
    pub delay_ms: u64,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub timeout: u64,

    /// Also write the log to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
