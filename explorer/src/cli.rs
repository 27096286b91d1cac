use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dcr-explorer")]
#[command(about = "Block explorer live-update service", long_about = None)]
pub struct Args {
    /// Path to configuration file (optional, uses defaults if not provided)
    #[arg(short, long)]
    pub config_path: Option<PathBuf>,

    /// HTTP listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// HTTP bind address
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Directory holding the page templates
    #[arg(long)]
    pub templates_dir: Option<PathBuf>,

    /// Envelopes buffered per websocket subscriber
    #[arg(long)]
    pub subscriber_queue: Option<usize>,

    /// Do not reload templates on SIGHUP
    #[arg(long)]
    pub no_template_reload: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}
