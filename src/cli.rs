use anstyle::AnsiColor;
use clap::builder::styling::Styles;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ClientConfig;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Cyan.on_default())
    .placeholder(AnsiColor::Red.on_default());

#[derive(Parser, Debug)]
#[command(name = "tftpc")]
#[command(about = "A simple TFTP client", long_about = None)]
#[command(styles = STYLES)]
pub struct Cli {
    /// Server host name or ip
    pub server: String,

    /// Server port
    #[arg(short, long, default_value_t = crate::DEF_PORT)]
    pub port: u16,

    /// Requested block size (8-65464)
    #[arg(short, long, default_value_t = crate::DEF_BLOCK_SIZE)]
    pub blksize: u16,

    /// Timeout (ms)
    #[arg(short, long, default_value_t = crate::DEF_TIMEOUT_SEC * 1000)]
    pub timeout: u64,

    /// Max retries
    #[arg(short, long, default_value_t = crate::MAX_RETRY_COUNT)]
    pub retry: u8,

    /// Transfer mode
    #[arg(short, long, default_value = crate::DEF_MODE)]
    pub mode: String,

    /// Ask the server for the file size
    #[arg(long)]
    pub tsize: bool,

    /// Debug logging
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a file
    Get {
        /// File name on the server
        remote: String,
        /// Where to save it (defaults to the remote name)
        local: Option<PathBuf>,
    },
    /// Upload a file
    Put {
        /// File to send
        local: PathBuf,
        /// File name on the server (defaults to the local file name)
        remote: Option<String>,
    },
}

impl Cli {
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            port: self.port,
            mode: self.mode.clone(),
            request_tsize: self.tsize,
            ..Default::default()
        }
        .with_block_size(self.blksize)
        .with_timeout(Duration::from_millis(self.timeout))
        .with_retries(self.retry)
    }
}
