mod cli;
mod client;
mod config;
mod error;
mod options;
mod packet;
mod retry;
mod session;
mod sink;
mod transfer;

pub use crate::cli::{Cli, Command};
pub use crate::client::{download, upload, Client, DownloadSummary, UploadSummary};
pub use crate::config::ClientConfig;
pub use crate::error::{ErrorCode, TransferError};
pub use crate::options::{NegotiationError, TransferOptions};
pub use crate::packet::{PacketError, TftpOption, TftpPacket};
pub use crate::sink::{FileSink, Sink};

pub const DEF_BLOCK_SIZE: u16 = 512; // RFC 1350
pub const MIN_BLOCK_SIZE: u16 = 8; // RFC 2348
pub const MAX_BLOCK_SIZE: u16 = 65464; // RFC 2348

pub const DEF_PORT: u16 = 69;
pub const DEF_TIMEOUT_SEC: u64 = 5;
pub const MAX_RETRY_COUNT: u8 = 3;
pub const DEF_MODE: &str = "octet";
