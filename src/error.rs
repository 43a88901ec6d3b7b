use std::fmt;
use std::io;

use thiserror::Error;

use crate::options::NegotiationError;

/// Error codes carried by ERROR packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    FileAlreadyExists = 6,
    NoSuchUser = 7,
    /// RFC 2347: the client rejects the server's option acknowledgment.
    OptionNegotiation = 8,
}

impl ErrorCode {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::NotDefined),
            1 => Some(Self::FileNotFound),
            2 => Some(Self::AccessViolation),
            3 => Some(Self::DiskFull),
            4 => Some(Self::IllegalOperation),
            5 => Some(Self::UnknownTransferId),
            6 => Some(Self::FileAlreadyExists),
            7 => Some(Self::NoSuchUser),
            8 => Some(Self::OptionNegotiation),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Self::NotDefined => "Not defined",
            Self::FileNotFound => "File not found",
            Self::AccessViolation => "Access violation",
            Self::DiskFull => "Disk full or allocation exceeded",
            Self::IllegalOperation => "Illegal TFTP operation",
            Self::UnknownTransferId => "Unknown transfer ID",
            Self::FileAlreadyExists => "File already exists",
            Self::NoSuchUser => "No such user",
            Self::OptionNegotiation => "Option negotiation failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.default_message(), self.as_u16())
    }
}

/// Terminal outcome of a failed transfer.
///
/// `block` fields carry the block number the session was waiting on (or had
/// just sent) when it gave up.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("server error {code}: {message}")]
    Remote { code: u16, message: String },
    #[error("timed out waiting for block #{block}")]
    TimeoutExceeded { block: u16 },
    #[error("transport failure at block #{block}: {source}")]
    Transport {
        block: u16,
        #[source]
        source: io::Error,
    },
    #[error("local resource error at block #{block}: {source}")]
    LocalResource {
        block: u16,
        #[source]
        source: io::Error,
    },
    #[error("option negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),
    #[error("transfer aborted at block #{block}")]
    Aborted { block: u16 },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransferError {
    /// Wraps a socket error that happened before any block was exchanged.
    pub(crate) fn transport(source: io::Error) -> Self {
        TransferError::Transport { block: 0, source }
    }

    /// The error code a local failure is reported to the server with, if any.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            TransferError::LocalResource { source, .. } => {
                if source.kind() == io::ErrorKind::PermissionDenied {
                    Some(ErrorCode::AccessViolation)
                } else {
                    Some(ErrorCode::DiskFull)
                }
            }
            TransferError::Negotiation(_) => Some(ErrorCode::OptionNegotiation),
            _ => None,
        }
    }

    /// Known code of a server-reported failure.
    pub fn remote_code(&self) -> Option<ErrorCode> {
        match self {
            TransferError::Remote { code, .. } => ErrorCode::from_u16(*code),
            _ => None,
        }
    }
}
