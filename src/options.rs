use thiserror::Error;

use crate::packet::TftpOption;

pub const OPT_BLKSIZE: &str = "blksize";
pub const OPT_TSIZE: &str = "tsize";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("unparsable value {value:?} for option {name}")]
    InvalidValue { name: String, value: String },
    #[error("server raised blksize from {requested} to {offered}")]
    BlockSizeRaised { requested: u16, offered: u16 },
    #[error("server offered blksize {0}, below the protocol minimum")]
    BlockSizeTooSmall(u16),
}

/// The options this client understands, parsed out of an option list.
///
/// Unknown names are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOptions {
    pub blksize: Option<u16>,
    pub tsize: Option<u64>,
}

impl TransferOptions {
    /// Options to put on a request. `blksize` is only asked for when it
    /// differs from the protocol default.
    pub fn request(block_size: u16, tsize: Option<u64>) -> Self {
        Self {
            blksize: (block_size != crate::DEF_BLOCK_SIZE).then_some(block_size),
            tsize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blksize.is_none() && self.tsize.is_none()
    }

    pub fn to_options(&self) -> Vec<TftpOption> {
        let mut options = Vec::new();
        if let Some(blksize) = self.blksize {
            options.push(TftpOption::new(OPT_BLKSIZE, blksize.to_string()));
        }
        if let Some(tsize) = self.tsize {
            options.push(TftpOption::new(OPT_TSIZE, tsize.to_string()));
        }
        options
    }

    /// Single pass over an option list. Option names compare
    /// case-insensitively (RFC 2347).
    pub fn parse(options: &[TftpOption]) -> Result<Self, NegotiationError> {
        let mut parsed = Self::default();
        for option in options {
            let invalid = || NegotiationError::InvalidValue {
                name: option.name.clone(),
                value: option.value.clone(),
            };
            if option.name.eq_ignore_ascii_case(OPT_BLKSIZE) {
                parsed.blksize = Some(option.value.trim().parse().map_err(|_| invalid())?);
            } else if option.name.eq_ignore_ascii_case(OPT_TSIZE) {
                parsed.tsize = Some(option.value.trim().parse().map_err(|_| invalid())?);
            }
        }
        Ok(parsed)
    }

    /// Effective block size after the server acknowledged these options.
    ///
    /// The result never exceeds `requested`; a missing `blksize` falls back
    /// to the protocol default.
    pub fn block_size(&self, requested: u16) -> Result<u16, NegotiationError> {
        match self.blksize {
            None => Ok(crate::DEF_BLOCK_SIZE),
            Some(offered) if offered < crate::MIN_BLOCK_SIZE => {
                Err(NegotiationError::BlockSizeTooSmall(offered))
            }
            Some(offered) if offered > requested => Err(NegotiationError::BlockSizeRaised {
                requested,
                offered,
            }),
            Some(offered) => Ok(offered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_block_size_is_not_requested() {
        let options = TransferOptions::request(crate::DEF_BLOCK_SIZE, None);
        assert!(options.is_empty());
        assert!(options.to_options().is_empty());
    }

    #[test]
    fn request_lists_blksize_then_tsize() {
        let options = TransferOptions::request(1428, Some(0)).to_options();
        assert_eq!(
            options,
            vec![TftpOption::new("blksize", "1428"), TftpOption::new("tsize", "0")]
        );
    }

    #[test]
    fn parse_ignores_unknown_names() {
        let parsed = TransferOptions::parse(&[
            TftpOption::new("BLKSIZE", "1024"),
            TftpOption::new("windowsize", "4"),
            TftpOption::new("tsize", "123456789012"),
        ])
        .unwrap();
        assert_eq!(parsed.blksize, Some(1024));
        assert_eq!(parsed.tsize, Some(123456789012));
    }

    #[test]
    fn parse_rejects_garbage_values() {
        let err = TransferOptions::parse(&[TftpOption::new("blksize", "big")]).unwrap_err();
        assert!(matches!(err, NegotiationError::InvalidValue { .. }));
        assert!(TransferOptions::parse(&[TftpOption::new("blksize", "70000")]).is_err());
        assert!(TransferOptions::parse(&[TftpOption::new("tsize", "-1")]).is_err());
    }

    #[test]
    fn negotiated_size_never_exceeds_request() {
        let acked = |blksize| TransferOptions {
            blksize: Some(blksize),
            tsize: None,
        };
        assert_eq!(acked(1024).block_size(1428), Ok(1024));
        assert_eq!(acked(1428).block_size(1428), Ok(1428));
        assert_eq!(
            acked(2048).block_size(1428),
            Err(NegotiationError::BlockSizeRaised {
                requested: 1428,
                offered: 2048
            })
        );
        assert_eq!(
            acked(4).block_size(1428),
            Err(NegotiationError::BlockSizeTooSmall(4))
        );
        for requested in [8u16, 512, 1024, crate::MAX_BLOCK_SIZE] {
            for offered in [8u16, 100, 512, 1024, 9000, crate::MAX_BLOCK_SIZE] {
                if let Ok(size) = acked(offered).block_size(requested) {
                    assert!(size <= requested);
                }
            }
        }
    }

    #[test]
    fn missing_blksize_falls_back_to_default() {
        let acked = TransferOptions {
            blksize: None,
            tsize: Some(10),
        };
        assert_eq!(acked.block_size(1024), Ok(crate::DEF_BLOCK_SIZE));
    }
}
