use std::time::Duration;

use crate::error::TransferError;

/// Per-session transfer policy.
///
/// Every [`crate::Client`] carries its own copy, so concurrent transfers may
/// run with different settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server port requests are sent to.
    pub port: u16,
    /// Requested block size; the server may lower it.
    pub block_size: u16,
    /// How long to wait for each reply.
    pub timeout: Duration,
    /// Resends of the last packet before giving up.
    pub max_retries: u8,
    pub mode: String,
    /// Ask the server for the file size (`tsize`) on downloads.
    pub request_tsize: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: crate::DEF_PORT,
            block_size: crate::DEF_BLOCK_SIZE,
            timeout: Duration::from_secs(crate::DEF_TIMEOUT_SEC),
            max_retries: crate::MAX_RETRY_COUNT,
            mode: crate::DEF_MODE.to_string(),
            request_tsize: false,
        }
    }
}

impl ClientConfig {
    pub fn with_block_size(mut self, block_size: u16) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        if !(crate::MIN_BLOCK_SIZE..=crate::MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(TransferError::InvalidRequest(format!(
                "block size {} outside {}..={}",
                self.block_size,
                crate::MIN_BLOCK_SIZE,
                crate::MAX_BLOCK_SIZE
            )));
        }
        if self.timeout.is_zero() {
            return Err(TransferError::InvalidRequest("timeout must be non-zero".into()));
        }
        if self.mode.is_empty() || self.mode.contains('\0') {
            return Err(TransferError::InvalidRequest(format!(
                "invalid mode {:?}",
                self.mode
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 69);
        assert_eq!(config.block_size, 512);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.mode, "octet");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn block_size_bounds() {
        assert!(ClientConfig::default().with_block_size(8).validate().is_ok());
        assert!(ClientConfig::default().with_block_size(65464).validate().is_ok());
        assert!(ClientConfig::default().with_block_size(7).validate().is_err());
        assert!(ClientConfig::default().with_block_size(65465).validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout_and_bad_mode() {
        let config = ClientConfig::default().with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = ClientConfig {
            mode: "oct\0et".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TransferError::InvalidRequest(_))
        ));
    }
}
