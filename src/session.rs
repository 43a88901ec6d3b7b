use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ErrorCode, TransferError};
use crate::packet::{PacketError, TftpPacket};
use crate::retry::Retry;

// Largest UDP payload; anything a server sends fits.
const RECV_BUF_SIZE: usize = 65536;

enum Reply {
    Packet(TftpPacket),
    Timeout,
    Malformed(PacketError),
}

/// One side of a transfer: an ephemeral socket plus the server's transfer ID
/// once the first reply has arrived.
pub(crate) struct Session {
    socket: UdpSocket,
    server: SocketAddr,
    remote: Option<SocketAddr>,
    timeout: Duration,
    // Expiry of the wait for a reply to `last_sent`. Packets that get
    // ignored do not move it.
    deadline: Instant,
    retry: Retry,
    last_sent: Vec<u8>,
    buf: Vec<u8>,
    abort: Option<watch::Receiver<bool>>,
}

impl Session {
    pub async fn open(
        server: SocketAddr,
        config: &ClientConfig,
        abort: Option<watch::Receiver<bool>>,
    ) -> Result<Self, TransferError> {
        let bind_addr = match server {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(TransferError::transport)?;
        debug!(
            local = %socket.local_addr().map_err(TransferError::transport)?,
            %server,
            "transfer socket bound"
        );

        Ok(Self {
            socket,
            server,
            remote: None,
            timeout: config.timeout,
            deadline: Instant::now() + config.timeout,
            retry: Retry::new(config.max_retries),
            last_sent: Vec::new(),
            buf: vec![0; RECV_BUF_SIZE],
            abort,
        })
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    fn peer(&self) -> SocketAddr {
        self.remote.unwrap_or(self.server)
    }

    /// Sends `pkt` and remembers it as the packet to resend on timeout.
    pub async fn send(&mut self, pkt: &TftpPacket, block: u16) -> Result<(), TransferError> {
        self.last_sent = pkt.serialize();
        debug!(peer = %self.peer(), opcode = pkt.opcode(), block, "send");
        self.socket
            .send_to(&self.last_sent, self.peer())
            .await
            .map_err(|source| TransferError::Transport { block, source })?;
        self.deadline = Instant::now() + self.timeout;
        Ok(())
    }

    /// Sends `pkt` without making it the retransmission candidate or
    /// restarting the reply timer.
    pub async fn send_once(&self, pkt: &TftpPacket, block: u16) -> Result<(), TransferError> {
        debug!(peer = %self.peer(), opcode = pkt.opcode(), block, "send once");
        self.socket
            .send_to(&pkt.serialize(), self.peer())
            .await
            .map_err(|source| TransferError::Transport { block, source })?;
        Ok(())
    }

    /// Best-effort ERROR notification to the server.
    pub async fn notify_error(&self, code: ErrorCode, msg: &str) {
        let pkt = TftpPacket::ERROR {
            code: code.as_u16(),
            msg: msg.to_string(),
        };
        if let Err(e) = self.socket.send_to(&pkt.serialize(), self.peer()).await {
            warn!(error = %e, "failed to send error packet");
        }
    }

    /// The transfer moved forward; the next packet gets a fresh retry budget.
    pub fn progress(&mut self) {
        self.retry.reset();
    }

    /// Waits for the next usable packet, resending the last packet on every
    /// timeout or malformed reply until the retry budget is spent.
    ///
    /// The timeout runs from the last (re)transmission, not from this call,
    /// so callers that loop over ignored packets still time out on schedule.
    pub async fn recv(&mut self, block: u16) -> Result<TftpPacket, TransferError> {
        loop {
            match self.wait_reply(block).await? {
                Reply::Packet(pkt) => return Ok(pkt),
                Reply::Timeout => debug!(block, "receive timed out"),
                Reply::Malformed(e) => debug!(block, error = %e, "malformed packet"),
            }

            if !self.retry.consume() {
                return Err(TransferError::TimeoutExceeded { block });
            }
            warn!(block, attempt = self.retry.attempt(), "retransmitting");
            self.socket
                .send_to(&self.last_sent, self.peer())
                .await
                .map_err(|source| TransferError::Transport { block, source })?;
            self.deadline = Instant::now() + self.timeout;
        }
    }

    async fn wait_reply(&mut self, block: u16) -> Result<Reply, TransferError> {
        let deadline = self.deadline;
        loop {
            let received = tokio::select! {
                res = timeout_at(deadline, self.socket.recv_from(&mut self.buf)) => res,
                _ = aborted(&mut self.abort) => return Err(TransferError::Aborted { block }),
            };
            let (len, src) = match received {
                Err(_) => return Ok(Reply::Timeout),
                Ok(Err(source)) => return Err(TransferError::Transport { block, source }),
                Ok(Ok(received)) => received,
            };

            if let Some(remote) = self.remote {
                if remote != src {
                    warn!(%src, %remote, "ignoring packet from unknown transfer id");
                    continue;
                }
            }

            let pkt = match TftpPacket::deserialize(&self.buf[..len]) {
                Ok(pkt) => pkt,
                Err(e) => return Ok(Reply::Malformed(e)),
            };
            if self.remote.is_none() {
                debug!(remote = %src, "server transfer id");
                self.remote = Some(src);
            }
            return Ok(Reply::Packet(pkt));
        }
    }
}

async fn aborted(abort: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = abort {
        let raised = rx.wait_for(|stop| *stop).await.is_ok();
        if raised {
            return;
        }
    }
    // No signal attached, or its sender is gone: never fires.
    std::future::pending::<()>().await
}
