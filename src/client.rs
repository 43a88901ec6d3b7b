use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ErrorCode, TransferError};
use crate::options::TransferOptions;
use crate::packet::{TftpOption, TftpPacket};
use crate::session::Session;
use crate::sink::Sink;
use crate::transfer::{AckAction, DataAction, Receiving, Sending};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub bytes: u64,
    /// Block size the transfer actually ran with.
    pub block_size: u16,
    /// File size announced by the server, if it answered a `tsize` request.
    pub tsize: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub bytes: u64,
    pub block_size: u16,
}

/// Client for one server. Each call to [`Client::download`] or
/// [`Client::upload`] runs on its own fresh socket, so a client can be
/// shared by concurrent transfers.
#[derive(Debug, Clone)]
pub struct Client {
    server: SocketAddr,
    config: ClientConfig,
    abort: Option<watch::Receiver<bool>>,
}

impl Client {
    pub fn new(server: IpAddr, config: ClientConfig) -> Self {
        Self {
            server: SocketAddr::new(server, config.port),
            config,
            abort: None,
        }
    }

    /// Setting the watched value to `true` fails any pending receive with
    /// [`TransferError::Aborted`].
    pub fn with_abort(mut self, abort: watch::Receiver<bool>) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Reads `filename` from the server into `sink`.
    ///
    /// The sink is committed before the final block is acknowledged. On any
    /// failure it is discarded, so partial output never looks complete.
    pub async fn download<S: Sink>(
        &self,
        filename: &str,
        sink: &mut S,
    ) -> Result<DownloadSummary, TransferError> {
        let result = self.receive(filename, sink).await;
        if let Err(e) = &result {
            warn!(filename, error = %e, "download failed, discarding output");
            if let Err(e) = sink.discard().await {
                warn!(error = %e, "failed to discard partial output");
            }
        }
        result
    }

    /// Writes everything `source` yields to `filename` on the server.
    pub async fn upload<R: AsyncRead + Unpin>(
        &self,
        filename: &str,
        source: &mut R,
    ) -> Result<UploadSummary, TransferError> {
        self.check_request(filename)?;
        let requested = TransferOptions::request(self.config.block_size, None);
        let mut session = Session::open(self.server, &self.config, self.abort.clone()).await?;

        let wrq = TftpPacket::WRQ {
            filename: filename.to_string(),
            mode: self.config.mode.clone(),
            options: requested.to_options(),
        };
        session.send(&wrq, 0).await?;

        let mut tx = Sending::new(crate::DEF_BLOCK_SIZE);
        let mut awaiting_first = true;
        let mut bytes: u64 = 0;

        loop {
            let pkt = session.recv(tx.outstanding()).await?;

            let acked = if awaiting_first {
                pkt.acknowledged_options()
            } else {
                None
            };
            let block = if let Some(options) = acked {
                let (block_size, _) = self.negotiate(&session, options).await?;
                tx.set_block_size(block_size);
                0
            } else {
                match &pkt {
                    TftpPacket::ACK(block) => *block,
                    TftpPacket::ERROR { code, msg } => {
                        return Err(TransferError::Remote {
                            code: *code,
                            message: msg.clone(),
                        })
                    }
                    other => {
                        debug!(opcode = other.opcode(), "ignoring unexpected packet");
                        continue;
                    }
                }
            };
            awaiting_first = false;

            match tx.on_ack(block) {
                AckAction::Stale => debug!(block, "ignoring stale ack"),
                AckAction::Done => {
                    info!(
                        filename,
                        bytes,
                        block_size = tx.block_size(),
                        remote = ?session.remote(),
                        "upload complete"
                    );
                    return Ok(UploadSummary {
                        bytes,
                        block_size: tx.block_size(),
                    });
                }
                AckAction::Send(next) => {
                    session.progress();
                    let data = match read_chunk(source, tx.block_size()).await {
                        Ok(data) => data,
                        Err(source) => {
                            session
                                .notify_error(ErrorCode::NotDefined, "client read error")
                                .await;
                            return Err(TransferError::LocalResource {
                                block: next,
                                source,
                            });
                        }
                    };
                    let len = data.len();
                    session
                        .send(&TftpPacket::DATA { block: next, data }, next)
                        .await?;
                    bytes += len as u64;
                    tx.sent(len);
                }
            }
        }
    }

    async fn receive<S: Sink>(
        &self,
        filename: &str,
        sink: &mut S,
    ) -> Result<DownloadSummary, TransferError> {
        self.check_request(filename)?;
        let requested = TransferOptions::request(
            self.config.block_size,
            self.config.request_tsize.then_some(0),
        );
        let mut session = Session::open(self.server, &self.config, self.abort.clone()).await?;

        let rrq = TftpPacket::RRQ {
            filename: filename.to_string(),
            mode: self.config.mode.clone(),
            options: requested.to_options(),
        };
        session.send(&rrq, 0).await?;

        // Without an option acknowledgment the server uses the default.
        let mut rx = Receiving::new(crate::DEF_BLOCK_SIZE);
        let mut awaiting_first = true;
        let mut tsize = None;
        let mut bytes: u64 = 0;

        loop {
            let pkt = session.recv(rx.expected()).await?;

            if awaiting_first {
                if let Some(options) = pkt.acknowledged_options() {
                    let (block_size, size) = self.negotiate(&session, options).await?;
                    rx.set_block_size(block_size);
                    tsize = size;
                    awaiting_first = false;
                    session.send(&TftpPacket::ACK(0), 0).await?;
                    session.progress();
                    continue;
                }
            }

            match pkt {
                TftpPacket::DATA { block, data } => {
                    awaiting_first = false;
                    match rx.on_data(block, data.len()) {
                        DataAction::Accept { last } => {
                            let block_size = usize::from(rx.block_size());
                            if let Err(source) = write_block(sink, &data, last, block_size).await {
                                let err = TransferError::LocalResource { block, source };
                                self.report(&session, &err).await;
                                return Err(err);
                            }
                            bytes += data.len() as u64;
                            session.send(&TftpPacket::ACK(block), block).await?;
                            session.progress();

                            if last {
                                info!(
                                    filename,
                                    bytes,
                                    block_size = rx.block_size(),
                                    remote = ?session.remote(),
                                    "download complete"
                                );
                                return Ok(DownloadSummary {
                                    bytes,
                                    block_size: rx.block_size(),
                                    tsize,
                                });
                            }
                        }
                        DataAction::Duplicate => {
                            debug!(block, expected = rx.expected(), "re-acknowledging duplicate");
                            session.send_once(&TftpPacket::ACK(block), block).await?;
                        }
                        DataAction::Ignore => {
                            debug!(block, expected = rx.expected(), "ignoring out of order block")
                        }
                        DataAction::Oversized => warn!(
                            block,
                            len = data.len(),
                            block_size = rx.block_size(),
                            "ignoring oversized block"
                        ),
                    }
                }
                TftpPacket::ERROR { code, msg } => {
                    return Err(TransferError::Remote { code, message: msg })
                }
                other => debug!(opcode = other.opcode(), "ignoring unexpected packet"),
            }
        }
    }

    fn check_request(&self, filename: &str) -> Result<(), TransferError> {
        self.config.validate()?;
        if filename.is_empty() || filename.contains('\0') {
            return Err(TransferError::InvalidRequest(format!(
                "invalid filename {filename:?}"
            )));
        }
        Ok(())
    }

    /// Applies an option acknowledgment, returning the block size to use and
    /// the announced file size.
    async fn negotiate(
        &self,
        session: &Session,
        options: &[TftpOption],
    ) -> Result<(u16, Option<u64>), TransferError> {
        let negotiated = TransferOptions::parse(options).and_then(|acked| {
            let block_size = acked.block_size(self.config.block_size)?;
            Ok((block_size, acked.tsize))
        });
        match negotiated {
            Ok((block_size, tsize)) => {
                debug!(block_size, ?tsize, "options acknowledged");
                Ok((block_size, tsize))
            }
            Err(e) => {
                let err = TransferError::from(e);
                self.report(session, &err).await;
                Err(err)
            }
        }
    }

    /// Tells the server about a local failure, when it maps to a wire code.
    async fn report(&self, session: &Session, err: &TransferError) {
        if let Some(code) = err.error_code() {
            session.notify_error(code, code.default_message()).await;
        }
    }
}

async fn write_block<S: Sink>(
    sink: &mut S,
    data: &[u8],
    last: bool,
    block_size: usize,
) -> io::Result<()> {
    sink.write_all(data).await?;
    if last {
        sink.flush().await?;
        sink.commit().await
    } else {
        sink.check_space(block_size)
    }
}

// A full block unless the source runs dry first.
async fn read_chunk<R: AsyncRead + Unpin>(source: &mut R, block_size: u16) -> io::Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(usize::from(block_size));
    source
        .take(u64::from(block_size))
        .read_to_end(&mut chunk)
        .await?;
    Ok(chunk)
}

/// Downloads `filename` from `server` with a one-off [`Client`].
pub async fn download<S: Sink>(
    server: IpAddr,
    filename: &str,
    sink: &mut S,
    config: &ClientConfig,
) -> Result<DownloadSummary, TransferError> {
    Client::new(server, config.clone())
        .download(filename, sink)
        .await
}

/// Uploads `source` as `filename` to `server` with a one-off [`Client`].
pub async fn upload<R: AsyncRead + Unpin>(
    server: IpAddr,
    filename: &str,
    source: &mut R,
    config: &ClientConfig,
) -> Result<UploadSummary, TransferError> {
    Client::new(server, config.clone())
        .upload(filename, source)
        .await
}
