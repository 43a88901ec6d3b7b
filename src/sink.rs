use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::{self, File};
use tokio::io::AsyncWrite;

/// Destination of a download.
///
/// Besides accepting bytes, a sink can veto the next block (`check_space`) and
/// must be able to throw away partial output when a transfer aborts.
pub trait Sink: AsyncWrite + Unpin {
    /// Checks there is room for `additional` more bytes. Called after every
    /// block that is not the last one.
    fn check_space(&mut self, _additional: usize) -> io::Result<()> {
        Ok(())
    }

    /// Marks the output complete. Called once, after the last block has been
    /// written and flushed and before it is acknowledged.
    fn commit(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        async { Ok(()) }
    }

    /// Drops whatever was written so far.
    fn discard(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

impl Sink for Vec<u8> {
    fn discard(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        self.clear();
        async { Ok(()) }
    }
}

/// A file that only appears at its path once the download completes.
///
/// Blocks are written to a hidden staging file next to the destination,
/// which `commit` renames into place. An existing file at the destination is
/// left alone until then.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
    staging: PathBuf,
    written: u64,
    limit: Option<u64>,
    committed: bool,
    removed: bool,
}

impl FileSink {
    pub async fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            )
        })?;
        let staging = path.with_file_name(format!(
            ".{}.{}.part",
            name.to_string_lossy(),
            std::process::id()
        ));
        let file = File::create(&staging).await?;
        Ok(Self {
            file,
            path,
            staging,
            written: 0,
            limit: None,
            committed: false,
            removed: false,
        })
    }

    /// Caps the file size; a block that would not fit fails `check_space`.
    pub fn with_limit(mut self, bytes: u64) -> Self {
        self.limit = Some(bytes);
        self
    }

    /// Final destination of the download.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl AsyncWrite for FileSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.file).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            self.written += n as u64;
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

impl Sink for FileSink {
    fn check_space(&mut self, additional: usize) -> io::Result<()> {
        match self.limit {
            Some(limit) if self.written + additional as u64 > limit => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} would exceed {limit} bytes", self.path.display()),
            )),
            _ => Ok(()),
        }
    }

    fn commit(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        async move {
            if !self.committed {
                fs::rename(&self.staging, &self.path).await?;
                self.committed = true;
            }
            Ok(())
        }
    }

    fn discard(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        async move {
            if self.committed || self.removed {
                return Ok(());
            }
            self.removed = true;
            fs::remove_file(&self.staging).await
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // No async context here; a plain unlink is all that is left to do.
        if !self.committed && !self.removed {
            let _ = std::fs::remove_file(&self.staging);
        }
    }
}
