use anyhow::{anyhow, Context};
use clap::Parser;
use std::net::IpAddr;
use std::path::Path;
use tokio::fs::File;
use tokio::net::lookup_host;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tftpc::{Cli, Client, Command, FileSink, TransferError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let server = resolve(&args.server, args.port).await?;
    let client = Client::new(server, args.config());
    info!(
        server = %client.server(),
        blksize = client.config().block_size,
        timeout = ?client.config().timeout,
        retries = client.config().max_retries,
        "connecting"
    );
    let start = Instant::now();

    let bytes = match &args.command {
        Command::Get { remote, local } => {
            let local = match local {
                Some(path) => path.clone(),
                None => Path::new(remote)
                    .file_name()
                    .ok_or(anyhow!("cannot derive a local name from {remote:?}"))?
                    .into(),
            };
            let mut sink = FileSink::create(&local)
                .await
                .with_context(|| format!("creating {}", local.display()))?;
            let summary = client
                .download(remote, &mut sink)
                .await
                .map_err(explain)
                .with_context(|| format!("get {remote}"))?;
            if let Some(tsize) = summary.tsize {
                println!("server reported size: {tsize} bytes");
            }
            println!(
                "{remote} -> {} ({} bytes, blksize {})",
                sink.path().display(),
                summary.bytes,
                summary.block_size
            );
            summary.bytes
        }
        Command::Put { local, remote } => {
            let remote = match remote {
                Some(name) => name.clone(),
                None => local
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or(anyhow!("cannot derive a remote name from {}", local.display()))?
                    .to_string(),
            };
            let mut source = File::open(local)
                .await
                .with_context(|| format!("opening {}", local.display()))?;
            let summary = client
                .upload(&remote, &mut source)
                .await
                .map_err(explain)
                .with_context(|| format!("put {remote}"))?;
            println!(
                "{} -> {remote} ({} bytes, blksize {})",
                local.display(),
                summary.bytes,
                summary.block_size
            );
            summary.bytes
        }
    };

    let cost = start.elapsed();
    println!(
        "cost: {:.3}s, speed: {:.2} MB/s",
        cost.as_secs_f64(),
        bytes as f64 / cost.as_secs_f64() / 1024.0 / 1024.0
    );
    Ok(())
}

// Names the standard meaning of a server error code next to the server's own
// message, which is often terse.
fn explain(err: TransferError) -> anyhow::Error {
    match err.remote_code() {
        Some(code) => anyhow::Error::new(err).context(format!("server refused: {code}")),
        None => err.into(),
    }
}

async fn resolve(host: &str, port: u16) -> anyhow::Result<IpAddr> {
    if let Ok(ip) = host.parse() {
        return Ok(ip);
    }
    lookup_host((host, port))
        .await
        .with_context(|| format!("resolving {host}"))?
        .next()
        .map(|addr| addr.ip())
        .ok_or(anyhow!("no address for {host}"))
}
