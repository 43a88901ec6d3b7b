//! Scripted loopback servers for driving the client.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tftpc::{ClientConfig, TftpPacket};
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// How long a scripted server waits before declaring the client silent.
pub const SERVER_WAIT: Duration = Duration::from_secs(2);

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Binds a well-known-port stand-in and a config pointing at it with short
/// timeouts.
pub async fn listener() -> (UdpSocket, ClientConfig) {
    let sock = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let config = ClientConfig {
        port: sock.local_addr().unwrap().port(),
        ..Default::default()
    }
    .with_timeout(Duration::from_millis(100));
    (sock, config)
}

/// A fresh socket, i.e. a new server transfer ID.
pub async fn transfer_socket() -> UdpSocket {
    UdpSocket::bind((LOCALHOST, 0)).await.unwrap()
}

pub async fn recv(sock: &UdpSocket) -> (TftpPacket, SocketAddr) {
    try_recv(sock, SERVER_WAIT)
        .await
        .expect("client went silent")
}

pub async fn try_recv(sock: &UdpSocket, wait: Duration) -> Option<(TftpPacket, SocketAddr)> {
    let mut buf = vec![0; 65536];
    let (n, from) = timeout(wait, sock.recv_from(&mut buf)).await.ok()?.unwrap();
    Some((TftpPacket::deserialize(&buf[..n]).unwrap(), from))
}

pub async fn send(sock: &UdpSocket, pkt: &TftpPacket, to: SocketAddr) {
    sock.send_to(&pkt.serialize(), to).await.unwrap();
}

pub fn data(block: u16, payload: &[u8]) -> TftpPacket {
    TftpPacket::DATA {
        block,
        data: payload.to_vec(),
    }
}

/// Serves `content` in lockstep, starting at block 1, and returns once the
/// final block is acknowledged.
pub async fn serve_download(
    sock: &UdpSocket,
    client: SocketAddr,
    content: &[u8],
    block_size: usize,
) {
    let mut block: u16 = 1;
    let mut offset = 0;
    loop {
        let end = (offset + block_size).min(content.len());
        let chunk = &content[offset..end];
        send(sock, &data(block, chunk), client).await;
        loop {
            let (pkt, from) = recv(sock).await;
            assert_eq!(from, client);
            if pkt == TftpPacket::ACK(block) {
                break;
            }
        }
        if chunk.len() < block_size {
            return;
        }
        offset = end;
        block = block.wrapping_add(1);
    }
}

/// Acknowledges DATA blocks from block 1 until a short one arrives and
/// returns what was received.
pub async fn receive_upload(sock: &UdpSocket, client: SocketAddr, block_size: usize) -> Vec<u8> {
    let mut received = Vec::new();
    let mut expected: u16 = 1;
    loop {
        let (pkt, from) = recv(sock).await;
        assert_eq!(from, client);
        match pkt {
            TftpPacket::DATA { block, data } if block == expected => {
                assert!(data.len() <= block_size);
                received.extend_from_slice(&data);
                send(sock, &TftpPacket::ACK(block), client).await;
                if data.len() < block_size {
                    return received;
                }
                expected = expected.wrapping_add(1);
            }
            TftpPacket::DATA { block, .. } => {
                send(sock, &TftpPacket::ACK(block), client).await;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
