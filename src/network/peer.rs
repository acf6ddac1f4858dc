// Peer connection management

use crate::core::new_id;
use crate::error::{LedgerError, Result};
use crate::network::Message;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Longest envelope accepted from a peer
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Messages queued for a peer before it is treated as stalled
pub const OUTBOUND_QUEUE: usize = 1024;

/// Peer information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Connection id, unique per connection even for repeated addresses
    pub id: String,
    pub addr: SocketAddr,
}

impl PeerInfo {
    pub fn new(addr: SocketAddr) -> Self {
        Self { id: new_id(), addr }
    }
}

/// Outbound half of a peer connection.
///
/// Messages are queued and written by a dedicated task, one envelope per line,
/// so sending never waits on the socket. The queue is bounded; a full queue
/// is reported as an error and the caller drops the peer.
pub struct Peer {
    pub info: PeerInfo,
    sender: mpsc::Sender<String>,
    writer: JoinHandle<()>,
}

/// Inbound half of a peer connection
pub struct PeerReader {
    addr: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    max_line: usize,
}

impl Peer {
    /// Split `stream` into a queued writer and a line reader
    pub fn spawn(stream: TcpStream, addr: SocketAddr) -> (Self, PeerReader) {
        Self::spawn_with_limits(stream, addr, OUTBOUND_QUEUE, MAX_LINE_BYTES)
    }

    pub fn spawn_with_limits(
        stream: TcpStream,
        addr: SocketAddr,
        queue: usize,
        max_line: usize,
    ) -> (Self, PeerReader) {
        let (read_half, write_half) = stream.into_split();
        let (sender, receiver) = mpsc::channel(queue.max(1));
        let writer = tokio::spawn(write_loop(write_half, receiver, addr));

        let peer = Self {
            info: PeerInfo::new(addr),
            sender,
            writer,
        };
        let reader = PeerReader {
            addr,
            reader: BufReader::new(read_half),
            max_line,
        };

        (peer, reader)
    }

    /// Connect to a peer
    pub async fn connect(addr: SocketAddr) -> Result<(Self, PeerReader)> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| LedgerError::Network(format!("Failed to connect to {}: {}", addr, e)))?;

        Ok(Self::spawn(stream, addr))
    }

    /// Queue a message for the peer
    pub fn send_message(&self, message: &Message) -> Result<()> {
        self.send_line(message.encode()?)
    }

    /// Queue an already encoded envelope
    pub fn send_line(&self, line: String) -> Result<()> {
        self.sender.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => {
                LedgerError::Network(format!("Outbound queue to {} is full", self.info.addr))
            }
            TrySendError::Closed(_) => {
                LedgerError::Network(format!("Connection to {} is closed", self.info.addr))
            }
        })
    }

    /// Stop accepting messages and wait until queued ones are written
    pub async fn close(self) {
        drop(self.sender);
        if let Err(e) = self.writer.await {
            log::error!("Writer for {} failed: {}", self.info.addr, e);
        }
    }
}

impl PeerReader {
    /// Next message, `None` once the peer hangs up
    pub async fn receive_message(&mut self) -> Result<Option<Message>> {
        loop {
            match self.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Message::decode(&line).map(Some),
                None => return Ok(None),
            }
        }
    }

    /// Read one line of at most `max_line` bytes
    async fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let limit = self.max_line as u64 + 1;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| LedgerError::Network(format!("Failed to read from {}: {}", self.addr, e)))?;

        if read == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        } else if buf.len() > self.max_line {
            return Err(LedgerError::MalformedMessage(format!(
                "line from {} exceeds {} bytes",
                self.addr, self.max_line
            )));
        }

        String::from_utf8(buf)
            .map(Some)
            .map_err(|e| LedgerError::MalformedMessage(e.to_string()))
    }
}

async fn write_loop(
    mut stream: OwnedWriteHalf,
    mut receiver: mpsc::Receiver<String>,
    addr: SocketAddr,
) {
    while let Some(mut line) = receiver.recv().await {
        line.push('\n');
        if let Err(e) = stream.write_all(line.as_bytes()).await {
            log::warn!("Failed to send message to {}: {}", addr, e);
            return;
        }
    }

    if let Err(e) = stream.shutdown().await {
        log::debug!("Failed to shut down connection to {}: {}", addr, e);
    }
}
