// Network node - manages peer connections and applies gossip

use crate::core::Transaction;
use crate::error::{LedgerError, Result};
use crate::network::{Message, Peer, PeerInfo, PeerReader};
use crate::storage::Storage;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

/// Network node
#[derive(Clone)]
pub struct Node {
    /// Node address
    pub addr: SocketAddr,
    /// Connected peers
    peers: Arc<RwLock<Vec<Peer>>>,
    /// Ledger and pool, the single mutation path for this node
    pub storage: Arc<RwLock<Storage>>,
}

impl Node {
    /// Create a new node
    pub fn new(addr: SocketAddr, storage: Storage) -> Self {
        Self {
            addr,
            peers: Arc::new(RwLock::new(Vec::new())),
            storage: Arc::new(RwLock::new(storage)),
        }
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        log::info!("Node listening on {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener
                .accept()
                .await
                .map_err(|e| LedgerError::Network(format!("Failed to accept connection: {}", e)))?;

            log::info!("New connection from {}", addr);
            self.spawn_connection(stream, addr);
        }
    }

    /// Connect to a peer
    pub async fn connect_to_peer(&self, addr: SocketAddr) -> Result<()> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| LedgerError::Network(format!("Failed to connect to {}: {}", addr, e)))?;

        log::info!("Connected to peer {}", addr);
        self.spawn_connection(stream, addr);
        Ok(())
    }

    /// Dial every peer once; unreachable peers are logged and skipped
    pub async fn connect_to_peers(&self, addrs: &[SocketAddr]) {
        for addr in addrs {
            if let Err(e) = self.connect_to_peer(*addr).await {
                log::warn!("{}", e);
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let node = self.clone();
        tokio::spawn(async move {
            node.handle_peer(stream, addr).await;
        });
    }

    /// Register the peer, bootstrap it with our chain, then apply its
    /// messages until it disconnects or sends something undecodable
    async fn handle_peer(&self, stream: TcpStream, addr: SocketAddr) {
        let (peer, mut reader) = Peer::spawn(stream, addr);
        let info = peer.info.clone();

        self.peers.write().await.push(peer);

        if let Err(e) = self.send_chain(&info).await {
            log::warn!("Failed to send chain to {}: {}", addr, e);
        }

        self.read_loop(&info, &mut reader).await;

        // Remove from peer list
        self.peers.write().await.retain(|p| p.info.id != info.id);
        log::info!("Peer {} disconnected", addr);
    }

    async fn read_loop(&self, info: &PeerInfo, reader: &mut PeerReader) {
        loop {
            match reader.receive_message().await {
                Ok(Some(message)) => {
                    log::debug!(
                        "Received message from {}: {}",
                        info.addr,
                        message.message_type().as_str()
                    );
                    Self::apply_message(&self.storage, message).await;
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Dropping peer {}: {}", info.addr, e);
                    break;
                }
            }
        }
    }

    /// Apply an inbound message to the ledger and pool
    pub async fn apply_message(storage: &RwLock<Storage>, message: Message) {
        let mut storage = storage.write().await;

        match message {
            Message::SendBlocks(blocks) => {
                // rejection is logged by the ledger
                storage.blockchain.reset_chain(blocks);
            }
            Message::SendTransaction(tx) => {
                storage.pool.add_or_update(tx);
            }
            Message::ClearAllTransactions => {
                log::info!("Clearing {} pending transactions", storage.pool.len());
                storage.pool.clear();
            }
        }
    }

    async fn send_chain(&self, info: &PeerInfo) -> Result<()> {
        let message = self.chain_message().await;
        let peers = self.peers.read().await;
        match peers.iter().find(|p| p.info.id == info.id) {
            Some(peer) => peer.send_message(&message),
            None => Ok(()),
        }
    }

    async fn chain_message(&self) -> Message {
        let storage = self.storage.read().await;
        Message::SendBlocks(storage.blockchain.blocks().to_vec())
    }

    /// Send `message` to every connected peer, without acknowledgment.
    /// Peers whose queue is full or closed are dropped.
    pub async fn broadcast(&self, message: &Message) -> Result<()> {
        let line = message.encode()?;
        let mut peers = self.peers.write().await;

        log::info!(
            "Broadcasting {} to {} peers",
            message.message_type().as_str(),
            peers.len()
        );

        peers.retain(|peer| match peer.send_line(line.clone()) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Dropping peer {}: {}", peer.info.addr, e);
                false
            }
        });

        Ok(())
    }

    /// Broadcast our full chain
    pub async fn broadcast_chain(&self) -> Result<()> {
        let message = self.chain_message().await;
        self.broadcast(&message).await
    }

    /// Broadcast a transaction to all peers
    pub async fn broadcast_transaction(&self, tx: &Transaction) -> Result<()> {
        self.broadcast(&Message::SendTransaction(tx.clone())).await
    }

    /// Tell all peers to empty their pools
    pub async fn broadcast_clear_transactions(&self) -> Result<()> {
        self.broadcast(&Message::ClearAllTransactions).await
    }

    /// Get number of connected peers
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use crate::wallet::{KeyPair, Wallet};

    fn fast_config() -> ChainConfig {
        ChainConfig {
            mine_rate: 1,
            ..ChainConfig::default()
        }
    }

    fn storage() -> Storage {
        Storage::new(fast_config()).unwrap()
    }

    #[test]
    fn test_node_creation() {
        let addr: SocketAddr = "127.0.0.1:5001".parse().unwrap();
        let node = Node::new(addr, storage());

        assert_eq!(node.addr, addr);
    }

    #[tokio::test]
    async fn test_apply_send_blocks() {
        let node = Node::new("127.0.0.1:0".parse().unwrap(), storage());

        let mut longer = storage();
        longer.blockchain.add_block(Vec::new()).unwrap();
        let blocks = longer.blockchain.blocks().to_vec();

        Node::apply_message(&node.storage, Message::SendBlocks(blocks.clone())).await;
        assert_eq!(node.storage.read().await.blockchain.blocks(), blocks.as_slice());

        // equal length is ignored
        let mut rival = storage();
        rival.blockchain.add_block(Vec::new()).unwrap();
        Node::apply_message(
            &node.storage,
            Message::SendBlocks(rival.blockchain.blocks().to_vec()),
        )
        .await;
        assert_eq!(node.storage.read().await.blockchain.blocks(), blocks.as_slice());
    }

    #[tokio::test]
    async fn test_apply_transaction_and_clear() {
        let node = Node::new("127.0.0.1:0".parse().unwrap(), storage());
        let wallet = Wallet::new(KeyPair::generate(), &fast_config());
        let tx = Transaction::create(&wallet, "R", 10).unwrap();

        Node::apply_message(&node.storage, Message::SendTransaction(tx.clone())).await;
        assert_eq!(node.storage.read().await.pool.get(&tx.id), Some(&tx));

        Node::apply_message(&node.storage, Message::ClearAllTransactions).await;
        assert!(node.storage.read().await.pool.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_connected_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let node = Node::new(listener.local_addr().unwrap(), storage());
        {
            let node = node.clone();
            tokio::spawn(async move { node.serve(listener).await });
        }

        let (_peer, mut reader) = Peer::connect(node.addr).await.unwrap();

        // bootstrap chain first
        assert!(matches!(
            reader.receive_message().await.unwrap(),
            Some(Message::SendBlocks(blocks)) if blocks.len() == 1
        ));

        node.broadcast_clear_transactions().await.unwrap();
        assert_eq!(
            reader.receive_message().await.unwrap(),
            Some(Message::ClearAllTransactions)
        );
        assert_eq!(node.peer_count().await, 1);
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let node = Node::new("127.0.0.1:0".parse().unwrap(), storage());
        assert!(matches!(
            node.connect_to_peer(addr).await,
            Err(LedgerError::Network(_))
        ));
        node.connect_to_peers(&[addr]).await;
        assert_eq!(node.peer_count().await, 0);
    }
}
