// P2P gossip networking

mod message;
mod node;
mod peer;

pub use message::{Message, MessageType};
pub use node::Node;
pub use peer::{Peer, PeerInfo, PeerReader};
