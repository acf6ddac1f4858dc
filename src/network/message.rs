// Gossip protocol messages

use crate::core::{Block, Transaction};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Network message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    SendBlocks,
    SendTransaction,
    ClearAllTransactions,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::SendBlocks => "send-blocks",
            MessageType::SendTransaction => "send-transaction",
            MessageType::ClearAllTransactions => "clear-all-transactions",
        }
    }

}

impl FromStr for MessageType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "send-blocks" => Ok(MessageType::SendBlocks),
            "send-transaction" => Ok(MessageType::SendTransaction),
            "clear-all-transactions" => Ok(MessageType::ClearAllTransactions),
            _ => Err(LedgerError::UnknownMessageKind(s.to_string())),
        }
    }
}

/// Network message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Full chain of the sender
    SendBlocks(Vec<Block>),
    /// New or updated pending transaction
    SendTransaction(Transaction),
    /// Instruction to empty the pool
    ClearAllTransactions,
}

/// Wire envelope: `{"type": ..., "data": ...}`
#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl Message {
    /// Get message type
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::SendBlocks(_) => MessageType::SendBlocks,
            Message::SendTransaction(_) => MessageType::SendTransaction,
            Message::ClearAllTransactions => MessageType::ClearAllTransactions,
        }
    }

    /// Encode as a single-line JSON envelope
    pub fn encode(&self) -> Result<String> {
        let data = match self {
            Message::SendBlocks(blocks) => serde_json::to_value(blocks)?,
            Message::SendTransaction(tx) => serde_json::to_value(tx)?,
            Message::ClearAllTransactions => Value::Null,
        };

        let envelope = Envelope {
            kind: self.message_type().as_str().to_string(),
            data,
        };

        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decode a JSON envelope
    pub fn decode(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| LedgerError::MalformedMessage(e.to_string()))?;

        let kind: MessageType = envelope.kind.parse()?;

        let malformed = |e: serde_json::Error| {
            LedgerError::MalformedMessage(format!("{}: {}", kind.as_str(), e))
        };

        match kind {
            MessageType::SendBlocks => {
                let blocks = serde_json::from_value(envelope.data).map_err(malformed)?;
                Ok(Message::SendBlocks(blocks))
            }
            MessageType::SendTransaction => {
                let tx = serde_json::from_value(envelope.data).map_err(malformed)?;
                Ok(Message::SendTransaction(tx))
            }
            MessageType::ClearAllTransactions => Ok(Message::ClearAllTransactions),
        }
    }
}
