//! P2P protocol messages
//!
//! One JSON object per line. Every object carries a `type` discriminator
//! followed by the payload for that type.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::consensus::Block;
use crate::crypto::{is_hex, HASH_LEN};

/// Protocol errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    #[error("Invalid hex in field {0}")]
    InvalidHex(String),
}

/// P2P message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Announce or deliver a block
    Block { block: Block },
    /// Request the full chain ending at `latest`
    Chain { latest: String },
}

impl Message {
    /// Get the command name for this message
    pub fn command(&self) -> &'static str {
        match self {
            Message::Block { .. } => "block",
            Message::Chain { .. } => "chain",
        }
    }

    /// Encode as a newline-terminated JSON line
    pub fn to_line(&self) -> String {
        // Serializing plain strings and integers cannot fail
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }

    /// Decode one line received from a peer
    pub fn from_line(line: impl AsRef<[u8]>) -> Result<Self, ProtocolError> {
        let mut value: Value = serde_json::from_slice(line.as_ref())
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(ProtocolError::Malformed("type is not a string".into())),
            None => return Err(ProtocolError::Malformed("missing type".into())),
        };

        match kind.as_str() {
            "block" => {
                let payload = take_field(&mut value, "block")?;
                let block: Block = serde_json::from_value(payload)
                    .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
                block
                    .check_encoding()
                    .map_err(|field| ProtocolError::InvalidHex(format!("block.{field}")))?;
                Ok(Message::Block { block })
            }
            "chain" => {
                let latest = match take_field(&mut value, "latest")? {
                    Value::String(latest) => latest,
                    _ => return Err(ProtocolError::Malformed("latest is not a string".into())),
                };
                if latest.len() != HASH_LEN * 2 || !is_hex(&latest) {
                    return Err(ProtocolError::InvalidHex("latest".into()));
                }
                Ok(Message::Chain { latest })
            }
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

fn take_field(value: &mut Value, field: &str) -> Result<Value, ProtocolError> {
    value
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| ProtocolError::Malformed(format!("missing {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::genesis_block;
    use crate::validation::Transaction;

    fn sample_block() -> Block {
        Block::new(
            genesis_block().hash_hex(),
            17,
            1,
            vec![Transaction::block_reward("aa", 5000, "01")],
        )
    }

    #[test]
    fn test_block_wire_shape() {
        let msg = Message::Block { block: sample_block() };
        let line = msg.to_line();
        assert!(line.ends_with('\n'));

        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], "block");
        assert_eq!(value["block"]["work"], 17);
        assert_eq!(value["block"]["transactions"][0]["input"], "blockReward");

        assert_eq!(Message::from_line(&line).unwrap(), msg);
    }

    #[test]
    fn test_chain_wire_shape() {
        let latest = sample_block().hash_hex();
        let line = format!(r#"{{"type":"chain","latest":"{latest}"}}"#);
        let msg = Message::from_line(&line).unwrap();
        assert_eq!(msg, Message::Chain { latest });
        assert_eq!(msg.command(), "chain");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = Message::from_line(r#"{"type":"ping"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownType("ping".into()));
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(matches!(Message::from_line("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(Message::from_line(r#"{"latest":"00"}"#), Err(ProtocolError::Malformed(_))));
        assert!(matches!(Message::from_line(r#"{"type":"block"}"#), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            Message::from_line(r#"{"type":"block","block":{"previous":"00"}}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_hex_rejected() {
        let mut block = sample_block();
        block.transactions[0].output = "zz".into();
        let line = Message::Block { block }.to_line();
        assert_eq!(
            Message::from_line(&line).unwrap_err(),
            ProtocolError::InvalidHex("block.transactions[0].output".into())
        );

        let err = Message::from_line(r#"{"type":"chain","latest":"xyz"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidHex("latest".into()));
    }
}
