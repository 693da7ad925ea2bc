use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::core::types::Address;
use crate::core::types::Timestamp;
use crate::core::types::TxHash;
use crate::index::Document;

/// Raw event identifiers emitted by the chain and marketplace contracts.
mod names {
    pub const CREATE: &str = "ESDTNFTCreate";
    pub const ADD_QUANTITY: &str = "ESDTNFTAddQuantity";
    pub const TRANSFER: &str = "ESDTNFTTransfer";
    pub const AUCTION_TOKEN: &str = "auctionToken";
    pub const BID: &str = "bid";
    pub const BUY_SFT: &str = "buySft";
    pub const END_AUCTION: &str = "endAuction";
    pub const WITHDRAW: &str = "withdraw";
}

/// A chain event decoded at the boundary into a tagged variant.
///
/// Raw index documents carry an `identifier` discriminant and base64 topics;
/// nothing dynamically-typed crosses into reconciliation logic.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEvent {
    Created {
        address: Address,
        quantity: u64,
    },
    AddedQuantity {
        address: Address,
        quantity: u64,
    },
    Transferred {
        from: Address,
        to: Address,
        quantity: u64,
    },
    AuctionStarted {
        seller: Address,
        min_bid: String,
    },
    BidPlaced {
        bidder: Address,
        amount: String,
    },
    Bought {
        buyer: Address,
        price: String,
        quantity: u64,
    },
    AuctionEnded {
        winner: Address,
        price: String,
    },
    AuctionClosed {
        seller: Address,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedEvent {
    pub tx_hash: TxHash,
    pub timestamp: Timestamp,
    pub event: ChainEvent,
}

/// Decodes one raw log document into the tagged events it carries.
///
/// Unknown event identifiers are skipped; a malformed known event is dropped
/// with a warning rather than poisoning the batch.
pub fn decode_log(doc: &Document) -> Vec<TimestampedEvent> {
    let tx_hash = doc.str_field("identifier").unwrap_or_default().to_owned();
    let timestamp = doc.timestamp().unwrap_or_default();

    let raw_events = match doc.0.get("events").and_then(|v| v.as_array()) {
        Some(events) => events,
        None => return vec![],
    };

    raw_events
        .iter()
        .filter_map(|raw| {
            let identifier = raw.get("identifier")?.as_str()?;
            let address = raw
                .get("address")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned();
            let topics: Vec<String> = raw
                .get("topics")
                .and_then(|v| v.as_array())
                .map(|ts| {
                    ts.iter()
                        .filter_map(|t| t.as_str())
                        .map(decode_topic)
                        .collect()
                })
                .unwrap_or_default();

            let event = decode_event(identifier, address, &topics);
            if event.is_none() && is_known(identifier) {
                tracing::warn!("dropping malformed {identifier} event in tx {tx_hash}");
            }
            event.map(|event| TimestampedEvent {
                tx_hash: tx_hash.clone(),
                timestamp,
                event,
            })
        })
        .collect()
}

fn is_known(identifier: &str) -> bool {
    matches!(
        identifier,
        names::CREATE
            | names::ADD_QUANTITY
            | names::TRANSFER
            | names::AUCTION_TOKEN
            | names::BID
            | names::BUY_SFT
            | names::END_AUCTION
            | names::WITHDRAW
    )
}

/// Topic layout per event kind:
/// `[collection, nonce, quantity-or-price, counterpart-address, ...]`.
fn decode_event(identifier: &str, address: Address, topics: &[String]) -> Option<ChainEvent> {
    match identifier {
        names::CREATE => Some(ChainEvent::Created {
            address,
            quantity: topic_u64(topics, 2)?,
        }),
        names::ADD_QUANTITY => Some(ChainEvent::AddedQuantity {
            address,
            quantity: topic_u64(topics, 2)?,
        }),
        names::TRANSFER => Some(ChainEvent::Transferred {
            from: address,
            to: topics.get(3)?.clone(),
            quantity: topic_u64(topics, 2)?,
        }),
        names::AUCTION_TOKEN => Some(ChainEvent::AuctionStarted {
            seller: address,
            min_bid: topics.get(3)?.clone(),
        }),
        names::BID => Some(ChainEvent::BidPlaced {
            bidder: topics.get(4)?.clone(),
            amount: topics.get(3)?.clone(),
        }),
        names::BUY_SFT => Some(ChainEvent::Bought {
            buyer: topics.get(4)?.clone(),
            price: topics.get(3)?.clone(),
            quantity: topic_u64(topics, 2).unwrap_or(1),
        }),
        names::END_AUCTION => Some(ChainEvent::AuctionEnded {
            winner: topics.get(4)?.clone(),
            price: topics.get(5)?.clone(),
        }),
        names::WITHDRAW => Some(ChainEvent::AuctionClosed { seller: address }),
        _ => None,
    }
}

fn decode_topic(topic: &str) -> String {
    match BASE64.decode(topic) {
        Ok(bytes) => match String::from_utf8(bytes.clone()) {
            Ok(s) => s,
            Err(_) => base16::encode_lower(&bytes),
        },
        // Already plain in some index deployments.
        Err(_) => topic.to_owned(),
    }
}

fn topic_u64(topics: &[String], index: usize) -> Option<u64> {
    let topic = topics.get(index)?;
    topic
        .parse::<u64>()
        .ok()
        .or_else(|| u64::from_str_radix(topic, 16).ok())
}

#[cfg(test)]
mod tests {
    use super::decode_log;
    use super::ChainEvent;
    use crate::index::Document;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn b64(s: &str) -> String {
        BASE64.encode(s)
    }

    #[test]
    fn decodes_create_event() {
        let doc = Document(json!({
            "identifier": "tx1",
            "timestamp": 1_690_000_000,
            "events": [{
                "address": "erd1creator",
                "identifier": "ESDTNFTCreate",
                "topics": [b64("CHESS-1a2b3c"), b64("01"), b64("1")],
            }],
        }));
        let events = decode_log(&doc);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tx_hash, "tx1");
        assert_eq!(
            events[0].event,
            ChainEvent::Created {
                address: "erd1creator".to_string(),
                quantity: 1,
            }
        );
    }

    #[test]
    fn unknown_events_are_skipped() {
        let doc = Document(json!({
            "identifier": "tx2",
            "timestamp": 1_690_000_000,
            "events": [{
                "address": "erd1x",
                "identifier": "somethingElse",
                "topics": [],
            }],
        }));
        assert_eq!(decode_log(&doc).len(), 0);
    }
}
