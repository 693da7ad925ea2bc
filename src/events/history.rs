use crate::core::types::Address;
use crate::core::types::Timestamp;

use super::types::ChainEvent;
use super::types::TimestampedEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetAction {
    Created,
    Added,
    Received,
    StartedAuction,
    Bought,
    ClosedAuction,
}

/// One line of an asset's user-facing history log.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub action: AssetAction,
    pub address: Address,
    pub item_count: u64,
    pub price: Option<String>,
    pub timestamp: Timestamp,
}

/// Builds the history log from an ordered event sequence.
///
/// A plain scan with a one-event lookahead: a bare transfer only becomes a
/// `Received` entry when the following event is not part of a marketplace
/// action, otherwise the marketplace event owns the log line. Bids are not
/// part of the history log.
pub fn build_history(events: &[TimestampedEvent]) -> Vec<HistoryEntry> {
    let mut scanner = Scanner::new(events);
    let mut log: Vec<HistoryEntry> = vec![];

    while let Some(current) = scanner.next() {
        let entry = match &current.event {
            ChainEvent::Created { address, quantity } => Some(HistoryEntry {
                action: AssetAction::Created,
                address: address.clone(),
                item_count: *quantity,
                price: None,
                timestamp: current.timestamp,
            }),
            ChainEvent::AddedQuantity { address, quantity } => Some(HistoryEntry {
                action: AssetAction::Added,
                address: address.clone(),
                item_count: *quantity,
                price: None,
                timestamp: current.timestamp,
            }),
            ChainEvent::Transferred { to, quantity, .. } => {
                if scanner.peek().map(|next| is_market_event(&next.event)) == Some(true) {
                    // The marketplace event right behind this transfer tells
                    // the real story.
                    None
                } else {
                    Some(HistoryEntry {
                        action: AssetAction::Received,
                        address: to.clone(),
                        item_count: *quantity,
                        price: None,
                        timestamp: current.timestamp,
                    })
                }
            }
            ChainEvent::AuctionStarted { seller, min_bid } => Some(HistoryEntry {
                action: AssetAction::StartedAuction,
                address: seller.clone(),
                item_count: 1,
                price: Some(min_bid.clone()),
                timestamp: current.timestamp,
            }),
            ChainEvent::BidPlaced { .. } => None,
            ChainEvent::Bought {
                buyer,
                price,
                quantity,
            } => Some(HistoryEntry {
                action: AssetAction::Bought,
                address: buyer.clone(),
                item_count: *quantity,
                price: Some(price.clone()),
                timestamp: current.timestamp,
            }),
            ChainEvent::AuctionEnded { winner, price } => Some(HistoryEntry {
                action: AssetAction::Bought,
                address: winner.clone(),
                item_count: 1,
                price: Some(price.clone()),
                timestamp: current.timestamp,
            }),
            ChainEvent::AuctionClosed { seller } => Some(HistoryEntry {
                action: AssetAction::ClosedAuction,
                address: seller.clone(),
                item_count: 1,
                price: None,
                timestamp: current.timestamp,
            }),
        };
        if let Some(entry) = entry {
            log.push(entry);
        }
    }

    log
}

fn is_market_event(event: &ChainEvent) -> bool {
    matches!(
        event,
        ChainEvent::AuctionStarted { .. }
            | ChainEvent::BidPlaced { .. }
            | ChainEvent::Bought { .. }
            | ChainEvent::AuctionEnded { .. }
            | ChainEvent::AuctionClosed { .. }
    )
}

/// Ordered event scan with a one-event lookahead buffer.
struct Scanner<'a> {
    events: &'a [TimestampedEvent],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(events: &'a [TimestampedEvent]) -> Self {
        Self { events, pos: 0 }
    }

    fn next(&mut self) -> Option<&'a TimestampedEvent> {
        let event = self.events.get(self.pos);
        self.pos += 1;
        event
    }

    fn peek(&self) -> Option<&'a TimestampedEvent> {
        self.events.get(self.pos)
    }
}
