mod history;
mod publisher;
mod types;

pub use history::build_history;
pub use history::AssetAction;
pub use history::HistoryEntry;
pub use publisher::CacheEventType;
pub use publisher::ChangedEvent;
pub use publisher::ChannelEventPublisher;
pub use publisher::EventPublisher;
pub use publisher::InvalidationConsumer;
pub use types::decode_log;
pub use types::ChainEvent;
pub use types::TimestampedEvent;
