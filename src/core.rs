pub mod api;
pub mod documents;
pub mod persistence;
pub mod types;

pub use api::ApiError;
pub use api::ChainApi;
pub use api::HttpChainApi;
pub use documents::DocumentStore;
pub use documents::MemoryDocumentStore;
pub use persistence::MarketplaceRepository;
pub use persistence::MemoryMarketplaceRepository;
pub use persistence::MemoryRarityRepository;
pub use persistence::PersistenceError;
pub use persistence::RarityRepository;
