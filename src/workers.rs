pub mod marketplace_events;
pub mod rarity;
pub mod scam;
pub mod traits;

use thiserror::Error;

use crate::cache::CacheError;
use crate::core::ApiError;
use crate::core::PersistenceError;
use crate::index::IndexError;

/// Anything that can fail inside one reconciliation unit of work.
///
/// Caught per unit, logged with job name and unit id, and turned into a
/// requeue outcome; a bad collection never aborts the batch.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("invalid request: {0}")]
    Invalid(String),
}
