/// Errors produced while persisting cache entries. Loads never error;
/// corruption and version skew surface as cache misses.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialize(#[from] quarry_index::SerializeError),
}
