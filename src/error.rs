//! Error taxonomy shared by every layer of the crate.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Error {
    /// Capacity must be at least 2.
    #[error("illegal capacity: {0} (must be greater than 1)")]
    InvalidCapacity(usize),
    /// Load factor must be positive, not NaN, and leave an allocatable bucket array.
    #[error("illegal load factor: {0}")]
    InvalidLoadFactor(f32),
    #[error("illegal shard count: {0} (must be at least 1)")]
    InvalidShardCount(usize),
    /// `get_or_create` needed a value but the map was built without a factory.
    #[error("no value factory configured")]
    MissingValueFactory,
    #[error("cannot evict from an empty map")]
    Empty,
}

pub type Result<T> = core::result::Result<T, Error>;
