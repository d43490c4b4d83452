use crate::core::error::Error;
use crate::cosmos::types::{BlockHeader, BlockResults};
use chrono::NaiveDateTime;

/// Read-only access to the blocks of a chain, as consumed by the reverse scanner.
///
/// Implementations are expected to handle transient failures themselves; an `Err` means the
/// provider has given up on the request.
#[async_trait::async_trait]
pub trait BlockProvider: Send + Sync {
    /// Name of this chain, used in logs.
    fn name(&self) -> &str;

    /// Return the latest height and its block time.
    async fn latest_height_and_time(&self) -> Result<(u64, NaiveDateTime), Error>;

    /// Query the block header at `height`. `Ok(None)` if the node returned no usable header.
    async fn block_header(&self, height: u64) -> Result<Option<BlockHeader>, Error>;

    /// Query the execution results at `height`. `Ok(None)` if the payload is empty or malformed.
    async fn block_results(&self, height: u64) -> Result<Option<BlockResults>, Error>;
}
