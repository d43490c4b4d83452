use super::client::CosmosClient;
use super::types::{BlockHeader, BlockResult, BlockResults, RpcResponse, StatusResult};
use crate::core::error::Error;
use crate::core::timestamps::parse_block_time;
use crate::primitives::BlockProvider;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decodes the `result` of an rpc response, `None` for error responses and unexpected shapes.
fn decode_result<T: DeserializeOwned>(method: &str, height: u64, body: Value) -> Option<T> {
    if let Some(error) = body.get("error") {
        log::warn!(
            target: "ibc-packet-scan",
            "⚠️ {} at height {} returned an rpc error: {}",
            method,
            height,
            error
        );
        return None;
    }
    match serde_json::from_value::<RpcResponse<T>>(body) {
        Ok(response) => Some(response.result),
        Err(e) => {
            log::warn!(
                target: "ibc-packet-scan",
                "⚠️ Malformed {} payload at height {}: {}",
                method,
                height,
                e
            );
            None
        }
    }
}

#[async_trait::async_trait]
impl BlockProvider for CosmosClient {
    fn name(&self) -> &str {
        &*self.name
    }

    async fn latest_height_and_time(&self) -> Result<(u64, NaiveDateTime), Error> {
        let body = self.fetch_json(self.endpoint("status", None)?).await?;
        let status = serde_json::from_value::<RpcResponse<StatusResult>>(body)?.result;
        let height = status
            .sync_info
            .latest_block_height
            .parse::<u64>()
            .map_err(|e| {
                Error::Custom(format!(
                    "Invalid latest block height {:?} for chain {}: {}",
                    status.sync_info.latest_block_height, self.name, e
                ))
            })?;
        let time = parse_block_time(&status.sync_info.latest_block_time).ok_or_else(|| {
            Error::Custom(format!(
                "Invalid latest block time {:?} for chain {}",
                status.sync_info.latest_block_time, self.name
            ))
        })?;
        Ok((height, time))
    }

    async fn block_header(&self, height: u64) -> Result<Option<BlockHeader>, Error> {
        let body = self.fetch_json(self.endpoint("block", Some(height))?).await?;
        Ok(decode_result::<BlockResult>("block", height, body).map(|result| result.block.header))
    }

    async fn block_results(&self, height: u64) -> Result<Option<BlockResults>, Error> {
        let body = self
            .fetch_json(self.endpoint("block_results", Some(height))?)
            .await?;
        Ok(decode_result::<BlockResults>("block_results", height, body))
    }
}
