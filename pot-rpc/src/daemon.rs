//! Blockchain Daemon RPC Interface

use async_trait::async_trait;

use crate::client::JsonRpcClient;
use crate::error::RpcResult;
use crate::types::{BlockHeader, GetBlockHeadersRangeRequest, GetBlockHeadersRangeResponse, GetLastBlockHeaderResponse};

/// Block header queries used to locate the draw anchor block
#[async_trait]
pub trait DaemonRpc: Send + Sync {
    /// Header of the chain tip
    async fn get_last_block_header(&self) -> RpcResult<BlockHeader>;

    /// Headers for heights `start..=end`, ascending
    async fn get_block_headers_range(&self, start: u64, end: u64) -> RpcResult<Vec<BlockHeader>>;
}

#[async_trait]
impl DaemonRpc for JsonRpcClient {
    async fn get_last_block_header(&self) -> RpcResult<BlockHeader> {
        let resp: GetLastBlockHeaderResponse = self
            .call("get_last_block_header", &serde_json::json!({}))
            .await?;
        Ok(resp.block_header)
    }

    async fn get_block_headers_range(&self, start: u64, end: u64) -> RpcResult<Vec<BlockHeader>> {
        let req = GetBlockHeadersRangeRequest {
            start_height: start,
            end_height: end,
        };
        let resp: GetBlockHeadersRangeResponse = self.call("get_block_headers_range", &req).await?;
        Ok(resp.headers)
    }
}
