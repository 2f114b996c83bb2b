//! Wallet RPC Interface

use async_trait::async_trait;

use crate::client::JsonRpcClient;
use crate::error::RpcResult;
use crate::types::*;

/// Operations the pot needs from its custodial wallet
#[async_trait]
pub trait WalletRpc: Send + Sync {
    async fn validate_address(&self, req: &ValidateAddressRequest) -> RpcResult<ValidateAddressResponse>;

    /// Issue a new receiving sub-address
    async fn create_address(&self, req: &CreateAddressRequest) -> RpcResult<CreateAddressResponse>;

    async fn get_balance(&self, req: &GetBalanceRequest) -> RpcResult<GetBalanceResponse>;

    async fn get_transfers(&self, req: &GetTransfersRequest) -> RpcResult<GetTransfersResponse>;

    async fn transfer(&self, req: &TransferRequest) -> RpcResult<TransferResponse>;

    async fn transfer_split(&self, req: &TransferSplitRequest) -> RpcResult<TransferSplitResponse>;

    async fn make_uri(&self, req: &MakeUriRequest) -> RpcResult<MakeUriResponse>;

    async fn get_address(&self, req: &GetAddressRequest) -> RpcResult<GetAddressResponse>;
}

#[async_trait]
impl WalletRpc for JsonRpcClient {
    async fn validate_address(&self, req: &ValidateAddressRequest) -> RpcResult<ValidateAddressResponse> {
        self.call("validate_address", req).await
    }

    async fn create_address(&self, req: &CreateAddressRequest) -> RpcResult<CreateAddressResponse> {
        self.call("create_address", req).await
    }

    async fn get_balance(&self, req: &GetBalanceRequest) -> RpcResult<GetBalanceResponse> {
        self.call("get_balance", req).await
    }

    async fn get_transfers(&self, req: &GetTransfersRequest) -> RpcResult<GetTransfersResponse> {
        self.call("get_transfers", req).await
    }

    async fn transfer(&self, req: &TransferRequest) -> RpcResult<TransferResponse> {
        self.call("transfer", req).await
    }

    async fn transfer_split(&self, req: &TransferSplitRequest) -> RpcResult<TransferSplitResponse> {
        self.call("transfer_split", req).await
    }

    async fn make_uri(&self, req: &MakeUriRequest) -> RpcResult<MakeUriResponse> {
        self.call("make_uri", req).await
    }

    async fn get_address(&self, req: &GetAddressRequest) -> RpcResult<GetAddressResponse> {
        self.call("get_address", req).await
    }
}
