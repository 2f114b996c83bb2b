//! Serialized Access
//!
//! The wallet service cannot handle overlapping calls, and the daemon is
//! treated the same way. Each wrapper owns its own lock so a slow wallet
//! call never blocks a daemon query. The lock is held only for the
//! duration of a single call.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::daemon::DaemonRpc;
use crate::error::RpcResult;
use crate::types::*;
use crate::wallet::WalletRpc;

/// Wallet handle that admits one in-flight call at a time
pub struct SerializedWallet {
    inner: Arc<dyn WalletRpc>,
    lock: Mutex<()>,
}

impl SerializedWallet {
    pub fn new(inner: Arc<dyn WalletRpc>) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl WalletRpc for SerializedWallet {
    async fn validate_address(&self, req: &ValidateAddressRequest) -> RpcResult<ValidateAddressResponse> {
        let _guard = self.lock.lock().await;
        self.inner.validate_address(req).await
    }

    async fn create_address(&self, req: &CreateAddressRequest) -> RpcResult<CreateAddressResponse> {
        let _guard = self.lock.lock().await;
        self.inner.create_address(req).await
    }

    async fn get_balance(&self, req: &GetBalanceRequest) -> RpcResult<GetBalanceResponse> {
        let _guard = self.lock.lock().await;
        self.inner.get_balance(req).await
    }

    async fn get_transfers(&self, req: &GetTransfersRequest) -> RpcResult<GetTransfersResponse> {
        let _guard = self.lock.lock().await;
        self.inner.get_transfers(req).await
    }

    async fn transfer(&self, req: &TransferRequest) -> RpcResult<TransferResponse> {
        let _guard = self.lock.lock().await;
        self.inner.transfer(req).await
    }

    async fn transfer_split(&self, req: &TransferSplitRequest) -> RpcResult<TransferSplitResponse> {
        let _guard = self.lock.lock().await;
        self.inner.transfer_split(req).await
    }

    async fn make_uri(&self, req: &MakeUriRequest) -> RpcResult<MakeUriResponse> {
        let _guard = self.lock.lock().await;
        self.inner.make_uri(req).await
    }

    async fn get_address(&self, req: &GetAddressRequest) -> RpcResult<GetAddressResponse> {
        let _guard = self.lock.lock().await;
        self.inner.get_address(req).await
    }
}

/// Daemon handle that admits one in-flight call at a time
pub struct SerializedDaemon {
    inner: Arc<dyn DaemonRpc>,
    lock: Mutex<()>,
}

impl SerializedDaemon {
    pub fn new(inner: Arc<dyn DaemonRpc>) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl DaemonRpc for SerializedDaemon {
    async fn get_last_block_header(&self) -> RpcResult<BlockHeader> {
        let _guard = self.lock.lock().await;
        self.inner.get_last_block_header().await
    }

    async fn get_block_headers_range(&self, start: u64, end: u64) -> RpcResult<Vec<BlockHeader>> {
        let _guard = self.lock.lock().await;
        self.inner.get_block_headers_range(start, end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Daemon that records the peak number of overlapping calls
    #[derive(Default)]
    struct Probe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DaemonRpc for Probe {
        async fn get_last_block_header(&self) -> RpcResult<BlockHeader> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(BlockHeader::default())
        }

        async fn get_block_headers_range(&self, _start: u64, _end: u64) -> RpcResult<Vec<BlockHeader>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_calls_do_not_overlap() {
        let probe = Arc::new(Probe::default());
        let daemon = Arc::new(SerializedDaemon::new(probe.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let daemon = daemon.clone();
            handles.push(tokio::spawn(async move { daemon.get_last_block_header().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
    }
}
