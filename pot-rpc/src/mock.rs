//! In-memory wallet and daemon backends
//!
//! Scripted stand-ins for the external services, used by engine tests.
//! Height filtering follows the wallet: `min_height` exclusive,
//! `max_height` inclusive.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::daemon::DaemonRpc;
use crate::error::{RpcError, RpcResult};
use crate::types::*;
use crate::wallet::WalletRpc;

/// Sub-address handed out by [`MockWallet::create_address`] for `index`
pub fn mock_address(index: u64) -> String {
    format!("8{:0>94}", index)
}

/// Primary address reported by [`MockWallet::get_address`]
pub fn mock_primary_address() -> String {
    format!("4{}", "0".repeat(94))
}

fn offline() -> RpcError {
    RpcError::Connection("mock service offline".to_string())
}

#[derive(Default)]
struct WalletState {
    transfers: Vec<Transfer>,
    balance: u64,
    unlocked_balance: u64,
    next_index: u64,
    split_failure: Option<(i64, String)>,
    failing_destinations: HashSet<String>,
    invalid_addresses: HashSet<String>,
    split_requests: Vec<TransferSplitRequest>,
    transfer_requests: Vec<TransferRequest>,
    offline: bool,
}

/// Scripted wallet service
#[derive(Default)]
pub struct MockWallet {
    state: Mutex<WalletState>,
}

impl MockWallet {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut WalletState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Add a confirmed inbound transfer to sub-address `minor`
    pub fn push_incoming(&self, txid: &str, minor: u64, amount: u64, height: u64) {
        self.with_state(|s| {
            s.transfers.push(Transfer {
                txid: txid.to_string(),
                amount,
                height,
                subaddr_index: SubaddressIndex { major: 0, minor },
                address: mock_address(minor),
                kind: "in".to_string(),
                ..Default::default()
            })
        });
    }

    pub fn set_balance(&self, balance: u64, unlocked_balance: u64) {
        self.with_state(|s| {
            s.balance = balance;
            s.unlocked_balance = unlocked_balance;
        });
    }

    /// Make every `transfer_split` fail with this error until cleared
    pub fn fail_split(&self, code: i64, message: &str) {
        self.with_state(|s| s.split_failure = Some((code, message.to_string())));
    }

    pub fn clear_split_failure(&self) {
        self.with_state(|s| s.split_failure = None);
    }

    /// Make single transfers to `address` fail
    pub fn fail_transfers_to(&self, address: &str) {
        self.with_state(|s| {
            s.failing_destinations.insert(address.to_string());
        });
    }

    pub fn reject_address(&self, address: &str) {
        self.with_state(|s| {
            s.invalid_addresses.insert(address.to_string());
        });
    }

    /// Fail every call with a connection error
    pub fn set_offline(&self, offline: bool) {
        self.with_state(|s| s.offline = offline);
    }

    pub fn split_requests(&self) -> Vec<TransferSplitRequest> {
        self.with_state(|s| s.split_requests.clone())
    }

    pub fn transfer_requests(&self) -> Vec<TransferRequest> {
        self.with_state(|s| s.transfer_requests.clone())
    }

    /// Number of sub-addresses issued so far
    pub fn issued_addresses(&self) -> u64 {
        self.with_state(|s| s.next_index)
    }

    fn debit(state: &mut WalletState, amount: u64) {
        state.balance = state.balance.saturating_sub(amount);
        state.unlocked_balance = state.unlocked_balance.saturating_sub(amount);
    }
}

#[async_trait]
impl WalletRpc for MockWallet {
    async fn validate_address(&self, req: &ValidateAddressRequest) -> RpcResult<ValidateAddressResponse> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            let valid = !req.address.is_empty() && !s.invalid_addresses.contains(&req.address);
            Ok(ValidateAddressResponse {
                valid,
                nettype: "mainnet".to_string(),
                ..Default::default()
            })
        })
    }

    async fn create_address(&self, _req: &CreateAddressRequest) -> RpcResult<CreateAddressResponse> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            s.next_index += 1;
            Ok(CreateAddressResponse {
                address: mock_address(s.next_index),
                address_index: s.next_index,
            })
        })
    }

    async fn get_balance(&self, _req: &GetBalanceRequest) -> RpcResult<GetBalanceResponse> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            Ok(GetBalanceResponse {
                balance: s.balance,
                unlocked_balance: s.unlocked_balance,
            })
        })
    }

    async fn get_transfers(&self, req: &GetTransfersRequest) -> RpcResult<GetTransfersResponse> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            let mut resp = GetTransfersResponse::default();
            if !req.incoming {
                return Ok(resp);
            }
            let min = req.min_height.unwrap_or(0);
            let max = req.max_height.unwrap_or(u64::MAX);
            resp.incoming = s
                .transfers
                .iter()
                .filter(|t| !req.filter_by_height || (t.height > min && t.height <= max))
                .cloned()
                .collect();
            Ok(resp)
        })
    }

    async fn transfer(&self, req: &TransferRequest) -> RpcResult<TransferResponse> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            if let Some(dest) = req
                .destinations
                .iter()
                .find(|d| s.failing_destinations.contains(&d.address))
            {
                return Err(RpcError::Response {
                    code: -4,
                    message: format!("transfer to {} rejected", dest.address),
                });
            }
            let amount = req.destinations.iter().map(|d| d.amount).sum();
            s.transfer_requests.push(req.clone());
            Self::debit(s, amount);
            Ok(TransferResponse {
                tx_hash: format!("{:064x}", s.transfer_requests.len()),
                amount,
                ..Default::default()
            })
        })
    }

    async fn transfer_split(&self, req: &TransferSplitRequest) -> RpcResult<TransferSplitResponse> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            if let Some((code, message)) = &s.split_failure {
                return Err(RpcError::Response {
                    code: *code,
                    message: message.clone(),
                });
            }
            s.split_requests.push(req.clone());
            Self::debit(s, req.total());
            Ok(TransferSplitResponse {
                tx_hash_list: vec![format!("{:064x}", s.split_requests.len())],
                amount_list: vec![req.total()],
                fee_list: vec![0],
            })
        })
    }

    async fn make_uri(&self, req: &MakeUriRequest) -> RpcResult<MakeUriResponse> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            let uri = match req.amount {
                Some(amount) => format!(
                    "monero:{}?tx_amount={}.{:012}",
                    req.address,
                    amount / 1_000_000_000_000,
                    amount % 1_000_000_000_000
                ),
                None => format!("monero:{}", req.address),
            };
            Ok(MakeUriResponse { uri })
        })
    }

    async fn get_address(&self, _req: &GetAddressRequest) -> RpcResult<GetAddressResponse> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            Ok(GetAddressResponse {
                address: mock_primary_address(),
                addresses: Vec::new(),
            })
        })
    }
}

#[derive(Default)]
struct DaemonState {
    headers: Vec<BlockHeader>,
    range_calls: Vec<(u64, u64)>,
    offline: bool,
}

/// Scripted blockchain daemon holding a list of block headers
#[derive(Default)]
pub struct MockDaemon {
    state: Mutex<DaemonState>,
}

impl MockDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut DaemonState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Add (or replace) the header at `height`
    pub fn push_header(&self, height: u64, timestamp: u64, hash: &str) {
        self.with_state(|s| {
            s.headers.retain(|h| h.height != height);
            s.headers.push(BlockHeader {
                hash: hash.to_string(),
                height,
                timestamp,
            });
            s.headers.sort_by_key(|h| h.height);
        });
    }

    /// Add headers for `from..=to`, `spacing` seconds apart starting at `start_time`.
    /// Hashes are the zero-padded hex height.
    pub fn extend_chain(&self, from: u64, to: u64, start_time: u64, spacing: u64) {
        for height in from..=to {
            let timestamp = start_time + (height - from) * spacing;
            self.push_header(height, timestamp, &format!("{:064x}", height));
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.with_state(|s| s.offline = offline);
    }

    /// Ranges requested so far, in call order
    pub fn range_calls(&self) -> Vec<(u64, u64)> {
        self.with_state(|s| s.range_calls.clone())
    }
}

#[async_trait]
impl DaemonRpc for MockDaemon {
    async fn get_last_block_header(&self) -> RpcResult<BlockHeader> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            s.headers.last().cloned().ok_or_else(|| RpcError::Response {
                code: -1,
                message: "no blocks".to_string(),
            })
        })
    }

    async fn get_block_headers_range(&self, start: u64, end: u64) -> RpcResult<Vec<BlockHeader>> {
        self.with_state(|s| {
            if s.offline {
                return Err(offline());
            }
            s.range_calls.push((start, end));
            if start > end {
                return Err(RpcError::Response {
                    code: -1,
                    message: format!("invalid range {}..{}", start, end),
                });
            }
            Ok(s.headers
                .iter()
                .filter(|h| h.height >= start && h.height <= end)
                .cloned()
                .collect())
        })
    }
}
