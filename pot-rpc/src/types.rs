//! Wallet and Daemon RPC Messages
//!
//! Field names follow the services' JSON. Response fields default when the
//! service omits them (e.g. `in` is absent when there are no transfers).

use serde::{Deserialize, Serialize};

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidateAddressRequest {
    pub address: String,
    #[serde(skip_serializing_if = "is_false")]
    pub any_net_type: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub allow_openalias: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValidateAddressResponse {
    pub valid: bool,
    pub integrated: bool,
    pub subaddress: bool,
    pub nettype: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateAddressRequest {
    pub account_index: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateAddressResponse {
    pub address: String,
    pub address_index: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetBalanceRequest {
    pub account_index: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub address_indices: Vec<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetBalanceResponse {
    pub balance: u64,
    pub unlocked_balance: u64,
}

impl GetBalanceResponse {
    /// Part of the balance still waiting to unlock
    pub fn is_fully_unlocked(&self) -> bool {
        self.balance == self.unlocked_balance
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubaddressIndex {
    pub major: u64,
    pub minor: u64,
}

/// Inbound/outbound transfer as reported by `get_transfers`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transfer {
    pub address: String,
    pub amount: u64,
    pub confirmations: u64,
    pub fee: u64,
    pub height: u64,
    pub payment_id: String,
    pub subaddr_index: SubaddressIndex,
    pub timestamp: u64,
    pub txid: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub unlock_time: u64,
}

/// `min_height` is exclusive, `max_height` inclusive
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetTransfersRequest {
    #[serde(rename = "in", skip_serializing_if = "is_false")]
    pub incoming: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub out: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub pending: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub failed: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub pool: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub filter_by_height: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u64>,
}

impl GetTransfersRequest {
    /// Confirmed inbound transfers above `min_height`
    pub fn incoming_above(min_height: u64) -> Self {
        Self {
            incoming: true,
            filter_by_height: true,
            min_height: Some(min_height),
            ..Default::default()
        }
    }

    /// Confirmed inbound transfers in `(min_height, max_height]`
    pub fn incoming_between(min_height: u64, max_height: u64) -> Self {
        Self {
            max_height: Some(max_height),
            ..Self::incoming_above(min_height)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetTransfersResponse {
    #[serde(rename = "in")]
    pub incoming: Vec<Transfer>,
    pub out: Vec<Transfer>,
    pub pending: Vec<Transfer>,
    pub failed: Vec<Transfer>,
    pub pool: Vec<Transfer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub amount: u64,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferRequest {
    pub destinations: Vec<Destination>,
    #[serde(default)]
    pub account_index: u64,
    #[serde(default)]
    pub priority: u64,
    #[serde(default)]
    pub mixin: u64,
    #[serde(default)]
    pub ring_size: u64,
    #[serde(default)]
    pub unlock_time: u64,
    #[serde(default)]
    pub get_tx_key: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransferResponse {
    pub tx_hash: String,
    pub tx_key: String,
    pub amount: u64,
    pub fee: u64,
}

/// Multi-destination transfer the wallet may split into several transactions.
///
/// Persisted verbatim as the pending payout of a draw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSplitRequest {
    pub destinations: Vec<Destination>,
    #[serde(default)]
    pub account_index: u64,
    #[serde(default)]
    pub priority: u64,
    #[serde(default)]
    pub mixin: u64,
    #[serde(default)]
    pub ring_size: u64,
    #[serde(default)]
    pub unlock_time: u64,
    #[serde(default)]
    pub new_algorithm: bool,
    #[serde(default)]
    pub get_tx_keys: bool,
}

impl TransferSplitRequest {
    pub fn total(&self) -> u64 {
        self.destinations.iter().map(|d| d.amount).sum()
    }

    /// Same parameters, one destination
    pub fn single(&self, destination: Destination) -> TransferRequest {
        TransferRequest {
            destinations: vec![destination],
            account_index: self.account_index,
            priority: self.priority,
            mixin: self.mixin,
            ring_size: self.ring_size,
            unlock_time: self.unlock_time,
            get_tx_key: self.get_tx_keys,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransferSplitResponse {
    pub tx_hash_list: Vec<String>,
    pub amount_list: Vec<u64>,
    pub fee_list: Vec<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MakeUriRequest {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MakeUriResponse {
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetAddressRequest {
    pub account_index: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub address_index: Vec<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressInfo {
    pub address: String,
    pub address_index: u64,
    pub label: String,
    pub used: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetAddressResponse {
    /// Primary address of the account
    pub address: String,
    pub addresses: Vec<AddressInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockHeader {
    pub hash: String,
    pub height: u64,
    /// Unix seconds
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetLastBlockHeaderResponse {
    pub block_header: BlockHeader,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetBlockHeadersRangeRequest {
    pub start_height: u64,
    pub end_height: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetBlockHeadersRangeResponse {
    pub headers: Vec<BlockHeader>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_transfers_request_encoding() {
        let req = GetTransfersRequest::incoming_between(100, 250);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["in"], true);
        assert_eq!(json["filter_by_height"], true);
        assert_eq!(json["min_height"], 100);
        assert_eq!(json["max_height"], 250);
        assert!(json.get("out").is_none());

        let json = serde_json::to_value(GetTransfersRequest::incoming_above(7)).unwrap();
        assert!(json.get("max_height").is_none());
    }

    #[test]
    fn test_get_transfers_response_without_in() {
        let resp: GetTransfersResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.incoming.is_empty());

        let resp: GetTransfersResponse = serde_json::from_str(
            r#"{"in":[{"txid":"ab","amount":5,"height":10,"subaddr_index":{"major":0,"minor":3},"type":"in"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.incoming.len(), 1);
        assert_eq!(resp.incoming[0].subaddr_index.minor, 3);
        assert_eq!(resp.incoming[0].kind, "in");
    }

    #[test]
    fn test_split_request_single() {
        let split = TransferSplitRequest {
            destinations: vec![
                Destination { amount: 5, address: "a".to_string() },
                Destination { amount: 7, address: "b".to_string() },
            ],
            mixin: 8,
            unlock_time: 10,
            ..Default::default()
        };
        assert_eq!(split.total(), 12);

        let single = split.single(split.destinations[1].clone());
        assert_eq!(single.destinations.len(), 1);
        assert_eq!(single.mixin, 8);
        assert_eq!(single.unlock_time, 10);
    }
}
