//! Typed view of the Tendermint / CometBFT JSON RPC responses the scanner consumes.
//!
//! Nodes differ in which fields they populate and frequently send `null` where a list is
//! expected, so every list tolerates `null` and unknown fields are ignored. A malformed list
//! element is dropped on its own instead of failing the whole payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// JSON-RPC envelope, `{"jsonrpc": "2.0", "id": -1, "result": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    pub result: T,
}

/// `status` endpoint result
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResult {
    pub sync_info: SyncInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncInfo {
    pub latest_block_height: String,
    pub latest_block_time: String,
}

/// `block?height=H` endpoint result
#[derive(Debug, Clone, Deserialize)]
pub struct BlockResult {
    pub block: Block,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockHeader {
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub proposer_address: Option<String>,
}

/// `block_results?height=H` endpoint result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockResults {
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub txs_results: Vec<TxResult>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub begin_block_events: Vec<AbciEvent>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub end_block_events: Vec<AbciEvent>,
    /// CometBFT 0.38 folds begin/end block events into this list
    #[serde(default, deserialize_with = "lenient_list")]
    pub finalize_block_events: Vec<AbciEvent>,
}

impl BlockResults {
    /// Events emitted outside of any transaction.
    pub fn block_events(&self) -> impl Iterator<Item = &AbciEvent> {
        self.begin_block_events
            .iter()
            .chain(self.end_block_events.iter())
            .chain(self.finalize_block_events.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.txs_results.is_empty() && self.block_events().next().is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxResult {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub events: Vec<AbciEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbciEvent {
    /// Empty when the node left it out, such events match no known type
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub attributes: Vec<EventAttribute>,
}

impl AbciEvent {
    /// Value of the last attribute named `key`, the way a flattened key/value map sees it.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|attr| attr.key.as_deref() == Some(key))
            .and_then(|attr| attr.value.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventAttribute {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// `null` as an empty list, elements that do not decode are skipped.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|element| match serde_json::from_value(element) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                log::debug!(target: "ibc-packet-scan", "🗑️ Skipping malformed list element: {}", e);
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_lists_decode_as_empty() {
        let raw = json!({
            "height": "12",
            "txs_results": null,
            "begin_block_events": null,
            "end_block_events": [],
            "validator_updates": null
        });
        let results: BlockResults = serde_json::from_value(raw).unwrap();
        assert!(results.txs_results.is_empty());
        assert!(results.is_empty());
    }

    #[test]
    fn attribute_lookup_skips_missing_values() {
        let raw = json!({
            "type": "send_packet",
            "attributes": [
                {"key": "packet_sequence", "value": "7", "index": true},
                {"key": "packet_src_channel", "value": null},
                {"key": "packet_src_channel"}
            ]
        });
        let event: AbciEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.attribute("packet_sequence"), Some("7"));
        assert_eq!(event.attribute("packet_src_channel"), None);
        assert_eq!(event.attribute("packet_dst_channel"), None);
    }

    #[test]
    fn malformed_events_do_not_spoil_the_block() {
        let raw = json!({
            "height": "40",
            "txs_results": [
                {"code": 0, "events": [{"attributes": []}, "garbage"]},
                {"code": 0, "events": [
                    {"type": "send_packet", "attributes": [
                        {"key": "packet_sequence", "value": "1"},
                        {"key": "packet_src_channel", "value": "channel-1"},
                        7
                    ]}
                ]},
                42
            ],
            "begin_block_events": null
        });
        let results: BlockResults = serde_json::from_value(raw).unwrap();
        assert_eq!(results.txs_results.len(), 2);
        assert_eq!(results.txs_results[0].events.len(), 1);
        assert_eq!(results.txs_results[0].events[0].kind, "");
        let send = &results.txs_results[1].events[0];
        assert_eq!(send.kind, "send_packet");
        assert_eq!(send.attributes.len(), 2);
        assert_eq!(send.attribute("packet_src_channel"), Some("channel-1"));
    }

    #[test]
    fn header_time_is_optional() {
        let raw = json!({"block": {"header": {"height": "5", "proposer_address": "AB"}}});
        let block: BlockResult = serde_json::from_value(raw).unwrap();
        assert!(block.block.header.time.is_none());
        assert_eq!(block.block.header.proposer_address.as_deref(), Some("AB"));
    }
}
