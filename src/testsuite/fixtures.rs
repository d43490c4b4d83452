use crate::cosmos::types::BlockResults;
use serde_json::{json, Value};

fn attributes(pairs: &[(&str, &str)]) -> Value {
    Value::Array(
        pairs
            .iter()
            .map(|(key, value)| json!({"key": key, "value": value, "index": true}))
            .collect(),
    )
}

pub fn send_packet_event(channel: &str, sequence: &str) -> Value {
    json!({
        "type": "send_packet",
        "attributes": attributes(&[
            ("packet_data", "{}"),
            ("packet_timeout_height", "1-5000000"),
            ("packet_sequence", sequence),
            ("packet_src_port", "transfer"),
            ("packet_src_channel", channel),
            ("packet_dst_port", "transfer"),
            ("packet_dst_channel", "channel-0"),
            ("packet_channel_ordering", "ORDER_UNORDERED"),
        ])
    })
}

pub fn ack_packet_event(channel: &str, sequence: &str) -> Value {
    json!({
        "type": "acknowledge_packet",
        "attributes": attributes(&[
            ("packet_timeout_height", "1-5000000"),
            ("packet_sequence", sequence),
            ("packet_src_port", "transfer"),
            ("packet_src_channel", channel),
            ("packet_dst_port", "transfer"),
            ("packet_dst_channel", "channel-0"),
        ])
    })
}

pub fn recv_packet_event(src_channel: &str, sequence: &str, dst_channel: &str) -> Value {
    json!({
        "type": "recv_packet",
        "attributes": attributes(&[
            ("packet_data", "{}"),
            ("packet_timeout_height", "1-5000000"),
            ("packet_sequence", sequence),
            ("packet_src_port", "transfer"),
            ("packet_src_channel", src_channel),
            ("packet_dst_port", "transfer"),
            ("packet_dst_channel", dst_channel),
        ])
    })
}

pub fn fee_event(amount: &str, denom: &str) -> Value {
    json!({
        "type": "tx_fee",
        "attributes": attributes(&[("amount", amount), ("denom", denom)])
    })
}

pub fn tx(events: Vec<Value>) -> Value {
    json!({"code": 0, "events": events})
}

/// `block_results` result body.
pub fn block_results_json(block_events: Vec<Value>, txs: Vec<Value>) -> Value {
    json!({
        "height": "0",
        "txs_results": if txs.is_empty() { Value::Null } else { Value::Array(txs) },
        "begin_block_events": block_events,
        "end_block_events": null,
        "validator_updates": null
    })
}

pub fn block_results(block_events: Vec<Value>, txs: Vec<Value>) -> BlockResults {
    serde_json::from_value(block_results_json(block_events, txs))
        .expect("fixture block results are well formed")
}
