use crate::core::timestamps::format_block_time;
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

/// Identity of one packet lifecycle: source channel and packet sequence, as emitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PacketKey {
    pub channel_id: String,
    pub sequence: String,
}

impl PacketKey {
    pub fn new(channel_id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            sequence: sequence.into(),
        }
    }
}

impl Ord for PacketKey {
    // sequences are decimal strings, shorter ones are numerically smaller
    fn cmp(&self, other: &Self) -> Ordering {
        self.channel_id
            .cmp(&other.channel_id)
            .then_with(|| self.sequence.len().cmp(&other.sequence.len()))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for PacketKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fee paid by the transaction that emitted an event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeeInfo {
    pub amount: Option<String>,
    pub denom: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendRecord {
    pub key: PacketKey,
    pub send_height: u64,
    pub fee: FeeInfo,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AckRecord {
    pub key: PacketKey,
    pub ack_height: u64,
}

/// A `recv_packet` observed on this chain. Row of the receive table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecvRecord {
    pub channel_id: String,
    pub sequence: String,
    pub recv_height: u64,
    #[serde(serialize_with = "serialize_time")]
    pub recv_time: Option<NaiveDateTime>,
    pub fee_amount: Option<String>,
    pub fee_denom: Option<String>,
    pub source_port: Option<String>,
    pub destination_channel: Option<String>,
    pub timeout_height: Option<String>,
}

/// A send joined with its acknowledgement, if one was seen. Row of the send/ack table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PacketDelayRecord {
    pub channel_id: String,
    pub sequence: String,
    pub send_height: u64,
    #[serde(serialize_with = "serialize_time")]
    pub send_time: Option<NaiveDateTime>,
    pub ack_height: Option<u64>,
    #[serde(serialize_with = "serialize_time")]
    pub ack_time: Option<NaiveDateTime>,
    pub block_delay: Option<i64>,
    pub fee_amount: Option<String>,
    pub fee_denom: Option<String>,
}

/// Number of blocks between a send and its acknowledgement, `ack_height - send_height`.
pub fn calculate_block_delay(send_height: u64, ack_height: u64) -> i64 {
    ack_height as i64 - send_height as i64
}

fn serialize_time<S>(time: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match time {
        Some(time) => serializer.serialize_str(&format_block_time(time)),
        None => serializer.serialize_none(),
    }
}
