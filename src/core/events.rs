// Copyright 2022 ComposableFi
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::core::packets::{FeeInfo, PacketKey, PacketStore, RecvRecord};
use crate::cosmos::types::{AbciEvent, BlockResults};
use thiserror::Error;

pub const SEND_PACKET: &str = "send_packet";
pub const ACKNOWLEDGE_PACKET: &str = "acknowledge_packet";
pub const RECV_PACKET: &str = "recv_packet";

/// Packet lifecycle events tracked by the scanner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketEventType {
    Send,
    Acknowledge,
    Recv,
}

impl PacketEventType {
    pub fn from_event_type(kind: &str) -> Option<Self> {
        match kind {
            SEND_PACKET => Some(Self::Send),
            ACKNOWLEDGE_PACKET => Some(Self::Acknowledge),
            RECV_PACKET => Some(Self::Recv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => SEND_PACKET,
            Self::Acknowledge => ACKNOWLEDGE_PACKET,
            Self::Recv => RECV_PACKET,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("missing attribute `{0}`")]
    MissingAttribute(&'static str),
}

/// Attributes of a packet event. Unknown attributes are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketAttributes {
    pub sequence: String,
    pub src_channel: String,
    pub src_port: Option<String>,
    pub dst_channel: Option<String>,
    pub timeout_height: Option<String>,
}

impl PacketAttributes {
    pub fn decode(event: &AbciEvent) -> Result<Self, DecodeError> {
        let required = |key: &'static str| {
            event
                .attribute(key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or(DecodeError::MissingAttribute(key))
        };
        let optional = |key: &str| event.attribute(key).map(str::to_string);
        Ok(Self {
            sequence: required("packet_sequence")?,
            src_channel: required("packet_src_channel")?,
            src_port: optional("packet_src_port"),
            dst_channel: optional("packet_dst_channel"),
            timeout_height: optional("packet_timeout_height"),
        })
    }

    pub fn key(&self) -> PacketKey {
        PacketKey::new(self.src_channel.clone(), self.sequence.clone())
    }
}

/// Counts of what one block contributed to the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub sends: usize,
    pub acks: usize,
    pub recvs: usize,
    /// Packet events dropped because they could not be decoded
    pub dropped: usize,
}

impl ExtractSummary {
    pub fn total(&self) -> usize {
        self.sends + self.acks + self.recvs
    }
}

/// Pulls packet lifecycle events out of block execution results into a [`PacketStore`].
#[derive(Clone, Debug)]
pub struct EventExtractor {
    fee_event_types: Vec<String>,
}

impl Default for EventExtractor {
    fn default() -> Self {
        Self::new(vec!["tx_fee".to_string(), "fee_pay".to_string()])
    }
}

impl EventExtractor {
    pub fn new(fee_event_types: Vec<String>) -> Self {
        Self { fee_event_types }
    }

    /// Fee paid by a transaction, taken from its own fee events. Later attributes win.
    pub fn tx_fee(&self, events: &[AbciEvent]) -> Option<FeeInfo> {
        let mut fee: Option<FeeInfo> = None;
        for event in events
            .iter()
            .filter(|event| self.fee_event_types.iter().any(|kind| *kind == event.kind))
        {
            let entry = fee.get_or_insert_with(FeeInfo::default);
            for attr in &event.attributes {
                match attr.key.as_deref() {
                    Some("amount") | Some("fee") => entry.amount = attr.value.clone(),
                    Some("denom") => entry.denom = attr.value.clone(),
                    _ => {}
                }
            }
        }
        fee
    }

    /// Records the packet events of the block at `height`.
    ///
    /// Block level events carry no fee. Transaction events are attributed the fee of the
    /// transaction that emitted them. `recv_time` is read from the store's timestamp cache, so
    /// the caller should record the block time first.
    pub fn extract(
        &self,
        height: u64,
        results: &BlockResults,
        store: &mut PacketStore,
    ) -> ExtractSummary {
        let mut summary = ExtractSummary::default();
        for event in results.block_events() {
            self.apply_event(height, event, None, None, store, &mut summary);
        }
        for tx in &results.txs_results {
            let fee = self.tx_fee(&tx.events);
            for event in &tx.events {
                self.apply_event(
                    height,
                    event,
                    fee.as_ref(),
                    tx.hash.as_deref(),
                    store,
                    &mut summary,
                );
            }
        }
        summary
    }

    fn apply_event(
        &self,
        height: u64,
        event: &AbciEvent,
        fee: Option<&FeeInfo>,
        tx_hash: Option<&str>,
        store: &mut PacketStore,
        summary: &mut ExtractSummary,
    ) {
        let event_type = match PacketEventType::from_event_type(&event.kind) {
            Some(event_type) => event_type,
            None => return,
        };
        let attributes = match PacketAttributes::decode(event) {
            Ok(attributes) => attributes,
            Err(e) => {
                summary.dropped += 1;
                log::debug!(
                    target: "ibc-packet-scan",
                    "🗑️ Dropping {} at height {} (tx {}): {}",
                    event_type.as_str(),
                    height,
                    tx_hash.unwrap_or("-"),
                    e
                );
                return;
            }
        };
        let fee = fee.cloned().unwrap_or_default();
        match event_type {
            PacketEventType::Send => {
                store.record_send(attributes.key(), height, fee);
                summary.sends += 1;
            }
            PacketEventType::Acknowledge => {
                store.record_ack(attributes.key(), height);
                summary.acks += 1;
            }
            PacketEventType::Recv => {
                let recv_time = store.timestamp(height);
                store.record_recv(RecvRecord {
                    channel_id: attributes.src_channel,
                    sequence: attributes.sequence,
                    recv_height: height,
                    recv_time,
                    fee_amount: fee.amount,
                    fee_denom: fee.denom,
                    source_port: attributes.src_port,
                    destination_channel: attributes.dst_channel,
                    timeout_height: attributes.timeout_height,
                });
                summary.recvs += 1;
            }
        }
    }
}
