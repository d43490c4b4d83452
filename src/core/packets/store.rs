use super::types::{
    calculate_block_delay, AckRecord, FeeInfo, PacketDelayRecord, PacketKey, RecvRecord,
    SendRecord,
};
use crate::core::config::DuplicatePolicy;
use crate::core::timestamps::BlockTimestampCache;
use chrono::NaiveDateTime;
use std::collections::{btree_map, hash_map, BTreeMap, HashMap, HashSet};

/// Cross-block packet state accumulated by a scan.
///
/// Sends and acknowledgements are keyed by [`PacketKey`] and joined into
/// [`PacketDelayRecord`]s on demand. Receives happen on the counterparty side of a packet's
/// lifecycle and are kept as a plain list.
#[derive(Debug, Default)]
pub struct PacketStore {
    sends: BTreeMap<PacketKey, SendRecord>,
    acks: HashMap<PacketKey, AckRecord>,
    recvs: Vec<RecvRecord>,
    timestamps: BlockTimestampCache,
    /// Keys already flushed by [`PacketStore::drain_delta`], never pruned
    emitted: HashSet<PacketKey>,
    duplicate_policy: DuplicatePolicy,
}

impl PacketStore {
    pub fn new(duplicate_policy: DuplicatePolicy) -> Self {
        Self {
            duplicate_policy,
            ..Self::default()
        }
    }

    /// Records a send, returns whether the store changed.
    pub fn record_send(&mut self, key: PacketKey, send_height: u64, fee: FeeInfo) -> bool {
        if self.emitted.contains(&key) {
            log::debug!(
                target: "ibc-packet-scan",
                "Send {}/{} at height {} was already written, ignoring",
                key.channel_id,
                key.sequence,
                send_height
            );
            return false;
        }
        let record = SendRecord {
            key: key.clone(),
            send_height,
            fee,
        };
        match self.sends.entry(key) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(record);
                true
            }
            btree_map::Entry::Occupied(mut entry) => {
                log::warn!(
                    target: "ibc-packet-scan",
                    "⚠️ Duplicate send for {}/{} at heights {} and {}, policy {:?}",
                    entry.key().channel_id,
                    entry.key().sequence,
                    entry.get().send_height,
                    send_height,
                    self.duplicate_policy
                );
                match self.duplicate_policy {
                    DuplicatePolicy::KeepFirst => false,
                    DuplicatePolicy::KeepLast => {
                        entry.insert(record);
                        true
                    }
                }
            }
        }
    }

    /// Records an acknowledgement, returns whether the store changed.
    pub fn record_ack(&mut self, key: PacketKey, ack_height: u64) -> bool {
        let record = AckRecord {
            key: key.clone(),
            ack_height,
        };
        match self.acks.entry(key) {
            hash_map::Entry::Vacant(entry) => {
                entry.insert(record);
                true
            }
            hash_map::Entry::Occupied(mut entry) => {
                log::warn!(
                    target: "ibc-packet-scan",
                    "⚠️ Duplicate acknowledgement for {}/{} at heights {} and {}, policy {:?}",
                    entry.key().channel_id,
                    entry.key().sequence,
                    entry.get().ack_height,
                    ack_height,
                    self.duplicate_policy
                );
                match self.duplicate_policy {
                    DuplicatePolicy::KeepFirst => false,
                    DuplicatePolicy::KeepLast => {
                        entry.insert(record);
                        true
                    }
                }
            }
        }
    }

    pub fn record_recv(&mut self, record: RecvRecord) {
        self.recvs.push(record);
    }

    pub fn record_timestamp(&mut self, height: u64, time: NaiveDateTime) {
        self.timestamps.insert(height, time);
    }

    pub fn timestamp(&self, height: u64) -> Option<NaiveDateTime> {
        self.timestamps.get(height)
    }

    pub fn timestamps(&self) -> &BlockTimestampCache {
        &self.timestamps
    }

    pub fn send(&self, key: &PacketKey) -> Option<&SendRecord> {
        self.sends.get(key)
    }

    pub fn ack(&self, key: &PacketKey) -> Option<&AckRecord> {
        self.acks.get(key)
    }

    pub fn send_count(&self) -> usize {
        self.sends.len()
    }

    pub fn ack_count(&self) -> usize {
        self.acks.len()
    }

    pub fn recv_records(&self) -> &[RecvRecord] {
        &self.recvs
    }

    /// Joins every recorded send with its acknowledgement and the cached block times.
    pub fn delay_records(&self) -> Vec<PacketDelayRecord> {
        self.sends
            .values()
            .map(|send| self.delay_record(send))
            .collect()
    }

    fn delay_record(&self, send: &SendRecord) -> PacketDelayRecord {
        let ack_height = self.acks.get(&send.key).map(|ack| ack.ack_height);
        PacketDelayRecord {
            channel_id: send.key.channel_id.clone(),
            sequence: send.key.sequence.clone(),
            send_height: send.send_height,
            send_time: self.timestamps.get(send.send_height),
            ack_height,
            ack_time: ack_height.and_then(|height| self.timestamps.get(height)),
            block_delay: ack_height.map(|ack| calculate_block_delay(send.send_height, ack)),
            fee_amount: send.fee.amount.clone(),
            fee_denom: send.fee.denom.clone(),
        }
    }

    /// Takes the rows recorded since the previous drain and forgets them.
    ///
    /// Emitted sends and their matched acknowledgements are pruned and later sends for the same
    /// keys are ignored. Unmatched acknowledgements stay, their sends may still be ahead.
    pub fn drain_delta(&mut self) -> (Vec<PacketDelayRecord>, Vec<RecvRecord>) {
        let rows = self.delay_records();
        let sends = std::mem::take(&mut self.sends);
        for key in sends.into_keys() {
            self.acks.remove(&key);
            self.emitted.insert(key);
        }
        (rows, std::mem::take(&mut self.recvs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn time(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs as i64)
    }

    fn fee(amount: &str) -> FeeInfo {
        FeeInfo {
            amount: Some(amount.to_string()),
            denom: Some("uatom".to_string()),
        }
    }

    #[test]
    fn send_and_ack_are_joined_with_signed_delay() {
        let mut store = PacketStore::default();
        let key = PacketKey::new("channel-1", "42");
        store.record_timestamp(100, time(600));
        store.record_timestamp(97, time(582));
        store.record_send(key.clone(), 100, fee("5000"));
        store.record_ack(key, 97);

        let rows = store.delay_records();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.send_height, 100);
        assert_eq!(row.ack_height, Some(97));
        assert_eq!(row.block_delay, Some(-3));
        assert_eq!(row.send_time, Some(time(600)));
        assert_eq!(row.ack_time, Some(time(582)));
        assert_eq!(row.fee_amount.as_deref(), Some("5000"));
    }

    #[test]
    fn ack_above_send_gives_positive_delay() {
        let mut store = PacketStore::default();
        let key = PacketKey::new("channel-0", "3");
        store.record_ack(key.clone(), 205);
        store.record_send(key, 200, FeeInfo::default());
        assert_eq!(store.delay_records()[0].block_delay, Some(5));
    }

    #[test]
    fn send_without_ack_has_empty_ack_columns() {
        let mut store = PacketStore::default();
        store.record_send(PacketKey::new("channel-1", "1"), 10, FeeInfo::default());
        let row = &store.delay_records()[0];
        assert_eq!(row.ack_height, None);
        assert_eq!(row.ack_time, None);
        assert_eq!(row.block_delay, None);
        assert_eq!(row.send_time, None);
    }

    #[test]
    fn acks_without_sends_produce_no_rows() {
        let mut store = PacketStore::default();
        store.record_ack(PacketKey::new("channel-1", "1"), 10);
        assert!(store.delay_records().is_empty());
        assert_eq!(store.ack_count(), 1);
    }

    #[test]
    fn duplicate_policy_decides_which_send_survives() {
        let key = PacketKey::new("channel-1", "8");

        let mut keep_last = PacketStore::new(DuplicatePolicy::KeepLast);
        assert!(keep_last.record_send(key.clone(), 50, fee("1")));
        assert!(keep_last.record_send(key.clone(), 40, fee("2")));
        assert_eq!(keep_last.send(&key).unwrap().send_height, 40);

        let mut keep_first = PacketStore::new(DuplicatePolicy::KeepFirst);
        assert!(keep_first.record_send(key.clone(), 50, fee("1")));
        assert!(!keep_first.record_send(key.clone(), 40, fee("2")));
        assert!(keep_first.record_ack(key.clone(), 60));
        assert!(!keep_first.record_ack(key.clone(), 55));
        assert_eq!(keep_first.ack(&key).unwrap().ack_height, 60);
        assert_eq!(keep_first.send(&key).unwrap().send_height, 50);
        assert_eq!(keep_first.send(&key).unwrap().fee, fee("1"));
    }

    #[test]
    fn drain_delta_never_emits_a_key_twice() {
        let mut store = PacketStore::default();
        let matched = PacketKey::new("channel-1", "1");
        let pending = PacketKey::new("channel-1", "2");
        store.record_ack(matched.clone(), 30);
        store.record_ack(pending.clone(), 31);
        store.record_send(matched.clone(), 20, FeeInfo::default());
        store.record_recv(RecvRecord {
            channel_id: "channel-9".to_string(),
            sequence: "4".to_string(),
            recv_height: 25,
            recv_time: None,
            fee_amount: None,
            fee_denom: None,
            source_port: Some("transfer".to_string()),
            destination_channel: Some("channel-1".to_string()),
            timeout_height: Some("0-0".to_string()),
        });

        let (rows, recvs) = store.drain_delta();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].block_delay, Some(10));
        assert_eq!(recvs.len(), 1);
        assert!(store.recv_records().is_empty());
        assert!(store.ack(&matched).is_none());
        assert!(store.ack(&pending).is_some());

        assert!(!store.record_send(matched, 15, FeeInfo::default()));
        assert!(store.record_send(pending, 18, FeeInfo::default()));
        let (rows, recvs) = store.drain_delta();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ack_height, Some(31));
        assert!(recvs.is_empty());
    }
}
