use crate::core::error::Error;
use crate::primitives::BlockProvider;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Output format for block times, always with microsecond precision.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parses an RPC block time such as `2024-03-01T10:15:02.123456789Z`.
///
/// Nodes emit anywhere between zero and nine fractional digits, so the fraction is padded or
/// truncated to six digits before parsing. The trailing UTC marker is dropped and the result is
/// a naive UTC timestamp.
pub fn parse_block_time(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix('z'))
        .or_else(|| trimmed.strip_suffix("+00:00"))
        .unwrap_or(trimmed);
    let (base, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let micros: String = fraction.chars().chain(std::iter::repeat('0')).take(6).collect();
    NaiveDateTime::parse_from_str(&format!("{base}.{micros}"), PARSE_FORMAT).ok()
}

pub fn format_block_time(time: &NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Block times resolved so far, keyed by height. Entries are never evicted during a run.
#[derive(Debug, Default, Clone)]
pub struct BlockTimestampCache {
    times: BTreeMap<u64, NaiveDateTime>,
}

impl BlockTimestampCache {
    pub fn insert(&mut self, height: u64, time: NaiveDateTime) {
        self.times.insert(height, time);
    }

    pub fn get(&self, height: u64) -> Option<NaiveDateTime> {
        self.times.get(&height).copied()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Resolves the block time at `height` from its header.
///
/// `Ok(None)` means the header was missing or carried no parseable time; the caller should treat
/// the height as having no known timestamp.
pub async fn resolve_timestamp<P>(provider: &P, height: u64) -> Result<Option<NaiveDateTime>, Error>
where
    P: BlockProvider + ?Sized,
{
    let header = match provider.block_header(height).await? {
        Some(header) => header,
        None => {
            log::warn!(target: "ibc-packet-scan", "⚠️ No header returned for block {}", height);
            return Ok(None);
        }
    };
    let raw = match header.time {
        Some(raw) => raw,
        None => {
            log::warn!(target: "ibc-packet-scan", "⚠️ Header of block {} has no time field", height);
            return Ok(None);
        }
    };
    let time = parse_block_time(&raw);
    if time.is_none() {
        log::warn!(target: "ibc-packet-scan", "⚠️ Invalid block time {:?} at height {}", raw, height);
    }
    Ok(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(h, m, s, micro)
            .unwrap()
    }

    #[test]
    fn short_and_padded_fractions_resolve_to_the_same_instant() {
        let short = parse_block_time("2024-03-01T10:15:02.5Z").unwrap();
        let padded = parse_block_time("2024-03-01T10:15:02.500000Z").unwrap();
        assert_eq!(short, padded);
        assert_eq!(short, at(10, 15, 2, 500_000));
    }

    #[test]
    fn nanosecond_fractions_are_truncated() {
        let time = parse_block_time("2024-03-01T10:15:02.123456789Z").unwrap();
        assert_eq!(time, at(10, 15, 2, 123_456));
    }

    #[test]
    fn missing_fraction_is_accepted() {
        assert_eq!(parse_block_time("2024-03-01T10:15:02Z"), Some(at(10, 15, 2, 0)));
        assert_eq!(parse_block_time("2024-03-01T10:15:02"), Some(at(10, 15, 2, 0)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_block_time(""), None);
        assert_eq!(parse_block_time("yesterday"), None);
        assert_eq!(parse_block_time("2024-03-01T10:15:02.12ab"), None);
        assert_eq!(parse_block_time("2024-13-01T10:15:02Z"), None);
    }

    #[test]
    fn formatting_keeps_six_digits() {
        assert_eq!(format_block_time(&at(1, 2, 3, 40)), "2024-03-01T01:02:03.000040");
    }

    #[test]
    fn cache_grows_and_overwrites_in_place() {
        let mut cache = BlockTimestampCache::default();
        assert!(cache.is_empty());
        cache.insert(10, at(1, 0, 0, 0));
        cache.insert(9, at(0, 59, 54, 0));
        cache.insert(10, at(1, 0, 0, 0));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(9), Some(at(0, 59, 54, 0)));
        assert_eq!(cache.get(8), None);
    }
}
