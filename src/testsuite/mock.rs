use crate::core::error::Error;
use crate::core::timestamps::format_block_time;
use crate::cosmos::types::{BlockHeader, BlockResults};
use crate::primitives::BlockProvider;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::watch;

/// Deterministic chain producing one block every `block_interval` up to `latest_height`.
///
/// Every block has empty results unless overridden. All requests are recorded so tests can
/// check the traversal order.
pub struct MockChain {
    name: String,
    latest_height: u64,
    latest_time: NaiveDateTime,
    block_interval: chrono::Duration,
    gaps: Vec<(u64, chrono::Duration)>,
    times: HashMap<u64, Option<NaiveDateTime>>,
    results: HashMap<u64, Option<BlockResults>>,
    failing_results: HashSet<u64>,
    failing_headers: HashSet<u64>,
    header_requests: Mutex<Vec<u64>>,
    results_requests: Mutex<Vec<u64>>,
    cancel_at: Option<(u64, watch::Sender<bool>)>,
}

impl MockChain {
    pub fn new(
        latest_height: u64,
        latest_time: NaiveDateTime,
        block_interval: chrono::Duration,
    ) -> Self {
        Self {
            name: "mock".to_string(),
            latest_height,
            latest_time,
            block_interval,
            gaps: vec![],
            times: HashMap::new(),
            results: HashMap::new(),
            failing_results: HashSet::new(),
            failing_headers: HashSet::new(),
            header_requests: Mutex::new(vec![]),
            results_requests: Mutex::new(vec![]),
            cancel_at: None,
        }
    }

    /// Overrides the block time at `height`, `None` for a header without time.
    pub fn with_block_time(mut self, height: u64, time: Option<NaiveDateTime>) -> Self {
        self.times.insert(height, time);
        self
    }

    /// Makes every block below `height` older by an extra `gap`, a pause in block production.
    pub fn with_time_gap(mut self, height: u64, gap: chrono::Duration) -> Self {
        self.gaps.push((height, gap));
        self
    }

    /// Overrides the results at `height`, `None` for an empty or malformed payload.
    pub fn with_results(mut self, height: u64, results: Option<BlockResults>) -> Self {
        self.results.insert(height, results);
        self
    }

    /// Makes `block_results` at `height` fail as if the client ran out of retries.
    pub fn with_failing_results(mut self, height: u64) -> Self {
        self.failing_results.insert(height);
        self
    }

    /// Makes `block_header` at `height` fail as if the client ran out of retries.
    pub fn with_failing_header(mut self, height: u64) -> Self {
        self.failing_headers.insert(height);
        self
    }

    /// Flips `shutdown` once the results at `height` are requested.
    pub fn cancel_at(mut self, height: u64, shutdown: watch::Sender<bool>) -> Self {
        self.cancel_at = Some((height, shutdown));
        self
    }

    pub fn block_time(&self, height: u64) -> Option<NaiveDateTime> {
        if height == 0 || height > self.latest_height {
            return None;
        }
        match self.times.get(&height) {
            Some(time) => *time,
            None => {
                let behind = (self.latest_height - height) as i32;
                let paused = self
                    .gaps
                    .iter()
                    .filter(|(below, _)| height < *below)
                    .fold(chrono::Duration::zero(), |total, (_, gap)| total + *gap);
                Some(self.latest_time - self.block_interval * behind - paused)
            }
        }
    }

    pub fn header_requests(&self) -> Vec<u64> {
        self.header_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn results_requests(&self) -> Vec<u64> {
        self.results_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl BlockProvider for MockChain {
    fn name(&self) -> &str {
        &*self.name
    }

    async fn latest_height_and_time(&self) -> Result<(u64, NaiveDateTime), Error> {
        Ok((self.latest_height, self.latest_time))
    }

    async fn block_header(&self, height: u64) -> Result<Option<BlockHeader>, Error> {
        if let Ok(mut requests) = self.header_requests.lock() {
            requests.push(height);
        }
        if self.failing_headers.contains(&height) {
            return Err(unavailable("block", height));
        }
        if height == 0 || height > self.latest_height {
            return Ok(None);
        }
        Ok(Some(BlockHeader {
            height: Some(height.to_string()),
            time: self
                .block_time(height)
                .map(|time| format!("{}Z", format_block_time(&time))),
            proposer_address: None,
        }))
    }

    async fn block_results(&self, height: u64) -> Result<Option<BlockResults>, Error> {
        if let Ok(mut requests) = self.results_requests.lock() {
            requests.push(height);
        }
        if let Some((cancel_height, shutdown)) = &self.cancel_at {
            if *cancel_height == height {
                let _ = shutdown.send(true);
            }
        }
        if self.failing_results.contains(&height) {
            return Err(unavailable("block_results", height));
        }
        Ok(match self.results.get(&height) {
            Some(results) => results.clone(),
            None => Some(BlockResults::default()),
        })
    }
}

fn unavailable(method: &str, height: u64) -> Error {
    Error::RetriesExhausted {
        url: format!("mock://{}?height={}", method, height),
        attempts: 1,
        reason: "unavailable".to_string(),
    }
}
