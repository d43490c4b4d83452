use crate::core::checkpoint::{CheckpointRecord, CheckpointWindow, CheckpointWriter};
use crate::core::config::{FetchFailurePolicy, ScanConfig};
use crate::core::error::Error;
use crate::core::events::EventExtractor;
use crate::core::packets::PacketStore;
use crate::core::progress::ScanProgress;
use crate::core::timestamps::resolve_timestamp;
use crate::primitives::BlockProvider;
use chrono::NaiveDateTime;
use tokio::sync::watch;

/// Why a scan stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A block at or before the time boundary was reached
    TimeBoundary,
    /// Height 1 was processed
    ChainStart,
    /// Too many consecutive heights without a timestamp
    TooManySkips,
    /// The client gave up and the failure policy is `abort`
    FetchFailed,
    Cancelled,
}

/// Summary of a finished scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    pub start_height: u64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// Heights whose block results were processed
    pub heights_processed: u64,
    pub lowest_processed: Option<u64>,
    /// Heights skipped because their timestamp could not be resolved
    pub skipped_heights: Vec<u64>,
    /// Heights whose block results could not be fetched
    pub failed_heights: Vec<u64>,
    pub dropped_events: usize,
    pub checkpoints: Vec<CheckpointRecord>,
    pub stop_reason: StopReason,
}

/// Drives a reverse scan from the latest block back to `collection_window` of block time.
pub struct Scanner<P> {
    provider: P,
    config: ScanConfig,
    extractor: EventExtractor,
    writer: CheckpointWriter,
    store: PacketStore,
}

impl<P: BlockProvider> Scanner<P> {
    pub fn new(provider: P, config: ScanConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            extractor: EventExtractor::new(config.fee_event_types.clone()),
            writer: CheckpointWriter::new(&config),
            store: PacketStore::new(config.duplicate_policy),
            provider,
            config,
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// State accumulated so far.
    pub fn store(&self) -> &PacketStore {
        &self.store
    }

    /// Scans backwards until the time boundary, flushing a checkpoint every
    /// `checkpoint_interval` of block time and once more at the end.
    ///
    /// `shutdown` is checked between heights; once it turns `true` the scan writes its final
    /// checkpoint and returns.
    pub async fn run(&mut self, shutdown: &watch::Receiver<bool>) -> Result<ScanReport, Error> {
        let (start_height, start_time) = self.provider.latest_height_and_time().await?;
        let end_time = start_time - self.config.collection_window();
        let interval = self.config.checkpoint_interval();
        let mut next_save_time = start_time - interval;
        log::info!(
            target: "ibc-packet-scan",
            "🚀 Scanning {} from block {} ({}) back to {}",
            self.provider.name(),
            start_height,
            start_time,
            end_time
        );

        let progress = ScanProgress::new(start_time, end_time, self.config.quiet);
        let mut report = ScanReport {
            start_height,
            start_time,
            end_time,
            heights_processed: 0,
            lowest_processed: None,
            skipped_heights: vec![],
            failed_heights: vec![],
            dropped_events: 0,
            checkpoints: vec![],
            stop_reason: StopReason::ChainStart,
        };
        let mut window_upper = start_height;
        let mut last_window: Option<CheckpointWindow> = None;
        let mut consecutive_skips = 0;
        let mut current_height = start_height;

        report.stop_reason = loop {
            if *shutdown.borrow() {
                log::warn!(target: "ibc-packet-scan", "🛑 Cancelled at height {}", current_height);
                break StopReason::Cancelled;
            }
            if current_height == 0 {
                break StopReason::ChainStart;
            }

            let block_time = match resolve_timestamp(&self.provider, current_height).await {
                Ok(Some(block_time)) => Some(block_time),
                Ok(None) => None,
                Err(e) => match self.config.fetch_failure_policy {
                    FetchFailurePolicy::Skip => {
                        log::error!(target: "ibc-packet-scan", "❌ Header of block {} unavailable: {}", current_height, e);
                        None
                    }
                    FetchFailurePolicy::Abort => {
                        log::error!(target: "ibc-packet-scan", "❌ Aborting at block {}: {}", current_height, e);
                        report.failed_heights.push(current_height);
                        break StopReason::FetchFailed;
                    }
                },
            };
            let block_time = match block_time {
                Some(block_time) => block_time,
                None => {
                    log::warn!(target: "ibc-packet-scan", "⏭️ Skipping block {} due to missing timestamp", current_height);
                    report.skipped_heights.push(current_height);
                    consecutive_skips += 1;
                    if consecutive_skips >= self.config.max_consecutive_skips {
                        log::error!(
                            target: "ibc-packet-scan",
                            "❌ {} consecutive blocks without timestamp, stopping at {}",
                            consecutive_skips,
                            current_height
                        );
                        break StopReason::TooManySkips;
                    }
                    current_height -= 1;
                    continue;
                }
            };
            consecutive_skips = 0;
            self.store.record_timestamp(current_height, block_time);

            if block_time <= end_time {
                break StopReason::TimeBoundary;
            }

            match self.provider.block_results(current_height).await {
                Ok(Some(results)) if results.is_empty() => {
                    log::trace!(target: "ibc-packet-scan", "Block {} has no events", current_height);
                }
                Ok(Some(results)) => {
                    let summary = self.extractor.extract(current_height, &results, &mut self.store);
                    report.dropped_events += summary.dropped;
                    if summary.total() > 0 {
                        log::debug!(
                            target: "ibc-packet-scan",
                            "🧾 Block {}: {} sends, {} acks, {} recvs",
                            current_height,
                            summary.sends,
                            summary.acks,
                            summary.recvs
                        );
                    }
                }
                Ok(None) => {
                    log::warn!(target: "ibc-packet-scan", "⚠️ Block data is invalid for height {}", current_height);
                }
                Err(e) => match self.config.fetch_failure_policy {
                    FetchFailurePolicy::Skip => {
                        log::error!(target: "ibc-packet-scan", "❌ Results of block {} unavailable: {}", current_height, e);
                        report.failed_heights.push(current_height);
                    }
                    FetchFailurePolicy::Abort => {
                        log::error!(target: "ibc-packet-scan", "❌ Aborting at block {}: {}", current_height, e);
                        report.failed_heights.push(current_height);
                        break StopReason::FetchFailed;
                    }
                },
            }
            report.heights_processed += 1;
            report.lowest_processed = Some(current_height);
            progress.update(current_height, block_time, report.heights_processed);

            if block_time <= next_save_time {
                if let Some(window) = CheckpointWindow::new(current_height, window_upper) {
                    report
                        .checkpoints
                        .push(self.writer.write(window, &mut self.store, false)?);
                    last_window = Some(window);
                }
                window_upper = current_height - 1;
                // one checkpoint covers every interval boundary crossed by this block
                while next_save_time >= block_time {
                    next_save_time = next_save_time - interval;
                }
            }

            if current_height == 1 {
                break StopReason::ChainStart;
            }
            current_height -= 1;
            tokio::time::sleep(self.config.inter_height_delay()).await;
        };

        // the last window ends at the lowest processed height, the boundary block is not part of it.
        // When the lowest height already closed an interval, its window is written again as final.
        let final_window = report
            .lowest_processed
            .and_then(|lowest| CheckpointWindow::new(lowest, window_upper).or(last_window));
        match final_window {
            Some(window) => report
                .checkpoints
                .push(self.writer.write(window, &mut self.store, true)?),
            None => log::info!(target: "ibc-packet-scan", "📭 No blocks left for a final checkpoint"),
        }

        progress.finish(format!("done, {} blocks", report.heights_processed));
        log::info!(
            target: "ibc-packet-scan",
            "🏁 Scan of {} stopped ({:?}) after {} blocks, {} checkpoints written",
            self.provider.name(),
            report.stop_reason,
            report.heights_processed,
            report.checkpoints.len()
        );
        Ok(report)
    }
}
