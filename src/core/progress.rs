use chrono::NaiveDateTime;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// Progress of a reverse scan, for display only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressEstimate {
    /// Wall time spent per processed block
    pub avg_per_block: Duration,
    /// Wall time left until the time boundary is reached
    pub eta: Option<Duration>,
}

/// Estimates progress from the block time span covered so far.
///
/// `covered` is the block time between the start of the scan and the current block,
/// `remaining` the block time between the current block and the time boundary.
pub fn estimate(
    elapsed: Duration,
    processed: u64,
    covered: chrono::Duration,
    remaining: chrono::Duration,
) -> ProgressEstimate {
    let avg_per_block = match u32::try_from(processed) {
        Ok(0) => Duration::ZERO,
        Ok(processed) => elapsed / processed,
        Err(_) => Duration::from_secs_f64(elapsed.as_secs_f64() / processed as f64),
    };
    let eta = match (covered.num_milliseconds(), remaining.num_milliseconds()) {
        (covered, remaining) if covered > 0 && remaining >= 0 => Some(Duration::from_secs_f64(
            elapsed.as_secs_f64() * remaining as f64 / covered as f64,
        )),
        _ => None,
    };
    ProgressEstimate { avg_per_block, eta }
}

pub struct ScanProgress {
    bar: ProgressBar,
    started: Instant,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
}

impl ScanProgress {
    pub fn new(start_time: NaiveDateTime, end_time: NaiveDateTime, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(10));
            if let Ok(style) =
                ProgressStyle::with_template("{spinner} Processing blocks {pos} | {elapsed_precise} | {msg}")
            {
                bar.set_style(style);
            }
            bar
        };
        Self {
            bar,
            started: Instant::now(),
            start_time,
            end_time,
        }
    }

    pub fn update(&self, height: u64, block_time: NaiveDateTime, processed: u64) -> ProgressEstimate {
        let estimate = estimate(
            self.started.elapsed(),
            processed,
            self.start_time - block_time,
            block_time - self.end_time,
        );
        let eta = estimate
            .eta
            .map(|eta| format!("{}s", eta.as_secs()))
            .unwrap_or_else(|| "--".to_string());
        self.bar.set_position(processed);
        self.bar.set_message(format!(
            "height {} | block time {} | {:.2?}/block | eta {}",
            height, block_time, estimate.avg_per_block, eta
        ));
        estimate
    }

    pub fn finish(&self, message: String) {
        self.bar.finish_with_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_is_proportional_to_remaining_block_time() {
        let estimate = estimate(
            Duration::from_secs(60),
            120,
            chrono::Duration::hours(1),
            chrono::Duration::hours(3),
        );
        assert_eq!(estimate.avg_per_block, Duration::from_millis(500));
        assert_eq!(estimate.eta, Some(Duration::from_secs(180)));
    }

    #[test]
    fn nothing_processed_yet() {
        let estimate = estimate(
            Duration::from_secs(1),
            0,
            chrono::Duration::zero(),
            chrono::Duration::hours(3),
        );
        assert_eq!(estimate.avg_per_block, Duration::ZERO);
        assert_eq!(estimate.eta, None);
    }
}
