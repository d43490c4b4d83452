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

use crate::core::config::{CheckpointMode, ScanConfig};
use crate::core::error::Error;
use crate::core::packets::{PacketDelayRecord, PacketStore, RecvRecord};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Inclusive range of heights covered by one checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointWindow {
    pub lower: u64,
    pub upper: u64,
}

impl CheckpointWindow {
    /// `None` if the range holds no height.
    pub fn new(lower: u64, upper: u64) -> Option<Self> {
        (lower <= upper).then_some(Self { lower, upper })
    }

    /// Number of heights in the window, never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.upper - self.lower + 1
    }
}

impl fmt::Display for CheckpointWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lower, self.upper)
    }
}

/// What a single checkpoint wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub window: CheckpointWindow,
    pub is_final: bool,
    pub send_rows: usize,
    pub recv_rows: usize,
    pub paths: Vec<PathBuf>,
}

/// Writes the send/ack and receive tables of a [`PacketStore`] as CSV files.
#[derive(Clone, Debug)]
pub struct CheckpointWriter {
    checkpoint_dir: PathBuf,
    output_dir: PathBuf,
    file_prefix: String,
    mode: CheckpointMode,
}

impl CheckpointWriter {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            checkpoint_dir: config.checkpoint_dir.clone(),
            output_dir: config.output_dir.clone(),
            file_prefix: config.file_prefix.clone(),
            mode: config.checkpoint_mode,
        }
    }

    pub fn send_ack_path(&self, dir: &Path, window: CheckpointWindow) -> PathBuf {
        dir.join(format!("{}_pk_{}.csv", self.file_prefix, window))
    }

    pub fn recv_path(&self, dir: &Path, window: CheckpointWindow) -> PathBuf {
        dir.join(format!("{}_rv_{}.csv", self.file_prefix, window))
    }

    /// Writes the tables for `window`. The final checkpoint goes to the output directory,
    /// intermediate ones to the checkpoint directory. Empty tables are not written.
    pub fn write(
        &self,
        window: CheckpointWindow,
        store: &mut PacketStore,
        is_final: bool,
    ) -> Result<CheckpointRecord, Error> {
        let dir = if is_final {
            &self.output_dir
        } else {
            &self.checkpoint_dir
        };
        match self.mode {
            CheckpointMode::Cumulative => {
                let rows = store.delay_records();
                self.write_tables(dir, window, &rows, store.recv_records(), is_final)
            }
            CheckpointMode::Delta => {
                let (rows, recvs) = store.drain_delta();
                self.write_tables(dir, window, &rows, &recvs, is_final)
            }
        }
    }

    fn write_tables(
        &self,
        dir: &Path,
        window: CheckpointWindow,
        rows: &[PacketDelayRecord],
        recvs: &[RecvRecord],
        is_final: bool,
    ) -> Result<CheckpointRecord, Error> {
        let mut paths = vec![];
        if !rows.is_empty() || !recvs.is_empty() {
            std::fs::create_dir_all(dir)?;
        }
        if !rows.is_empty() {
            let path = self.send_ack_path(dir, window);
            write_table(&path, rows)?;
            log::info!(target: "ibc-packet-scan", "💾 Saved {} packets to {}", rows.len(), path.display());
            paths.push(path);
        }
        if !recvs.is_empty() {
            let path = self.recv_path(dir, window);
            write_table(&path, recvs)?;
            log::info!(target: "ibc-packet-scan", "💾 Saved {} received packets to {}", recvs.len(), path.display());
            paths.push(path);
        }
        if paths.is_empty() {
            log::info!(target: "ibc-packet-scan", "📭 Nothing to save for heights {}", window);
        }
        Ok(CheckpointRecord {
            window,
            is_final,
            send_rows: rows.len(),
            recv_rows: recvs.len(),
            paths,
        })
    }
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
