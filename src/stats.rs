//! Streaming per-frame statistics.

use serde::{Deserialize, Serialize};

/// One processed frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(rename = "frame")]
    pub frame_index: u64,
    #[serde(rename = "people_count")]
    pub person_count: u64,
    #[serde(rename = "timestamp")]
    pub timestamp_seconds: f64,
}

/// Frame-level summary of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunStatistics {
    pub total_frames: u64,
    pub total_people_detected: u64,
    pub avg_people_per_frame: f64,
    pub max_people_count: u64,
    /// Index of the first frame that reached `max_people_count`; 0 if none.
    pub max_people_frame: u64,
}

/// Accumulates counts as frames arrive, in strictly increasing frame order.
#[derive(Clone, Debug, Default)]
pub struct FrameStatsCollector {
    records: Vec<FrameRecord>,
    running_sum: u64,
    /// `(count, frame_index)` of the first frame with the highest count.
    running_max: (u64, u64),
}

impl FrameStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, frame_index: u64, person_count: u64, fps: u32) {
        debug_assert!(
            self.records
                .last()
                .map_or(true, |last| last.frame_index < frame_index),
            "frames must be recorded in increasing order"
        );
        let timestamp_seconds = if fps == 0 {
            0.0
        } else {
            frame_index as f64 / fps as f64
        };
        self.records.push(FrameRecord {
            frame_index,
            person_count,
            timestamp_seconds,
        });
        self.running_sum += person_count;
        if person_count > self.running_max.0 {
            self.running_max = (person_count, frame_index);
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn total_people(&self) -> u64 {
        self.running_sum
    }

    pub fn max_people(&self) -> u64 {
        self.running_max.0
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn summarize(&self) -> RunStatistics {
        let total_frames = self.frame_count();
        let avg_people_per_frame = if total_frames == 0 {
            0.0
        } else {
            self.running_sum as f64 / total_frames as f64
        };
        RunStatistics {
            total_frames,
            total_people_detected: self.running_sum,
            avg_people_per_frame,
            max_people_count: self.running_max.0,
            max_people_frame: self.running_max.1,
        }
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.running_sum = 0;
        self.running_max = (0, 0);
    }
}
