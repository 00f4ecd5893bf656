//! Rendition rows and the encoding state machine
// Copyright 2025 Vodforge Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ladder::Rung;

/// Encoding lifecycle of one rendition.
///
/// `PENDING → PROCESSING → COMPLETED | FAILED`. The terminal states are
/// only left by an explicit re-encode, which re-creates the row at
/// `PENDING` with progress reset to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncodingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl EncodingStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition(self, next: EncodingStatus) -> bool {
        use EncodingStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }

    /// Terminal states are never left in place; a re-encode replaces the row.
    pub fn is_terminal(self) -> bool {
        matches!(self, EncodingStatus::Completed | EncodingStatus::Failed)
    }
}

/// One encoded output for one (asset, quality) pair.
///
/// Unique on (`asset_id`, `quality`); mutated only by the orchestrator or
/// by explicit deletion. `is_available == true` implies the status is
/// `COMPLETED` and the output file exists and is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rendition {
    pub asset_id: Uuid,
    /// Quality label, e.g. "720p". Opaque key; ordering comes from the ladder.
    pub quality: String,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    /// Locator of the encoded output, set once the encode completes.
    pub video_url: Option<String>,
    pub output_format: String,
    pub file_size_bytes: u64,
    pub is_available: bool,
    pub encoding_status: EncodingStatus,
    /// 0–100, monotonically non-decreasing within one encode attempt.
    pub encoding_progress: u8,
    pub updated_at: DateTime<Utc>,
}

impl Rendition {
    /// Create a fresh row at `PENDING` for one ladder rung.
    pub fn pending(asset_id: Uuid, rung: &Rung) -> Self {
        Self {
            asset_id,
            quality: rung.label.clone(),
            width: rung.width,
            height: rung.height,
            bitrate_kbps: rung.bitrate_kbps,
            video_url: None,
            output_format: "mp4".to_string(),
            file_size_bytes: 0,
            is_available: false,
            encoding_status: EncodingStatus::Pending,
            encoding_progress: 0,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::QualityLadder;

    #[test]
    fn test_valid_transitions() {
        use EncodingStatus::*;
        assert!(Pending.can_transition(Processing));
        assert!(Pending.can_transition(Failed));
        assert!(Processing.can_transition(Completed));
        assert!(Processing.can_transition(Failed));
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        use EncodingStatus::*;
        for next in [Pending, Processing, Completed, Failed] {
            assert!(!Completed.can_transition(next));
            assert!(!Failed.can_transition(next));
        }
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Processing.is_terminal());
    }

    #[test]
    fn test_pending_row_defaults() {
        let ladder = QualityLadder::standard();
        let rung = ladder.rung("720p").unwrap();
        let row = Rendition::pending(Uuid::new_v4(), rung);

        assert_eq!(row.encoding_status, EncodingStatus::Pending);
        assert_eq!(row.encoding_progress, 0);
        assert!(!row.is_available);
        assert!(row.video_url.is_none());
        assert_eq!(row.width, 1280);
        assert_eq!(row.height, 720);
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&EncodingStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        let back: EncodingStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(back, EncodingStatus::Completed);
    }
}
