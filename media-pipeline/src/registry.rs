//! Rendition registry - state machine over (asset, quality) rows
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


use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;
use vodforge_types::{EncodingStatus, Rendition, Rung};

/// Registry of rendition rows, unique on (asset, quality).
///
/// This is the only shared mutable state of the pipeline. Each row has a
/// single writer at a time (the orchestrator never schedules two tasks for
/// the same rung); updates are last-writer-wins on one row and renditions
/// are independent, so no cross-row transaction exists. Knows nothing about
/// encoding mechanics.
#[derive(Clone, Default)]
pub struct RenditionRegistry {
    rows: Arc<RwLock<HashMap<(Uuid, String), Rendition>>>,
}

impl RenditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or re-create) the row for one rung at `PENDING`.
    ///
    /// Re-creation is the explicit re-encode path: the old row is replaced,
    /// not merged, and progress resets to 0.
    pub async fn create(&self, asset_id: Uuid, rung: &Rung) -> Rendition {
        let row = Rendition::pending(asset_id, rung);
        let mut rows = self.rows.write().await;
        if rows
            .insert((asset_id, rung.label.clone()), row.clone())
            .is_some()
        {
            debug!(
                asset_id = %asset_id,
                quality = rung.label,
                "Replaced existing rendition row for re-encode"
            );
        }
        row
    }

    /// Transition a row's status, optionally bumping progress.
    ///
    /// Returns `false` without writing when the row does not exist (the
    /// asset was deleted while the encode was in flight) or when the state
    /// machine forbids the transition (terminal states are sticky).
    /// Progress is monotonic within an attempt; regressions are ignored.
    pub async fn update_status(
        &self,
        asset_id: Uuid,
        quality: &str,
        status: EncodingStatus,
        progress: Option<u8>,
    ) -> bool {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&(asset_id, quality.to_string())) else {
            debug!(
                asset_id = %asset_id,
                quality = quality,
                "Dropping status update for deleted rendition row"
            );
            return false;
        };

        if !row.encoding_status.can_transition(status) {
            warn!(
                asset_id = %asset_id,
                quality = quality,
                from = ?row.encoding_status,
                to = ?status,
                "Rejected invalid rendition status transition"
            );
            return false;
        }

        row.encoding_status = status;
        if let Some(progress) = progress {
            let progress = progress.min(100);
            if progress > row.encoding_progress {
                row.encoding_progress = progress;
            }
        }
        if status == EncodingStatus::Failed {
            row.is_available = false;
        }
        row.updated_at = Utc::now();
        true
    }

    /// Record a successful encode: output metadata plus the `COMPLETED`
    /// transition, marking the rendition available.
    pub async fn complete(
        &self,
        asset_id: Uuid,
        quality: &str,
        video_url: String,
        file_size_bytes: u64,
    ) -> bool {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&(asset_id, quality.to_string())) else {
            debug!(
                asset_id = %asset_id,
                quality = quality,
                "Dropping completion for deleted rendition row"
            );
            return false;
        };

        if !row.encoding_status.can_transition(EncodingStatus::Completed) {
            warn!(
                asset_id = %asset_id,
                quality = quality,
                from = ?row.encoding_status,
                "Rejected completion for rendition not in PROCESSING"
            );
            return false;
        }

        row.encoding_status = EncodingStatus::Completed;
        row.encoding_progress = 100;
        row.is_available = true;
        row.video_url = Some(video_url);
        row.file_size_bytes = file_size_bytes;
        row.updated_at = Utc::now();
        true
    }

    pub async fn find_by_asset(&self, asset_id: Uuid) -> Vec<Rendition> {
        let rows = self.rows.read().await;
        rows.values()
            .filter(|r| r.asset_id == asset_id)
            .cloned()
            .collect()
    }

    pub async fn find_by_asset_and_quality(
        &self,
        asset_id: Uuid,
        quality: &str,
    ) -> Option<Rendition> {
        let rows = self.rows.read().await;
        rows.get(&(asset_id, quality.to_string())).cloned()
    }

    /// Delete all rows of one asset, returning how many were removed.
    ///
    /// Callers delete rows before removing files so that in-flight encode
    /// tasks observe the absence and drop their results.
    pub async fn delete_by_asset(&self, asset_id: Uuid) -> usize {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|(owner, _), _| *owner != asset_id);
        before - rows.len()
    }

    pub async fn list_by_status(&self, status: EncodingStatus) -> Vec<Rendition> {
        let rows = self.rows.read().await;
        rows.values()
            .filter(|r| r.encoding_status == status)
            .cloned()
            .collect()
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }
}
