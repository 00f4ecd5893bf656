//! Quality resolution - choosing the best rendition for a request
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


use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::registry::RenditionRegistry;
use vodforge_types::{PipelineError, QualityLadder, Result};

/// Descriptor returned for a live quality switch.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionSwitch {
    pub locator: String,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    /// Playback position the client should resume at, echoed back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_at: Option<f64>,
}

/// Read-only view over the registry answering quality questions.
///
/// Tolerates any mix of rung states for an asset at any time; availability
/// is re-read per call while sibling encodes are still in flight.
#[derive(Clone)]
pub struct QualityResolver {
    registry: RenditionRegistry,
    ladder: QualityLadder,
}

impl QualityResolver {
    pub fn new(registry: RenditionRegistry, ladder: QualityLadder) -> Self {
        Self { registry, ladder }
    }

    /// Available quality labels in the ladder's canonical order.
    pub async fn available_qualities(&self, asset_id: Uuid) -> Vec<String> {
        let mut available = Vec::new();
        for rung in self.ladder.rungs() {
            if self.is_available(asset_id, &rung.label).await {
                available.push(rung.label.clone());
            }
        }
        available
    }

    pub async fn is_available(&self, asset_id: Uuid, quality: &str) -> bool {
        self.registry
            .find_by_asset_and_quality(asset_id, quality)
            .await
            .map(|row| row.is_available)
            .unwrap_or(false)
    }

    /// Best available quality for a preference.
    ///
    /// Returns the preferred rung when available, otherwise the nearest
    /// available rung walking downward, then upward. Without a preference
    /// the top of the ladder is preferred. Fails with
    /// `NoRenditionAvailable` when nothing is playable yet.
    pub async fn best_available(&self, asset_id: Uuid, preferred: Option<&str>) -> Result<String> {
        let preferred = match preferred {
            Some(label) => label.to_string(),
            None => self
                .ladder
                .top()
                .ok_or_else(|| PipelineError::NoRenditionAvailable(asset_id))?
                .label
                .clone(),
        };

        for rung in self.ladder.fallback_order(&preferred)? {
            if self.is_available(asset_id, &rung.label).await {
                if rung.label != preferred {
                    debug!(
                        asset_id = %asset_id,
                        preferred = preferred,
                        resolved = rung.label,
                        "Preferred quality unavailable, resolved via ladder fallback"
                    );
                }
                return Ok(rung.label.clone());
            }
        }

        Err(PipelineError::NoRenditionAvailable(asset_id))
    }

    /// Execute a live quality-switch request.
    ///
    /// Quality switching is an explicit user action: an unavailable quality
    /// is a typed error, never a silent substitute.
    pub async fn change_resolution(
        &self,
        asset_id: Uuid,
        quality: &str,
        current_time: Option<f64>,
    ) -> Result<ResolutionSwitch> {
        let rung = self
            .ladder
            .rung(quality)
            .ok_or_else(|| PipelineError::UnknownQuality(quality.to_string()))?;

        let row = self
            .registry
            .find_by_asset_and_quality(asset_id, quality)
            .await
            .filter(|row| row.is_available)
            .ok_or(PipelineError::NoRenditionAvailable(asset_id))?;

        let locator = row.video_url.ok_or_else(|| {
            // Available without a locator means registry/storage divergence.
            PipelineError::FileMissing(format!("{}/{}", asset_id, quality))
        })?;

        Ok(ResolutionSwitch {
            locator,
            width: rung.width,
            height: rung.height,
            bitrate_kbps: rung.bitrate_kbps,
            resume_at: current_time,
        })
    }
}
