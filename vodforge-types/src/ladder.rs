//! Quality ladder: the ordered list of target renditions for every asset
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


use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// One rung of the ladder: a target rendition job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rung {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Target video bitrate in kbps.
    pub bitrate_kbps: u32,
}

impl Rung {
    fn new(label: &str, width: u32, height: u32, bitrate_kbps: u32) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
            bitrate_kbps,
        }
    }
}

/// The fixed, ordered list of target qualities the pipeline produces.
///
/// Ordering is canonical and positional (lowest rung first); quality labels
/// are opaque keys, never parsed for ordering. The ladder is loaded once at
/// startup and passed into the orchestrator as an immutable value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityLadder {
    rungs: Vec<Rung>,
}

impl QualityLadder {
    /// The pipeline's standard ladder, lowest quality first.
    pub fn standard() -> Self {
        Self {
            rungs: vec![
                Rung::new("360p", 640, 360, 600),
                Rung::new("480p", 854, 480, 1000),
                Rung::new("720p", 1280, 720, 2500),
                Rung::new("1080p", 1920, 1080, 5000),
                Rung::new("1440p", 2560, 1440, 8000),
            ],
        }
    }

    /// Build a ladder from an explicit ordered rung list.
    pub fn from_rungs(rungs: Vec<Rung>) -> Self {
        Self { rungs }
    }

    /// Select a subset of the standard ladder by label, preserving the
    /// standard ordering regardless of the order labels are given in.
    pub fn from_labels(labels: &[&str]) -> Result<Self> {
        let standard = Self::standard();
        for label in labels {
            if standard.position(label).is_none() {
                return Err(PipelineError::UnknownQuality(label.to_string()));
            }
        }
        let rungs = standard
            .rungs
            .into_iter()
            .filter(|r| labels.contains(&r.label.as_str()))
            .collect();
        Ok(Self { rungs })
    }

    pub fn rungs(&self) -> &[Rung] {
        &self.rungs
    }

    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    /// Canonical position of a label, if it is on the ladder.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.rungs.iter().position(|r| r.label == label)
    }

    pub fn rung(&self, label: &str) -> Option<&Rung> {
        self.rungs.iter().find(|r| r.label == label)
    }

    /// Highest rung of the ladder; `None` only for an empty ladder.
    pub fn top(&self) -> Option<&Rung> {
        self.rungs.last()
    }

    /// Rungs in fallback order for a preference: the preferred rung itself,
    /// then each lower rung walking downward, then each higher rung walking
    /// upward. Users tolerate lower quality over playback failure, so the
    /// downward walk is exhausted first.
    pub fn fallback_order(&self, preferred: &str) -> Result<Vec<&Rung>> {
        let pos = self
            .position(preferred)
            .ok_or_else(|| PipelineError::UnknownQuality(preferred.to_string()))?;

        let mut order = Vec::with_capacity(self.rungs.len());
        order.push(&self.rungs[pos]);
        for below in (0..pos).rev() {
            order.push(&self.rungs[below]);
        }
        for above in pos + 1..self.rungs.len() {
            order.push(&self.rungs[above]);
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_ladder_order() {
        let ladder = QualityLadder::standard();
        let labels: Vec<_> = ladder.rungs().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["360p", "480p", "720p", "1080p", "1440p"]);
        assert_eq!(ladder.top().unwrap().label, "1440p");
    }

    #[test]
    fn test_from_labels_preserves_canonical_order() {
        let ladder = QualityLadder::from_labels(&["1080p", "360p", "720p"]).unwrap();
        let labels: Vec<_> = ladder.rungs().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["360p", "720p", "1080p"]);
    }

    #[test]
    fn test_from_labels_rejects_unknown() {
        let err = QualityLadder::from_labels(&["4K"]).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownQuality(label) if label == "4K"));
    }

    #[test]
    fn test_fallback_walks_down_then_up() {
        let ladder = QualityLadder::standard();
        let order: Vec<_> = ladder
            .fallback_order("720p")
            .unwrap()
            .iter()
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(order, ["720p", "480p", "360p", "1080p", "1440p"]);
    }

    #[test]
    fn test_fallback_from_bottom_rung() {
        let ladder = QualityLadder::standard();
        let order: Vec<_> = ladder
            .fallback_order("360p")
            .unwrap()
            .iter()
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(order, ["360p", "480p", "720p", "1080p", "1440p"]);
    }

    #[test]
    fn test_fallback_unknown_label() {
        let ladder = QualityLadder::standard();
        assert!(ladder.fallback_order("2160p").is_err());
    }
}
