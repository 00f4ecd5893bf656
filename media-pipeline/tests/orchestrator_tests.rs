//! Integration tests for the transcode orchestrator with a mock encoder
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


use async_trait::async_trait;
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use media_pipeline::encoder::{EncodeOutcome, EncodeRequest, Encoder};
use media_pipeline::orchestrator::TranscodeOrchestrator;
use media_pipeline::registry::RenditionRegistry;
use media_pipeline::resolver::QualityResolver;
use vodforge_types::{EncodingStatus, PipelineError, QualityLadder};

/// Encoder double that writes real output files without subprocesses.
struct MockEncoder {
    available: bool,
    fail_qualities: HashSet<String>,
    output_bytes: usize,
    invocations: Arc<AtomicUsize>,
}

impl MockEncoder {
    fn new() -> Self {
        Self {
            available: true,
            fail_qualities: HashSet::new(),
            output_bytes: 1200,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing(qualities: &[&str]) -> Self {
        let mut encoder = Self::new();
        encoder.fail_qualities = qualities.iter().map(|q| q.to_string()).collect();
        encoder
    }

    fn unavailable() -> Self {
        let mut encoder = Self::new();
        encoder.available = false;
        encoder
    }
}

#[async_trait]
impl Encoder for MockEncoder {
    async fn invoke(&self, request: &EncodeRequest) -> EncodeOutcome {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        if self.fail_qualities.contains(&request.quality) {
            return EncodeOutcome::failed(
                request.output_path.clone(),
                format!("simulated encoder failure for {}", request.quality),
            );
        }

        if let Some(parent) = request.output_path.parent() {
            if tokio::fs::create_dir_all(parent).await.is_err() {
                return EncodeOutcome::failed(request.output_path.clone(), "mkdir failed");
            }
        }
        if tokio::fs::write(&request.output_path, vec![0u8; self.output_bytes])
            .await
            .is_err()
        {
            return EncodeOutcome::failed(request.output_path.clone(), "write failed");
        }
        EncodeOutcome::ok(request.output_path.clone(), self.output_bytes as u64)
    }

    async fn probe_available(&self) -> bool {
        self.available
    }

    fn encoder_name(&self) -> &str {
        "mock-encoder"
    }
}

fn write_source(dir: &tempfile::TempDir, bytes: usize) -> PathBuf {
    let source = dir.path().join("source.mp4");
    let mut file = std::fs::File::create(&source).unwrap();
    file.write_all(&vec![1u8; bytes]).unwrap();
    source
}

fn small_ladder() -> QualityLadder {
    QualityLadder::from_labels(&["360p", "720p"]).unwrap()
}

fn orchestrator(
    registry: &RenditionRegistry,
    encoder: Arc<dyn Encoder>,
    ladder: QualityLadder,
    media_root: PathBuf,
) -> TranscodeOrchestrator {
    TranscodeOrchestrator::new(registry.clone(), encoder, ladder, media_root, 4)
}

#[tokio::test]
async fn test_failed_rung_does_not_affect_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();
    let ladder = small_ladder();
    let encoder = Arc::new(MockEncoder::failing(&["720p"]));
    let orchestrator = orchestrator(
        &registry,
        encoder,
        ladder.clone(),
        dir.path().to_path_buf(),
    );

    let asset_id = Uuid::new_v4();
    let report = orchestrator
        .process_to_renditions(asset_id, source, false)
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failed_count(), 1);
    assert!(!report.all_completed());

    let low = registry
        .find_by_asset_and_quality(asset_id, "360p")
        .await
        .unwrap();
    assert_eq!(low.encoding_status, EncodingStatus::Completed);
    assert!(low.is_available);
    assert_eq!(low.encoding_progress, 100);
    assert_eq!(low.file_size_bytes, 1200);
    assert_eq!(
        low.video_url.as_deref(),
        Some(format!("/stream/{}/360p", asset_id).as_str())
    );

    let high = registry
        .find_by_asset_and_quality(asset_id, "720p")
        .await
        .unwrap();
    assert_eq!(high.encoding_status, EncodingStatus::Failed);
    assert!(!high.is_available);

    let resolver = QualityResolver::new(registry.clone(), ladder);
    assert_eq!(resolver.available_qualities(asset_id).await, vec!["360p"]);
}

#[tokio::test]
async fn test_completed_rungs_are_skipped_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();
    let encoder = Arc::new(MockEncoder::new());
    let counter = Arc::clone(&encoder.invocations);
    let orchestrator = orchestrator(
        &registry,
        encoder,
        small_ladder(),
        dir.path().to_path_buf(),
    );

    let asset_id = Uuid::new_v4();
    orchestrator
        .process_to_renditions(asset_id, source.clone(), false)
        .await
        .unwrap()
        .await
        .unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    // Re-running without force must not touch completed rungs.
    let report = orchestrator
        .process_to_renditions(asset_id, source, false)
        .await
        .unwrap()
        .await
        .unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert!(report.outcomes.iter().all(|o| o.skipped));
    assert!(report.all_completed());
}

#[tokio::test]
async fn test_force_re_encodes_completed_rungs() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();
    let encoder = Arc::new(MockEncoder::new());
    let counter = Arc::clone(&encoder.invocations);
    let orchestrator = orchestrator(
        &registry,
        encoder,
        small_ladder(),
        dir.path().to_path_buf(),
    );

    let asset_id = Uuid::new_v4();
    orchestrator
        .process_to_renditions(asset_id, source.clone(), false)
        .await
        .unwrap()
        .await
        .unwrap();
    let report = orchestrator
        .process_to_renditions(asset_id, source, true)
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 4);
    assert!(report.all_completed());
    assert!(report.outcomes.iter().all(|o| !o.skipped));
}

#[tokio::test]
async fn test_failed_rungs_are_retried_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();

    let asset_id = Uuid::new_v4();
    {
        let failing = Arc::new(MockEncoder::failing(&["360p", "720p"]));
        let orchestrator = orchestrator(
            &registry,
            failing,
            small_ladder(),
            dir.path().to_path_buf(),
        );
        let report = orchestrator
            .process_to_renditions(asset_id, source.clone(), false)
            .await
            .unwrap()
            .await
            .unwrap();
        assert_eq!(report.failed_count(), 2);
    }

    // A later run with a healthy encoder picks the failed rungs back up.
    let healthy = Arc::new(MockEncoder::new());
    let orchestrator = orchestrator(
        &registry,
        healthy,
        small_ladder(),
        dir.path().to_path_buf(),
    );
    let report = orchestrator
        .process_to_renditions(asset_id, source, false)
        .await
        .unwrap()
        .await
        .unwrap();

    assert!(report.all_completed());
    assert!(report.outcomes.iter().all(|o| !o.skipped));
}

#[tokio::test]
async fn test_unavailable_encoder_fails_every_rung_without_invoking() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();
    let encoder = Arc::new(MockEncoder::unavailable());
    let counter = Arc::clone(&encoder.invocations);
    let orchestrator = orchestrator(
        &registry,
        encoder,
        small_ladder(),
        dir.path().to_path_buf(),
    );

    let asset_id = Uuid::new_v4();
    let report = orchestrator
        .process_to_renditions(asset_id, source, false)
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(report.failed_count(), 2);
    for row in registry.find_by_asset(asset_id).await {
        assert_eq!(row.encoding_status, EncodingStatus::Failed);
        assert!(!row.is_available);
    }
}

#[tokio::test]
async fn test_unavailable_encoder_preserves_completed_rungs() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();

    let asset_id = Uuid::new_v4();
    {
        let healthy = Arc::new(MockEncoder::new());
        let orchestrator = orchestrator(
            &registry,
            healthy,
            QualityLadder::from_labels(&["360p"]).unwrap(),
            dir.path().to_path_buf(),
        );
        let report = orchestrator
            .process_to_renditions(asset_id, source.clone(), false)
            .await
            .unwrap()
            .await
            .unwrap();
        assert!(report.all_completed());
    }

    // A re-trigger during an encoder outage must not clobber a rung whose
    // output is already on disk; only schedulable rungs are failed.
    let down = Arc::new(MockEncoder::unavailable());
    let orchestrator = orchestrator(
        &registry,
        down,
        small_ladder(),
        dir.path().to_path_buf(),
    );
    let report = orchestrator
        .process_to_renditions(asset_id, source, false)
        .await
        .unwrap()
        .await
        .unwrap();

    let low = registry
        .find_by_asset_and_quality(asset_id, "360p")
        .await
        .unwrap();
    assert_eq!(low.encoding_status, EncodingStatus::Completed);
    assert!(low.is_available);

    let high = registry
        .find_by_asset_and_quality(asset_id, "720p")
        .await
        .unwrap();
    assert_eq!(high.encoding_status, EncodingStatus::Failed);

    let low_outcome = report
        .outcomes
        .iter()
        .find(|o| o.quality == "360p")
        .unwrap();
    assert!(low_outcome.skipped);
    assert_eq!(low_outcome.status, EncodingStatus::Completed);
}

#[tokio::test]
async fn test_unavailable_encoder_leaves_in_flight_rungs_alone() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();
    let ladder = QualityLadder::from_labels(&["360p"]).unwrap();

    let asset_id = Uuid::new_v4();
    registry
        .create(asset_id, ladder.rung("360p").unwrap())
        .await;
    assert!(
        registry
            .update_status(asset_id, "360p", EncodingStatus::Processing, None)
            .await
    );

    let down = Arc::new(MockEncoder::unavailable());
    let orchestrator = orchestrator(&registry, down, ladder, dir.path().to_path_buf());
    let report = orchestrator
        .process_to_renditions(asset_id, source, false)
        .await
        .unwrap()
        .await
        .unwrap();

    assert!(report.outcomes[0].skipped);
    let row = registry
        .find_by_asset_and_quality(asset_id, "360p")
        .await
        .unwrap();
    assert_eq!(row.encoding_status, EncodingStatus::Processing);
}

#[tokio::test]
async fn test_blocking_encode_never_doubles_an_in_flight_rung() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();
    let ladder = small_ladder();

    let asset_id = Uuid::new_v4();
    registry
        .create(asset_id, ladder.rung("360p").unwrap())
        .await;
    assert!(
        registry
            .update_status(asset_id, "360p", EncodingStatus::Processing, None)
            .await
    );

    let encoder = Arc::new(MockEncoder::new());
    let counter = Arc::clone(&encoder.invocations);
    let orchestrator = orchestrator(&registry, encoder, ladder, dir.path().to_path_buf());

    let outcome = orchestrator
        .encode_rendition_blocking(asset_id, "360p", source)
        .await
        .unwrap();

    assert!(outcome.skipped);
    assert_eq!(outcome.status, EncodingStatus::Processing);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    // The in-flight task still owns the row.
    let row = registry
        .find_by_asset_and_quality(asset_id, "360p")
        .await
        .unwrap();
    assert_eq!(row.encoding_status, EncodingStatus::Processing);
}

#[tokio::test]
async fn test_missing_source_is_rejected_before_any_row_exists() {
    let dir = tempfile::tempdir().unwrap();
    let registry = RenditionRegistry::new();
    let orchestrator = orchestrator(
        &registry,
        Arc::new(MockEncoder::new()),
        small_ladder(),
        dir.path().to_path_buf(),
    );

    let asset_id = Uuid::new_v4();
    let err = orchestrator
        .process_to_renditions(asset_id, PathBuf::from("/nonexistent/source.mp4"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SourceNotFound(_)));
    assert!(registry.find_by_asset(asset_id).await.is_empty());
}

#[tokio::test]
async fn test_single_permit_still_settles_every_rung() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();
    let orchestrator = TranscodeOrchestrator::new(
        registry.clone(),
        Arc::new(MockEncoder::new()),
        QualityLadder::standard(),
        dir.path().to_path_buf(),
        1,
    );

    let asset_id = Uuid::new_v4();
    let report = orchestrator
        .process_to_renditions(asset_id, source, false)
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), QualityLadder::standard().len());
    assert!(report.all_completed());
}

#[tokio::test]
async fn test_blocking_single_rendition_encode() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, 5000);
    let registry = RenditionRegistry::new();
    let orchestrator = orchestrator(
        &registry,
        Arc::new(MockEncoder::new()),
        small_ladder(),
        dir.path().to_path_buf(),
    );

    let asset_id = Uuid::new_v4();
    let outcome = orchestrator
        .encode_rendition_blocking(asset_id, "360p", source.clone())
        .await
        .unwrap();
    assert_eq!(outcome.status, EncodingStatus::Completed);

    let err = orchestrator
        .encode_rendition_blocking(asset_id, "4k", source)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownQuality(_)));
}
