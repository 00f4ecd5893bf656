//! Transcoding orchestration - one job per source asset, one task per rung
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


use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::encoder::{EncodeRequest, Encoder};
use crate::registry::RenditionRegistry;
use vodforge_types::{EncodingStatus, PipelineError, QualityLadder, Result, Rung};

/// Final observation of one rung after a job settles. Consumed for logging
/// only; the authoritative state lives in the registry.
#[derive(Debug, Clone)]
pub struct RungOutcome {
    pub quality: String,
    pub status: EncodingStatus,
    pub error: Option<String>,
    /// True when the rung was not (re-)encoded: already completed and not
    /// forced, already in flight, or its row vanished mid-encode.
    pub skipped: bool,
}

/// Aggregate of one orchestrator invocation once every rung has settled.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub asset_id: Uuid,
    pub outcomes: Vec<RungOutcome>,
}

impl JobReport {
    pub fn all_completed(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status == EncodingStatus::Completed)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == EncodingStatus::Failed)
            .count()
    }
}

/// Canonical on-disk location of one rendition output.
pub fn rendition_output_path(media_root: &Path, asset_id: Uuid, quality: &str) -> PathBuf {
    media_root
        .join(asset_id.to_string())
        .join(format!("{}.mp4", quality))
}

/// Streaming locator clients use to read one rendition's bytes.
pub fn rendition_locator(asset_id: Uuid, quality: &str) -> String {
    format!("/stream/{}/{}", asset_id, quality)
}

/// Drives one encode job per ladder rung for a source asset.
///
/// All rungs of a job may run concurrently, bounded by a worker pool shared
/// across every job of the process - a single large asset cannot starve the
/// pipeline. Rung completion is communicated solely by writing to the
/// registry; a failed rung never cancels or fails its siblings.
pub struct TranscodeOrchestrator {
    registry: RenditionRegistry,
    encoder: Arc<dyn Encoder>,
    ladder: QualityLadder,
    media_root: PathBuf,
    permits: Arc<Semaphore>,
}

impl TranscodeOrchestrator {
    pub fn new(
        registry: RenditionRegistry,
        encoder: Arc<dyn Encoder>,
        ladder: QualityLadder,
        media_root: PathBuf,
        max_concurrent_encodes: usize,
    ) -> Self {
        Self {
            registry,
            encoder,
            ladder,
            media_root,
            permits: Arc::new(Semaphore::new(max_concurrent_encodes.max(1))),
        }
    }

    pub fn ladder(&self) -> &QualityLadder {
        &self.ladder
    }

    /// Start transcoding a source asset into every rung of the ladder.
    ///
    /// Returns immediately with a handle to the settled job report; the
    /// caller observes progress through the registry. With `force` false
    /// (the default policy), rungs already `COMPLETED` are skipped and
    /// `FAILED` or stale rungs are re-encoded; `force` re-encodes
    /// everything. Rungs currently `PROCESSING` are never double-scheduled.
    pub async fn process_to_renditions(
        &self,
        asset_id: Uuid,
        source_path: PathBuf,
        force: bool,
    ) -> Result<JoinHandle<JobReport>> {
        match tokio::fs::metadata(&source_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                // Reject before any row is created.
                return Err(PipelineError::SourceNotFound(
                    source_path.display().to_string(),
                ));
            }
        }

        let registry = self.registry.clone();
        let encoder = Arc::clone(&self.encoder);
        let ladder = self.ladder.clone();
        let media_root = self.media_root.clone();
        let permits = Arc::clone(&self.permits);

        Ok(tokio::spawn(async move {
            run_job(
                registry, encoder, ladder, media_root, permits, asset_id, source_path, force,
            )
            .await
        }))
    }

    /// Encode a single rendition and wait for the subprocess to exit.
    ///
    /// Maintenance operation: unlike `process_to_renditions` this blocks the
    /// calling task until the encode settles. The global worker-pool bound
    /// still applies.
    pub async fn encode_rendition_blocking(
        &self,
        asset_id: Uuid,
        quality: &str,
        source_path: PathBuf,
    ) -> Result<RungOutcome> {
        let rung = self
            .ladder
            .rung(quality)
            .ok_or_else(|| PipelineError::UnknownQuality(quality.to_string()))?
            .clone();

        match tokio::fs::metadata(&source_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return Err(PipelineError::SourceNotFound(
                    source_path.display().to_string(),
                ))
            }
        }

        // Single-writer per row: an in-flight task owns this rung, so the
        // blocking path must not start a second encode onto the same output.
        let existing = self
            .registry
            .find_by_asset_and_quality(asset_id, quality)
            .await;
        if matches!(
            existing,
            Some(ref row) if row.encoding_status == EncodingStatus::Processing
        ) {
            debug!(
                asset_id = %asset_id,
                quality = quality,
                "Rung already in flight, not starting a blocking encode"
            );
            return Ok(RungOutcome {
                quality: quality.to_string(),
                status: EncodingStatus::Processing,
                error: None,
                skipped: true,
            });
        }

        self.registry.create(asset_id, &rung).await;
        Ok(run_rung(
            self.registry.clone(),
            Arc::clone(&self.encoder),
            Arc::clone(&self.permits),
            EncodeRequest {
                asset_id,
                quality: rung.label.clone(),
                source_path,
                output_path: rendition_output_path(&self.media_root, asset_id, &rung.label),
                width: rung.width,
                height: rung.height,
                bitrate_kbps: rung.bitrate_kbps,
            },
        )
        .await)
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    registry: RenditionRegistry,
    encoder: Arc<dyn Encoder>,
    ladder: QualityLadder,
    media_root: PathBuf,
    permits: Arc<Semaphore>,
    asset_id: Uuid,
    source_path: PathBuf,
    force: bool,
) -> JobReport {
    info!(
        asset_id = %asset_id,
        source = %source_path.display(),
        rungs = ladder.len(),
        force = force,
        "Starting transcode job"
    );

    // Preflight: without an encoder no subprocess is spawned and every rung
    // that would have been scheduled is surfaced as FAILED. The scheduling
    // policy still applies: completed rungs keep their rows and files unless
    // forced, and in-flight rungs are left to their running task.
    if !encoder.probe_available().await {
        error!(
            asset_id = %asset_id,
            encoder = encoder.encoder_name(),
            "Encoder unavailable, failing schedulable rungs without spawning"
        );
        let mut outcomes = Vec::with_capacity(ladder.len());
        for rung in ladder.rungs() {
            let existing = registry
                .find_by_asset_and_quality(asset_id, &rung.label)
                .await;
            match existing {
                Some(row) if row.encoding_status == EncodingStatus::Processing => {
                    outcomes.push(RungOutcome {
                        quality: rung.label.clone(),
                        status: EncodingStatus::Processing,
                        error: None,
                        skipped: true,
                    });
                    continue;
                }
                Some(row) if row.encoding_status == EncodingStatus::Completed && !force => {
                    outcomes.push(RungOutcome {
                        quality: rung.label.clone(),
                        status: EncodingStatus::Completed,
                        error: None,
                        skipped: true,
                    });
                    continue;
                }
                _ => {}
            }

            registry.create(asset_id, rung).await;
            registry
                .update_status(asset_id, &rung.label, EncodingStatus::Failed, None)
                .await;
            outcomes.push(RungOutcome {
                quality: rung.label.clone(),
                status: EncodingStatus::Failed,
                error: Some(format!("encoder unavailable: {}", encoder.encoder_name())),
                skipped: false,
            });
        }
        return JobReport { asset_id, outcomes };
    }

    let mut skipped = Vec::new();
    let mut tasks = Vec::new();

    for rung in ladder.rungs() {
        let existing = registry
            .find_by_asset_and_quality(asset_id, &rung.label)
            .await;

        match existing {
            Some(row) if row.encoding_status == EncodingStatus::Processing => {
                // Single-writer per row: never schedule a duplicate task.
                debug!(
                    asset_id = %asset_id,
                    quality = rung.label,
                    "Rung already in flight, not rescheduling"
                );
                skipped.push(RungOutcome {
                    quality: rung.label.clone(),
                    status: EncodingStatus::Processing,
                    error: None,
                    skipped: true,
                });
                continue;
            }
            Some(row) if row.encoding_status == EncodingStatus::Completed && !force => {
                debug!(
                    asset_id = %asset_id,
                    quality = rung.label,
                    "Rung already completed, skipping"
                );
                skipped.push(RungOutcome {
                    quality: rung.label.clone(),
                    status: EncodingStatus::Completed,
                    error: None,
                    skipped: true,
                });
                continue;
            }
            _ => {}
        }

        registry.create(asset_id, rung).await;

        let request = EncodeRequest {
            asset_id,
            quality: rung.label.clone(),
            source_path: source_path.clone(),
            output_path: rendition_output_path(&media_root, asset_id, &rung.label),
            width: rung.width,
            height: rung.height,
            bitrate_kbps: rung.bitrate_kbps,
        };

        let registry = registry.clone();
        let encoder = Arc::clone(&encoder);
        let permits = Arc::clone(&permits);
        tasks.push(tokio::spawn(async move {
            run_rung(registry, encoder, permits, request).await
        }));
    }

    let mut outcomes = skipped;
    for settled in join_all(tasks).await {
        match settled {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!(asset_id = %asset_id, error = %e, "Rung task panicked");
            }
        }
    }

    let report = JobReport { asset_id, outcomes };
    if report.all_completed() {
        info!(
            asset_id = %asset_id,
            rungs = report.outcomes.len(),
            "Transcode job settled, all rungs completed"
        );
    } else {
        warn!(
            asset_id = %asset_id,
            rungs = report.outcomes.len(),
            failed = report.failed_count(),
            "Transcode job settled with failed rungs"
        );
    }
    report
}

/// Run one rung to completion and record the result, unless the row was
/// deleted while the encode was in flight (asset deletion), in which case
/// the result is dropped.
async fn run_rung(
    registry: RenditionRegistry,
    encoder: Arc<dyn Encoder>,
    permits: Arc<Semaphore>,
    request: EncodeRequest,
) -> RungOutcome {
    let asset_id = request.asset_id;
    let quality = request.quality.clone();

    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            // Pool closed during shutdown; leave the row PENDING.
            return RungOutcome {
                quality,
                status: EncodingStatus::Pending,
                error: Some("worker pool closed".to_string()),
                skipped: true,
            };
        }
    };

    if !registry
        .update_status(asset_id, &quality, EncodingStatus::Processing, None)
        .await
    {
        return RungOutcome {
            quality,
            status: EncodingStatus::Pending,
            error: Some("rendition row deleted before encode started".to_string()),
            skipped: true,
        };
    }

    let outcome = encoder.invoke(&request).await;

    if outcome.success {
        let recorded = registry
            .complete(
                asset_id,
                &quality,
                rendition_locator(asset_id, &quality),
                outcome.file_size_bytes,
            )
            .await;
        if !recorded {
            // Asset deleted mid-encode: drop the orphaned output.
            let _ = tokio::fs::remove_file(&outcome.output_path).await;
            return RungOutcome {
                quality,
                status: EncodingStatus::Pending,
                error: Some("rendition row deleted during encode".to_string()),
                skipped: true,
            };
        }
        info!(
            asset_id = %asset_id,
            quality = quality,
            size_bytes = outcome.file_size_bytes,
            "Rendition completed"
        );
        RungOutcome {
            quality,
            status: EncodingStatus::Completed,
            error: None,
            skipped: false,
        }
    } else {
        let reason = outcome
            .error
            .unwrap_or_else(|| "unknown encoder failure".to_string());
        error!(
            asset_id = %asset_id,
            quality = quality,
            error = reason,
            "Rendition encode failed"
        );
        registry
            .update_status(asset_id, &quality, EncodingStatus::Failed, None)
            .await;
        RungOutcome {
            quality,
            status: EncodingStatus::Failed,
            error: Some(reason),
            skipped: false,
        }
    }
}
