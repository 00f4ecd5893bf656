//! Encoder invocation - one external encode operation per rendition
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
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

/// One encode operation: source file to one rendition file.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub asset_id: Uuid,
    pub quality: String,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Target video bitrate in kbps.
    pub bitrate_kbps: u32,
}

/// Result of one encode operation. Failure is data, never an `Err`:
/// spawn failure, non-zero exit and a missing or empty output file all
/// normalize to `success == false` with a reason attached.
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    pub success: bool,
    pub output_path: PathBuf,
    pub file_size_bytes: u64,
    pub error: Option<String>,
}

impl EncodeOutcome {
    pub fn ok(output_path: PathBuf, file_size_bytes: u64) -> Self {
        Self {
            success: true,
            output_path,
            file_size_bytes,
            error: None,
        }
    }

    pub fn failed(output_path: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path,
            file_size_bytes: 0,
            error: Some(reason.into()),
        }
    }
}

/// Seam for the external encoder so the orchestrator can be exercised
/// without spawning real subprocesses.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Run one encode to completion. Writes exactly one file and never
    /// touches the registry; the orchestrator records the outcome.
    async fn invoke(&self, request: &EncodeRequest) -> EncodeOutcome;

    /// Cheap capability probe (version invocation). Used as a preflight
    /// check before any rung of a job is scheduled.
    async fn probe_available(&self) -> bool;

    /// Name of the underlying encoder, for logging.
    fn encoder_name(&self) -> &str;
}

/// Encoder backed by the ffmpeg command line, invoked as a subprocess
/// with a deterministic argument set per rendition.
pub struct FfmpegEncoder {
    encoder_bin: String,
    audio_bitrate: String,
}

impl FfmpegEncoder {
    pub fn new(encoder_bin: impl Into<String>, audio_bitrate: impl Into<String>) -> Self {
        Self {
            encoder_bin: encoder_bin.into(),
            audio_bitrate: audio_bitrate.into(),
        }
    }

    /// Scale to the target box preserving aspect ratio, padding the rest.
    fn scale_filter(width: u32, height: u32) -> String {
        format!(
            "scale={}:{}:force_original_aspect_ratio=decrease,pad={}:{}:(ow-iw)/2:(oh-ih)/2",
            width, height, width, height
        )
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn invoke(&self, request: &EncodeRequest) -> EncodeOutcome {
        let output_path = request.output_path.clone();

        if request.width == 0 || request.height == 0 || request.bitrate_kbps == 0 {
            return EncodeOutcome::failed(
                output_path,
                format!(
                    "invalid encode parameters: {}x{} @ {}kbps",
                    request.width, request.height, request.bitrate_kbps
                ),
            );
        }

        match tokio::fs::metadata(&request.source_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return EncodeOutcome::failed(
                    output_path,
                    format!("source not readable: {}", request.source_path.display()),
                );
            }
        }

        if let Some(parent) = request.output_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return EncodeOutcome::failed(
                    output_path,
                    format!("failed to create output directory: {}", e),
                );
            }
        }

        let source = match request.source_path.to_str() {
            Some(s) => s,
            None => {
                return EncodeOutcome::failed(
                    output_path,
                    format!("source path contains invalid UTF-8: {:?}", request.source_path),
                )
            }
        };
        let target = match request.output_path.to_str() {
            Some(s) => s.to_string(),
            None => {
                return EncodeOutcome::failed(
                    output_path,
                    format!("output path contains invalid UTF-8: {:?}", request.output_path),
                )
            }
        };

        let maxrate = format!("{}k", request.bitrate_kbps);
        let bufsize = format!("{}k", request.bitrate_kbps * 2);
        let vf_filter = Self::scale_filter(request.width, request.height);

        let args = [
            "-i",
            source,
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-crf",
            "23",
            "-maxrate",
            &maxrate,
            "-bufsize",
            &bufsize,
            "-vf",
            &vf_filter,
            "-c:a",
            "aac",
            "-b:a",
            &self.audio_bitrate,
            "-movflags",
            "+faststart",
            "-f",
            "mp4",
            "-y",
            &target,
        ];

        debug!(
            asset_id = %request.asset_id,
            quality = request.quality,
            width = request.width,
            height = request.height,
            bitrate_kbps = request.bitrate_kbps,
            "Spawning encoder subprocess"
        );

        let status = match Command::new(&self.encoder_bin).args(args).status().await {
            Ok(status) => status,
            Err(e) => {
                return EncodeOutcome::failed(output_path, format!("failed to spawn encoder: {}", e));
            }
        };

        if !status.success() {
            return EncodeOutcome::failed(
                output_path,
                format!("encoder exited with status {}", status),
            );
        }

        // Post-condition: the output must exist and be non-empty.
        match tokio::fs::metadata(&request.output_path).await {
            Ok(meta) if meta.len() > 0 => EncodeOutcome::ok(output_path, meta.len()),
            Ok(_) => EncodeOutcome::failed(output_path, "encoder produced an empty output file"),
            Err(_) => EncodeOutcome::failed(output_path, "encoder produced no output file"),
        }
    }

    async fn probe_available(&self) -> bool {
        match Command::new(&self.encoder_bin).arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                warn!(
                    encoder = self.encoder_bin,
                    error = %e,
                    "Encoder availability probe failed"
                );
                false
            }
        }
    }

    fn encoder_name(&self) -> &str {
        &self.encoder_bin
    }
}
