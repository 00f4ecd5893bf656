//! Source metadata probing via the external probe binary
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


use std::path::Path;
use tokio::process::Command;
use tracing::warn;

/// Metadata extracted from a source file. Every field is optional: probe
/// failures degrade to unknown metadata and never block transcoding.
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    pub duration_secs: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub container_format: Option<String>,
}

/// Thin wrapper around the ffprobe command line.
#[derive(Clone)]
pub struct MediaProber {
    probe_bin: String,
}

impl MediaProber {
    pub fn new(probe_bin: impl Into<String>) -> Self {
        Self {
            probe_bin: probe_bin.into(),
        }
    }

    pub async fn probe(&self, path: &Path) -> SourceProbe {
        let mut probe = SourceProbe::default();
        probe.duration_secs = self.probe_duration(path).await;
        if let Some((width, height)) = self.probe_resolution(path).await {
            probe.width = Some(width);
            probe.height = Some(height);
        }
        probe.container_format = self.probe_format(path).await;
        probe
    }

    /// Duration in whole seconds.
    pub async fn probe_duration(&self, path: &Path) -> Option<u64> {
        let raw = self
            .probe_entry(path, &["-show_entries", "format=duration"])
            .await?;
        match raw.trim().parse::<f64>() {
            Ok(seconds) => Some(seconds as u64),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unparseable duration from probe");
                None
            }
        }
    }

    /// Resolution of the first video stream.
    pub async fn probe_resolution(&self, path: &Path) -> Option<(u32, u32)> {
        let path_str = path.to_str()?;
        let output = Command::new(&self.probe_bin)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "csv=s=x:p=0",
                path_str,
            ])
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }

        let raw = String::from_utf8(output.stdout).ok()?;
        let (width, height) = raw.trim().split_once('x')?;
        Some((width.parse().ok()?, height.parse().ok()?))
    }

    /// Container format name, e.g. "mov,mp4,m4a,3gp,3g2,mj2".
    pub async fn probe_format(&self, path: &Path) -> Option<String> {
        let raw = self
            .probe_entry(path, &["-show_entries", "format=format_name"])
            .await?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    async fn probe_entry(&self, path: &Path, entry_args: &[&str]) -> Option<String> {
        let path_str = path.to_str()?;
        let mut args = vec!["-v", "error"];
        args.extend_from_slice(entry_args);
        args.extend_from_slice(&["-of", "default=noprint_wrappers=1:nokey=1", path_str]);

        match Command::new(&self.probe_bin).args(&args).output().await {
            Ok(output) if output.status.success() => String::from_utf8(output.stdout).ok(),
            Ok(_) => {
                warn!(path = %path.display(), "Probe exited non-zero");
                None
            }
            Err(e) => {
                warn!(probe = self.probe_bin, error = %e, "Failed to spawn probe");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_probe_binary_degrades_to_unknown() {
        let prober = MediaProber::new("definitely-not-a-probe-binary");
        let probe = prober.probe(&PathBuf::from("/tmp/whatever.mp4")).await;
        assert!(probe.duration_secs.is_none());
        assert!(probe.width.is_none());
        assert!(probe.container_format.is_none());
    }
}
