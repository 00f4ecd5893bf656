//! Source asset records
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
use std::path::PathBuf;
use uuid::Uuid;

/// One uploaded source video, independent of any encoded output.
///
/// Immutable once referenced by rendition jobs; deleted only when the owning
/// catalog entry is deleted, which cascades rendition deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAsset {
    pub asset_id: Uuid,
    pub storage_path: PathBuf,
    pub original_filename: String,
    /// Container/format as probed from the file, e.g. "mov,mp4,m4a".
    pub container_format: Option<String>,
    pub duration_secs: Option<u64>,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}
