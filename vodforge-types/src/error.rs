//! Error types for the Vodforge pipeline
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


use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the Vodforge pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("Encoder binary unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Encode failed for {asset_id}/{quality}: {reason}")]
    EncodeFailed {
        asset_id: Uuid,
        quality: String,
        reason: String,
    },

    #[error("No rendition available for asset {0}")]
    NoRenditionAvailable(Uuid),

    #[error("Unknown quality label: {0}")]
    UnknownQuality(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(Uuid),

    #[error("Range not satisfiable: {0}")]
    RangeNotSatisfiable(String),

    #[error("Rendition file missing on disk: {0}")]
    FileMissing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
