//! Media Pipeline Library
//!
//! This library implements the transcoding and adaptive-streaming pipeline:
//! - Encoder invocation as cancellable, awaitable units of work
//! - Rendition registry with per-rung state machine
//! - Transcoding orchestration with bounded global concurrency
//! - Quality resolution and live quality switching
//! - Byte-range serving of rendition files
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


pub mod catalog;
pub mod encoder;
pub mod health;
pub mod http;
pub mod orchestrator;
pub mod probe;
pub mod range;
pub mod registry;
pub mod resolver;

// Re-export the encoder seam for convenience
pub use encoder::{EncodeOutcome, EncodeRequest, Encoder, FfmpegEncoder};
pub use orchestrator::TranscodeOrchestrator;
pub use registry::RenditionRegistry;
pub use resolver::QualityResolver;
