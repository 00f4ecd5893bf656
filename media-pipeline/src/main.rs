//! Media Pipeline
//!
//! Turns one uploaded source video into a ladder of pre-encoded renditions,
//! tracks each rendition's encode lifecycle independently, resolves the
//! best available rendition for a client, and serves video bytes with
//! byte-range semantics for seeking.
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


use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use media_pipeline::catalog::AssetCatalog;
use media_pipeline::encoder::{Encoder, FfmpegEncoder};
use media_pipeline::health;
use media_pipeline::http::{self, AppState};
use media_pipeline::orchestrator::TranscodeOrchestrator;
use media_pipeline::probe::MediaProber;
use media_pipeline::registry::RenditionRegistry;
use media_pipeline::resolver::QualityResolver;
use vodforge_config::AppConfig;
use vodforge_logging::{init_console_logging, init_logging};
use vodforge_types::QualityLadder;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    if config.json_logging() {
        init_logging("media-pipeline", config.log_level());
    } else {
        init_console_logging("media-pipeline", config.log_level());
    }

    info!("Starting Media Pipeline");

    // The ladder is resolved once at startup and passed in as an
    // immutable value.
    let ladder = match &config.ladder_labels {
        Some(labels) => {
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            QualityLadder::from_labels(&labels)
                .map_err(|e| anyhow::anyhow!("Invalid QUALITY_LADDER: {}", e))?
        }
        None => QualityLadder::standard(),
    };

    tokio::fs::create_dir_all(&config.media_root).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to create media root {}: {}",
            config.media_root.display(),
            e
        )
    })?;

    info!(
        media_root = %config.media_root.display(),
        encoder = config.encoder.encoder_bin,
        rungs = ladder.len(),
        max_concurrent_encodes = config.encoder.max_concurrent_encodes,
        "Configuration loaded"
    );

    let encoder = Arc::new(FfmpegEncoder::new(
        config.encoder.encoder_bin.clone(),
        config.encoder.audio_bitrate.clone(),
    ));
    if !encoder.probe_available().await {
        tracing::warn!(
            encoder = config.encoder.encoder_bin,
            "Encoder binary not available at startup; transcode jobs will fail until it is"
        );
    }

    let registry = RenditionRegistry::new();
    let catalog = AssetCatalog::new(MediaProber::new(config.encoder.probe_bin.clone()));
    let orchestrator = Arc::new(TranscodeOrchestrator::new(
        registry.clone(),
        encoder,
        ladder.clone(),
        config.media_root.clone(),
        config.encoder.max_concurrent_encodes,
    ));
    let resolver = QualityResolver::new(registry.clone(), ladder);

    let state = AppState {
        catalog,
        registry,
        resolver,
        orchestrator,
        media_root: config.media_root.clone(),
        cache_max_age_secs: config.server.cache_max_age_secs,
    };
    let app = http::router(state);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    info!(port = config.server.port, "Media Pipeline listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(health::shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Media Pipeline stopped");
    Ok(())
}
