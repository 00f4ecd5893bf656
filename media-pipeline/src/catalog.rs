//! Asset catalog - source asset records and path resolution
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


use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::probe::MediaProber;
use crate::registry::RenditionRegistry;
use vodforge_types::{PipelineError, Result, SourceAsset};

/// In-memory registry of source assets, implementing the asset-storage
/// collaborator surface (`resolve_path`, `exists`, `size`).
#[derive(Clone)]
pub struct AssetCatalog {
    assets: Arc<RwLock<HashMap<Uuid, SourceAsset>>>,
    prober: MediaProber,
}

impl AssetCatalog {
    pub fn new(prober: MediaProber) -> Self {
        Self {
            assets: Arc::new(RwLock::new(HashMap::new())),
            prober,
        }
    }

    /// Register an uploaded source file under an asset id.
    ///
    /// The file must already be in place; upload placement is the caller's
    /// concern. Metadata probing is best-effort. Re-registering an existing
    /// asset id returns the existing record unchanged - source assets are
    /// immutable once referenced by rendition jobs.
    pub async fn register(
        &self,
        asset_id: Uuid,
        storage_path: PathBuf,
        original_filename: String,
    ) -> Result<SourceAsset> {
        if let Some(existing) = self.get(asset_id).await {
            return Ok(existing);
        }

        let size_bytes = match tokio::fs::metadata(&storage_path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                return Err(PipelineError::SourceNotFound(
                    storage_path.display().to_string(),
                ))
            }
        };

        let probe = self.prober.probe(&storage_path).await;
        let asset = SourceAsset {
            asset_id,
            storage_path,
            original_filename,
            container_format: probe.container_format,
            duration_secs: probe.duration_secs,
            size_bytes,
            created_at: Utc::now(),
        };

        info!(
            asset_id = %asset_id,
            filename = asset.original_filename,
            size_bytes = size_bytes,
            duration_secs = ?asset.duration_secs,
            "Registered source asset"
        );

        let mut assets = self.assets.write().await;
        Ok(assets.entry(asset_id).or_insert(asset).clone())
    }

    pub async fn get(&self, asset_id: Uuid) -> Option<SourceAsset> {
        self.assets.read().await.get(&asset_id).cloned()
    }

    /// Absolute path of the source file for an asset.
    pub async fn resolve_path(&self, asset_id: Uuid) -> Result<PathBuf> {
        self.get(asset_id)
            .await
            .map(|asset| asset.storage_path)
            .ok_or(PipelineError::AssetNotFound(asset_id))
    }

    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    pub async fn size(&self, path: &Path) -> Result<u64> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| PipelineError::SourceNotFound(path.display().to_string()))?;
        Ok(meta.len())
    }

    /// Delete an asset, cascading to its renditions.
    ///
    /// Registry rows are deleted before any file so that in-flight encode
    /// tasks observe row absence and drop their results; only then is the
    /// rendition directory removed.
    pub async fn delete_cascading(
        &self,
        asset_id: Uuid,
        registry: &RenditionRegistry,
        media_root: &Path,
    ) -> Result<()> {
        let removed = {
            let mut assets = self.assets.write().await;
            assets.remove(&asset_id)
        };
        if removed.is_none() {
            return Err(PipelineError::AssetNotFound(asset_id));
        }

        let rows = registry.delete_by_asset(asset_id).await;

        let rendition_dir = media_root.join(asset_id.to_string());
        if let Err(e) = tokio::fs::remove_dir_all(&rendition_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    asset_id = %asset_id,
                    dir = %rendition_dir.display(),
                    error = %e,
                    "Failed to remove rendition directory"
                );
            }
        }

        info!(
            asset_id = %asset_id,
            renditions_deleted = rows,
            "Deleted asset with cascading rendition cleanup"
        );
        Ok(())
    }
}
