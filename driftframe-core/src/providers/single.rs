//! Trivial one-item provider for `media_source_type: single_media`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use driftframe_model::MediaItem;

use crate::error::Result;
use crate::extract::{self, PathMetadataOptions};
use crate::index::IndexGateway;
use crate::providers::MediaProvider;

#[derive(Debug)]
pub struct SingleFileProvider {
    path: String,
    gateway: Option<Arc<IndexGateway>>,
    item: Option<MediaItem>,
}

impl SingleFileProvider {
    pub fn new(path: impl Into<String>, gateway: Option<Arc<IndexGateway>>) -> Self {
        Self {
            path: path.into(),
            gateway,
            item: None,
        }
    }

    async fn build_item(&self) -> MediaItem {
        let kind = extract::detect_kind(&self.path);
        let metadata = extract::extract_path_metadata(
            &self.path,
            &PathMetadataOptions {
                media_root_marker: "media",
                folder_date_pattern: None,
            },
        );
        let mut item = MediaItem::new(self.path.clone(), kind).with_metadata(metadata);
        if let Some(gateway) = &self.gateway {
            if let Some(index_meta) = gateway.fetch_file_metadata(&self.path).await {
                item.enrich_from_index(index_meta);
            }
        }
        item
    }
}

#[async_trait]
impl MediaProvider for SingleFileProvider {
    async fn initialize(&mut self) -> Result<()> {
        self.item = Some(self.build_item().await);
        Ok(())
    }

    /// Always the same item; a slideshow over a single file just keeps
    /// showing it. Returns `None` only after the file was excluded.
    async fn get_next(&mut self) -> Result<Option<MediaItem>> {
        Ok(self.item.clone())
    }

    async fn check_file_exists(&self, item: &MediaItem) -> Option<bool> {
        match &self.gateway {
            Some(gateway) => gateway.check_exists(item).await,
            None => None,
        }
    }

    async fn exclude_file(&mut self, id: &str) {
        if self.item.as_ref().is_some_and(|item| item.id == id) {
            debug!(id, "single media item marked invalid");
            self.item = None;
        }
    }

    async fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    async fn rescan(&mut self) -> Result<()> {
        self.initialize().await
    }

    async fn files_newer_than(&self, _cutoff: DateTime<Utc>) -> Vec<MediaItem> {
        Vec::new()
    }
}
