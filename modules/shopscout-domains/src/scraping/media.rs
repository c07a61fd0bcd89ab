use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use shopscout_core::{MediaProcessor, MediaRole, PostData, RawMedia, StoredMedia};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Downloads a post's images and video under `media_dir/<post_id>/`.
///
/// Frame extraction is not done here; stills are stored as `high-res` and
/// videos as `video`.
pub struct StoredMediaProcessor {
    http: reqwest::Client,
    media_dir: PathBuf,
}

impl StoredMediaProcessor {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            media_dir: media_dir.into(),
        }
    }

    async fn download(&self, dir: &std::path::Path, index: usize, item: &RawMedia) -> Result<StoredMedia> {
        let resp = self
            .http
            .get(&item.url)
            .send()
            .await
            .with_context(|| format!("GET {}", item.url))?;
        if !resp.status().is_success() {
            bail!("GET {} returned {}", item.url, resp.status());
        }
        let bytes = resp.bytes().await?;

        let path = dir.join(file_name(index, item));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(StoredMedia {
            role: if item.is_video {
                MediaRole::Video
            } else {
                MediaRole::HighRes
            },
            path: path.to_string_lossy().into_owned(),
            ordinal: item.ordinal,
            source_url: Some(item.url.clone()),
        })
    }
}

pub(crate) fn extension(url: &str, is_video: bool) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if is_video {
        return "mp4";
    }
    if path.ends_with(".png") {
        "png"
    } else if path.ends_with(".webp") {
        "webp"
    } else {
        "jpg"
    }
}

fn file_name(index: usize, item: &RawMedia) -> String {
    format!("{:02}-{}.{}", item.ordinal, index, extension(&item.url, item.is_video))
}

#[async_trait]
impl MediaProcessor for StoredMediaProcessor {
    async fn process_post_media(&self, post_id: Uuid, post: &PostData) -> Result<Vec<StoredMedia>> {
        let dir = self.media_dir.join(post_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut stored = Vec::with_capacity(post.media.len());
        for (index, item) in post.media.iter().enumerate() {
            match self.download(&dir, index, item).await {
                Ok(media) => stored.push(media),
                Err(e) => {
                    tracing::warn!(
                        post_id = %post_id,
                        url = %item.url,
                        error = %e,
                        "Media download failed, skipping"
                    );
                }
            }
        }
        Ok(stored)
    }
}
