use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run metadata returned when starting or polling an actor run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Input for the apify/instagram-post-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct InstagramScraperInput {
    pub username: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
    #[serde(rename = "onlyPostsNewerThan", skip_serializing_if = "Option::is_none")]
    pub only_posts_newer_than: Option<String>,
}

/// A single Instagram post from the Apify dataset.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstagramPost {
    pub id: String,
    #[serde(rename = "shortCode")]
    pub short_code: Option<String>,
    pub url: Option<String>,
    pub caption: Option<String>,
    #[serde(rename = "ownerUsername")]
    pub owner_username: Option<String>,
    #[serde(rename = "displayUrl")]
    pub display_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
    #[serde(rename = "childPosts", default)]
    pub child_posts: Vec<InstagramChildPost>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    #[serde(rename = "likesCount")]
    pub likes_count: Option<i64>,
    #[serde(rename = "commentsCount")]
    pub comments_count: Option<i64>,
}

/// One slide of a carousel post.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstagramChildPost {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    #[serde(rename = "displayUrl")]
    pub display_url: Option<String>,
    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
}

/// Kind of a media asset referenced by a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// A media URL found on a post, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

impl InstagramPost {
    /// Every distinct image and video URL on the post, cover first.
    pub fn media_refs(&self) -> Vec<MediaRef> {
        let mut refs: Vec<MediaRef> = Vec::new();
        let mut push = |url: &Option<String>, kind: MediaKind| {
            if let Some(url) = url.as_deref().filter(|u| !u.is_empty()) {
                if !refs.iter().any(|r| r.url == url) {
                    refs.push(MediaRef {
                        url: url.to_string(),
                        kind,
                    });
                }
            }
        };

        push(&self.display_url, MediaKind::Image);
        for image in &self.images {
            push(&Some(image.clone()), MediaKind::Image);
        }
        for child in &self.child_posts {
            push(&child.display_url, MediaKind::Image);
            push(&child.video_url, MediaKind::Video);
        }
        push(&self.video_url, MediaKind::Video);
        refs
    }

    pub fn permalink(&self) -> Option<String> {
        self.url.clone().or_else(|| {
            self.short_code
                .as_ref()
                .map(|code| format!("https://www.instagram.com/p/{code}/"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dataset_item_deserializes_with_missing_optional_fields() {
        let post: InstagramPost = serde_json::from_value(json!({
            "id": "3301",
            "shortCode": "Cx1",
            "caption": "RTX 4090 for sale",
            "displayUrl": "https://cdn/a.jpg",
            "timestamp": "2024-03-01T10:00:00.000Z",
            "type": "Image"
        }))
        .unwrap();

        assert_eq!(post.id, "3301");
        assert!(post.images.is_empty());
        assert_eq!(post.permalink().as_deref(), Some("https://www.instagram.com/p/Cx1/"));
    }

    #[test]
    fn media_refs_dedupe_and_keep_order() {
        let post: InstagramPost = serde_json::from_value(json!({
            "id": "1",
            "displayUrl": "https://cdn/a.jpg",
            "images": ["https://cdn/a.jpg", "https://cdn/b.jpg"],
            "childPosts": [
                {"type": "Video", "displayUrl": "https://cdn/c.jpg", "videoUrl": "https://cdn/c.mp4"}
            ]
        }))
        .unwrap();

        let urls: Vec<_> = post.media_refs().into_iter().map(|r| (r.url, r.kind)).collect();
        assert_eq!(
            urls,
            vec![
                ("https://cdn/a.jpg".to_string(), MediaKind::Image),
                ("https://cdn/b.jpg".to_string(), MediaKind::Image),
                ("https://cdn/c.jpg".to_string(), MediaKind::Image),
                ("https://cdn/c.mp4".to_string(), MediaKind::Video),
            ]
        );
    }
}
