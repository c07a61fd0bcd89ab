use anyhow::Result;
use async_trait::async_trait;

use apify_client::{ApifyClient, InstagramPost, MediaKind};
use shopscout_core::{PostData, PostPage, PostSource, RawMedia};

/// Instagram profiles scraped through Apify.
pub struct ApifyPostSource {
    client: ApifyClient,
}

impl ApifyPostSource {
    pub fn new(client: ApifyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PostSource for ApifyPostSource {
    async fn get_posts(&self, identifier: &str, limit: u32) -> Result<PostPage> {
        let username = identifier.trim_start_matches('@');
        let posts = self.client.scrape_instagram_posts(username, limit).await?;
        let has_more = posts.len() >= limit as usize;
        Ok(PostPage {
            posts: posts.iter().filter_map(to_post_data).collect(),
            end_cursor: None,
            has_more,
        })
    }
}

/// `None` when the item carries no usable id.
pub(crate) fn to_post_data(post: &InstagramPost) -> Option<PostData> {
    let external_id = post
        .short_code
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| Some(post.id.clone()).filter(|id| !id.is_empty()))?;

    Some(PostData {
        external_id,
        caption: post.caption.clone(),
        permalink: post.permalink(),
        posted_at: post.timestamp,
        media: raw_media(post),
    })
}

/// Carousel children keep their index; a video shares its poster's ordinal.
pub(crate) fn raw_media(post: &InstagramPost) -> Vec<RawMedia> {
    let mut media: Vec<RawMedia> = Vec::new();
    let mut push = |url: &Option<String>, is_video: bool, ordinal: i32| {
        if let Some(url) = url.as_deref().filter(|u| !u.is_empty()) {
            if !media.iter().any(|m| m.url == url) {
                media.push(RawMedia {
                    url: url.to_string(),
                    is_video,
                    ordinal,
                });
            }
        }
    };

    if !post.child_posts.is_empty() {
        for (index, child) in post.child_posts.iter().enumerate() {
            push(&child.display_url, false, index as i32);
            push(&child.video_url, true, index as i32);
        }
        return media;
    }

    let mut next = 0;
    for item in post.media_refs() {
        match item.kind {
            MediaKind::Image => {
                push(&Some(item.url), false, next);
                next += 1;
            }
            MediaKind::Video => push(&Some(item.url), true, 0),
        }
    }
    media
}
