use tracing::{info, warn};
use uuid::Uuid;

use shopscout_core::{MediaProcessor, PipelineError, PostData};

use crate::catalog::models::{NewPost, Post, Profile};
use crate::deps::PipelineDeps;
use crate::pipeline::cancel_requested;
use crate::pipeline::run::ScrapeCounts;
use crate::store::CatalogStore;

/// Fetch the profile's latest posts and store the ones not seen before.
///
/// Duplicates (same external id) are counted as skipped. Cancellation is
/// checked between posts; already ingested posts stay counted.
pub async fn scrape_profile(
    deps: &PipelineDeps,
    profile: &Profile,
    run_id: Uuid,
) -> Result<ScrapeCounts, PipelineError> {
    let Some(source) = &deps.post_source else {
        return Err(PipelineError::Validation(
            "no post source configured".to_string(),
        ));
    };

    let limit = deps.config.scrape_limit;
    let timeout = deps.config.scrape_timeout();
    info!(profile_id = %profile.id, username = %profile.username, limit, "Scraping profile");

    let page = tokio::time::timeout(timeout, source.get_posts(&profile.username, limit))
        .await
        .map_err(|_| PipelineError::Timeout(timeout.as_secs()))?
        .map_err(|e| PipelineError::Scraping(e.to_string()))?;

    let mut counts = ScrapeCounts {
        fetched: page.posts.len() as i32,
        ..ScrapeCounts::default()
    };

    for data in &page.posts {
        if cancel_requested(deps.runs.as_ref(), run_id).await? {
            deps.runs.record_scrape_counts(run_id, counts).await?;
            return Err(PipelineError::Cancelled(run_id));
        }
        match ingest_post(deps.catalog.as_ref(), deps.media.as_ref(), profile.id, data).await? {
            Some(_) => counts.new += 1,
            None => counts.skipped += 1,
        }
    }

    deps.runs.record_scrape_counts(run_id, counts).await?;
    info!(
        profile_id = %profile.id,
        run_id = %run_id,
        fetched = counts.fetched,
        new = counts.new,
        skipped = counts.skipped,
        has_more = page.has_more,
        "Scrape complete"
    );
    Ok(counts)
}

/// Store one scraped post with its media. `None` when it already exists.
///
/// A known post whose media never landed gets another attempt, so a failed
/// download is recovered by the next scrape.
pub async fn ingest_post(
    catalog: &dyn CatalogStore,
    media: &dyn MediaProcessor,
    profile_id: Uuid,
    data: &PostData,
) -> anyhow::Result<Option<Post>> {
    let inserted = catalog
        .insert_post_if_new(NewPost {
            profile_id,
            external_id: data.external_id.clone(),
            caption: data.caption.clone(),
            permalink: data.permalink.clone(),
            posted_at: data.posted_at,
        })
        .await?;

    let Some(post) = inserted else {
        if data.media.is_empty() {
            return Ok(None);
        }
        if let Some(existing) = catalog.find_post_by_external_id(&data.external_id).await? {
            if catalog.media_for_post(existing.id).await?.is_empty() {
                info!(post_id = %existing.id, external_id = %data.external_id, "Retrying media for known post");
                attach_media(catalog, media, &existing, data).await?;
            }
        }
        return Ok(None);
    };

    attach_media(catalog, media, &post, data).await?;
    Ok(Some(post))
}

async fn attach_media(
    catalog: &dyn CatalogStore,
    media: &dyn MediaProcessor,
    post: &Post,
    data: &PostData,
) -> anyhow::Result<()> {
    match media.process_post_media(post.id, data).await {
        Ok(stored) if !stored.is_empty() => {
            catalog.insert_media(post.id, &stored).await?;
        }
        Ok(_) => warn!(post_id = %post.id, external_id = %data.external_id, "Post has no media"),
        Err(e) => {
            warn!(post_id = %post.id, external_id = %data.external_id, error = %e, "Media processing failed");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{post_data, MockMediaProcessor};

    #[tokio::test]
    async fn failed_media_is_retried_on_the_next_scrape() {
        let store = MemoryStore::new();
        let profile = store.add_profile("gadget.hub");
        let data = post_data("C1", Some("iPhone 14 Pro"), 2);

        let first = ingest_post(&store, &MockMediaProcessor::failing(), profile.id, &data)
            .await
            .unwrap()
            .expect("new post");
        assert!(store.media_for_post(first.id).await.unwrap().is_empty());

        let second = ingest_post(&store, &MockMediaProcessor::new(), profile.id, &data)
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(store.posts().len(), 1);
        assert_eq!(store.media_for_post(first.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stored_media_is_not_fetched_again() {
        let store = MemoryStore::new();
        let profile = store.add_profile("gadget.hub");
        let data = post_data("C2", Some("Galaxy S23"), 1);

        let post = ingest_post(&store, &MockMediaProcessor::new(), profile.id, &data)
            .await
            .unwrap()
            .expect("new post");
        ingest_post(&store, &MockMediaProcessor::new(), profile.id, &data).await.unwrap();

        assert_eq!(store.media_for_post(post.id).await.unwrap().len(), 1);
    }
}
