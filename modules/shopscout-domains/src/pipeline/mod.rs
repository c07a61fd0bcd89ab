pub mod queue;
pub mod reaper;
pub mod run;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ai_client::ImageInput;
use shopscout_core::{steps, DomainGroup, MediaRole, PipelineError, RunKind};

use crate::catalog::models::{Media, Post, Profile};
use crate::catalog::{ProcessingOutcome, ALREADY_PROCESSED_REASON};
use crate::deps::PipelineDeps;
use crate::extraction::{classify, extract, SchemaCatalog};
use crate::scraping::scrape_profile;
use crate::store::RunStore;
use crate::taxonomy::{CategoryNode, CategoryTree};

pub use queue::{Job, JobHandler, JobQueue, JobReceiver, RetryPolicy, WorkerPool};
pub use reaper::{spawn_reaper, CleanupReport};
pub use run::{NewRun, PostTally, Run, ScrapeCounts};

/// Answer to a trigger: work was queued, or there was nothing to do.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome<T> {
    Started(T),
    NotApplicable { reason: String },
}

impl<T> TriggerOutcome<T> {
    fn not_applicable(reason: impl Into<String>) -> Self {
        TriggerOutcome::NotApplicable {
            reason: reason.into(),
        }
    }

    pub fn started(self) -> Option<T> {
        match self {
            TriggerOutcome::Started(value) => Some(value),
            TriggerOutcome::NotApplicable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStarted {
    pub run_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelingQueued {
    pub posts_to_label: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingQueued {
    pub run_id: Uuid,
    pub posts_queued: usize,
}

/// True when the run asked to stop, is already cancelled, or is gone.
pub async fn cancel_requested(runs: &dyn RunStore, run_id: Uuid) -> anyhow::Result<bool> {
    Ok(runs
        .find_run(run_id)
        .await?
        .map(|run| run.cancel_requested || run.status == shopscout_core::RunStatus::Cancelled)
        .unwrap_or(true))
}

/// Counter deltas for one reconciled post.
pub fn tally_for(outcome: &ProcessingOutcome) -> PostTally {
    let produced = outcome.products_created > 0;
    PostTally {
        processed: i32::from(produced),
        skipped: i32::from(!produced),
        failed: 0,
        products_created: outcome.products_created,
        low_confidence_skipped: outcome.low_confidence_skipped,
    }
}

/// One still per carousel position: high-res, then mid-res, then a frame.
fn select_stills(media: Vec<Media>) -> Vec<Media> {
    fn rank(role: Option<MediaRole>) -> Option<u8> {
        match role? {
            MediaRole::HighRes => Some(0),
            MediaRole::MidRes => Some(1),
            MediaRole::Frame => Some(2),
            MediaRole::Video => None,
        }
    }

    let mut picked: Vec<(u8, Media)> = Vec::new();
    for item in media {
        let Some(r) = rank(item.role()) else { continue };
        match picked.iter_mut().find(|(_, m)| m.ordinal == item.ordinal) {
            Some(slot) if r < slot.0 => *slot = (r, item),
            Some(_) => {}
            None => picked.push((r, item)),
        }
    }
    picked.sort_by_key(|(_, m)| m.ordinal);
    picked.into_iter().map(|(_, m)| m).collect()
}

async fn load_image(media: &Media) -> Option<ImageInput> {
    if media.path.starts_with("http://") || media.path.starts_with("https://") {
        return Some(ImageInput::url(media.path.clone()));
    }
    match ImageInput::from_file(Path::new(&media.path)).await {
        Ok(image) => Some(image),
        Err(e) => match &media.source_url {
            Some(url) => {
                debug!(media_id = %media.id, error = %e, "Stored media unreadable, using source URL");
                Some(ImageInput::url(url.clone()))
            }
            None => {
                warn!(media_id = %media.id, path = %media.path, error = %e, "Media unreadable, skipping");
                None
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Scrape, label and process orchestration over the job queue.
#[derive(Clone)]
pub struct Pipeline {
    deps: PipelineDeps,
    queue: JobQueue,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, queue: JobQueue) -> Self {
        Self { deps, queue }
    }

    pub fn deps(&self) -> &PipelineDeps {
        &self.deps
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            tries: self.deps.config.job_tries.max(1),
            backoff: self.deps.config.job_backoff(),
        }
    }

    pub fn start_workers(&self, receiver: JobReceiver) -> WorkerPool {
        WorkerPool::start(
            receiver,
            self.queue.clone(),
            Arc::new(self.clone()),
            self.deps.config.workers,
            self.retry_policy(),
        )
    }

    async fn profile(&self, id: Uuid) -> Result<Profile, PipelineError> {
        self.deps
            .catalog
            .find_profile(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("profile {id}")))
    }

    async fn post(&self, id: Uuid) -> Result<Post, PipelineError> {
        self.deps
            .catalog
            .find_post(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("post {id}")))
    }

    // --- triggers ----------------------------------------------------------

    pub async fn trigger_scrape(&self, profile_id: Uuid) -> Result<TriggerOutcome<RunStarted>, PipelineError> {
        let profile = self.profile(profile_id).await?;
        if self.deps.post_source.is_none() {
            return Ok(TriggerOutcome::not_applicable("Scraping is not configured"));
        }
        if let Some(active) = self.deps.runs.active_run(profile.id, RunKind::Scrape).await? {
            return Ok(TriggerOutcome::not_applicable(format!(
                "Scrape {} is already running",
                active.id
            )));
        }

        let run = self
            .deps
            .runs
            .create_run(NewRun::new(RunKind::Scrape, profile.id))
            .await?;
        self.queue.enqueue(Job::Scrape {
            profile_id: profile.id,
            run_id: run.id,
        })?;
        info!(profile_id = %profile.id, run_id = %run.id, "Scrape queued");
        Ok(TriggerOutcome::Started(RunStarted { run_id: run.id }))
    }

    pub async fn trigger_labeling(&self, profile_id: Uuid) -> Result<TriggerOutcome<LabelingQueued>, PipelineError> {
        let profile = self.profile(profile_id).await?;
        let posts = self.deps.catalog.posts_needing_label(profile.id).await?;
        if posts.is_empty() {
            return Ok(TriggerOutcome::not_applicable("No posts need labeling"));
        }
        for post in &posts {
            self.queue.enqueue(Job::LabelPost { post_id: post.id })?;
        }
        info!(profile_id = %profile.id, posts = posts.len(), "Labeling queued");
        Ok(TriggerOutcome::Started(LabelingQueued {
            posts_to_label: posts.len(),
        }))
    }

    pub async fn trigger_processing(&self, profile_id: Uuid) -> Result<TriggerOutcome<ProcessingQueued>, PipelineError> {
        let profile = self.profile(profile_id).await?;
        if let Some(active) = self.deps.runs.active_run(profile.id, RunKind::Processing).await? {
            return Ok(TriggerOutcome::not_applicable(format!(
                "Processing {} is already running",
                active.id
            )));
        }
        let posts = self.deps.catalog.posts_to_process(profile.id).await?;
        if posts.is_empty() {
            return Ok(TriggerOutcome::not_applicable("No unprocessed posts"));
        }

        let run = self
            .deps
            .runs
            .create_run(NewRun::new(RunKind::Processing, profile.id).to_process(posts.len() as i32))
            .await?;
        for post in &posts {
            self.queue.enqueue(Job::ProcessPost {
                post_id: post.id,
                run_id: run.id,
            })?;
        }
        info!(profile_id = %profile.id, run_id = %run.id, posts = posts.len(), "Processing queued");
        Ok(TriggerOutcome::Started(ProcessingQueued {
            run_id: run.id,
            posts_queued: posts.len(),
        }))
    }

    pub async fn trigger_full_pipeline(&self, profile_id: Uuid) -> Result<TriggerOutcome<RunStarted>, PipelineError> {
        let profile = self.profile(profile_id).await?;
        if let Some(active) = self.deps.runs.active_run(profile.id, RunKind::Pipeline).await? {
            return Ok(TriggerOutcome::not_applicable(format!(
                "Pipeline {} is already running",
                active.id
            )));
        }

        let run = self
            .deps
            .runs
            .create_run(NewRun::new(RunKind::Pipeline, profile.id))
            .await?;
        self.queue.enqueue(Job::FullPipeline {
            profile_id: profile.id,
            run_id: run.id,
        })?;
        info!(profile_id = %profile.id, run_id = %run.id, "Full pipeline queued");
        Ok(TriggerOutcome::Started(RunStarted { run_id: run.id }))
    }

    // --- run management ----------------------------------------------------

    pub async fn get_run_status(&self, run_id: Uuid) -> Result<Run, PipelineError> {
        self.deps
            .runs
            .find_run(run_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("run {run_id}")))
    }

    /// Ask a run to stop. Finished runs are returned unchanged.
    pub async fn cancel_run(&self, run_id: Uuid) -> Result<Run, PipelineError> {
        match self.deps.runs.request_cancel(run_id).await? {
            Some(run) => {
                info!(run_id = %run_id, kind = run.kind.as_str(), "Cancellation requested");
                Ok(run)
            }
            None => self.get_run_status(run_id).await,
        }
    }

    pub async fn cleanup_stale_runs(&self) -> Result<CleanupReport, PipelineError> {
        let completed = self.deps.runs.complete_finished_runs().await?;
        let minutes = self.deps.config.stale_run_after_mins;
        let cutoff = Utc::now() - chrono::Duration::minutes(minutes);
        let failed = self
            .deps
            .runs
            .fail_stale_runs(cutoff, &format!("Run still running after {minutes} minutes"))
            .await?;

        for id in &completed {
            info!(run_id = %id, "Completed stuck run");
        }
        for id in &failed {
            warn!(run_id = %id, "Failed stale run");
        }
        Ok(CleanupReport { completed, failed })
    }

    pub async fn category_tree(&self) -> Result<Vec<CategoryNode>, PipelineError> {
        let categories = self.deps.taxonomy.all_categories().await?;
        Ok(CategoryTree::build(categories).to_nodes())
    }

    // --- stages ------------------------------------------------------------

    /// Classify a post once. Labelled posts keep their group.
    pub async fn label_post(&self, post_id: Uuid) -> Result<DomainGroup, PipelineError> {
        let post = self.post(post_id).await?;
        if let Some(label) = &post.group_label {
            return Ok(DomainGroup::resolve(label));
        }

        let groups = self.deps.taxonomy.domain_groups().await?;
        let media = self.deps.catalog.media_for_post(post.id).await?;
        let image = match select_stills(media).first() {
            Some(first) => load_image(first).await,
            None => None,
        };

        let group = classify(
            self.deps.classification_llm.as_ref(),
            &groups,
            post.caption_text(),
            image,
            self.deps.default_group(),
        )
        .await;
        self.deps.catalog.set_post_group(post.id, group).await?;
        info!(post_id = %post.id, group = %group, "Post labelled");
        Ok(group)
    }

    /// Extract and reconcile one post. Posts already reconciled are skipped.
    pub async fn process_post(
        &self,
        post_id: Uuid,
        schema: &SchemaCatalog,
    ) -> Result<ProcessingOutcome, PipelineError> {
        let post = self.post(post_id).await?;
        if post.processed_structure {
            debug!(post_id = %post.id, "Post already processed, skipping");
            return Ok(ProcessingOutcome::skipped(ALREADY_PROCESSED_REASON));
        }
        let group = match &post.group_label {
            Some(label) => DomainGroup::resolve(label),
            None => self.label_post(post.id).await?,
        };

        let media = self.deps.catalog.media_for_post(post.id).await?;
        let mut images = Vec::new();
        for item in select_stills(media) {
            if let Some(image) = load_image(&item).await {
                images.push((item.id, image));
            }
        }

        let config = &self.deps.config;
        let extraction = extract(
            self.deps.extraction_llm.as_ref(),
            schema,
            images,
            post.caption_text(),
            group,
            config.max_extraction_retries,
            config.extraction_backoff(),
        )
        .await?;

        Ok(self
            .deps
            .reconciler()
            .reconcile(&post, group, &extraction, schema)
            .await?)
    }

    async fn record_outcome(&self, run_id: Uuid, tally: PostTally) -> Result<(), PipelineError> {
        let run = self.deps.runs.record_post_result(run_id, tally).await?;
        debug!(
            run_id = %run_id,
            processed = run.posts_processed,
            skipped = run.posts_skipped,
            failed = run.posts_failed,
            to_process = run.posts_to_process,
            "Post result recorded"
        );
        if self.deps.runs.complete_if_done(run_id).await? {
            info!(
                run_id = %run_id,
                processed = run.posts_processed,
                skipped = run.posts_skipped,
                failed = run.posts_failed,
                products_created = run.products_created,
                "Processing run completed"
            );
        }
        Ok(())
    }

    async fn check_cancel(&self, run_id: Uuid) -> Result<(), PipelineError> {
        if cancel_requested(self.deps.runs.as_ref(), run_id).await? {
            return Err(PipelineError::Cancelled(run_id));
        }
        Ok(())
    }

    /// Put the run back to `running` for this attempt. False when it must not run.
    async fn begin_attempt(&self, run_id: Uuid) -> Result<bool, PipelineError> {
        let run = self.get_run_status(run_id).await?;
        if run.cancel_requested {
            self.deps.runs.mark_cancelled(run_id).await?;
            info!(run_id = %run_id, "Run cancelled before start");
            return Ok(false);
        }
        if run.status.is_terminal() && run.status != shopscout_core::RunStatus::Failed {
            debug!(run_id = %run_id, status = run.status.as_str(), "Run already finished");
            return Ok(false);
        }
        self.deps.runs.mark_running(run_id).await?;
        Ok(true)
    }

    /// Terminal bookkeeping for scrape and pipeline runs. Errors are re-raised.
    async fn finish_run(&self, run_id: Uuid, result: Result<(), PipelineError>) -> Result<(), PipelineError> {
        match result {
            Ok(()) => {
                self.deps.runs.mark_completed(run_id).await?;
                info!(run_id = %run_id, "Run completed");
                Ok(())
            }
            Err(PipelineError::Cancelled(_)) => {
                self.deps.runs.mark_cancelled(run_id).await?;
                info!(run_id = %run_id, "Run cancelled");
                Ok(())
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Run failed");
                self.deps.runs.mark_failed(run_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn run_scrape(&self, profile_id: Uuid, run_id: Uuid) -> Result<(), PipelineError> {
        if !self.begin_attempt(run_id).await? {
            return Ok(());
        }
        let result = async {
            let profile = self.profile(profile_id).await?;
            scrape_profile(&self.deps, &profile, run_id).await.map(|_| ())
        }
        .await;
        self.finish_run(run_id, result).await
    }

    async fn run_process_post(&self, post_id: Uuid, run_id: Uuid) -> Result<(), PipelineError> {
        let run = self.get_run_status(run_id).await?;
        if run.status.is_terminal() || run.cancel_requested {
            info!(post_id = %post_id, run_id = %run_id, status = run.status.as_str(), "Run finished, post abandoned");
            return Ok(());
        }

        let schema = SchemaCatalog::load(self.deps.taxonomy.as_ref()).await?;
        let outcome = self.process_post(post_id, &schema).await?;
        self.record_outcome(run_id, tally_for(&outcome)).await
    }

    async fn process_with_retries(
        &self,
        post_id: Uuid,
        schema: &SchemaCatalog,
    ) -> Result<ProcessingOutcome, PipelineError> {
        let policy = self.retry_policy();
        let mut attempt = 1;
        loop {
            match self.process_post(post_id, schema).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < policy.tries => {
                    warn!(post_id = %post_id, attempt, error = %e, "Post processing failed, retrying");
                    tokio::time::sleep(policy.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_full_pipeline(&self, profile_id: Uuid, run_id: Uuid) -> Result<(), PipelineError> {
        if !self.begin_attempt(run_id).await? {
            return Ok(());
        }
        let result = self.full_pipeline_stages(profile_id, run_id).await;
        self.finish_run(run_id, result).await
    }

    async fn full_pipeline_stages(&self, profile_id: Uuid, run_id: Uuid) -> Result<(), PipelineError> {
        let profile = self.profile(profile_id).await?;
        let runs = &self.deps.runs;

        runs.set_status_message(run_id, Some(steps::SCRAPING)).await?;
        if self.deps.post_source.is_some() {
            let child = runs
                .create_run(NewRun::new(RunKind::Scrape, profile.id).child_of(run_id))
                .await?;
            match scrape_profile(&self.deps, &profile, child.id).await {
                Ok(counts) => {
                    runs.mark_completed(child.id).await?;
                    runs.record_scrape_counts(run_id, counts).await?;
                }
                Err(PipelineError::Cancelled(_)) => {
                    runs.mark_cancelled(child.id).await?;
                    return Err(PipelineError::Cancelled(run_id));
                }
                Err(e) => {
                    runs.mark_failed(child.id, &e.to_string()).await?;
                    return Err(e);
                }
            }
        } else {
            info!(run_id = %run_id, "No post source configured, skipping scrape stage");
        }
        self.check_cancel(run_id).await?;

        runs.set_status_message(run_id, Some(steps::LABELING)).await?;
        for post in self.deps.catalog.posts_needing_label(profile.id).await? {
            self.check_cancel(run_id).await?;
            if let Err(e) = self.label_post(post.id).await {
                warn!(run_id = %run_id, post_id = %post.id, error = %e, "Labeling failed, continuing");
            }
        }
        self.check_cancel(run_id).await?;

        runs.set_status_message(run_id, Some(steps::PROCESSING)).await?;
        let posts = self.deps.catalog.posts_to_process(profile.id).await?;
        let to_process = posts.len() as i32;
        let child = runs
            .create_run(
                NewRun::new(RunKind::Processing, profile.id)
                    .child_of(run_id)
                    .to_process(to_process),
            )
            .await?;
        let schema = SchemaCatalog::load(self.deps.taxonomy.as_ref()).await?;

        for post in &posts {
            if cancel_requested(runs.as_ref(), run_id).await? {
                runs.mark_cancelled(child.id).await?;
                return Err(PipelineError::Cancelled(run_id));
            }
            let tally = match self.process_with_retries(post.id, &schema).await {
                Ok(outcome) => tally_for(&outcome),
                Err(e) => {
                    error!(run_id = %run_id, post_id = %post.id, error = %e, "Post failed, continuing");
                    PostTally::failed()
                }
            };
            self.record_outcome(child.id, tally).await?;
        }
        runs.complete_if_done(child.id).await?;
        Ok(())
    }
}

#[async_trait]
impl JobHandler for Pipeline {
    async fn handle(&self, job: Job) -> Result<(), PipelineError> {
        match job {
            Job::Scrape { profile_id, run_id } => self.run_scrape(profile_id, run_id).await,
            Job::LabelPost { post_id } => self.label_post(post_id).await.map(|_| ()),
            Job::ProcessPost { post_id, run_id } => self.run_process_post(post_id, run_id).await,
            Job::FullPipeline { profile_id, run_id } => self.run_full_pipeline(profile_id, run_id).await,
        }
    }

    async fn on_exhausted(&self, job: Job, error: &PipelineError) {
        let result = match job {
            Job::ProcessPost { post_id, run_id } => {
                warn!(post_id = %post_id, run_id = %run_id, error = %error, "Post failed after retries");
                self.record_outcome(run_id, PostTally::failed()).await
            }
            Job::Scrape { run_id, .. } | Job::FullPipeline { run_id, .. } => self
                .deps
                .runs
                .mark_failed(run_id, &error.to_string())
                .await
                .map_err(PipelineError::from),
            Job::LabelPost { post_id } => {
                warn!(post_id = %post_id, error = %error, "Labeling failed after retries");
                Ok(())
            }
        };
        if let Err(e) = result {
            error!(job = job.name(), error = %e, "Failed to record job exhaustion");
        }
    }

    fn timeout_for(&self, job: &Job) -> Duration {
        let config = &self.deps.config;
        match job {
            Job::Scrape { .. } => config.scrape_timeout(),
            Job::LabelPost { .. } => config.llm_timeout(),
            Job::ProcessPost { .. } => config.llm_timeout() * (config.max_extraction_retries.max(1) + 1),
            Job::FullPipeline { .. } => config.pipeline_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(ordinal: i32, role: &str) -> Media {
        Media {
            id: Uuid::new_v4(),
            post_id: Uuid::nil(),
            role: role.to_string(),
            path: format!("{ordinal}-{role}.jpg"),
            ordinal,
            source_url: None,
        }
    }

    #[test]
    fn one_still_per_ordinal_preferring_high_res() {
        let picked = select_stills(vec![
            media(1, "frame"),
            media(0, "mid-res"),
            media(0, "high-res"),
            media(1, "video"),
            media(2, "video"),
        ]);
        let got: Vec<_> = picked.iter().map(|m| (m.ordinal, m.role.as_str())).collect();
        assert_eq!(got, vec![(0, "high-res"), (1, "frame")]);
    }

    #[test]
    fn tally_counts_posts_without_products_as_skipped() {
        let outcome = ProcessingOutcome {
            success: false,
            reason: Some("No products detected".into()),
            products_created: 0,
            low_confidence_skipped: 2,
            invalid_skipped: 0,
            products: Vec::new(),
        };
        let tally = tally_for(&outcome);
        assert_eq!((tally.processed, tally.skipped), (0, 1));
        assert_eq!(tally.low_confidence_skipped, 2);
    }

    #[tokio::test]
    async fn url_paths_load_without_touching_disk() {
        let mut item = media(0, "high-res");
        item.path = "https://cdn.example.com/a.jpg".into();
        assert!(matches!(load_image(&item).await, Some(ImageInput::Url(_))));

        let missing = media(0, "high-res");
        assert!(load_image(&missing).await.is_none());
    }
}
