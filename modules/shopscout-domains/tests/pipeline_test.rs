//! End-to-end pipeline scenarios over the in-memory store.
//!
//! Every external boundary is mocked: the post source, media downloads and
//! both LLM roles. Jobs run on a real `WorkerPool`; each test drains the
//! queue with `wait_idle` before asserting.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

use shopscout_core::{PipelineConfig, PipelineError, PostSource, RunKind, RunStatus};
use shopscout_domains::catalog::models::Profile;
use shopscout_domains::pipeline::{Job, JobQueue, NewRun, Run, TriggerOutcome, WorkerPool};
use shopscout_domains::store::MemoryStore;
use shopscout_domains::testing::{post_data, MockLlm, MockMediaProcessor, MockPostSource};
use shopscout_domains::{CatalogStore, Pipeline, PipelineDeps, RunStore};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

const USERNAME: &str = "gadget.hub";
const TECH: &str = r#"{"group":"tech"}"#;

fn test_config() -> PipelineConfig {
    PipelineConfig {
        max_extraction_retries: 2,
        extraction_backoff_ms: 0,
        job_tries: 2,
        job_backoff_secs: 0,
        workers: 4,
        ..PipelineConfig::default()
    }
}

fn seeded_store() -> (Arc<MemoryStore>, Profile) {
    let store = Arc::new(MemoryStore::new());
    store.add_domain_group("tech", "Consumer electronics and accessories");
    store.add_domain_group("car", "Vehicles and automotive parts");
    for key in ["brand", "name", "condition", "currency", "storage"] {
        store.add_structure_output("tech", key, key, false, Some("phone"));
    }
    store.add_structure_output("car", "mileage", "Odometer reading", false, Some("car"));
    let profile = store.add_profile(USERNAME);
    (store, profile)
}

struct Harness {
    store: Arc<MemoryStore>,
    profile: Profile,
    extraction: Arc<MockLlm>,
    pipeline: Pipeline,
    _workers: WorkerPool,
}

impl Harness {
    fn new(extraction: MockLlm, classification: MockLlm, source: Option<MockPostSource>) -> Self {
        let (store, profile) = seeded_store();
        let extraction = Arc::new(extraction);
        let deps = PipelineDeps::builder()
            .catalog(store.clone())
            .taxonomy(store.clone())
            .runs(store.clone())
            .extraction_llm(extraction.clone())
            .classification_llm(Arc::new(classification))
            .post_source(source.map(|s| Arc::new(s) as Arc<dyn PostSource>))
            .media(Arc::new(MockMediaProcessor::new()))
            .config(test_config())
            .build();
        let (queue, receiver) = JobQueue::new();
        let pipeline = Pipeline::new(deps, queue);
        let workers = pipeline.start_workers(receiver);
        Self {
            store,
            profile,
            extraction,
            pipeline,
            _workers: workers,
        }
    }

    fn with_extraction(answer: &str) -> Self {
        Self::new(MockLlm::new().always(answer), MockLlm::new().always(TECH), None)
    }

    /// A post with one fetchable image.
    fn seed_post(&self, external_id: &str, caption: &str) -> uuid::Uuid {
        let post = self.store.add_post(self.profile.id, external_id, Some(caption));
        self.store.add_media(
            post.id,
            "high-res",
            &format!("https://cdn.example.com/{external_id}.jpg"),
            0,
        );
        post.id
    }

    async fn drain(&self) {
        self.pipeline.queue().wait_idle().await;
    }

    fn run(&self, id: uuid::Uuid) -> Run {
        self.store
            .runs()
            .into_iter()
            .find(|r| r.id == id)
            .expect("run exists")
    }
}

fn product(name: &str, confidence: &str) -> serde_json::Value {
    json!({
        "brand": "Apple",
        "name": name,
        "type": "phone",
        "categories": ["Phones"],
        "price": 800,
        "discount_price": 0,
        "currency": "usd",
        "condition": "used",
        "attributes": {"storage": "256GB"},
        "product_details": null,
        "source": ["image_1"],
        "confidence": confidence
    })
}

fn answer(products: Vec<serde_json::Value>) -> String {
    json!({"has_products": !products.is_empty(), "products": products}).to_string()
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_pipeline_scrapes_labels_and_processes() {
    let source = MockPostSource::new().on_posts(
        USERNAME,
        vec![
            post_data("C1", Some("iPhone 14 Pro 256GB, used"), 1),
            post_data("C2", Some("iPhone 13, 128GB"), 2),
        ],
    );
    let h = Harness::new(
        MockLlm::new().always(&answer(vec![product("iPhone 14 Pro", "high")])),
        MockLlm::new().always(TECH),
        Some(source),
    );

    let run_id = match h.pipeline.trigger_full_pipeline(h.profile.id).await.unwrap() {
        TriggerOutcome::Started(started) => started.run_id,
        other => panic!("expected a started run, got {other:?}"),
    };
    h.drain().await;

    let run = h.run(run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.status_message.is_none());
    assert_eq!(run.posts_new, 2);

    let posts = h.store.posts();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.processed_structure));
    assert!(posts.iter().all(|p| p.group_label.as_deref() == Some("tech")));
    assert_eq!(h.store.products().len(), 2);

    let children: Vec<_> = h
        .store
        .runs()
        .into_iter()
        .filter(|r| r.parent_id == Some(run_id))
        .collect();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|r| r.status == RunStatus::Completed));
    let processing = children
        .iter()
        .find(|r| r.kind == RunKind::Processing)
        .expect("processing child");
    assert_eq!(processing.posts_to_process, 2);
    assert_eq!(processing.posts_processed, 2);
    assert_eq!(processing.products_created, 2);
}

#[tokio::test]
async fn full_pipeline_without_source_processes_existing_posts() {
    let h = Harness::with_extraction(&answer(vec![product("iPhone 14 Pro", "high")]));
    h.seed_post("P1", "iPhone for sale");

    let started = h
        .pipeline
        .trigger_full_pipeline(h.profile.id)
        .await
        .unwrap()
        .started()
        .expect("pipeline started");
    h.drain().await;

    assert_eq!(h.run(started.run_id).status, RunStatus::Completed);
    assert_eq!(h.store.products().len(), 1);
    assert!(h
        .store
        .runs()
        .iter()
        .all(|r| r.kind != RunKind::Scrape));
}

// ---------------------------------------------------------------------------
// Scraping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scraping_twice_stores_each_post_once() {
    let source = MockPostSource::new().on_posts(USERNAME, vec![post_data("C1", Some("Galaxy S23"), 1)]);
    let h = Harness::new(MockLlm::new(), MockLlm::new().always(TECH), Some(source));

    let first = h.pipeline.trigger_scrape(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;
    let second = h.pipeline.trigger_scrape(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    assert_eq!(h.store.posts().len(), 1);
    let first = h.run(first.run_id);
    let second = h.run(second.run_id);
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!((first.posts_fetched, first.posts_new), (1, 1));
    assert_eq!((second.posts_fetched, second.posts_new), (1, 0));
}

#[tokio::test]
async fn rescraping_recovers_media_that_failed_to_download() {
    let (store, profile) = seeded_store();
    let scrape_with = |media: MockMediaProcessor| {
        let source = MockPostSource::new().on_posts(USERNAME, vec![post_data("C1", Some("Pixel 8"), 2)]);
        let deps = PipelineDeps::builder()
            .catalog(store.clone())
            .taxonomy(store.clone())
            .runs(store.clone())
            .extraction_llm(Arc::new(MockLlm::new()))
            .classification_llm(Arc::new(MockLlm::new().always(TECH)))
            .post_source(Some(Arc::new(source) as Arc<dyn PostSource>))
            .media(Arc::new(media))
            .config(test_config())
            .build();
        let (queue, receiver) = JobQueue::new();
        let pipeline = Pipeline::new(deps, queue);
        let workers = pipeline.start_workers(receiver);
        (pipeline, workers)
    };

    let (broken, workers) = scrape_with(MockMediaProcessor::failing());
    broken.trigger_scrape(profile.id).await.unwrap().started().unwrap();
    broken.queue().wait_idle().await;
    workers.shutdown().await;
    let post = store.posts()[0].clone();
    assert!(store.media_for_post(post.id).await.unwrap().is_empty());

    let (working, workers) = scrape_with(MockMediaProcessor::new());
    let second = working.trigger_scrape(profile.id).await.unwrap().started().unwrap();
    working.queue().wait_idle().await;
    workers.shutdown().await;

    let run = working.get_run_status(second.run_id).await.unwrap();
    assert_eq!((run.posts_new, run.posts_skipped), (0, 1));
    assert_eq!(store.posts().len(), 1);
    assert_eq!(store.media_for_post(post.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn failing_source_marks_scrape_failed() {
    // Registered under another username, so every fetch errors.
    let source = MockPostSource::new().on_posts("someone.else", Vec::new());
    let h = Harness::new(MockLlm::new(), MockLlm::new().always(TECH), Some(source));

    let started = h.pipeline.trigger_scrape(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    let run = h.run(started.run_id);
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.is_some());
}

// ---------------------------------------------------------------------------
// Labeling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn labeling_assigns_groups_once() {
    let classification = MockLlm::new()
        .when("brake pads", r#"{"group":"car"}"#)
        .always(TECH);
    let h = Harness::new(MockLlm::new(), classification, None);
    let phone = h.seed_post("L1", "Unlocked phone, barely used");
    let pads = h.seed_post("L2", "Ceramic brake pads for sedans");

    let queued = h.pipeline.trigger_labeling(h.profile.id).await.unwrap().started().unwrap();
    assert_eq!(queued.posts_to_label, 2);
    h.drain().await;

    let label = |id| {
        h.store
            .posts()
            .into_iter()
            .find(|p| p.id == id)
            .and_then(|p| p.group_label)
    };
    assert_eq!(label(phone).as_deref(), Some("tech"));
    assert_eq!(label(pads).as_deref(), Some("car"));

    let again = h.pipeline.trigger_labeling(h.profile.id).await.unwrap();
    assert!(matches!(again, TriggerOutcome::NotApplicable { .. }));
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_posts_complete_the_run_exactly_once() {
    let h = Harness::with_extraction(&answer(vec![product("iPhone 14 Pro", "high")]));
    for i in 0..5 {
        h.seed_post(&format!("R{i}"), "iPhone 14 Pro");
    }

    let queued = h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().unwrap();
    assert_eq!(queued.posts_queued, 5);
    h.drain().await;

    let run = h.run(queued.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.completed_at.is_some());
    assert_eq!(run.posts_to_process, 5);
    assert_eq!(run.posts_processed + run.posts_skipped + run.posts_failed, 5);
    assert_eq!(run.products_created, 5);
    assert!(!h.store.complete_if_done(run.id).await.unwrap());
}

#[tokio::test]
async fn values_promote_once_seen_past_the_threshold() {
    let h = Harness::with_extraction(&answer(vec![product("iPhone 14 Pro", "high")]));
    for i in 0..4 {
        h.seed_post(&format!("V{i}"), "iPhone 14 Pro");
    }

    h.pipeline.trigger_processing(h.profile.id).await.unwrap();
    h.drain().await;

    let apple = h.store.value_named("Apple").expect("brand value");
    assert_eq!(apple.score, 4);
    assert!(!apple.is_temp);
    assert_eq!(h.store.values().iter().filter(|v| v.ai_value == "apple").count(), 1);
}

#[tokio::test]
async fn processing_twice_scores_each_post_once() {
    let (store, profile) = seeded_store();
    let post = store.add_post(profile.id, "W1", Some("iPhone 14 Pro"));
    store.add_media(post.id, "high-res", "https://cdn.example.com/w1.jpg", 0);
    let extraction = Arc::new(MockLlm::new().always(&answer(vec![product("iPhone 14 Pro", "high")])));
    let deps = PipelineDeps::builder()
        .catalog(store.clone())
        .taxonomy(store.clone())
        .runs(store.clone())
        .extraction_llm(extraction.clone())
        .classification_llm(Arc::new(MockLlm::new().always(TECH)))
        .media(Arc::new(MockMediaProcessor::new()))
        .config(test_config())
        .build();
    let (queue, receiver) = JobQueue::new();
    let pipeline = Pipeline::new(deps, queue);

    let first = pipeline.trigger_processing(profile.id).await.unwrap().started().unwrap();
    let second = pipeline.trigger_processing(profile.id).await.unwrap();
    assert!(matches!(second, TriggerOutcome::NotApplicable { .. }));

    let workers = pipeline.start_workers(receiver);
    pipeline.queue().wait_idle().await;
    workers.shutdown().await;

    assert_eq!(extraction.calls(), 1);
    assert_eq!(store.value_named("Apple").unwrap().score, 1);
    let processing: Vec<Run> = store
        .runs()
        .into_iter()
        .filter(|r| r.kind == RunKind::Processing)
        .collect();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].id, first.run_id);
    assert_eq!(processing[0].status, RunStatus::Completed);
}

#[tokio::test]
async fn already_processed_posts_are_counted_as_skipped() {
    let h = Harness::with_extraction(&answer(vec![product("iPhone 14 Pro", "high")]));
    let post_id = h.seed_post("A1", "iPhone 14 Pro");
    h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    // A job queued before the first run finished reaches a processed post.
    let late = h
        .store
        .create_run(NewRun::new(RunKind::Processing, h.profile.id).to_process(1))
        .await
        .unwrap();
    h.pipeline
        .queue()
        .enqueue(Job::ProcessPost {
            post_id,
            run_id: late.id,
        })
        .unwrap();
    h.drain().await;

    let run = h.run(late.id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!((run.posts_processed, run.posts_skipped), (0, 1));
    assert_eq!(h.extraction.calls(), 1);
    assert_eq!(h.store.products().len(), 1);
    assert_eq!(h.store.value_named("Apple").unwrap().score, 1);
}

#[tokio::test]
async fn low_confidence_products_are_skipped() {
    let h = Harness::with_extraction(&answer(vec![
        product("iPhone 14 Pro", "low"),
        product("iPhone 13", "medium-low"),
    ]));
    let post_id = h.seed_post("G1", "blurry phone pic");

    let queued = h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    let run = h.run(queued.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.posts_skipped, 1);
    assert_eq!(run.low_confidence_skipped, 2);
    assert!(h.store.products().is_empty());
    let post = h.store.posts().into_iter().find(|p| p.id == post_id).unwrap();
    assert!(post.processed_structure);
}

#[tokio::test]
async fn placeholder_names_never_become_products() {
    let h = Harness::with_extraction(&answer(vec![product("N/A", "high")]));
    h.seed_post("N1", "something for sale");

    let queued = h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    assert!(h.store.products().is_empty());
    assert_eq!(h.run(queued.run_id).posts_skipped, 1);
}

#[tokio::test]
async fn posts_without_products_are_marked_processed() {
    let h = Harness::with_extraction(&answer(Vec::new()));
    h.seed_post("E1", "Happy friday everyone!");

    let queued = h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    let run = h.run(queued.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.posts_skipped, 1);
    assert!(h.store.posts()[0].processed_structure);
    assert!(h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().is_none());
}

#[tokio::test]
async fn post_without_images_fails_without_calling_the_model() {
    let h = Harness::with_extraction(&answer(vec![product("iPhone 14 Pro", "high")]));
    h.store.add_post(h.profile.id, "T1", Some("text only"));

    let queued = h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    let run = h.run(queued.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.posts_failed, 1);
    assert_eq!(h.extraction.calls(), 0);
    assert!(!h.store.posts()[0].processed_structure);
}

#[tokio::test]
async fn model_failures_count_the_post_as_failed() {
    // No scripted answer: every call errors.
    let h = Harness::new(MockLlm::new(), MockLlm::new().always(TECH), None);
    h.seed_post("F1", "iPhone");

    let queued = h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    let run = h.run(queued.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.posts_failed, 1);
    assert!(h.store.products().is_empty());
}

#[tokio::test]
async fn transient_model_errors_are_retried() {
    let extraction = MockLlm::new()
        .fail_transient()
        .always(&answer(vec![product("iPhone 14 Pro", "high")]));
    let h = Harness::new(extraction, MockLlm::new().always(TECH), None);
    h.seed_post("X1", "iPhone 14 Pro");

    let queued = h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    assert_eq!(h.run(queued.run_id).posts_processed, 1);
    assert_eq!(h.extraction.calls(), 2);
}

// ---------------------------------------------------------------------------
// Cancellation and cleanup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_processing_run_abandons_queued_posts() {
    let (store, profile) = seeded_store();
    for i in 0..3 {
        let post = store.add_post(profile.id, &format!("K{i}"), Some("iPhone"));
        store.add_media(post.id, "high-res", "https://cdn.example.com/k.jpg", 0);
    }
    let extraction = Arc::new(MockLlm::new().always(&answer(vec![product("iPhone", "high")])));
    let deps = PipelineDeps::builder()
        .catalog(store.clone())
        .taxonomy(store.clone())
        .runs(store.clone())
        .extraction_llm(extraction.clone())
        .classification_llm(Arc::new(MockLlm::new().always(TECH)))
        .media(Arc::new(MockMediaProcessor::new()))
        .config(test_config())
        .build();
    let (queue, receiver) = JobQueue::new();
    let pipeline = Pipeline::new(deps, queue);

    let queued = pipeline.trigger_processing(profile.id).await.unwrap().started().unwrap();
    let cancelled = pipeline.cancel_run(queued.run_id).await.unwrap();
    assert_eq!(cancelled.status, RunStatus::Cancelled);
    assert!(cancelled.cancel_requested);

    let workers = pipeline.start_workers(receiver);
    pipeline.queue().wait_idle().await;
    workers.shutdown().await;

    assert_eq!(extraction.calls(), 0);
    assert!(store.products().is_empty());
    let run = pipeline.get_run_status(queued.run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_a_full_pipeline_stops_before_the_next_post() {
    let extraction = MockLlm::new()
        .always(&answer(vec![product("iPhone 14 Pro", "high")]))
        .with_delay(Duration::from_millis(100));
    let h = Harness::new(extraction, MockLlm::new().always(TECH), None);
    for i in 0..3 {
        h.seed_post(&format!("S{i}"), "iPhone 14 Pro");
    }

    let started = h
        .pipeline
        .trigger_full_pipeline(h.profile.id)
        .await
        .unwrap()
        .started()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let flagged = h.pipeline.cancel_run(started.run_id).await.unwrap();
    assert!(flagged.cancel_requested);
    h.drain().await;

    let run = h.run(started.run_id);
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(h.store.products().len() < 3);
    assert!(h
        .store
        .runs()
        .iter()
        .filter(|r| r.parent_id == Some(run.id))
        .all(|r| r.status == RunStatus::Cancelled));
}

#[tokio::test]
async fn cancelling_a_finished_run_changes_nothing() {
    let h = Harness::with_extraction(&answer(Vec::new()));
    h.seed_post("D1", "nothing");
    let queued = h.pipeline.trigger_processing(h.profile.id).await.unwrap().started().unwrap();
    h.drain().await;

    let run = h.pipeline.cancel_run(queued.run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(!run.cancel_requested);
}

#[tokio::test]
async fn cleanup_completes_finished_runs_and_fails_stale_ones() {
    let (store, profile) = seeded_store();
    let deps = PipelineDeps::builder()
        .catalog(store.clone())
        .taxonomy(store.clone())
        .runs(store.clone())
        .extraction_llm(Arc::new(MockLlm::new()))
        .classification_llm(Arc::new(MockLlm::new()))
        .media(Arc::new(MockMediaProcessor::new()))
        .config(test_config())
        .build();
    let (queue, _receiver) = JobQueue::new();
    let pipeline = Pipeline::new(deps, queue);

    let finished = store
        .create_run(NewRun::new(RunKind::Processing, profile.id))
        .await
        .unwrap();
    let stale = store
        .create_run(NewRun::new(RunKind::Scrape, profile.id))
        .await
        .unwrap();
    let fresh = store
        .create_run(NewRun::new(RunKind::Scrape, profile.id))
        .await
        .unwrap();
    store.backdate_run(stale.id, Utc::now() - ChronoDuration::hours(3));

    let report = pipeline.cleanup_stale_runs().await.unwrap();
    assert_eq!(report.completed, vec![finished.id]);
    assert_eq!(report.failed, vec![stale.id]);

    let stale = pipeline.get_run_status(stale.id).await.unwrap();
    assert_eq!(stale.status, RunStatus::Failed);
    assert!(stale.error_message.is_some());
    assert_eq!(
        pipeline.get_run_status(fresh.id).await.unwrap().status,
        RunStatus::Running
    );
    assert!(pipeline.cleanup_stale_runs().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn triggers_report_when_there_is_nothing_to_do() {
    let h = Harness::with_extraction(&answer(Vec::new()));

    let scrape = h.pipeline.trigger_scrape(h.profile.id).await.unwrap();
    assert!(matches!(scrape, TriggerOutcome::NotApplicable { .. }));
    let processing = h.pipeline.trigger_processing(h.profile.id).await.unwrap();
    assert!(matches!(processing, TriggerOutcome::NotApplicable { .. }));
    let labeling = h.pipeline.trigger_labeling(h.profile.id).await.unwrap();
    assert!(matches!(labeling, TriggerOutcome::NotApplicable { .. }));
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let h = Harness::with_extraction(&answer(Vec::new()));
    let missing = uuid::Uuid::new_v4();

    assert!(matches!(
        h.pipeline.trigger_full_pipeline(missing).await,
        Err(PipelineError::NotFound(_))
    ));
    assert!(matches!(
        h.pipeline.get_run_status(missing).await,
        Err(PipelineError::NotFound(_))
    ));
    assert!(matches!(
        h.pipeline.cancel_run(missing).await,
        Err(PipelineError::NotFound(_))
    ));
}
