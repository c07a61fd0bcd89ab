use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use shopscout_core::{RunKind, RunStatus};

/// Progress record for a scrape, processing or full-pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: Uuid,
    pub kind: RunKind,
    pub profile_id: Uuid,
    /// Full-pipeline run that spawned this one.
    pub parent_id: Option<Uuid>,
    pub status: RunStatus,
    pub status_message: Option<String>,
    pub error_message: Option<String>,
    pub posts_fetched: i32,
    pub posts_new: i32,
    pub posts_to_process: i32,
    pub posts_processed: i32,
    pub posts_skipped: i32,
    pub posts_failed: i32,
    pub products_created: i32,
    pub low_confidence_skipped: i32,
    pub cancel_requested: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Run {
    /// Every queued post has reported back.
    pub fn is_done(&self) -> bool {
        self.posts_processed + self.posts_skipped + self.posts_failed >= self.posts_to_process
    }
}

#[derive(Debug, Clone)]
pub struct NewRun {
    pub kind: RunKind,
    pub profile_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub posts_to_process: i32,
    pub status_message: Option<String>,
}

impl NewRun {
    pub fn new(kind: RunKind, profile_id: Uuid) -> Self {
        Self {
            kind,
            profile_id,
            parent_id: None,
            posts_to_process: 0,
            status_message: None,
        }
    }

    pub fn child_of(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn to_process(mut self, posts: i32) -> Self {
        self.posts_to_process = posts;
        self
    }
}

/// Counter deltas applied atomically after one post finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostTally {
    pub processed: i32,
    pub skipped: i32,
    pub failed: i32,
    pub products_created: i32,
    pub low_confidence_skipped: i32,
}

impl PostTally {
    pub fn failed() -> Self {
        Self {
            failed: 1,
            ..Self::default()
        }
    }
}

/// Counters written once a scrape finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeCounts {
    pub fetched: i32,
    pub new: i32,
    pub skipped: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(to_process: i32, processed: i32, skipped: i32, failed: i32) -> Run {
        Run {
            id: Uuid::new_v4(),
            kind: RunKind::Processing,
            profile_id: Uuid::new_v4(),
            parent_id: None,
            status: RunStatus::Running,
            status_message: None,
            error_message: None,
            posts_fetched: 0,
            posts_new: 0,
            posts_to_process: to_process,
            posts_processed: processed,
            posts_skipped: skipped,
            posts_failed: failed,
            products_created: 0,
            low_confidence_skipped: 0,
            cancel_requested: false,
            started_at: Some(Utc::now()),
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn done_counts_every_outcome() {
        assert!(!run(5, 2, 1, 1).is_done());
        assert!(run(5, 2, 2, 1).is_done());
        assert!(run(0, 0, 0, 0).is_done());
    }
}
