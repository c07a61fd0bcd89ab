use std::sync::{Arc, Mutex};

use shopscout_core::{SearchDocument, SearchIndexer};

#[derive(Default)]
struct SyncState {
    suppressed: usize,
    pending: Vec<SearchDocument>,
}

struct Inner {
    indexer: Option<Arc<dyn SearchIndexer>>,
    state: Mutex<SyncState>,
}

/// Writes catalog changes to the search index.
///
/// While at least one [`SyncGuard`] is alive documents are buffered instead of
/// sent. Releasing the last guard flushes the buffer, so index writes never
/// run inside a reconciliation and the index catches up afterwards.
#[derive(Clone)]
pub struct SearchSync {
    inner: Arc<Inner>,
}

impl SearchSync {
    pub fn new(indexer: Option<Arc<dyn SearchIndexer>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                indexer,
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    /// A sync that drops every document.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SyncState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Buffer index writes until the returned guard is released.
    pub fn suppress(&self) -> SyncGuard {
        self.state().suppressed += 1;
        SyncGuard {
            sync: self.clone(),
            released: false,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.state().suppressed > 0
    }

    pub fn pending(&self) -> usize {
        self.state().pending.len()
    }

    /// Index `document` now, or buffer it while suppressed.
    pub async fn record(&self, document: SearchDocument) {
        if self.inner.indexer.is_none() {
            return;
        }
        {
            let mut state = self.state();
            if state.suppressed > 0 {
                state.pending.push(document);
                return;
            }
        }
        self.send(vec![document]).await;
    }

    /// Decrement the suppression depth; hand back the buffer when it reaches zero.
    fn release(&self) -> Vec<SearchDocument> {
        let mut state = self.state();
        state.suppressed = state.suppressed.saturating_sub(1);
        if state.suppressed == 0 {
            std::mem::take(&mut state.pending)
        } else {
            Vec::new()
        }
    }

    async fn send(&self, documents: Vec<SearchDocument>) {
        let Some(indexer) = &self.inner.indexer else {
            return;
        };
        if documents.is_empty() {
            return;
        }
        let count = documents.len();
        if let Err(e) = indexer.upsert(dedupe(documents)).await {
            tracing::warn!(error = %e, documents = count, "Search index sync failed");
        }
    }
}

/// Keep the last write per (collection, id).
fn dedupe(documents: Vec<SearchDocument>) -> Vec<SearchDocument> {
    let mut out: Vec<SearchDocument> = Vec::with_capacity(documents.len());
    for doc in documents {
        match out
            .iter_mut()
            .find(|d| d.collection == doc.collection && d.id == doc.id)
        {
            Some(existing) => *existing = doc,
            None => out.push(doc),
        }
    }
    out
}

/// Scope during which index writes are buffered.
pub struct SyncGuard {
    sync: SearchSync,
    released: bool,
}

impl SyncGuard {
    /// Release the guard and wait for the flush.
    pub async fn flush(mut self) {
        self.released = true;
        let documents = self.sync.release();
        self.sync.send(documents).await;
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let documents = self.sync.release();
        if documents.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sync = self.sync.clone();
                handle.spawn(async move { sync.send(documents).await });
            }
            Err(_) => {
                tracing::warn!(
                    documents = documents.len(),
                    "Search sync guard dropped outside a runtime, documents discarded"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingIndexer;
    use serde_json::json;

    fn doc(id: &str, name: &str) -> SearchDocument {
        SearchDocument {
            collection: "products".to_string(),
            id: id.to_string(),
            body: json!({ "name": name }),
        }
    }

    #[tokio::test]
    async fn unsuppressed_writes_go_straight_through() {
        let indexer = Arc::new(RecordingIndexer::new());
        let sync = SearchSync::new(Some(indexer.clone()));
        sync.record(doc("1", "a")).await;
        assert_eq!(indexer.documents().len(), 1);
    }

    #[tokio::test]
    async fn nested_guards_flush_once_when_the_last_is_released() {
        let indexer = Arc::new(RecordingIndexer::new());
        let sync = SearchSync::new(Some(indexer.clone()));

        let outer = sync.suppress();
        let inner = sync.suppress();
        sync.record(doc("1", "first")).await;
        sync.record(doc("1", "second")).await;
        sync.record(doc("2", "other")).await;

        inner.flush().await;
        assert!(indexer.documents().is_empty());
        assert!(sync.is_suppressed());

        outer.flush().await;
        let sent = indexer.documents();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body["name"], "second");
        assert_eq!(indexer.batches(), 1);
        assert!(!sync.is_suppressed());
    }

    #[tokio::test]
    async fn dropped_guard_flushes_in_the_background() {
        let indexer = Arc::new(RecordingIndexer::new());
        let sync = SearchSync::new(Some(indexer.clone()));
        {
            let _guard = sync.suppress();
            sync.record(doc("1", "a")).await;
        }
        for _ in 0..50 {
            if !indexer.documents().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(indexer.documents().len(), 1);
        assert_eq!(sync.pending(), 0);
    }

    #[tokio::test]
    async fn index_failures_are_swallowed() {
        let indexer = Arc::new(RecordingIndexer::failing());
        let sync = SearchSync::new(Some(indexer.clone()));
        sync.record(doc("1", "a")).await;
        assert!(indexer.documents().is_empty());
    }
}
