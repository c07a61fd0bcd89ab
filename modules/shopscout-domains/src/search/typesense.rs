use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use shopscout_core::{SearchDocument, SearchIndexer, VectorHit, VectorSearch};

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";
const EMBEDDING_FIELD: &str = "embedding";

/// Typesense adapter for both vector lookup and document upserts.
pub struct TypesenseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TypesenseClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Deserialize)]
struct MultiSearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<SearchHit>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct SearchHit {
    document: serde_json::Value,
    #[serde(default)]
    vector_distance: Option<f32>,
}

#[derive(Deserialize)]
struct ImportLine {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

pub(crate) fn vector_query(vector: &[f32], k: usize) -> String {
    let values: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("{EMBEDDING_FIELD}:([{}], k:{k})", values.join(","))
}

pub(crate) fn to_jsonl(documents: &[SearchDocument]) -> Result<String> {
    let mut body = String::new();
    for doc in documents {
        let mut value = doc.body.clone();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("id".to_string(), json!(doc.id));
        }
        body.push_str(&serde_json::to_string(&value)?);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl VectorSearch for TypesenseClient {
    async fn search(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let body = json!({
            "searches": [{
                "collection": collection,
                "q": "*",
                "vector_query": vector_query(vector, k),
                "exclude_fields": EMBEDDING_FIELD,
            }]
        });

        let resp = self
            .http
            .post(format!("{}/multi_search", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Typesense multi_search request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Typesense search returned {status}: {text}");
        }

        let parsed: MultiSearchResponse = resp.json().await?;
        let Some(result) = parsed.results.into_iter().next() else {
            return Ok(Vec::new());
        };
        if let Some(error) = result.error {
            bail!("Typesense search error: {error}");
        }

        let mut hits: Vec<VectorHit> = result
            .hits
            .into_iter()
            .filter_map(|hit| {
                let id = hit.document.get("id")?.as_str()?.to_string();
                Some(VectorHit {
                    document_id: id,
                    distance: hit.vector_distance.unwrap_or(f32::MAX),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }
}

#[async_trait]
impl SearchIndexer for TypesenseClient {
    async fn upsert(&self, documents: Vec<SearchDocument>) -> Result<()> {
        let mut by_collection: Vec<(String, Vec<SearchDocument>)> = Vec::new();
        for doc in documents {
            match by_collection.iter_mut().find(|(c, _)| *c == doc.collection) {
                Some((_, docs)) => docs.push(doc),
                None => by_collection.push((doc.collection.clone(), vec![doc])),
            }
        }

        for (collection, docs) in by_collection {
            let resp = self
                .http
                .post(format!(
                    "{}/collections/{collection}/documents/import?action=upsert",
                    self.base_url
                ))
                .header(API_KEY_HEADER, &self.api_key)
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(to_jsonl(&docs)?)
                .send()
                .await
                .with_context(|| format!("Typesense import into {collection} failed"))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                bail!("Typesense import into {collection} returned {status}: {text}");
            }

            let text = resp.text().await?;
            let failed: Vec<String> = text
                .lines()
                .filter_map(|line| serde_json::from_str::<ImportLine>(line).ok())
                .filter(|line| !line.success)
                .map(|line| line.error.unwrap_or_default())
                .collect();
            if !failed.is_empty() {
                tracing::warn!(
                    collection = %collection,
                    failed = failed.len(),
                    first_error = %failed[0],
                    "Some documents failed to index"
                );
            } else {
                tracing::debug!(collection = %collection, documents = docs.len(), "Indexed documents");
            }
        }
        Ok(())
    }
}
