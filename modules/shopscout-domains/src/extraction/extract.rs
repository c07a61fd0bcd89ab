use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use ai_client::{
    strip_code_blocks, truncate_to_char_boundary, AiError, ImageInput, Message,
    StructuredCompletion,
};
use shopscout_core::{DomainGroup, PipelineError};

use super::schema::{conditions, SchemaCatalog};
use super::types::ExtractionOutput;

const MAX_CAPTION_BYTES: usize = 8000;

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract sellable products from social media sales posts.

Each image is preceded by its label (image_1, image_2, ...). For every distinct product offered for sale:
- Use only facts visible in the images or stated in the caption. Leave a field null rather than guessing.
- `name` is the model name without the brand.
- `source` lists the labels of every image showing the product.
- `categories` holds at most two catalog categories, most specific first.
- `price` and `discount_price` are plain numbers; use discount_price only when a reduced price is advertised.
- `confidence` says how sure you are that this is a real product for sale with correct details.

If the post sells nothing (memes, announcements, lifestyle shots), set has_products to false and return no products."#;

/// Parsed extraction plus the label to media id mapping used to build it.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub output: ExtractionOutput,
    pub image_map: BTreeMap<String, Uuid>,
}

impl Extraction {
    /// Media ids for the labels, in label order, unknown labels dropped.
    pub fn media_for(&self, labels: &[String]) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for label in labels {
            if let Some(id) = self.image_map.get(label.trim()) {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
        }
        ids
    }
}

pub fn source_label(index: usize) -> String {
    format!("image_{}", index + 1)
}

fn user_prompt(group: DomainGroup, caption: Option<&str>, labels: &[String]) -> String {
    let mut prompt = format!(
        "Catalog group: {}\nAllowed conditions: {}\nImages: {}\n",
        group.as_str(),
        conditions(group).join(", "),
        labels.join(", ")
    );
    match caption {
        Some(caption) => {
            prompt.push_str("\nCaption:\n");
            prompt.push_str(truncate_to_char_boundary(caption, MAX_CAPTION_BYTES));
        }
        None => prompt.push_str("\nThe post has no caption."),
    }
    prompt
}

fn build_messages(prompt: String, labels: &[String], images: Vec<ImageInput>) -> Vec<Message> {
    let mut messages = vec![Message::system(EXTRACTION_SYSTEM_PROMPT), Message::user(prompt)];
    for (label, image) in labels.iter().zip(images) {
        messages.push(Message::user_with_images(label.clone(), vec![image]));
    }
    messages
}

/// One extraction call with bounded retries on transient and parse failures.
///
/// Images are labelled `image_1..image_N` in the order given. No persistence
/// happens here.
pub async fn extract(
    llm: &dyn StructuredCompletion,
    catalog: &SchemaCatalog,
    images: Vec<(Uuid, ImageInput)>,
    caption: Option<&str>,
    group: DomainGroup,
    max_retries: u32,
    backoff: Duration,
) -> Result<Extraction, PipelineError> {
    if images.is_empty() {
        return Err(PipelineError::Validation(
            "extraction needs at least one image".to_string(),
        ));
    }

    let mut labels = Vec::with_capacity(images.len());
    let mut image_map = BTreeMap::new();
    let mut inputs = Vec::with_capacity(images.len());
    for (index, (media_id, image)) in images.into_iter().enumerate() {
        let label = source_label(index);
        image_map.insert(label.clone(), media_id);
        labels.push(label);
        inputs.push(image);
    }

    let schema = catalog.build_for(group, &labels);
    let caption = caption.map(str::trim).filter(|c| !c.is_empty());
    let messages = build_messages(user_prompt(group, caption, &labels), &labels, inputs);

    let attempts = max_retries.max(1);
    let mut last_error: Option<PipelineError> = None;

    for attempt in 1..=attempts {
        debug!(attempt, group = %group, images = labels.len(), model = llm.model(), "Extraction request");

        let error = match llm.complete(&messages, &schema.spec).await {
            Ok(raw) => match serde_json::from_str::<ExtractionOutput>(strip_code_blocks(&raw)) {
                Ok(output) => {
                    info!(
                        attempt,
                        group = %group,
                        has_products = output.has_products,
                        products = output.products.len(),
                        "Extraction complete"
                    );
                    return Ok(Extraction { output, image_map });
                }
                Err(e) => PipelineError::Parse(e.to_string()),
            },
            Err(e) if e.is_transient() => PipelineError::Llm(e.to_string()),
            Err(e) => return Err(permanent(e)),
        };

        warn!(attempt, max_attempts = attempts, error = %error, "Extraction attempt failed");
        last_error = Some(error);
        if attempt < attempts {
            tokio::time::sleep(backoff).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        PipelineError::Extraction("extraction failed after retries".to_string())
    }))
}

fn permanent(error: AiError) -> PipelineError {
    match error {
        AiError::Refusal(reason) => PipelineError::Extraction(format!("model refused: {reason}")),
        other => PipelineError::Llm(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;

    const ONE_PRODUCT: &str = r#"{"has_products":true,"post_type":"phone","products":[{"brand":"Apple","name":"iPhone 14 Pro","type":"phone","categories":["Phones"],"price":800,"discount_price":null,"currency":"USD","condition":"used","attributes":{"storage":"256GB"},"product_details":null,"source":["image_2","image_9"],"confidence":"high"}]}"#;

    fn image(n: u8) -> (Uuid, ImageInput) {
        (
            Uuid::new_v4(),
            ImageInput::url(format!("https://cdn.example.com/{n}.jpg")),
        )
    }

    #[tokio::test]
    async fn no_images_is_a_validation_error() {
        let llm = MockLlm::new().respond(ONE_PRODUCT);
        let err = extract(&llm, &SchemaCatalog::default(), vec![], Some("x"), DomainGroup::Tech, 3, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(!err.is_retryable());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn labels_map_back_to_media_ids() {
        let llm = MockLlm::new().respond(ONE_PRODUCT);
        let images = vec![image(1), image(2)];
        let second = images[1].0;

        let extraction = extract(&llm, &SchemaCatalog::default(), images, None, DomainGroup::Tech, 3, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(extraction.image_map.len(), 2);
        let product = &extraction.output.products[0];
        assert_eq!(extraction.media_for(&product.source), vec![second]);
        assert_eq!(llm.last_image_count(), 2);
    }

    #[tokio::test]
    async fn transient_and_parse_failures_are_retried() {
        let llm = MockLlm::new()
            .fail_transient()
            .respond("{not json")
            .respond(ONE_PRODUCT);
        let extraction = extract(&llm, &SchemaCatalog::default(), vec![image(1)], None, DomainGroup::Tech, 3, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(llm.calls(), 3);
        assert_eq!(extraction.output.products.len(), 1);
    }

    #[tokio::test]
    async fn last_error_surfaces_after_retries() {
        let llm = MockLlm::new()
            .fail_transient()
            .fail_transient()
            .respond("[]");
        let err = extract(&llm, &SchemaCatalog::default(), vec![image(1)], None, DomainGroup::Car, 3, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_errors_stop_immediately() {
        let llm = MockLlm::new().fail_permanent().respond(ONE_PRODUCT);
        let err = extract(&llm, &SchemaCatalog::default(), vec![image(1)], None, DomainGroup::Tech, 3, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
        assert_eq!(llm.calls(), 1);
    }
}
