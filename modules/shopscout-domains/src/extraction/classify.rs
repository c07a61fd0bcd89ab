use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use ai_client::{
    strip_code_blocks, truncate_to_char_boundary, ImageInput, JsonSchemaSpec, Message,
    StructuredCompletion,
};
use shopscout_core::DomainGroup;

use crate::taxonomy::models::DomainGroupRow;

const MAX_CAPTION_BYTES: usize = 4000;

const CLASSIFY_SYSTEM_PROMPT: &str = "You sort social media sales posts into catalog groups. \
Pick the single group whose description best fits what the post is selling. \
Answer with the group key only.";

#[derive(Deserialize)]
struct ClassificationAnswer {
    group: String,
}

fn build_prompt(candidates: &[(DomainGroup, &str)], caption: Option<&str>) -> String {
    let mut prompt = String::from("Groups:\n");
    for (group, description) in candidates {
        prompt.push_str(&format!("- {}: {}\n", group.as_str(), description));
    }
    match caption {
        Some(caption) => {
            prompt.push_str("\nCaption:\n");
            prompt.push_str(truncate_to_char_boundary(caption, MAX_CAPTION_BYTES));
        }
        None => prompt.push_str("\nThe post has no caption; judge from the image."),
    }
    prompt
}

/// Label a post with one of the configured domain groups.
///
/// Never fails: missing input, no candidates, transport errors and answers
/// outside the candidate set all return `default`.
pub async fn classify(
    llm: &dyn StructuredCompletion,
    groups: &[DomainGroupRow],
    caption: Option<&str>,
    image: Option<ImageInput>,
    default: DomainGroup,
) -> DomainGroup {
    let caption = caption.map(str::trim).filter(|c| !c.is_empty());
    if caption.is_none() && image.is_none() {
        debug!(default = %default, "Nothing to classify, using default group");
        return default;
    }

    let candidates: Vec<(DomainGroup, &str)> = groups
        .iter()
        .filter_map(|row| match row.key.parse::<DomainGroup>() {
            Ok(group) => Some((group, row.description.as_str())),
            Err(_) => {
                warn!(group = %row.key, "Ignoring domain group outside the supported set");
                None
            }
        })
        .collect();
    if candidates.is_empty() {
        warn!(default = %default, "No domain groups configured, using default group");
        return default;
    }

    let keys: Vec<&str> = candidates.iter().map(|(g, _)| g.as_str()).collect();
    let schema = JsonSchemaSpec::new(
        "post_group",
        json!({
            "type": "object",
            "properties": { "group": { "type": "string", "enum": keys } },
            "required": ["group"]
        }),
    );

    let prompt = build_prompt(&candidates, caption);
    let user = match image {
        Some(image) => Message::user_with_images(prompt, vec![image]),
        None => Message::user(prompt),
    };
    let messages = [Message::system(CLASSIFY_SYSTEM_PROMPT), user];

    let raw = match llm.complete(&messages, &schema).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, default = %default, "Classification request failed, using default group");
            return default;
        }
    };

    let answer: ClassificationAnswer = match serde_json::from_str(strip_code_blocks(&raw)) {
        Ok(answer) => answer,
        Err(e) => {
            warn!(error = %e, default = %default, "Unparseable classification answer, using default group");
            return default;
        }
    };

    match candidates
        .iter()
        .find(|(g, _)| g.as_str() == answer.group.trim().to_lowercase())
    {
        Some((group, _)) => *group,
        None => {
            warn!(answer = %answer.group, default = %default, "Classification outside candidate set, using default group");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;

    fn groups() -> Vec<DomainGroupRow> {
        vec![
            DomainGroupRow {
                key: "tech".into(),
                description: "Phones and laptops".into(),
            },
            DomainGroupRow {
                key: "car".into(),
                description: "Cars and parts".into(),
            },
        ]
    }

    #[tokio::test]
    async fn no_input_skips_the_model() {
        let llm = MockLlm::new().respond(r#"{"group":"car"}"#);
        let group = classify(&llm, &groups(), Some("   "), None, DomainGroup::Tech).await;
        assert_eq!(group, DomainGroup::Tech);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn no_candidates_skips_the_model() {
        let llm = MockLlm::new().respond(r#"{"group":"car"}"#);
        let group = classify(&llm, &[], Some("BMW M3"), None, DomainGroup::Tech).await;
        assert_eq!(group, DomainGroup::Tech);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn model_answer_is_used() {
        let llm = MockLlm::new().respond(r#"{"group":"car"}"#);
        let group = classify(&llm, &groups(), Some("BMW M3 2019"), None, DomainGroup::Tech).await;
        assert_eq!(group, DomainGroup::Car);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn image_only_posts_are_classified() {
        let llm = MockLlm::new().respond(r#"{"group":"car"}"#);
        let image = ImageInput::url("https://cdn.example.com/a.jpg");
        let group = classify(&llm, &groups(), None, Some(image), DomainGroup::Tech).await;
        assert_eq!(group, DomainGroup::Car);
        assert_eq!(llm.last_image_count(), 1);
    }

    #[tokio::test]
    async fn failures_degrade_to_default() {
        let out_of_set = MockLlm::new().respond(r#"{"group":"boat"}"#);
        assert_eq!(
            classify(&out_of_set, &groups(), Some("x boat"), None, DomainGroup::Car).await,
            DomainGroup::Car
        );

        let garbage = MockLlm::new().respond("not json");
        assert_eq!(
            classify(&garbage, &groups(), Some("x"), None, DomainGroup::Car).await,
            DomainGroup::Car
        );

        let failing = MockLlm::new().fail_transient();
        assert_eq!(
            classify(&failing, &groups(), Some("x"), None, DomainGroup::Car).await,
            DomainGroup::Car
        );
    }
}
