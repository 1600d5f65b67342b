// src/ai/prompts.rs
//! Prompt construction for each AI capability.

use crate::ai::provider::AiRequest;
use crate::model::FeedItem;

/// Item text sent to the provider is capped at this many characters.
pub const MAX_CONTENT_CHARS: usize = 4000;

const SUMMARY_PROMPT: &str = "You summarize technology news for a busy reader. \
Respond with ONE JSON object and nothing else: \
{\"summary\": string (2-3 sentences), \"keyPoints\": [string], \"tags\": [string], \
\"insights\": [string], \"confidence\": number between 0 and 1}.";

const TAGS_PROMPT: &str = "Extract 3 to 8 short lower-case topic tags for the article. \
Respond with a JSON object {\"tags\": [string]}.";

const INSIGHTS_PROMPT: &str = "List up to 3 non-obvious insights or implications of the article \
for a practitioner. Respond with a JSON object {\"insights\": [string]}.";

const RELEVANCE_PROMPT: &str = "Rate how relevant the article is to the reader interest described \
below, from 0.0 (unrelated) to 1.0 (exactly on topic). Respond with the number only.";

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

/// Title, source and body in the layout every prompt expects.
pub fn item_content(item: &FeedItem) -> String {
    let mut s = format!("Title: {}\nSource: {}\n", item.title, item.url);
    if !item.tags.is_empty() {
        s.push_str(&format!("Tags: {}\n", item.tags.join(", ")));
    }
    s.push('\n');
    s.push_str(&truncate_chars(&item.content, MAX_CONTENT_CHARS));
    s
}

pub fn summary_request(item: &FeedItem) -> AiRequest {
    AiRequest {
        prompt: SUMMARY_PROMPT.to_string(),
        content: item_content(item),
        max_tokens: 400,
        temperature: 0.3,
    }
}

pub fn tags_request(item: &FeedItem) -> AiRequest {
    AiRequest {
        prompt: TAGS_PROMPT.to_string(),
        content: item_content(item),
        max_tokens: 100,
        temperature: 0.2,
    }
}

pub fn insights_request(item: &FeedItem) -> AiRequest {
    AiRequest {
        prompt: INSIGHTS_PROMPT.to_string(),
        content: item_content(item),
        max_tokens: 250,
        temperature: 0.4,
    }
}

pub fn relevance_request(item: &FeedItem, profile_description: &str) -> AiRequest {
    AiRequest {
        prompt: format!("{RELEVANCE_PROMPT}\n\nReader interest: {}", profile_description.trim()),
        content: item_content(item),
        max_tokens: 10,
        temperature: 0.0,
    }
}

pub fn probe_request() -> AiRequest {
    AiRequest {
        prompt: "Reply with OK.".to_string(),
        content: "ping".to_string(),
        max_tokens: 5,
        temperature: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;

    #[test]
    fn long_content_is_truncated() {
        let body = "x".repeat(MAX_CONTENT_CHARS + 50);
        let it = FeedItem::new("1", "T", body, "https://u", SourceKind::Syndication, "s");
        let c = item_content(&it);
        assert!(c.ends_with("..."));
        assert!(c.chars().count() < MAX_CONTENT_CHARS + 100);
    }

    #[test]
    fn relevance_prompt_carries_profile_description() {
        let it = FeedItem::new("1", "T", "b", "u", SourceKind::Syndication, "s");
        let req = relevance_request(&it, "  Rust systems programming ");
        assert!(req.prompt.ends_with("Reader interest: Rust systems programming"));
    }
}
