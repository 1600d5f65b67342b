// src/analyze/tags.rs
//! Tag enhancement: fixed technology vocabulary plus suffix patterns (`X.js`, `XAPI`, `XDB`).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::FeedItem;

const TECH_VOCABULARY: &[&str] = &[
    "javascript",
    "typescript",
    "python",
    "rust",
    "golang",
    "java",
    "kotlin",
    "swift",
    "react",
    "vue",
    "angular",
    "svelte",
    "docker",
    "kubernetes",
    "terraform",
    "aws",
    "azure",
    "gcp",
    "postgresql",
    "mysql",
    "redis",
    "graphql",
    "webassembly",
    "machine learning",
    "deep learning",
    "llm",
    "openai",
    "blockchain",
    "devops",
    "microservices",
    "serverless",
];

static SUFFIX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b([a-z][a-z0-9]*\.js)\b",
        r"\b([a-z][a-z0-9]*api)\b",
        r"\b([a-z][a-z0-9]*db)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("suffix regex"))
    .collect()
});

fn push_unique(out: &mut Vec<String>, tag: &str) {
    let t = tag.trim().to_lowercase();
    if t.chars().count() <= 1 {
        return;
    }
    if !out.contains(&t) {
        out.push(t);
    }
}

fn contains_word(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + term.len()..].chars().next();
        let boundary = |c: Option<char>| c.map_or(true, |c| !c.is_alphanumeric());
        boundary(before) && boundary(after)
    })
}

/// Tags detected in already lower-cased `text`.
pub fn detect_tags(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for term in TECH_VOCABULARY {
        if contains_word(text, term) {
            push_unique(&mut out, term);
        }
    }
    for re in SUFFIX_PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                push_unique(&mut out, m.as_str());
            }
        }
    }
    out
}

/// Existing tags first, then detected ones; lower-cased, de-duplicated, no 1-char tokens.
pub fn enhance_tags(item: &FeedItem) -> Vec<String> {
    let mut out = Vec::with_capacity(item.tags.len() + 4);
    for t in &item.tags {
        push_unique(&mut out, t);
    }
    for t in detect_tags(&item.searchable_text()) {
        push_unique(&mut out, &t);
    }
    out
}
