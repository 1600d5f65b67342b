// src/ai/parse.rs
//! Structured-response parsing with plain-text fallbacks.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::model::ContentSummary;

/// Confidence assigned when the response had no parsable JSON.
pub const FALLBACK_CONFIDENCE: f32 = 0.3;
/// Relevance when the response contains no number.
pub const DEFAULT_RELEVANCE: f32 = 0.5;

static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").expect("number regex"));

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSummary {
    summary: Option<String>,
    key_points: Vec<String>,
    tags: Vec<String>,
    insights: Vec<String>,
    confidence: Option<f32>,
}

/// First balanced `{ ... }` block in `text`, honouring string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if in_str {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// JSON summary object, or the raw text as summary with confidence 0.3.
pub fn parse_summary(text: &str) -> ContentSummary {
    let parsed = extract_json_object(text)
        .and_then(|json| serde_json::from_str::<RawSummary>(json).ok())
        .filter(|raw| raw.summary.as_deref().is_some_and(|s| !s.trim().is_empty()));

    match parsed {
        Some(raw) => ContentSummary {
            summary: raw.summary.unwrap_or_default().trim().to_string(),
            key_points: clean_list(raw.key_points),
            tags: clean_list(raw.tags)
                .into_iter()
                .map(|t| t.to_lowercase())
                .collect(),
            insights: clean_list(raw.insights),
            confidence: raw.confidence.unwrap_or(FALLBACK_CONFIDENCE).clamp(0.0, 1.0),
            processing_time_ms: 0,
        },
        None => ContentSummary {
            summary: text.trim().to_string(),
            key_points: Vec::new(),
            tags: Vec::new(),
            insights: Vec::new(),
            confidence: FALLBACK_CONFIDENCE,
            processing_time_ms: 0,
        },
    }
}

fn parse_list_field(text: &str, field: &str) -> Option<Vec<String>> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<Vec<String>>(trimmed) {
            return Some(clean_list(v));
        }
    }
    let json = extract_json_object(text)?;
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let arr = value.get(field)?.as_array()?;
    Some(clean_list(
        arr.iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
    ))
}

/// `{"tags": [...]}` / `[...]`, else comma/newline separated words.
pub fn parse_tags(text: &str) -> Vec<String> {
    let raw = parse_list_field(text, "tags").unwrap_or_else(|| {
        text.split([',', '\n'])
            .map(|s| s.trim_matches(|c: char| c == '-' || c == '*' || c == '#' || c.is_whitespace()))
            .map(str::to_string)
            .collect()
    });
    let mut out: Vec<String> = Vec::new();
    for t in clean_list(raw) {
        let t = t.to_lowercase();
        if t.chars().count() > 1 && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

/// `{"insights": [...]}` / `[...]`, else one insight per non-empty line.
pub fn parse_insights(text: &str) -> Vec<String> {
    parse_list_field(text, "insights").unwrap_or_else(|| {
        clean_list(
            text.lines()
                .map(|l| l.trim_start_matches(|c: char| c == '-' || c == '*' || c.is_whitespace()))
                .map(str::to_string)
                .collect(),
        )
    })
}

/// First decimal number in `text`, clamped to [0,1]; 0.5 when absent.
pub fn parse_relevance(text: &str) -> f32 {
    RE_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .map(|v| v.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_RELEVANCE)
}
