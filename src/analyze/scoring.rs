// src/analyze/scoring.rs
//! Keyword relevance scoring against a profile's tiered keyword lists.

use crate::model::{FeedItem, ProfileKeywords};

pub const HIGH_WEIGHT: f32 = 3.0;
pub const MEDIUM_WEIGHT: f32 = 1.0;
pub const LOW_WEIGHT: f32 = 0.5;
/// Raw points are divided by this before clamping to [0,1].
pub const NORMALIZER: f32 = 10.0;

/// Result of relevance evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Relevance {
    pub score: f32,
    pub matched: Vec<String>,
    pub reasons: Vec<String>,
}

fn occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

fn round3(x: f32) -> f32 {
    (x * 1000.0).round() / 1000.0
}

/// First exclude/require rule that `text` (already lower-cased) violates, if any.
pub fn filter_violation(text: &str, keywords: &ProfileKeywords) -> Option<String> {
    for ex in &keywords.filter.exclude {
        let ex = ex.trim().to_lowercase();
        if !ex.is_empty() && text.contains(&ex) {
            return Some(format!("excluded:{ex}"));
        }
    }
    for req in &keywords.filter.require {
        let req = req.trim().to_lowercase();
        if !req.is_empty() && !text.contains(&req) {
            return Some(format!("missing_required:{req}"));
        }
    }
    None
}

/// Score `text` (already lower-cased) and explain which keywords contributed.
///
/// Any exclude hit or any missing require keyword neutralizes the score to 0.
pub fn explain_text(text: &str, keywords: &ProfileKeywords) -> Relevance {
    let mut rel = Relevance::default();

    if let Some(reason) = filter_violation(text, keywords) {
        rel.reasons.push(reason);
        return rel;
    }

    let tiers: [(&[String], f32); 3] = [
        (&keywords.boost.high, HIGH_WEIGHT),
        (&keywords.boost.medium, MEDIUM_WEIGHT),
        (&keywords.boost.low, LOW_WEIGHT),
    ];
    let mut points = 0.0f32;
    for (list, weight) in tiers {
        for kw in list {
            let kw = kw.trim().to_lowercase();
            let n = occurrences(text, &kw);
            if n > 0 {
                points += weight * n as f32;
                rel.matched.push(kw);
            }
        }
    }

    rel.score = round3((points / NORMALIZER).clamp(0.0, 1.0));
    rel.reasons.push(format!("points:{points:.1}"));
    rel
}

pub fn explain_relevance(item: &FeedItem, keywords: &ProfileKeywords) -> Relevance {
    explain_text(&item.searchable_text(), keywords)
}

/// Relevance in [0,1], rounded to 3 decimals.
pub fn calculate_relevance_score(item: &FeedItem, keywords: &ProfileKeywords) -> f32 {
    explain_relevance(item, keywords).score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoostKeywords, FilterKeywords, SourceKind};

    fn kw(high: &[&str], medium: &[&str], low: &[&str]) -> ProfileKeywords {
        let v = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        ProfileKeywords {
            boost: BoostKeywords {
                high: v(high),
                medium: v(medium),
                low: v(low),
            },
            filter: FilterKeywords::default(),
        }
    }

    fn item(title: &str, content: &str) -> FeedItem {
        FeedItem::new("id", title, content, "u", SourceKind::Syndication, "s")
    }

    #[test]
    fn tiers_accumulate_and_normalize() {
        let k = kw(&["rust"], &["async"], &["tokio"]);
        // rust x2 (6) + async x1 (1) + tokio x1 (0.5) = 7.5 -> 0.75
        let it = item("Rust async", "rust with tokio");
        assert_eq!(calculate_relevance_score(&it, &k), 0.75);
    }

    #[test]
    fn clamps_at_one() {
        let k = kw(&["ai"], &[], &[]);
        let it = item("ai ai ai", "ai ai");
        assert_eq!(calculate_relevance_score(&it, &k), 1.0);
    }

    #[test]
    fn exclude_neutralizes() {
        let mut k = kw(&["rust"], &[], &[]);
        k.filter.exclude = vec!["Crypto".into()];
        let r = explain_relevance(&item("Rust crypto wallet", ""), &k);
        assert_eq!(r.score, 0.0);
        assert!(r.reasons.iter().any(|s| s == "excluded:crypto"));
    }

    #[test]
    fn all_required_keywords_must_be_present() {
        let mut k = kw(&["product"], &[], &[]);
        k.filter.require = vec!["ai".into(), "product".into()];
        assert_eq!(
            calculate_relevance_score(&item("Product development", "roadmaps"), &k),
            0.0
        );
        assert!(calculate_relevance_score(&item("AI product development", ""), &k) > 0.0);
    }

    #[test]
    fn rounds_to_three_decimals() {
        let k = kw(&[], &[], &["x"]);
        // 0.5 / 10 = 0.05
        assert_eq!(calculate_relevance_score(&item("x", ""), &k), 0.05);
    }
}
