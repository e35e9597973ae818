//! Keyword search over stored values interpreted as text.
//!
//! Scoring is plain token overlap: each query-token occurrence shared with a
//! document counts once, repeated matches count multiple times, order is
//! ignored. Candidates with a zero score are dropped.

use crate::search::SearchResult;
use std::collections::HashMap;

/// Lowercase `text` and split on non-alphanumeric boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Score every stored value against `query`, keep positive scores, sort
/// descending (stable, so ties keep scan order), truncate to `k`.
///
/// Values are interpreted as UTF-8 text; undecodable bytes are replaced and
/// simply fail to match.
pub fn keyword_search(
    data: &HashMap<String, Vec<u8>>,
    query: &str,
    k: usize,
) -> Vec<SearchResult> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut results = Vec::new();
    for (key, value) in data {
        let text = String::from_utf8_lossy(value);
        let doc_tokens = tokenize(&text);

        let mut score = 0u32;
        for qt in &query_tokens {
            score += doc_tokens.iter().filter(|dt| *dt == qt).count() as u32;
        }

        if score > 0 {
            results.push(SearchResult {
                key: key.clone(),
                score: score as f32,
            });
        }
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(entries: &[(&str, &str)]) -> HashMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Hello, World-42!"),
            vec!["hello", "world", "42"]
        );
        assert!(tokenize("--- ---").is_empty());
    }

    #[test]
    fn repeated_matches_count_multiple_times() {
        let data = dataset(&[("a", "cat cat dog"), ("b", "cat")]);
        let hits = keyword_search(&data, "cat", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, "a");
        assert_eq!(hits[0].score, 2.0);
        assert_eq!(hits[1].score, 1.0);
    }

    #[test]
    fn zero_score_candidates_are_dropped() {
        let data = dataset(&[("a", "apples only"), ("b", "bananas only")]);
        let hits = keyword_search(&data, "apples", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "a");
    }

    #[test]
    fn matching_is_case_insensitive_and_order_insensitive() {
        let data = dataset(&[("a", "Quick Brown FOX")]);
        let hits = keyword_search(&data, "fox quick", 10);
        assert_eq!(hits[0].score, 2.0);
    }

    #[test]
    fn empty_query_matches_nothing() {
        let data = dataset(&[("a", "anything")]);
        assert!(keyword_search(&data, "", 10).is_empty());
        assert!(keyword_search(&data, "!!!", 10).is_empty());
    }

    #[test]
    fn truncates_to_k() {
        let data = dataset(&[("a", "x"), ("b", "x"), ("c", "x")]);
        assert_eq!(keyword_search(&data, "x", 2).len(), 2);
    }
}
