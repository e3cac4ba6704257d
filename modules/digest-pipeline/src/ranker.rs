//! Topic merger and ranker.
//!
//! Filters citations down to the valid ones, folds backend B's topics into
//! backend A's by title containment, scores, and keeps the top N.

use std::collections::HashSet;

use tracing::{debug, info};

use digest_common::Topic;

use crate::verifier::{is_valid_url, ValidityMap};

/// Base score every surviving topic starts from.
pub const BASE_SCORE: f64 = 100.0;
/// Added per valid citation.
pub const CITATION_WEIGHT: f64 = 10.0;
/// Cap on the content-depth bonus.
pub const MAX_DEPTH_BONUS: f64 = 50.0;

/// Drop invalid and repeated citations (first occurrence wins), then topics
/// left with none.
pub fn filter_valid(topics: Vec<Topic>, validity: &ValidityMap) -> Vec<Topic> {
    topics
        .into_iter()
        .filter_map(|mut topic| {
            let before = topic.citations.len();
            let mut seen = HashSet::new();
            topic
                .citations
                .retain(|c| is_valid_url(validity, c.url()) && seen.insert(c.url().to_string()));
            if topic.citations.is_empty() {
                debug!(title = topic.title.as_str(), before, "Dropped topic with no valid citations");
                None
            } else {
                Some(topic)
            }
        })
        .collect()
}

/// Case-insensitive containment in either direction.
pub fn titles_match(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

/// Fold `incoming` into `target`: union citations by URL, fill empty
/// rationale fields and missing social evidence. Never overwrites.
pub fn merge_topic(target: &mut Topic, incoming: &Topic) {
    let mut seen: HashSet<String> = target.citations.iter().map(|c| c.url().to_string()).collect();
    for citation in &incoming.citations {
        if seen.insert(citation.url().to_string()) {
            target.citations.push(citation.clone());
        }
    }

    fill_if_empty(&mut target.viral_reason, &incoming.viral_reason);
    fill_if_empty(&mut target.value_reason, &incoming.value_reason);
    fill_if_empty(&mut target.insights, &incoming.insights);

    if !target.has_social_evidence() && incoming.has_social_evidence() {
        target.related_posts = incoming.related_posts.clone();
        target.related_hashtags = incoming.related_hashtags.clone();
        target.social_impact_score = incoming.social_impact_score;
    }
}

fn fill_if_empty(field: &mut String, incoming: &str) {
    if field.trim().is_empty() && !incoming.trim().is_empty() {
        *field = incoming.to_string();
    }
}

/// `100 + 10 * citations + social + min(50, content_len / 100)`
pub fn overall_score(topic: &Topic) -> f64 {
    let depth = (topic.content_length() as f64 / 100.0).min(MAX_DEPTH_BONUS);
    BASE_SCORE + CITATION_WEIGHT * topic.citations.len() as f64 + topic.social_impact_score + depth
}

/// Filter, merge, score and rank both backends' topics. Returns at most `n`.
pub fn merge_and_rank(
    topics_a: Vec<Topic>,
    topics_b: Vec<Topic>,
    validity: &ValidityMap,
    n: usize,
) -> Vec<Topic> {
    let mut merged = filter_valid(topics_a, validity);
    let from_a = merged.len();
    let filtered_b = filter_valid(topics_b, validity);
    let from_b = filtered_b.len();

    let mut folded = 0;
    for topic in filtered_b {
        // only backend A's topics absorb; B never folds into B
        match merged[..from_a].iter_mut().find(|t| titles_match(&t.title, &topic.title)) {
            Some(existing) => {
                debug!(
                    into = existing.title.as_str(),
                    from = topic.title.as_str(),
                    "Merged topic"
                );
                merge_topic(existing, &topic);
                folded += 1;
            }
            None => merged.push(topic),
        }
    }

    for topic in merged.iter_mut() {
        topic.overall_score = overall_score(topic);
    }
    // stable: equal scores keep merge order
    merged.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
    let candidates = merged.len();
    merged.truncate(n);

    info!(
        from_a,
        from_b,
        folded,
        candidates,
        kept = merged.len(),
        "Ranked topics"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::CitationCheck;
    use digest_common::{BackendId, Citation};

    const VALID: CitationCheck = CitationCheck {
        accessible: true,
        trusted: true,
        future_dated: false,
    };
    const FUTURE: CitationCheck = CitationCheck {
        accessible: false,
        trusted: true,
        future_dated: true,
    };

    fn topic(title: &str, urls: &[&str], source: BackendId) -> Topic {
        Topic::new(
            title,
            "",
            "",
            "",
            "",
            urls.iter().map(|u| Citation::from_link("link", *u)).collect(),
            source,
        )
    }

    fn validity(valid: &[&str]) -> ValidityMap {
        valid.iter().map(|u| (u.to_string(), VALID)).collect()
    }

    // --- filter ---

    #[test]
    fn invalid_citations_are_removed() {
        let t = topic("T", &["https://a.com/1", "https://a.com/2"], BackendId::BackendA);
        let out = filter_valid(vec![t], &validity(&["https://a.com/2"]));
        assert_eq!(out[0].citations.len(), 1);
        assert_eq!(out[0].citations[0].url(), "https://a.com/2");
    }

    #[test]
    fn repeated_citation_counts_once() {
        let t = topic("T", &["https://a.com/1", "https://a.com/1"], BackendId::BackendA);
        let ranked = merge_and_rank(vec![t], vec![], &validity(&["https://a.com/1"]), 5);
        assert_eq!(ranked[0].citations.len(), 1);
        assert_eq!(ranked[0].overall_score, 110.0);
    }

    #[test]
    fn topic_without_valid_citations_is_dropped() {
        let t = topic("T", &["https://a.com/1"], BackendId::BackendA);
        assert!(filter_valid(vec![t], &ValidityMap::new()).is_empty());
    }

    #[test]
    fn all_future_dated_topic_never_reaches_the_digest() {
        let urls = ["https://reuters.com/2031/a", "https://reuters.com/2031/b"];
        let t = topic("Fabricated", &urls, BackendId::BackendA);
        let map: ValidityMap = urls.iter().map(|u| (u.to_string(), FUTURE)).collect();
        assert!(merge_and_rank(vec![t], vec![], &map, 5).is_empty());
    }

    // --- scoring ---

    #[test]
    fn each_valid_citation_adds_ten() {
        let one = topic("T", &["https://a.com/1"], BackendId::BackendA);
        let two = topic("T", &["https://a.com/1", "https://a.com/2"], BackendId::BackendA);
        assert_eq!(overall_score(&two) - overall_score(&one), CITATION_WEIGHT);
    }

    #[test]
    fn depth_bonus_is_fractional_and_capped_at_fifty() {
        let mut t = topic("T", &[], BackendId::BackendA);
        t.summary = "x".repeat(250);
        assert_eq!(overall_score(&t), 102.5);
        t.summary = "x".repeat(20_000);
        assert_eq!(overall_score(&t), 150.0);
    }

    #[test]
    fn partial_hundreds_count_toward_depth() {
        let mut t = topic("T", &["https://a.com/1"], BackendId::BackendA);
        t.summary = "x".repeat(250);
        assert_eq!(overall_score(&t), 112.5);
    }

    #[test]
    fn social_impact_adds_directly() {
        let mut t = topic("T", &["https://a.com/1"], BackendId::BackendA);
        t.social_impact_score = 12.5;
        assert_eq!(overall_score(&t), 122.5);
    }

    // --- merge ---

    #[test]
    fn titles_match_either_direction_case_insensitively() {
        assert!(titles_match("OpenAI Releases Model X", "openai releases model x"));
        assert!(titles_match("Model X", "OpenAI Releases Model X"));
        assert!(titles_match("OpenAI Releases Model X", "model x"));
        assert!(!titles_match("Gemini 3", "Model X"));
    }

    #[test]
    fn merge_unions_citations_and_fills_empty_fields() {
        let mut a = topic("Model X", &["https://a.com/1", "https://a.com/2"], BackendId::BackendA);
        a.value_reason = "kept".into();
        let mut b = topic("Model X", &["https://a.com/2", "https://a.com/3"], BackendId::BackendB);
        b.viral_reason = "trending".into();
        b.value_reason = "ignored".into();

        merge_topic(&mut a, &b);

        let urls: Vec<&str> = a.citations.iter().map(|c| c.url()).collect();
        assert_eq!(urls, vec!["https://a.com/1", "https://a.com/2", "https://a.com/3"]);
        assert_eq!(a.viral_reason, "trending");
        assert_eq!(a.value_reason, "kept");
        assert_eq!(a.source, BackendId::BackendA);
    }

    #[test]
    fn merging_the_same_topic_twice_changes_nothing_more() {
        let mut once = topic("Model X", &["https://a.com/1"], BackendId::BackendA);
        let b = topic("Model X", &["https://a.com/2"], BackendId::BackendB);
        merge_topic(&mut once, &b);
        let mut twice = once.clone();
        merge_topic(&mut twice, &b);
        assert_eq!(once, twice);
    }

    #[test]
    fn openai_release_scenario_merges_into_one_topic() {
        let a = topic(
            "OpenAI Releases Model X",
            &["https://openai.com/x", "https://reuters.com/x"],
            BackendId::BackendA,
        );
        let b = topic(
            "openai releases model x",
            &["https://reuters.com/x", "https://theverge.com/x", "https://arxiv.org/x"],
            BackendId::BackendB,
        );
        let map = validity(&[
            "https://openai.com/x",
            "https://reuters.com/x",
            "https://theverge.com/x",
            "https://arxiv.org/x",
        ]);

        let ranked = merge_and_rank(vec![a], vec![b], &map, 5);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].title, "OpenAI Releases Model X");
        assert_eq!(ranked[0].citations.len(), 4);
        // 100 + 4*10, no write-up so no depth bonus
        assert_eq!(ranked[0].overall_score, 140.0);
    }

    #[test]
    fn unmatched_b_topics_are_appended() {
        let a = topic("Model X", &["https://a.com/1"], BackendId::BackendA);
        let b = topic("Chip shortage", &["https://a.com/2"], BackendId::BackendB);
        let map = validity(&["https://a.com/1", "https://a.com/2"]);
        let ranked = merge_and_rank(vec![a], vec![b], &map, 5);
        assert_eq!(ranked.len(), 2);
        // equal scores keep A first
        assert_eq!(ranked[0].source, BackendId::BackendA);
        assert_eq!(ranked[1].source, BackendId::BackendB);
    }

    #[test]
    fn b_topics_never_fold_into_each_other() {
        let b1 = topic("Model X", &["https://a.com/1"], BackendId::BackendB);
        let b2 = topic("Model X benchmarks", &["https://a.com/2"], BackendId::BackendB);
        let map = validity(&["https://a.com/1", "https://a.com/2"]);
        let ranked = merge_and_rank(vec![], vec![b1, b2], &map, 5);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|t| t.citations.len() == 1));
    }

    #[test]
    fn short_titles_over_merge() {
        let a = topic("AI", &["https://a.com/1"], BackendId::BackendA);
        let b = topic("Fair chip trade", &["https://a.com/2"], BackendId::BackendB);
        let map = validity(&["https://a.com/1", "https://a.com/2"]);
        let ranked = merge_and_rank(vec![a], vec![b], &map, 5);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn merge_fills_missing_social_evidence() {
        use digest_common::Hashtag;
        use std::sync::Arc;

        let mut a = topic("Model X", &["https://a.com/1"], BackendId::BackendA);
        let mut b = topic("Model X", &["https://a.com/1"], BackendId::BackendB);
        b.related_hashtags = vec![Arc::new(Hashtag::new("#ModelX", 1, 100, 0, 0))];
        b.social_impact_score = 10.0;

        merge_topic(&mut a, &b);
        assert_eq!(a.related_hashtags.len(), 1);
        assert_eq!(a.social_impact_score, 10.0);
    }

    // --- ranking ---

    #[test]
    fn ranking_is_bounded_and_sorted() {
        let urls: Vec<String> = (0..8).map(|i| format!("https://a.com/{i}")).collect();
        let topics: Vec<Topic> = (0..8)
            .map(|i| {
                let cites: Vec<&str> = urls[..=i].iter().map(String::as_str).collect();
                topic(&format!("Distinct topic number {i}"), &cites, BackendId::BackendA)
            })
            .collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();

        let ranked = merge_and_rank(topics, vec![], &validity(&refs), 5);

        assert_eq!(ranked.len(), 5);
        assert!(ranked.windows(2).all(|w| w[0].overall_score >= w[1].overall_score));
        assert_eq!(ranked[0].citations.len(), 8);
    }

    #[test]
    fn fewer_candidates_than_n_are_not_padded() {
        let a = topic("Only one", &["https://a.com/1"], BackendId::BackendA);
        assert_eq!(merge_and_rank(vec![a], vec![], &validity(&["https://a.com/1"]), 5).len(), 1);
    }
}
