//! Hybrid scoring of retrieved chunks.

use super::{count_terms, Candidate, Persona, Weights};
use crate::vector_index::{metadata_keys, VectorMatch};

const DEFAULT_SUMMARY: &str = "No summary available.";

/// Fixed synonym expansions applied to query keywords.
pub fn synonyms_for(keyword: &str) -> &'static [&'static str] {
    match keyword {
        "ciso" => &["chief information security officer", "security officer"],
        "ai" => &["artificial intelligence", "machine learning"],
        "security" => &["cybersecurity", "protection", "secure"],
        "agentic" => &["agent", "autonomous", "intelligent"],
        "leader" => &["executive", "manager", "director"],
        "engineer" => &["developer", "programmer", "technical"],
        _ => &[],
    }
}

/// Whitespace tokens of the lower-cased query with at least two characters,
/// followed by the synonyms of each token in token order.
///
/// Punctuation is not stripped, so "security?" does not pick up the
/// "security" synonyms.
pub fn query_keywords(query: &str) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let keywords: Vec<&str> = query_lower
        .split_whitespace()
        .filter(|token| token.chars().count() >= 2)
        .collect();

    let expansions = keywords
        .iter()
        .flat_map(|keyword| synonyms_for(keyword).iter().copied());

    keywords
        .iter()
        .copied()
        .chain(expansions)
        .map(str::to_string)
        .collect()
}

/// Substring occurrences of all keywords divided by the content word count.
pub fn keyword_score(content_lower: &str, keywords: &[String]) -> f64 {
    let hits: usize = keywords
        .iter()
        .map(|keyword| content_lower.matches(keyword.as_str()).count())
        .sum();
    hits as f64 / content_lower.split_whitespace().count().max(1) as f64
}

/// First two '.'-separated pieces of a summary, rejoined and terminated with a period.
pub fn truncate_summary(summary: &str) -> String {
    let pieces: Vec<&str> = summary.split('.').take(2).collect();
    format!("{}.", pieces.join(". ").trim())
}

/// Score one match against the query. Normalized signals and the hybrid
/// score are filled in afterwards by [`blend_scores`].
pub fn score_match(m: VectorMatch, persona: Persona, keywords: &[String]) -> Candidate {
    let content = m
        .metadata
        .get(metadata_keys::SOURCE_TEXT)
        .cloned()
        .unwrap_or_default();
    let content_lower = content.to_lowercase();

    let semantic_score = 1.0 - m.distance.unwrap_or(1.0);
    let keyword_score = keyword_score(&content_lower, keywords);

    let summary = truncate_summary(
        m.metadata
            .get(metadata_keys::SUMMARY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SUMMARY),
    );
    let topics = m
        .metadata
        .get(metadata_keys::TOPIC_TIMING)
        .map(|t| t.to_lowercase())
        .unwrap_or_default();

    let (metadata_score, matched_terms) = match persona.vocabulary() {
        Some(terms) => {
            let combined = format!("{} {} {}", content_lower, summary.to_lowercase(), topics);
            let score = count_terms(&combined, terms) as f64
                / combined.split_whitespace().count().max(1) as f64;
            let matched = terms
                .iter()
                .filter(|term| combined.contains(*term))
                .map(|term| term.to_string())
                .collect();
            (score, matched)
        }
        None => (0.0, Vec::new()),
    };

    Candidate {
        doc_id: m.key,
        content,
        metadata: m.metadata,
        summary,
        semantic_score,
        keyword_score,
        metadata_score,
        matched_terms,
        hybrid_score: 0.0,
    }
}

/// Normalize keyword and metadata signals by the batch maximum and blend.
///
/// A signal whose batch maximum is zero contributes zero for every candidate.
pub fn blend_scores(candidates: &mut [Candidate], weights: Weights) {
    let max_keyword = candidates
        .iter()
        .map(|c| c.keyword_score)
        .fold(0.0_f64, f64::max);
    let max_metadata = candidates
        .iter()
        .map(|c| c.metadata_score)
        .fold(0.0_f64, f64::max);

    for candidate in candidates.iter_mut() {
        let keyword = normalize(candidate.keyword_score, max_keyword);
        let metadata = normalize(candidate.metadata_score, max_metadata);
        candidate.hybrid_score = weights.semantic * candidate.semantic_score
            + weights.keyword * keyword
            + weights.metadata * metadata;
    }
}

fn normalize(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::Metadata;

    fn vector_match(key: &str, distance: Option<f64>, pairs: &[(&str, &str)]) -> VectorMatch {
        let metadata: Metadata = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VectorMatch {
            key: key.to_string(),
            distance,
            metadata,
        }
    }

    #[test]
    fn test_query_keywords_expand_synonyms() {
        let keywords = query_keywords("CISO guide to AI a");
        assert_eq!(
            keywords,
            vec![
                "ciso",
                "guide",
                "to",
                "ai",
                "chief information security officer",
                "security officer",
                "artificial intelligence",
                "machine learning",
            ]
        );
    }

    #[test]
    fn test_query_keywords_keep_punctuation() {
        let keywords = query_keywords("security?");
        assert_eq!(keywords, vec!["security?"]);
    }

    #[test]
    fn test_keyword_score_counts_substrings() {
        // "ai" occurs inside "said" as well as on its own
        let score = keyword_score("she said ai matters", &["ai".to_string()]);
        assert!((score - 2.0 / 4.0).abs() < 1e-12);
        assert_eq!(keyword_score("", &["ai".to_string()]), 0.0);
    }

    #[test]
    fn test_truncate_summary() {
        assert_eq!(
            truncate_summary("First point. Second point. Third point."),
            "First point.  Second point."
        );
        assert_eq!(truncate_summary("No periods here"), "No periods here.");
        assert_eq!(truncate_summary("No summary available."), "No summary available..");
        assert_eq!(truncate_summary(""), ".");
    }

    #[test]
    fn test_score_match_defaults() {
        let c = score_match(vector_match("k", None, &[]), Persona::General, &[]);
        assert_eq!(c.doc_id, "k");
        assert_eq!(c.content, "");
        assert_eq!(c.semantic_score, 0.0);
        assert_eq!(c.keyword_score, 0.0);
        assert_eq!(c.summary, "No summary available..");
        assert!(c.matched_terms.is_empty());
    }

    #[test]
    fn test_score_match_leadership_metadata() {
        let m = vector_match(
            "row-1-chunk-0",
            Some(0.25),
            &[
                ("source_text", "Governance and risk for the CISO"),
                ("Video Transcript Summary", "A talk on policy. More. Even more."),
                ("When Was Each Topic Discussed", "Identity at 3:00"),
            ],
        );
        let c = score_match(m, Persona::Leadership, &query_keywords("ciso risk"));

        assert!((c.semantic_score - 0.75).abs() < 1e-9);
        // content: "governance and risk for the ciso" -> ciso + risk over 6 words
        assert!((c.keyword_score - 2.0 / 6.0).abs() < 1e-9);
        assert_eq!(c.summary, "A talk on policy.  More.");
        assert!(c.metadata_score > 0.0);
        assert_eq!(
            c.matched_terms,
            vec!["ciso", "governance", "policy", "risk", "identity"]
        );
    }

    #[test]
    fn test_semantic_score_is_exact_complement_of_distance() {
        let m: VectorMatch = serde_json::from_str(r#"{"key": "k", "distance": 0.6}"#).unwrap();
        assert_eq!(m.distance, Some(0.6_f64));

        let c = score_match(m, Persona::General, &[]);
        assert_eq!(c.semantic_score, 1.0 - 0.6);
    }

    #[test]
    fn test_general_persona_has_no_metadata_signal() {
        let m = vector_match("k", Some(0.1), &[("source_text", "security governance")]);
        let c = score_match(m, Persona::General, &[]);
        assert_eq!(c.metadata_score, 0.0);
        assert!(c.matched_terms.is_empty());
    }

    #[test]
    fn test_blend_scores_normalizes_by_batch_max() {
        let weights = Persona::Leadership.weights();
        let mut candidates = vec![
            score_match(
                vector_match("a", Some(0.2), &[("source_text", "risk risk")]),
                Persona::Leadership,
                &["risk".to_string()],
            ),
            score_match(
                vector_match("b", Some(0.4), &[("source_text", "risk other")]),
                Persona::Leadership,
                &["risk".to_string()],
            ),
        ];
        blend_scores(&mut candidates, weights);

        // a has the max keyword and metadata ratios, so both normalize to 1
        let expected_a = 0.8 * 0.8 + 0.15 * 1.0 + 0.05 * 1.0;
        assert!((candidates[0].hybrid_score - expected_a).abs() < 1e-6);
        assert!(candidates[1].hybrid_score < candidates[0].hybrid_score);
    }

    #[test]
    fn test_blend_scores_zero_max() {
        let mut candidates = vec![score_match(
            vector_match("a", Some(0.5), &[("source_text", "nothing relevant")]),
            Persona::General,
            &["ciso".to_string()],
        )];
        blend_scores(&mut candidates, Persona::General.weights());
        assert!((candidates[0].hybrid_score - 0.7 * 0.5).abs() < 1e-9);
    }
}
