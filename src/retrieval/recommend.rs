//! Recommendation text for the two best sources.

use super::ResultEntry;

/// Top score above which the recommendation is "highly recommended".
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Confidence label of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Moderate,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_CONFIDENCE_THRESHOLD {
            Confidence::High
        } else {
            Confidence::Moderate
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Confidence::High => "Highly recommended",
            Confidence::Moderate => "Moderately relevant",
        }
    }
}

/// Build the recommendation for the best and second-best sources.
pub fn synthesize(first: &ResultEntry, second: &ResultEntry, topic: &str, focus: &str) -> String {
    let confidence = Confidence::from_score(first.hybrid_score);
    format!(
        "{}: Relevant for {}.\n- Video 1 ({}): {}\n- Video 2 ({}): {}\nStart with Video 1 for its focus on {}.",
        confidence.label(),
        topic,
        first.doc_id,
        first.summary,
        second.doc_id,
        second.summary,
        focus
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::Links;

    fn entry(id: &str, score: f64, summary: &str) -> ResultEntry {
        ResultEntry {
            doc_id: id.to_string(),
            links: Links::default(),
            hybrid_score: score,
            summary: summary.to_string(),
        }
    }

    #[test]
    fn test_confidence_threshold() {
        assert_eq!(Confidence::from_score(0.51), Confidence::High);
        assert_eq!(Confidence::from_score(0.5), Confidence::Moderate);
        assert_eq!(Confidence::from_score(-0.2), Confidence::Moderate);
    }

    #[test]
    fn test_synthesize() {
        let text = synthesize(
            &entry("row-1-chunk-0", 0.72, "Talk one."),
            &entry("row-4-chunk-2", 0.41, "Talk two."),
            "agentic AI security",
            "AI agent security",
        );
        assert_eq!(
            text,
            "Highly recommended: Relevant for agentic AI security.\n\
             - Video 1 (row-1-chunk-0): Talk one.\n\
             - Video 2 (row-4-chunk-2): Talk two.\n\
             Start with Video 1 for its focus on AI agent security."
        );

        let moderate = synthesize(&entry("a", 0.3, "x."), &entry("b", 0.2, "y."), "t", "f");
        assert!(moderate.starts_with("Moderately relevant: Relevant for t."));
    }
}
