//! Diversity clustering of scored candidates.

use super::{count_terms, Candidate, Persona, LEADERSHIP_TERMS, TECHNICAL_TERMS};

/// Slate size when no leadership diversity applies.
pub const MAX_GENERAL_SLATE: usize = 5;

/// Leadership slots in a leadership slate.
const LEADERSHIP_SLOTS: usize = 2;

/// Whether a candidate's content leans towards leadership vocabulary.
/// Ties count as leadership.
pub fn leans_leadership(candidate: &Candidate) -> bool {
    let content_lower = candidate.content.to_lowercase();
    count_terms(&content_lower, &LEADERSHIP_TERMS) >= count_terms(&content_lower, &TECHNICAL_TERMS)
}

/// Stable sort by hybrid score, highest first.
pub fn sort_by_hybrid_desc<T, F>(items: &mut [T], score: F)
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Choose a small, diverse slate of candidates.
///
/// For a leadership query with at least one leadership-leaning candidate,
/// the slate is the two best leadership-leaning candidates, topped up with
/// the single best technical-leaning one when fewer than two exist.
/// Otherwise the slate is the five best candidates overall.
pub fn select_slate(candidates: Vec<Candidate>, persona: Persona) -> Vec<Candidate> {
    let (mut leadership, mut technical): (Vec<Candidate>, Vec<Candidate>) =
        candidates.iter().cloned().partition(leans_leadership);

    if persona == Persona::Leadership && !leadership.is_empty() {
        sort_by_hybrid_desc(&mut leadership, |c| c.hybrid_score);
        leadership.truncate(LEADERSHIP_SLOTS);

        if leadership.len() < LEADERSHIP_SLOTS && !technical.is_empty() {
            sort_by_hybrid_desc(&mut technical, |c| c.hybrid_score);
            leadership.push(technical.swap_remove(0));
        }
        return leadership;
    }

    let mut slate = candidates;
    sort_by_hybrid_desc(&mut slate, |c| c.hybrid_score);
    slate.truncate(MAX_GENERAL_SLATE);
    slate
}
