//! Persona inference from the query text.

use serde::Serialize;
use std::time::Instant;
use tracing::debug;

/// Vocabulary that marks a leadership-oriented query or chunk.
pub const LEADERSHIP_TERMS: [&str; 14] = [
    "ciso",
    "leader",
    "leadership",
    "executive",
    "manager",
    "governance",
    "strategy",
    "compliance",
    "policy",
    "risk",
    "identity",
    "security",
    "authentication",
    "authorization",
];

/// Vocabulary that marks a technical query or chunk.
pub const TECHNICAL_TERMS: [&str; 13] = [
    "engineer",
    "developer",
    "implementation",
    "api",
    "code",
    "technical",
    "tool",
    "sdk",
    "programming",
    "configuration",
    "mcp",
    "bedrock",
    "cognito",
];

/// Weight of the metadata signal, identical for every persona.
pub const METADATA_WEIGHT: f64 = 0.05;

/// Audience the query appears to come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Leadership,
    Technical,
    General,
}

impl Persona {
    /// Blend weights for this persona. The three weights always sum to 1.
    pub fn weights(self) -> Weights {
        let semantic = match self {
            Persona::Leadership => 0.8,
            Persona::Technical => 0.6,
            Persona::General => 0.7,
        };
        Weights {
            semantic,
            keyword: 1.0 - semantic - METADATA_WEIGHT,
            metadata: METADATA_WEIGHT,
        }
    }

    /// Vocabulary used for the metadata signal; `None` for the general persona.
    pub fn vocabulary(self) -> Option<&'static [&'static str]> {
        match self {
            Persona::Leadership => Some(&LEADERSHIP_TERMS),
            Persona::Technical => Some(&TECHNICAL_TERMS),
            Persona::General => None,
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Persona::Leadership => write!(f, "leadership"),
            Persona::Technical => write!(f, "technical"),
            Persona::General => write!(f, "general"),
        }
    }
}

/// Weight triple used to blend the three signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub semantic: f64,
    pub keyword: f64,
    pub metadata: f64,
}

/// Outcome of persona inference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonaInference {
    pub persona: Persona,
    pub leadership_confidence: f64,
    pub technical_confidence: f64,
}

/// Total substring occurrences of every term in `text`.
///
/// Terms are matched as substrings, not tokens: "api" is found inside
/// "capital" and "risk" inside "asterisk".
pub fn count_terms(text: &str, terms: &[&str]) -> usize {
    terms.iter().map(|term| text.matches(term).count()).sum()
}

/// Infer the persona of a query.
pub fn infer_persona(query: &str) -> PersonaInference {
    let started = Instant::now();
    let query_lower = query.to_lowercase();
    let token_count = query_lower.split_whitespace().count().max(1) as f64;

    let leadership_confidence = count_terms(&query_lower, &LEADERSHIP_TERMS) as f64 / token_count;
    let technical_confidence = count_terms(&query_lower, &TECHNICAL_TERMS) as f64 / token_count;

    let persona = if leadership_confidence > technical_confidence {
        Persona::Leadership
    } else if technical_confidence > leadership_confidence {
        Persona::Technical
    } else {
        Persona::General
    };

    debug!(
        "Inferred persona: {}, leadership_conf={:.3}, technical_conf={:.3} ({:?})",
        persona,
        leadership_confidence,
        technical_confidence,
        started.elapsed()
    );

    PersonaInference {
        persona,
        leadership_confidence,
        technical_confidence,
    }
}
