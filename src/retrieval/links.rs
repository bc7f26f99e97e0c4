//! Link extraction and filtering.

use super::{Candidate, ResultEntry};
use crate::vector_index::{metadata_keys, Metadata};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Kinds of link a video can carry, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkKind {
    ExternalYoutube,
    Content,
    Deck,
    InternalBroadcast,
}

impl LinkKind {
    pub const ALL: [LinkKind; 4] = [
        LinkKind::ExternalYoutube,
        LinkKind::Content,
        LinkKind::Deck,
        LinkKind::InternalBroadcast,
    ];

    /// Output field name.
    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::ExternalYoutube => "external_youtube_link",
            LinkKind::Content => "content_link",
            LinkKind::Deck => "deck_link",
            LinkKind::InternalBroadcast => "internal_broadcast_link",
        }
    }

    /// Metadata key the link is read from.
    pub fn metadata_key(self) -> &'static str {
        match self {
            LinkKind::ExternalYoutube => metadata_keys::EXTERNAL_VIDEO_LINK,
            LinkKind::Content => metadata_keys::CONTENT_LINK,
            LinkKind::Deck => metadata_keys::DECK_LINK,
            LinkKind::InternalBroadcast => metadata_keys::INTERNAL_BROADCAST_LINK,
        }
    }
}

/// Usable links of one video, kept in [`LinkKind::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Links(Vec<(LinkKind, String)>);

impl Links {
    pub fn get(&self, kind: LinkKind) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LinkKind, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl Serialize for Links {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (kind, value) in &self.0 {
            map.serialize_entry(kind.as_str(), value)?;
        }
        map.end()
    }
}

/// A link value is usable unless it is empty or the "not available" placeholder.
pub fn is_usable_link(value: &str) -> bool {
    let lower = value.to_lowercase();
    !lower.is_empty() && lower != "not available"
}

/// Collect the usable links from chunk metadata.
pub fn extract_links(metadata: &Metadata) -> Links {
    Links(
        LinkKind::ALL
            .iter()
            .filter_map(|kind| {
                metadata
                    .get(kind.metadata_key())
                    .filter(|value| is_usable_link(value))
                    .map(|value| (*kind, value.clone()))
            })
            .collect(),
    )
}

/// Keep only the candidates with at least one usable link, preserving order.
pub fn filter_linked(slate: Vec<Candidate>) -> Vec<ResultEntry> {
    slate
        .into_iter()
        .filter_map(|candidate| {
            let links = extract_links(&candidate.metadata);
            if links.is_empty() {
                return None;
            }
            Some(ResultEntry {
                doc_id: candidate.doc_id,
                links,
                hybrid_score: candidate.hybrid_score,
                summary: candidate.summary,
            })
        })
        .collect()
}
