//! Next/previous resolution over a mixed library + external track list.
//!
//! The list is whatever the caller has right now; nothing here caches it.
//! Policy, in order: filter by category (falling back to the whole list when
//! the filter leaves nothing), sort by display index, find the current track
//! (exact id, then tolerant match), step with wrap-around. An unknown current
//! track resolves to the first entry; an empty list resolves to nothing.

use crate::library::filename::title_from_external_id;
use crate::library::{CategoryFilter, Provenance, Track};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Next,
    Previous,
}

/// A list entry with its derived ordering facts.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    track: &'a Track,
    id: &'a str,
    provenance: Provenance,
    display_index: usize,
}

/// Classify an id as library or external.
pub fn classify(id: &str) -> Provenance {
    Provenance::of(id)
}

/// Category implied by an id: external prefix or an all-digit library key.
/// Anything else implies nothing.
pub fn infer_category(id: &str) -> Option<CategoryFilter> {
    let id = id.trim();
    match classify(id) {
        Provenance::External => Some(CategoryFilter::External),
        Provenance::Library if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => {
            Some(CategoryFilter::Library)
        }
        Provenance::Library => None,
    }
}

fn normalize(tracks: &[Track]) -> Vec<Candidate<'_>> {
    tracks
        .iter()
        .enumerate()
        .map(|(position, track)| Candidate {
            track,
            id: track.id.as_str().trim(),
            provenance: classify(track.id.as_str()),
            display_index: track.display_index.unwrap_or(position),
        })
        .collect()
}

pub fn resolve_adjacent_track<'a>(
    direction: Direction,
    tracks: &'a [Track],
    current_id: &str,
    filter: CategoryFilter,
) -> Option<&'a Track> {
    let normalized = normalize(tracks);

    let filtered: Vec<Candidate<'a>> = normalized
        .iter()
        .filter(|c| filter.admits(c.track, c.provenance))
        .cloned()
        .collect();
    let mut candidates = if filtered.is_empty() {
        if !normalized.is_empty() {
            debug!("Category {} matched nothing, using the full list", filter);
        }
        normalized
    } else {
        filtered
    };

    if candidates.is_empty() {
        return None;
    }

    // Stable: equal display indexes keep list order
    candidates.sort_by_key(|c| c.display_index);

    let len = candidates.len();
    let target = match locate(&candidates, current_id.trim()) {
        Some(i) => match direction {
            Direction::Next => (i + 1) % len,
            Direction::Previous => (i + len - 1) % len,
        },
        None => {
            debug!("Current track {} not in list, defaulting to first", current_id);
            0
        }
    };

    Some(candidates[target].track)
}

fn locate(candidates: &[Candidate<'_>], current_id: &str) -> Option<usize> {
    if let Some(i) = candidates.iter().position(|c| c.id == current_id) {
        return Some(i);
    }
    if current_id.is_empty() {
        return None;
    }

    // Tolerant matching for ids that drifted between sources (numeric vs
    // string keys, prefixed vs bare file names). Fragile by nature.
    if let Some(i) = candidates
        .iter()
        .position(|c| !c.id.is_empty() && (c.id.contains(current_id) || current_id.contains(c.id)))
    {
        debug!("Tolerant id match for {}: {}", current_id, candidates[i].id);
        return Some(i);
    }

    if classify(current_id) == Provenance::External {
        let derived = title_from_external_id(current_id)?.to_lowercase();
        let found = candidates.iter().position(|c| {
            c.track
                .title
                .as_deref()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .map_or(false, |t| t.contains(&derived) || derived.contains(&t))
        });
        if let Some(i) = found {
            debug!("Title match for {}: {}", current_id, candidates[i].id);
        }
        return found;
    }

    None
}
