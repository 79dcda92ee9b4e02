use super::track::Track;
use fuzzy_matcher::{clangd::ClangdMatcher, FuzzyMatcher};
use tracing::debug;

// Plain substring hits always outrank fuzzy-only hits
const SUBSTRING_BONUS: i64 = 1_000;

pub struct TrackSearch {
    matcher: ClangdMatcher,
}

impl TrackSearch {
    pub fn new() -> Self {
        Self {
            matcher: ClangdMatcher::default().ignore_case(),
        }
    }

    /// Search title, artist and genre. Best match first; an empty query
    /// returns everything in list order.
    pub fn search<'a>(&self, tracks: &'a [Track], query: &str) -> Vec<&'a Track> {
        let query = query.trim();
        if query.is_empty() {
            return tracks.iter().collect();
        }

        let lowered = query.to_lowercase();
        let mut scored: Vec<(usize, i64)> = tracks
            .iter()
            .enumerate()
            .filter_map(|(idx, track)| self.score(track, query, &lowered).map(|score| (idx, score)))
            .collect();

        // Stable: equal scores keep list order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        debug!("Search '{}' matched {} of {} tracks", query, scored.len(), tracks.len());

        scored.into_iter().map(|(idx, _)| &tracks[idx]).collect()
    }

    fn score(&self, track: &Track, query: &str, lowered: &str) -> Option<i64> {
        [&track.title, &track.artist, &track.genre]
            .into_iter()
            .flatten()
            .filter_map(|field| {
                let fuzzy = self.matcher.fuzzy_match(field, query);
                if field.to_lowercase().contains(lowered) {
                    Some(SUBSTRING_BONUS + fuzzy.unwrap_or(0))
                } else {
                    fuzzy
                }
            })
            .max()
    }
}

impl Default for TrackSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Track> {
        let mut rain = Track::from_id("3").with_title("Rain").with_artist("Storm Cellar");
        rain.genre = Some("Jazz".into());
        vec![
            Track::from_id("1").with_title("Glow Up").with_artist("Astro"),
            Track::from_id("2").with_title("Afterglow").with_artist("Nightly"),
            rain,
        ]
    }

    #[test]
    fn test_search_matches_fields() {
        let tracks = catalog();
        let search = TrackSearch::new();

        let ids: Vec<&str> = search.search(&tracks, "glow").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"1") && ids.contains(&"2"));

        let by_genre = search.search(&tracks, "JAZZ");
        assert_eq!(by_genre.len(), 1);
        assert_eq!(by_genre[0].id.as_str(), "3");

        let by_artist = search.search(&tracks, "astro");
        assert_eq!(by_artist[0].id.as_str(), "1");
    }

    #[test]
    fn test_empty_query_returns_all() {
        let tracks = catalog();
        assert_eq!(TrackSearch::new().search(&tracks, "  ").len(), 3);
    }

    #[test]
    fn test_no_match() {
        let tracks = catalog();
        assert!(TrackSearch::new().search(&tracks, "zzzz").is_empty());
    }
}
