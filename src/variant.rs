/*
 *  variant.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Variant scorer: ranks alternate releases of one song
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use regex::Regex;
use std::sync::LazyLock;

/// Title-level marker that decides the base score. Only the first match in
/// declaration order applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantMarker {
    Cover,
    Remix,
    Instrumental,
    Live,
    Remaster,
}

impl VariantMarker {
    pub fn penalty(self) -> i32 {
        match self {
            VariantMarker::Cover => -100,
            VariantMarker::Remix => -60,
            VariantMarker::Instrumental => -40,
            VariantMarker::Live => -60,
            VariantMarker::Remaster => -10,
        }
    }
}

const ALBUM_CONTEXT_BONUS: i32 = 20;
const COMPILATION_PENALTY: i32 = -20;

// Markers match at word starts so "Discover" or "Alive" stay clean.
static MARKERS: LazyLock<[(VariantMarker, Regex); 5]> = LazyLock::new(|| {
    [
        (VariantMarker::Cover, word_regex(r"\bcover")),
        (VariantMarker::Remix, word_regex(r"\bremix")),
        (VariantMarker::Instrumental, word_regex(r"\binstrumental")),
        (VariantMarker::Live, live_regex()),
        (VariantMarker::Remaster, word_regex(r"\bremaster")),
    ]
});

static LIVE: LazyLock<Regex> = LazyLock::new(live_regex);

static COMPILATION: LazyLock<Regex> =
    LazyLock::new(|| word_regex(r"\bgreatest hits\b|\bcompilation\b"));

fn word_regex(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("static regex")
}

fn live_regex() -> Regex {
    word_regex(r"\b(?:live|unplugged|mtv unplugged|sessions?|acoustic|radio|bbc|kexp|music bank)\b")
}

/// Whether the title or the album marks a live or session recording.
pub fn is_live_variant(title: &str, album: Option<&str>) -> bool {
    LIVE.is_match(title) || album.is_some_and(|a| LIVE.is_match(a))
}

pub fn title_marker(title: &str) -> Option<VariantMarker> {
    MARKERS
        .iter()
        .find(|(_, re)| re.is_match(title))
        .map(|(marker, _)| *marker)
}

/// Preference score of one (title, album) observation; higher is better.
///
/// The album bonus is withheld for live titles and for albums that are
/// themselves live recordings.
pub fn score(title: &str, album: Option<&str>) -> i32 {
    let marker = title_marker(title);
    let mut score = marker.map_or(0, VariantMarker::penalty);

    if let Some(album) = album {
        if COMPILATION.is_match(album) {
            score += COMPILATION_PENALTY;
        } else if marker != Some(VariantMarker::Live) && !LIVE.is_match(album) {
            score += ALBUM_CONTEXT_BONUS;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_studio_live_cover() {
        let studio = score("Song", Some("Studio Album"));
        let live = score("Song (Live)", Some("Studio Album"));
        let cover = score("Song (Cover)", None);
        assert!(studio > live, "{studio} > {live}");
        assert!(live > cover, "{live} > {cover}");
    }

    #[test]
    fn test_live_variant_detection() {
        assert!(is_live_variant("Song", Some("Live at Wembley")));
        assert!(is_live_variant("Song (KEXP Session)", None));
        assert!(is_live_variant("Dynamite", Some("Music Bank 2020")));
        assert!(!is_live_variant("Alive", Some("Studio Album")));
        assert!(!is_live_variant("Song", None));
    }

    #[test]
    fn test_first_marker_wins() {
        assert_eq!(title_marker("Song (Live Cover)"), Some(VariantMarker::Cover));
        assert_eq!(title_marker("Song (Live Remix)"), Some(VariantMarker::Remix));
        assert_eq!(score("Song (Acoustic Remastered)", None), -60);
        assert_eq!(score("Song (2009 Remaster)", None), -10);
        assert_eq!(score("Song", None), 0);
    }

    #[test]
    fn test_live_marker_words() {
        for t in ["Song - MTV Unplugged", "Song (BBC Session)", "Song [KEXP]", "Song (Radio Edit)"] {
            assert_eq!(title_marker(t), Some(VariantMarker::Live), "{t}");
        }
        assert_eq!(title_marker("Alive"), None);
        assert_eq!(title_marker("Discover"), None);
    }

    #[test]
    fn test_album_adjustment() {
        assert_eq!(score("Song", Some("Greatest Hits")), -20);
        assert_eq!(score("Song", Some("The Compilation")), -20);
        assert_eq!(score("Song (Remix)", Some("Album")), -40);
        assert_eq!(score("Song (Live)", Some("Album")), -60);
        assert_eq!(score("Song", Some("Live at Leeds")), 0);
        assert_eq!(score("Song (Remaster)", Some("Album")), 10);
    }
}
