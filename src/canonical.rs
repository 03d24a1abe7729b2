/*
 *  canonical.rs
 *
 *  VinylPi - spin it, see it
 *  (c) 2025-26 VinylPi contributors
 *
 *  Title canonicalizer: folds variant annotations out of song titles
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

// Words that mark a release variant rather than a different song.
const MARKER_WORDS: &str = r"remaster|remastered|remix|version|edit|deluxe|mono|stereo|reissue";

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\(\[]([^\(\)\[\]]*)[\)\]]").expect("static regex"));

static BRACKET_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:{MARKER_WORDS})\b|\b\d{{4}}\b")).expect("static regex")
});

static STANDALONE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b(?:{MARKER_WORDS})\b")).expect("static regex"));

/// Normalize a raw title into its comparison key.
///
/// Lower-cases, drops bracketed annotations that carry a variant marker or a
/// bare year, keeps only the text before the first `" - "`, removes leftover
/// marker words and collapses whitespace. The result is a fixpoint, so the
/// function is idempotent. A title made only of markers keeps its folded form
/// rather than collapsing to an empty key.
pub fn canonicalize(raw: &str) -> String {
    let mut current = collapse_whitespace(&raw.to_lowercase());
    loop {
        let next = strip_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        collapse_whitespace(&raw.to_lowercase())
    } else {
        current
    }
}

// Every step only deletes text, so repeated passes shrink until stable.
fn strip_pass(input: &str) -> String {
    let without_brackets = BRACKETED.replace_all(input, |caps: &regex::Captures| {
        if BRACKET_MARKER.is_match(&caps[1]) {
            String::new()
        } else {
            caps[0].to_string()
        }
    });

    let head = match without_brackets.split_once(" - ") {
        Some((before, _)) if !before.trim().is_empty() => before,
        _ => without_brackets.as_ref(),
    };

    let without_words = STANDALONE_MARKER.replace_all(head, "");
    collapse_whitespace(&without_words)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
