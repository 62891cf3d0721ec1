use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{FALLBACK_LABEL, MIN_LABEL_LEN, SENTINEL_WORD};

static NON_ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z ]").unwrap());

const STOP_WORDS: [&str; 15] = [
    "the", "and", "a", "to", "of", "in", "is", "it", "you", "that", "this", "for", "was", "with",
    "on",
];

/// Normalize text into lowercase Latin words.
/// ASCII-only casing so the result is identical on every platform.
/// Everything outside `a-z` and the space character is dropped before
/// splitting, so tabs and newlines join the words around them.
pub fn normalize(text: &str) -> Vec<String> {
    let lowered = text.to_ascii_lowercase();
    NON_ALPHA
        .replace_all(&lowered, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// The longest normalized word, first one wins on a tie.
/// Falls back to the sentinel word when nothing survives normalization.
pub fn focal_word(text: &str) -> String {
    let mut words = normalize(text);
    // sort_by is stable: equal lengths keep their left-to-right order
    words.sort_by(|a, b| b.len().cmp(&a.len()));
    words
        .into_iter()
        .next()
        .unwrap_or_else(|| SENTINEL_WORD.to_string())
}

/// Whitespace-split, lowercased word set used for overlap scoring.
pub fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Pick the display label for a thought.
///
/// Words shorter than four letters and stop words are ignored. The rest are
/// scored by frequency times length; ties go to the word seen first.
pub fn extract_label(text: &str) -> String {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for word in normalize(text) {
        if word.len() < MIN_LABEL_LEN || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        let count = counts.entry(word.clone()).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    order.sort_by(|a, b| {
        let score_a = counts[a] * a.len();
        let score_b = counts[b] * b.len();
        score_b.cmp(&score_a)
    });

    order
        .into_iter()
        .next()
        .unwrap_or_else(|| FALLBACK_LABEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_digits() {
        assert_eq!(normalize("Hello, World! 42"), vec!["hello", "world"]);
    }

    #[test]
    fn test_normalize_joins_across_stripped_chars() {
        // apostrophes are removed, not treated as separators
        assert_eq!(normalize("Don't stop"), vec!["dont", "stop"]);
    }

    #[test]
    fn test_normalize_only_space_separates() {
        assert_eq!(normalize("alpha\tbeta"), vec!["alphabeta"]);
        assert_eq!(normalize("alpha\nbeta gamma"), vec!["alphabeta", "gamma"]);
    }

    #[test]
    fn test_focal_word_joins_across_line_breaks() {
        assert_eq!(focal_word("extra\nordinary day"), "extraordinary");
    }

    #[test]
    fn test_normalize_drops_non_latin() {
        assert_eq!(normalize("café ÉCOLE"), vec!["caf", "cole"]);
    }

    #[test]
    fn test_focal_word_longest() {
        assert_eq!(focal_word("The quick brown fox jumps"), "quick");
    }

    #[test]
    fn test_focal_word_first_longest_wins() {
        // "quick" and "brown" and "jumps" are all five letters
        assert_eq!(focal_word("brown quick jumps"), "brown");
        assert_eq!(focal_word("A lazy quick person"), "person");
        assert_eq!(focal_word("A lazy quick dog"), "quick");
    }

    #[test]
    fn test_focal_word_sentinel() {
        assert_eq!(focal_word(""), SENTINEL_WORD);
        assert_eq!(focal_word("   "), SENTINEL_WORD);
        assert_eq!(focal_word("123 456"), SENTINEL_WORD);
        assert_eq!(focal_word("?!."), SENTINEL_WORD);
    }

    #[test]
    fn test_focal_word_case_insensitive() {
        assert_eq!(focal_word("GALAXY"), focal_word("galaxy"));
    }

    #[test]
    fn test_word_set_dedups() {
        let set = word_set("Star star STAR dust");
        assert_eq!(set.len(), 2);
        assert!(set.contains("star"));
        assert!(set.contains("dust"));
    }

    #[test]
    fn test_word_set_empty() {
        assert!(word_set("").is_empty());
        assert!(word_set(" \t ").is_empty());
    }

    #[test]
    fn test_label_prefers_frequency_times_length() {
        // "dream" x2 = 10 beats "ocean" x1 = 5
        assert_eq!(extract_label("ocean dream dream"), "dream");
    }

    #[test]
    fn test_label_skips_stop_and_short_words() {
        assert_eq!(extract_label("this is the way of it"), FALLBACK_LABEL);
        assert_eq!(extract_label("cat dog with that"), FALLBACK_LABEL);
    }

    #[test]
    fn test_label_tie_goes_to_first_seen() {
        assert_eq!(extract_label("stars moons"), "stars");
    }

    #[test]
    fn test_label_empty_input() {
        assert_eq!(extract_label(""), FALLBACK_LABEL);
    }
}
