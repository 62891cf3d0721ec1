use crate::constants::ATTRACTION_THRESHOLD;
use crate::tokenizer::word_set;

/// Jaccard overlap of the two texts' word sets. Range: [0, 1].
/// Zero when either side has no words.
pub fn similarity(a: &str, b: &str) -> f64 {
    let set_a = word_set(a);
    let set_b = word_set(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Pull between two thoughts: the similarity once it clears the threshold,
/// zero below it so weak overlap never moves anything.
pub fn attraction(a: &str, b: &str) -> f64 {
    let s = similarity(a, b);
    if s > ATTRACTION_THRESHOLD { s } else { 0.0 }
}
