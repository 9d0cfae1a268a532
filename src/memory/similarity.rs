//! Text similarity used by the memory store.

use std::collections::BTreeSet;

/// Lowercase alphanumeric tokens of `text`. Single characters are ignored.
fn tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|w| w.len() > 1)
        .map(str::to_string)
        .collect()
}

/// Jaccard overlap of the token sets of `a` and `b`, in `[0.0, 1.0]`.
///
/// Two empty texts score `0.0`, never a perfect match.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let a_words = tokens(a);
    let b_words = tokens(b);
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }

    let common = a_words.intersection(&b_words).count();
    let union = a_words.union(&b_words).count();
    common as f64 / union as f64
}
