//! Randomness check for captured literals.
//!
//! Token-like rules only fire when the captured value looks random, so
//! `"changeme"` or `"password"` literals do not read as leaked keys.

use std::collections::HashMap;

/// Shannon entropy of `s` in bits per character.
pub fn shannon_entropy(s: &str) -> f64 {
    let total = s.chars().count();
    if total == 0 {
        return 0.0;
    }

    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
    }

    let total = total as f64;
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// `true` when `literal` reaches `threshold`. A threshold of zero or
/// below disables the check.
pub fn looks_random(literal: &str, threshold: f64) -> bool {
    threshold <= 0.0 || shannon_entropy(literal) >= threshold
}
