//! Textual closeness between an expected and an actual output.
//!
//! Uses the Sørensen–Dice coefficient over character bigrams, ignoring
//! whitespace, and reports it on a 0-100 scale rounded to two decimals.

use std::collections::HashMap;

/// Similarity of `expected` and `actual` in `[0, 100]`
///
/// Two empty strings score 100; exactly one empty string scores 0.
pub fn score(expected: &str, actual: &str) -> f64 {
    round_to(dice_coefficient(expected, actual) * 100.0, 2)
}

/// Dice coefficient over whitespace-free character bigrams, in `[0, 1]`
pub fn dice_coefficient(first: &str, second: &str) -> f64 {
    let first: Vec<char> = first.chars().filter(|c| !c.is_whitespace()).collect();
    let second: Vec<char> = second.chars().filter(|c| !c.is_whitespace()).collect();

    if first == second {
        return 1.0;
    }
    if first.len() < 2 || second.len() < 2 {
        return 0.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::with_capacity(first.len());
    for pair in first.windows(2) {
        *bigrams.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    let mut intersection = 0usize;
    for pair in second.windows(2) {
        if let Some(count) = bigrams.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                intersection += 1;
            }
        }
    }

    (2.0 * intersection as f64) / ((first.len() + second.len() - 2) as f64)
}

/// Arithmetic mean rounded to one decimal; `None` when there is nothing to average
pub fn average(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let sum: f64 = scores.iter().sum();
    Some(round_to(sum / scores.len() as f64, 1))
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings_score_100() {
        for s in ["", "a", "hello world", "Ünïcödé text ✓", "  padded  "] {
            assert_eq!(score(s, s), 100.0, "input {:?}", s);
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(score("", ""), 100.0);
        assert_eq!(score("", "something"), 0.0);
        assert_eq!(score("something", ""), 0.0);
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert_eq!(score("abcdef", "uvwxyz"), 0.0);
        assert_eq!(score("aaaa", "bbbb"), 0.0);
    }

    #[test]
    fn test_known_values() {
        // "healed" vs "sealed": 4 shared bigrams out of 5 + 5
        assert_eq!(score("healed", "sealed"), 80.0);
        // whitespace is ignored entirely
        assert_eq!(score("a b c", "abc"), 100.0);
        // only "ht" is shared: 2 * 1 / (4 + 4)
        assert_eq!(score("night", "nacht"), 25.0);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [("french", "quebec"), ("the quick fox", "quick brown fox"), ("ab", "abab")];
        for (a, b) in pairs {
            assert_eq!(score(a, b), score(b, a));
        }
    }

    #[test]
    fn test_rounded_to_two_decimals() {
        let value = score("abcdefg", "abcxefg");
        assert_eq!(value, (value * 100.0).round() / 100.0);
        assert!(value > 0.0 && value < 100.0);
    }

    #[test]
    fn test_average() {
        assert_eq!(average(&[80.0, 60.0]), Some(70.0));
        assert_eq!(average(&[33.33, 33.33, 33.34]), Some(33.3));
        assert_eq!(average(&[]), None);
    }
}
