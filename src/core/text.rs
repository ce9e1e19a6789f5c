//! Word counting and word-budget truncation for debate turns
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.0.0: Word-based replacement for the byte-based truncation helpers

/// Marker appended to content cut at the word budget
pub const ELLIPSIS: &str = "...";

/// Count whitespace-delimited words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Cut `text` down to at most `max_words` words.
///
/// Text within budget is returned unchanged. Longer text keeps its first
/// `max_words` words joined by single spaces, with [`ELLIPSIS`] glued to the
/// last word so the marker never counts as a word of its own.
pub fn enforce_word_limit(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    if max_words == 0 {
        return String::new();
    }

    format!("{}{}", words[..max_words].join(" "), ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words_empty() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \n\t "), 0);
    }

    #[test]
    fn test_count_words_irregular_spacing() {
        assert_eq!(count_words("  a  b   c "), 3);
        assert_eq!(count_words("one\ntwo\tthree four"), 4);
    }

    #[test]
    fn test_within_budget_unchanged() {
        let text = "  keep   my\nspacing ";
        assert_eq!(enforce_word_limit(text, 3), text);
        assert_eq!(enforce_word_limit(text, 10), text);
    }

    #[test]
    fn test_truncates_and_normalizes_spacing() {
        let result = enforce_word_limit("one  two\nthree four five", 3);
        assert_eq!(result, "one two three...");
        assert_eq!(count_words(&result), 3);
    }

    #[test]
    fn test_truncation_is_idempotent() {
        let inputs = [
            "",
            "single",
            "a b c d e f g h i j",
            "  spaced   out\n\nwords  everywhere  here ",
        ];
        for input in inputs {
            for limit in 0..8 {
                let once = enforce_word_limit(input, limit);
                let twice = enforce_word_limit(&once, limit);
                assert_eq!(once, twice, "input {input:?} limit {limit}");
                assert!(count_words(&once) <= limit);
            }
        }
    }

    #[test]
    fn test_untruncated_word_count_matches_input() {
        let input = "the quick brown fox";
        let output = enforce_word_limit(input, 4);
        assert_eq!(count_words(&output), count_words(input));
    }

    #[test]
    fn test_zero_budget() {
        assert_eq!(enforce_word_limit("anything at all", 0), "");
        assert_eq!(enforce_word_limit("", 0), "");
    }
}
