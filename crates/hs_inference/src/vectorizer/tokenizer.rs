use lazy_static::lazy_static;
use regex::Regex;

use super::stop_words::is_stop_word;

lazy_static! {
    // Runs of two or more word characters
    static ref TOKEN_REGEX: Regex = Regex::new(r"\b\w\w+\b").expect("valid token regex");
}

/// Lowercases `text` and splits it into word tokens, dropping stop-words if asked to.
pub fn tokenize(text: &str, drop_stop_words: bool) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_REGEX
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !drop_stop_words || !is_stop_word(token))
        .map(str::to_string)
        .collect()
}
