use std::sync::LazyLock;

use regex::Regex;

/// Returned whenever no introductory paragraph could be produced.
pub const NO_PARAGRAPH_SENTINEL: &str = "No suitable paragraph found";

// Single non-nested pass: "a (b (c) d) e" keeps "d)".
static PARENTHESISED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());
static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
// Latin and Arabic punctuation in one class.
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([,.:;!؟،-])").unwrap());

/// Cleans the plain text of an encyclopedia paragraph:
/// - drops `(...)` then `[...]` spans
/// - collapses whitespace runs and trims
/// - removes whitespace in front of punctuation
///
/// Applying it twice gives the same result as applying it once.
pub fn clean_paragraph(text: &str) -> String {
    let text = PARENTHESISED.replace_all(text, "");
    let text = BRACKETED.replace_all(&text, "");
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    SPACE_BEFORE_PUNCT
        .replace_all(text.trim(), "$1")
        .into_owned()
}
