//! Prompt injection filter for user-supplied text.
//!
//! Detection runs three independent checks and flags the text if any of them fires:
//! direct injection phrasing, markup/script injection, and scrambled-interior
//! variants of watchlist words.
//!
//! The scrambled-interior check is a heuristic. Any word with the same length,
//! first and last letter, and interior letters as a watchlist term is flagged,
//! so real words that happen to be such anagrams are false positives.
//!
//! Sanitization only neutralizes the direct patterns. Markup and fuzzy matches are
//! for the detector to decide on; the sanitizer does not rewrite them.

use super::patterns::{
    first_match, ThreatCategory, FUZZY_TERMS, INJECTION_REGEX, MARKUP_REGEX, WHITESPACE_REGEX,
    WORD_REGEX,
};

/// Replacement token for redacted direct patterns.
pub const FILTERED_TOKEN: &str = "[FILTERED]";

/// Maximum sanitized input length, in characters.
pub const MAX_INPUT_CHARS: usize = 10_000;

/// Runs of this many identical characters or more collapse to one.
const REPEAT_COLLAPSE_THRESHOLD: usize = 4;

/// Which check flagged the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Category of the check that fired
    pub category: ThreatCategory,
    /// Pattern name, or the watchlist term for fuzzy matches
    pub name: String,
}

/// Filter for detecting and neutralizing prompt injection attempts.
#[derive(Debug, Clone)]
pub struct PromptInjectionFilter {
    fuzzy_terms: Vec<&'static str>,
    max_chars: usize,
}

impl Default for PromptInjectionFilter {
    fn default() -> Self {
        Self {
            fuzzy_terms: FUZZY_TERMS.to_vec(),
            max_chars: MAX_INPUT_CHARS,
        }
    }
}

impl PromptInjectionFilter {
    /// Create a filter with the default watchlist and length limit
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any of the three checks flags `text`.
    pub fn detect_injection(&self, text: &str) -> bool {
        self.inspect(text).is_some()
    }

    /// Run the checks in order and report the first one that fires.
    pub fn inspect(&self, text: &str) -> Option<Detection> {
        if let Some(pattern) = first_match(&INJECTION_REGEX, text) {
            return Some(Detection {
                category: pattern.category,
                name: pattern.name.to_string(),
            });
        }

        if let Some(pattern) = first_match(&MARKUP_REGEX, text) {
            return Some(Detection {
                category: pattern.category,
                name: pattern.name.to_string(),
            });
        }

        let lowered = text.to_lowercase();
        for word in WORD_REGEX.find_iter(&lowered) {
            for term in &self.fuzzy_terms {
                if is_similar_word(word.as_str(), term) {
                    return Some(Detection {
                        category: ThreatCategory::Injection,
                        name: format!("fuzzy_{term}"),
                    });
                }
            }
        }

        None
    }

    /// Normalize obfuscations, redact direct patterns and cap the length.
    pub fn sanitize_input(&self, text: &str) -> String {
        let collapsed = WHITESPACE_REGEX.replace_all(text, " ");
        let mut text = collapse_repeats(&collapsed);

        for (regex, _) in INJECTION_REGEX.iter() {
            text = regex.replace_all(&text, FILTERED_TOKEN).into_owned();
        }

        match text.char_indices().nth(self.max_chars) {
            Some((cut, _)) => text[..cut].to_string(),
            None => text,
        }
    }
}

/// Same length (at least 3), same first and last character, same interior multiset.
fn is_similar_word(word: &str, target: &str) -> bool {
    let word: Vec<char> = word.chars().collect();
    let target: Vec<char> = target.chars().collect();

    if word.len() != target.len() || word.len() < 3 {
        return false;
    }

    let last = word.len() - 1;
    if word[0] != target[0] || word[last] != target[last] {
        return false;
    }

    let mut word_mid = word[1..last].to_vec();
    let mut target_mid = target[1..last].to_vec();
    word_mid.sort_unstable();
    target_mid.sort_unstable();
    word_mid == target_mid
}

/// Collapse every run of `REPEAT_COLLAPSE_THRESHOLD`+ identical characters to one.
fn collapse_repeats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }
        let keep = if run >= REPEAT_COLLAPSE_THRESHOLD { 1 } else { run };
        out.extend(std::iter::repeat(c).take(keep));
    }

    out
}
