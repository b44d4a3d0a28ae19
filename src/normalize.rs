//! Text normalisation — raw input text to the model's canonical form.
//!
//! The cleanup is a fixed ordered sequence; later steps assume the earlier
//! ones already ran (e.g. punctuation spacing is fixed before whitespace is
//! collapsed).  The result is wrapped in explicit language tags,
//! `<en>…</en>`, which is what the text encoder was trained on.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::Error;

/// Languages the models understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    En,
    Ko,
    Es,
    Pt,
    Fr,
}

impl Lang {
    pub const ALL: [Lang; 5] = [Lang::En, Lang::Ko, Lang::Es, Lang::Pt, Lang::Fr];

    pub fn as_str(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Ko => "ko",
            Lang::Es => "es",
            Lang::Pt => "pt",
            Lang::Fr => "fr",
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Lang {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "en" => Ok(Lang::En),
            "ko" => Ok(Lang::Ko),
            "es" => Ok(Lang::Es),
            "pt" => Ok(Lang::Pt),
            "fr" => Ok(Lang::Fr),
            other => Err(Error::InvalidLanguage(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compiled regexes (lazily initialised once)
// ─────────────────────────────────────────────────────────────────────────────

/// Emoji and pictographic symbol ranges, removed outright.
static RE_EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{1F700}-\x{1F77F}\x{1F780}-\x{1F7FF}\x{1F800}-\x{1F8FF}\x{1F900}-\x{1F9FF}\x{1FA00}-\x{1FA6F}\x{1FA70}-\x{1FAFF}\x{2600}-\x{26FF}\x{2700}-\x{27BF}\x{1F1E6}-\x{1F1FF}]+",
    )
    .unwrap()
});

/// Whitespace immediately preceding sentence punctuation or an apostrophe.
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([,.!?;:'])").unwrap());

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Terminal characters after which no closing period is appended — Latin
/// sentence punctuation, straight and curly quotes, closing brackets, and the
/// CJK closing marks.
static RE_TERMINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[.!?;:,'"\u{201C}\u{201D}\u{2018}\u{2019})\]}…。」』】〉》›»]$"#).unwrap()
});

// ─────────────────────────────────────────────────────────────────────────────
// Substitution tables
// ─────────────────────────────────────────────────────────────────────────────

/// Character-level substitutions, applied after emoji stripping.
const CHAR_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("–", "-"),          // en dash
    ("‑", "-"),          // non-breaking hyphen
    ("—", "-"),          // em dash
    ("_", " "),          // underscore
    ("\u{201C}", "\""),  // left double quote
    ("\u{201D}", "\""),  // right double quote
    ("\u{2018}", "'"),   // left single quote
    ("\u{2019}", "'"),   // right single quote
    ("´", "'"),          // acute accent
    ("`", "'"),          // grave accent
    ("[", " "),
    ("]", " "),
    ("|", " "),
    ("/", " "),
    ("#", " "),
    ("→", " "),
    ("←", " "),
];

/// Decorative symbols deleted outright (not replaced with a space).
const DELETED_SYMBOLS: &[&str] = &["♥", "☆", "♡", "©", "\\"];

/// Phrase-level spoken-form substitutions.
const PHRASE_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("@", " at "),
    ("e.g.,", "for example, "),
    ("i.e.,", "that is, "),
];

// ─────────────────────────────────────────────────────────────────────────────
// Cleanup pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Run the cleanup stage (everything except the language-tag wrapping).
///
/// Idempotent: cleaning already-clean text is a no-op.
pub fn clean_text(text: &str) -> String {
    // 1. Unicode decomposition.
    let mut text: String = text.nfkd().collect();

    // 2. Strip emoji / pictographic ranges.
    text = RE_EMOJI.replace_all(&text, "").into_owned();

    // 3. Character-level substitutions.
    for (from, to) in CHAR_SUBSTITUTIONS {
        text = text.replace(from, to);
    }

    // 4. Decorative symbols are deleted, not spaced out.
    for symbol in DELETED_SYMBOLS {
        text = text.replace(symbol, "");
    }

    // 5. Phrase-level substitutions.
    for (from, to) in PHRASE_SUBSTITUTIONS {
        text = text.replace(from, to);
    }

    // 6. No whitespace before sentence punctuation.
    text = RE_SPACE_BEFORE_PUNCT.replace_all(&text, "$1").into_owned();

    // 7. Collapse repeated quote characters until none remain.
    while text.contains("\"\"") {
        text = text.replace("\"\"", "\"");
    }
    while text.contains("''") {
        text = text.replace("''", "'");
    }
    while text.contains("``") {
        text = text.replace("``", "`");
    }

    // 8. Collapse whitespace runs; trim.
    text = RE_SPACES.replace_all(&text, " ").trim().to_string();

    // 9. Sentence-final punctuation is mandatory.
    if !text.is_empty() && !RE_TERMINAL.is_match(&text) {
        text.push('.');
    }

    text
}

/// Clean `text` and wrap it in explicit language tags.
///
/// The wrapping is applied exactly once and is not re-entrant: the tags
/// contain characters (`<`, `>`, `/`) the cleanup stage would mangle, so
/// normalised text must not be fed back in.
pub fn normalize(text: &str, lang: Lang) -> String {
    let cleaned = clean_text(text);
    format!("<{lang}>{cleaned}</{lang}>")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_is_idempotent() {
        let samples = [
            "Hello,  world",
            "“Curly quotes” and – dashes — everywhere",
            "e.g., something @ home",
            "spaced out ?  really !",
            "already clean.",
            "tabs\tand\nnewlines",
        ];
        for s in samples {
            let once = clean_text(s);
            assert_eq!(clean_text(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_terminal_punctuation_appended() {
        assert_eq!(clean_text("hello"), "hello.");
        assert_eq!(clean_text("hello!"), "hello!");
        assert_eq!(clean_text("「こんにちは。」"), "「こんにちは。」");
    }

    #[test]
    fn test_wrapped_exactly_once() {
        let out = normalize("Bonjour", Lang::Fr);
        assert_eq!(out, "<fr>Bonjour.</fr>");
        assert_eq!(out.matches("<fr>").count(), 1);
    }

    #[test]
    fn test_char_substitutions() {
        assert_eq!(clean_text("a – b — c"), "a - b - c.");
        assert_eq!(clean_text("“quoted”"), "\"quoted\"");
        assert_eq!(clean_text("path/to/file"), "path to file.");
    }

    #[test]
    fn test_decorative_symbols_deleted() {
        assert_eq!(clean_text("I ♥ you"), "I you.");
    }

    #[test]
    fn test_phrase_substitutions() {
        assert_eq!(clean_text("me@home"), "me at home.");
        assert_eq!(
            clean_text("fruit, e.g., apples"),
            "fruit, for example, apples."
        );
    }

    #[test]
    fn test_space_before_punctuation_removed() {
        assert_eq!(clean_text("wait , what ?"), "wait, what?");
    }

    #[test]
    fn test_quote_collapse() {
        assert_eq!(clean_text("he said \"\"\"hi\"\"\""), "he said \"hi\"");
    }

    #[test]
    fn test_emoji_stripped() {
        assert_eq!(clean_text("fine 😀🚀"), "fine.");
    }

    #[test]
    fn test_lang_parsing() {
        assert_eq!("ko".parse::<Lang>().unwrap(), Lang::Ko);
        assert!(matches!(
            "de".parse::<Lang>(),
            Err(Error::InvalidLanguage(_))
        ));
    }
}
