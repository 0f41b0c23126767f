//! Text cleaning, normalization and PII redaction
//!
//! `preprocess` runs ahead of every parser: whitespace/punctuation cleanup
//! first, then (when enabled) redaction of emails, phone numbers, passport
//! and card numbers and labelled INNs. `normalize_text` produces the stable
//! lowercase form used for cache fingerprints and history template keys.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static PUNCT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([!?.,]){4,}").unwrap());

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

// Russian national formats: +7/8 prefix, 10 digits with optional separators.
static PHONE_RU_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+7|\b8)[\s\-.]?\(?\d{3}\)?[\s\-.]?\d{3}[\s\-.]?\d{2}[\s\-.]?\d{2}\b").unwrap()
});

// Permissive international fallback, requires an explicit + prefix so that
// plain counts and durations are never swallowed.
static PHONE_INTL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+\d{1,3}[\s\-.]?\(?\d{1,4}\)?[\s\-.]?\d{1,4}[\s\-.]?\d{1,9}").unwrap()
});

static PASSPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}\s?\d{6}\b").unwrap());

static CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b").unwrap());

// Only redacts when the ИНН label is present; bare 10-12 digit runs stay.
static INN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bИНН:?\s*\d{10,12}\b").unwrap());

static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

static SENTENCE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\s+(?:\p{Lu})").unwrap());

/// Stateless text preprocessor; holds only the redaction switch
#[derive(Debug, Clone)]
pub struct TextPreprocessor {
    redaction_enabled: bool,
}

impl TextPreprocessor {
    pub fn new(redaction_enabled: bool) -> Self {
        Self { redaction_enabled }
    }

    /// Clean the text and, when enabled, redact PII
    pub fn preprocess(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let cleaned = Self::clean_text(text);
        if self.redaction_enabled {
            Self::redact_pii(&cleaned)
        } else {
            cleaned
        }
    }

    fn clean_text(text: &str) -> String {
        let collapsed = WHITESPACE_RE.replace_all(text, " ");
        let trimmed_punct = PUNCT_RUN_RE.replace_all(&collapsed, "$1$1$1");
        trimmed_punct.trim().to_string()
    }

    fn redact_pii(text: &str) -> String {
        let text = EMAIL_RE.replace_all(text, "<EMAIL>");
        let text = Self::redact_phone_numbers(&text);
        let text = PASSPORT_RE.replace_all(&text, "<PASSPORT>");
        let text = CARD_RE.replace_all(&text, "<CARD>");
        INN_RE.replace_all(&text, "<INN>").into_owned()
    }

    /// Russia-biased matching first; the permissive international pattern is
    /// only applied when no national format was found.
    fn redact_phone_numbers(text: &str) -> String {
        if PHONE_RU_RE.is_match(text) {
            PHONE_RU_RE.replace_all(text, "<PHONE>").into_owned()
        } else {
            PHONE_INTL_RE.replace_all(text, "<PHONE>").into_owned()
        }
    }

    /// Lowercase, strip punctuation, collapse whitespace. Used for cache
    /// fingerprints and history template keys.
    pub fn normalize_text(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let stripped = NON_WORD_RE.replace_all(&lowered, "");
        WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
    }

    /// Split into sentences on terminal punctuation followed by an uppercase
    /// letter. Utility, not on the analysis hot path.
    pub fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut last = 0;
        for m in SENTENCE_SPLIT_RE.find_iter(text) {
            // the match consumes the uppercase letter of the next sentence,
            // so cut right before it
            let boundary = m.end() - text[..m.end()].chars().next_back().map_or(0, char::len_utf8);
            let chunk = text[last..boundary].trim_matches(|c: char| c.is_whitespace() || ".!?".contains(c));
            if !chunk.is_empty() {
                sentences.push(chunk.to_string());
            }
            last = boundary;
        }
        let tail = text[last..].trim();
        if !tail.is_empty() {
            sentences.push(tail.trim_end_matches(|c: char| ".!?".contains(c)).trim().to_string());
        }
        sentences.retain(|s| !s.is_empty());
        sentences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preprocessor() -> TextPreprocessor {
        TextPreprocessor::new(true)
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(preprocessor().preprocess(""), "");
    }

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(preprocessor().preprocess("  Сходил   в\tзал  "), "Сходил в зал");
    }

    #[test]
    fn collapses_excessive_punctuation_to_three() {
        assert_eq!(preprocessor().preprocess("Ура!!!!!"), "Ура!!!");
        assert_eq!(preprocessor().preprocess("Ну....."), "Ну...");
        // three or fewer stay untouched
        assert_eq!(preprocessor().preprocess("Ура!!!"), "Ура!!!");
    }

    #[test]
    fn preprocess_is_idempotent() {
        let p = preprocessor();
        let texts = [
            "Сходил   в зал!!!!!",
            "Почта test@example.com, телефон +7 999 123-45-67",
            "Читал 2 часа",
        ];
        for text in texts {
            let once = p.preprocess(text);
            assert_eq!(p.preprocess(&once), once);
        }
    }

    #[test]
    fn redacts_email() {
        let out = preprocessor().preprocess("Написал на ivan.petrov@example.com про отчёт");
        assert!(out.contains("<EMAIL>"));
        assert!(!out.contains("example.com"));
    }

    #[test]
    fn redacts_russian_phone_formats() {
        let p = preprocessor();
        for text in [
            "позвони +7 999 123-45-67",
            "позвони 8(999)123-45-67",
            "позвони +7-999-123-45-67",
        ] {
            let out = p.preprocess(text);
            assert!(out.contains("<PHONE>"), "not redacted: {out}");
            assert!(!out.contains("123"), "digits leaked: {out}");
        }
    }

    #[test]
    fn redacts_international_phone_via_fallback() {
        let out = preprocessor().preprocess("call me at +49 170 1234567");
        assert!(out.contains("<PHONE>"));
    }

    #[test]
    fn keeps_durations_intact() {
        let out = preprocessor().preprocess("Тренировался 120 минут, пробежал 10 км");
        assert_eq!(out, "Тренировался 120 минут, пробежал 10 км");
    }

    #[test]
    fn redacts_passport_and_card() {
        let p = preprocessor();
        let out = p.preprocess("паспорт 1234 567890 потерял");
        assert!(out.contains("<PASSPORT>"));
        let out = p.preprocess("карта 1234-5678-9012-3456 заблокирована");
        assert!(out.contains("<CARD>"));
        assert!(!out.contains("9012"));
    }

    #[test]
    fn redacts_inn_only_with_label() {
        let p = preprocessor();
        let out = p.preprocess("мой ИНН: 1234567890 записан");
        assert!(out.contains("<INN>"));
        // bare long numbers stay (deliberately conservative)
        let out = p.preprocess("насчитал 1234567890 шагов");
        assert!(out.contains("1234567890"));
    }

    #[test]
    fn redaction_disabled_only_cleans() {
        let p = TextPreprocessor::new(false);
        let out = p.preprocess("почта  test@example.com!!!!!");
        assert_eq!(out, "почта test@example.com!!!");
    }

    #[test]
    fn normalize_lowercases_and_strips_punctuation() {
        let p = preprocessor();
        assert_eq!(p.normalize_text("Сходил в Зал!"), "сходил в зал");
        assert_eq!(p.normalize_text("  Читал,  книгу... "), "читал книгу");
    }

    #[test]
    fn normalize_is_idempotent() {
        let p = preprocessor();
        for text in ["Сходил в Зал!", "ЧИТАЛ 2 часа?!", "  пусто  "] {
            let once = p.normalize_text(text);
            assert_eq!(p.normalize_text(&once), once);
        }
    }

    #[test]
    fn splits_sentences_on_terminal_punctuation() {
        let p = preprocessor();
        let sentences = p.split_sentences("Сходил в зал. Потом читал книгу! Вечером отдыхал");
        assert_eq!(
            sentences,
            vec!["Сходил в зал", "Потом читал книгу", "Вечером отдыхал"]
        );
    }
}
