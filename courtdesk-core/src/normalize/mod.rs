//! Field normalization and validation.
//!
//! Pure, deterministic functions with no I/O. Spoken answers pass through
//! [`map_spoken_digits`] before any numeric validation.

pub mod case_type;
pub mod digits;

pub use case_type::{
    default_case_types, resolve_case_type, resolve_case_type_with_floor, similarity,
    CaseTypeEntry, DEFAULT_SIMILARITY_FLOOR,
};
pub use digits::map_spoken_digits;

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Length of an eCourts CNR identifier.
pub const CNR_LENGTH: usize = 16;

fn case_number_grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Regex::new(r"^[0-9]+(-[A-Za-z0-9_]+)?$").expect("case-number grammar is a valid regex")
    })
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '/' | '_' | '.' | ',' | '–' | '—')
}

/// Case-fold to upper case, unify dash variants and collapse whitespace.
pub fn canonicalize(text: &str) -> String {
    let unified: String = text
        .chars()
        .map(|c| match c {
            '_' | '–' | '—' => '-',
            other => other,
        })
        .collect();
    unified
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" -", "-")
        .replace("- ", "-")
        .to_uppercase()
}

/// Upper-cased alphanumerics only: `crm - m` → `CRMM`.
pub fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Capitalize the first letter of every word and lower-case the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.trim().chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Split on separators, join the numeric parts as the number and the
/// remaining parts as an upper-cased suffix, then check the
/// `number[-suffix]` grammar. Input without a numeric part is invalid.
///
/// `"1234 ABC"` → `"1234-ABC"`.
pub fn normalize_case_number(raw: &str) -> Option<String> {
    let mut number = String::new();
    let mut suffix = String::new();
    for part in raw.split(is_separator).filter(|p| !p.is_empty()) {
        if part.chars().all(|c| c.is_ascii_digit()) {
            number.push_str(part);
        } else {
            suffix.push_str(&part.to_uppercase());
        }
    }
    if number.is_empty() {
        return None;
    }

    let structured = if suffix.is_empty() {
        number
    } else {
        format!("{number}-{suffix}")
    };
    case_number_grammar()
        .is_match(&structured)
        .then_some(structured)
}

/// Accept exactly four ASCII digits once whitespace is removed.
pub fn normalize_case_year(raw: &str) -> Option<String> {
    let year: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    (year.len() == 4 && year.chars().all(|c| c.is_ascii_digit())).then_some(year)
}

/// Digit-map then validate a spoken case number.
pub fn spoken_case_number(text: &str, language: Language) -> Option<String> {
    normalize_case_number(&map_spoken_digits(text, language))
}

/// Digit-map then validate a spoken case year.
pub fn spoken_case_year(text: &str, language: Language) -> Option<String> {
    normalize_case_year(&map_spoken_digits(text, language))
}

/// Filing and FIR numbers: digit-mapped, upper-cased, spoken gaps become
/// `/` (`f 2025 123` → `F/2025/123`). Digits spoken one at a time stay
/// together. Must contain at least one digit.
pub fn spoken_reference_number(text: &str, language: Language) -> Option<String> {
    let mapped = map_spoken_digits(text, language).to_uppercase();
    let mut groups: Vec<String> = Vec::new();
    let mut in_digit_run = false;
    for token in mapped.split_whitespace() {
        let single_digit = token.len() == 1 && token.chars().all(|c| c.is_ascii_digit());
        match groups.last_mut() {
            Some(last) if single_digit && in_digit_run => last.push_str(token),
            _ => groups.push(token.to_string()),
        }
        in_digit_run = single_digit;
    }
    let joined = groups.join("/");
    joined
        .chars()
        .any(|c| c.is_ascii_digit())
        .then_some(joined)
}

/// CNR identifiers: digit-mapped, spaces removed, upper-cased, exactly
/// [`CNR_LENGTH`] ASCII alphanumerics.
pub fn spoken_cnr(text: &str, language: Language) -> Option<String> {
    let cnr: String = map_spoken_digits(text, language)
        .chars()
        .filter(|c| !is_separator(*c))
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (cnr.len() == CNR_LENGTH && cnr.chars().all(|c| c.is_ascii_alphanumeric())).then_some(cnr)
}

/// The three-part key used to look up a registered case. Only constructed
/// from independently validated parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseIdentifier {
    pub case_type: String,
    pub case_number: String,
    pub case_year: String,
}

impl CaseIdentifier {
    pub fn new(case_type: &str, case_number: &str, case_year: &str) -> Option<Self> {
        let case_type = case_type.trim();
        if case_type.is_empty() {
            return None;
        }
        Some(Self {
            case_type: case_type.to_string(),
            case_number: normalize_case_number(case_number)?,
            case_year: normalize_case_year(case_year)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_number_joins_number_and_suffix() {
        assert_eq!(normalize_case_number("1234 ABC").as_deref(), Some("1234-ABC"));
        assert_eq!(normalize_case_number("abc/1234").as_deref(), Some("1234-ABC"));
        assert_eq!(normalize_case_number("1234").as_deref(), Some("1234"));
        assert_eq!(normalize_case_number("1 2 3 4").as_deref(), Some("1234"));
    }

    #[test]
    fn case_number_without_numeric_part_is_invalid() {
        assert_eq!(normalize_case_number("ABC"), None);
        assert_eq!(normalize_case_number(""), None);
    }

    #[test]
    fn case_number_rejects_non_word_suffix() {
        assert_eq!(normalize_case_number("1234 A#B"), None);
        assert_eq!(normalize_case_number("1234 क"), None);
    }

    #[test]
    fn case_year_requires_four_digits() {
        assert_eq!(normalize_case_year("2025").as_deref(), Some("2025"));
        assert_eq!(normalize_case_year("2 0 2 5").as_deref(), Some("2025"));
        assert_eq!(normalize_case_year("25"), None);
        assert_eq!(normalize_case_year("20255"), None);
        assert_eq!(normalize_case_year("२०२५"), None);
    }

    #[test]
    fn spoken_year_is_idempotent_for_every_language() {
        let samples = [
            ("two zero two five", Language::En),
            ("२०२५", Language::Hi),
            ("दो शून्य दो पांच", Language::Hi),
            ("੨੦੨੪", Language::Pa),
            ("ਦੋ ਸਿਫਰ ਦੋ ਚਾਰ", Language::Pa),
            ("not a year", Language::En),
        ];
        for (text, lang) in samples {
            let once = map_spoken_digits(text, lang);
            let twice = map_spoken_digits(&once, lang);
            assert_eq!(once, twice, "mapping not idempotent for {text:?}");
            assert_eq!(
                normalize_case_year(&once),
                normalize_case_year(&twice),
                "year not idempotent for {text:?}"
            );
            if let Some(year) = normalize_case_year(&once) {
                assert_eq!(spoken_case_year(&year, lang), Some(year));
            }
        }
    }

    #[test]
    fn every_lexicon_entry_maps_idempotently() {
        for lang in Language::ALL {
            let lexicon = digits::lexicon(lang);
            let expected_len = if lang == Language::En { 11 } else { 21 };
            assert!(lexicon.len() >= expected_len, "{lang} lexicon too small");
            for (entry, digit) in lexicon {
                let once = map_spoken_digits(&entry, lang);
                assert_eq!(once, digit.to_string(), "{entry:?} in {lang}");
                assert_eq!(map_spoken_digits(&once, lang), once, "{entry:?} in {lang}");

                let spoken = format!("{entry} {entry} {entry} {entry}");
                let year = spoken_case_year(&spoken, lang);
                assert_eq!(year, Some(digit.to_string().repeat(4)), "{spoken:?} in {lang}");
                let year = year.unwrap_or_default();
                assert_eq!(spoken_case_year(&year, lang), Some(year.clone()));
            }
        }
    }

    #[test]
    fn spoken_case_number_maps_words_first() {
        assert_eq!(
            spoken_case_number("one two three four abc", Language::En).as_deref(),
            Some("1234-ABC")
        );
    }

    #[test]
    fn reference_number_uses_slashes() {
        assert_eq!(
            spoken_reference_number("f 2025 one two three", Language::En).as_deref(),
            Some("F/2025/123")
        );
        assert_eq!(spoken_reference_number("no digits here", Language::En), None);
    }

    #[test]
    fn cnr_requires_sixteen_alphanumerics() {
        assert_eq!(
            spoken_cnr("abc1234567892025", Language::En).as_deref(),
            Some("ABC1234567892025")
        );
        assert_eq!(
            spoken_cnr("PBSG 0100 1234 2025", Language::En).as_deref(),
            Some("PBSG010012342025")
        );
        assert_eq!(spoken_cnr("ABC123", Language::En), None);
    }

    #[test]
    fn canonicalize_folds_case_and_separators() {
        assert_eq!(canonicalize("  crm _ m  "), "CRM-M");
        assert_eq!(canonicalize("civil   suit"), "CIVIL SUIT");
    }

    #[test]
    fn title_case_matches_display_style() {
        assert_eq!(title_case("RAM kumar singh"), "Ram Kumar Singh");
        assert_eq!(title_case("police station-2"), "Police Station-2");
    }

    #[test]
    fn case_identifier_validates_each_part() {
        let id = CaseIdentifier::new("CWP", "1234 abc", "2024").expect("valid identifier");
        assert_eq!(id.case_number, "1234-ABC");
        assert!(CaseIdentifier::new("CWP", "abc", "2024").is_none());
        assert!(CaseIdentifier::new("CWP", "1234", "24").is_none());
        assert!(CaseIdentifier::new(" ", "1234", "2024").is_none());
    }
}
