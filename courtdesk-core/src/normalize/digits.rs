//! Spoken-digit lexicons.
//!
//! Each language maps its native numeral glyphs and its spelled-out number
//! words to ASCII digits. English number words are accepted in every
//! language because recognizers frequently emit them in Latin script.

use crate::language::Language;

const ENGLISH_WORDS: &[(&str, char)] = &[
    ("zero", '0'),
    ("oh", '0'),
    ("one", '1'),
    ("two", '2'),
    ("three", '3'),
    ("four", '4'),
    ("five", '5'),
    ("six", '6'),
    ("seven", '7'),
    ("eight", '8'),
    ("nine", '9'),
];

const HINDI_WORDS: &[(&str, char)] = &[
    ("शून्य", '0'),
    ("एक", '1'),
    ("दो", '2'),
    ("तीन", '3'),
    ("चार", '4'),
    ("पांच", '5'),
    ("पाँच", '5'),
    ("छह", '6'),
    ("छः", '6'),
    ("सात", '7'),
    ("आठ", '8'),
    ("नौ", '9'),
];

const PUNJABI_WORDS: &[(&str, char)] = &[
    ("ਸਿਫ਼ਰ", '0'),
    ("ਸਿਫਰ", '0'),
    ("ਇੱਕ", '1'),
    ("ਇਕ", '1'),
    ("ਦੋ", '2'),
    ("ਤਿੰਨ", '3'),
    ("ਚਾਰ", '4'),
    ("ਪੰਜ", '5'),
    ("ਛੇ", '6'),
    ("ਸੱਤ", '7'),
    ("ਅੱਠ", '8'),
    ("ਨੌਂ", '9'),
    ("ਨੌ", '9'),
];

/// Devanagari digit zero (U+0966).
const DEVANAGARI_ZERO: u32 = 0x0966;
/// Gurmukhi digit zero (U+0A66).
const GURMUKHI_ZERO: u32 = 0x0A66;

fn native_words(language: Language) -> &'static [(&'static str, char)] {
    match language {
        Language::En => &[],
        Language::Hi => HINDI_WORDS,
        Language::Pa => PUNJABI_WORDS,
    }
}

fn native_zero(language: Language) -> Option<u32> {
    match language {
        Language::En => None,
        Language::Hi => Some(DEVANAGARI_ZERO),
        Language::Pa => Some(GURMUKHI_ZERO),
    }
}

fn native_glyph_digit(language: Language, c: char) -> Option<char> {
    let zero = native_zero(language)?;
    let offset = (c as u32).checked_sub(zero)?;
    if offset < 10 {
        char::from_digit(offset, 10)
    } else {
        None
    }
}

fn is_edge_punctuation(c: char) -> bool {
    matches!(c, '.' | ',' | '?' | '!' | ';' | ':' | '।')
}

fn lookup_word(language: Language, word: &str) -> Option<char> {
    let lower = word.to_lowercase();
    ENGLISH_WORDS
        .iter()
        .chain(native_words(language).iter())
        .find(|(w, _)| *w == lower)
        .map(|(_, d)| *d)
}

/// `2O25` → `2025`: a letter O inside an otherwise numeric token is a zero.
fn fix_letter_o(token: String) -> String {
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let only_digits_or_o = token
        .chars()
        .all(|c| c.is_ascii_digit() || c == 'O' || c == 'o');
    if has_digit && only_digits_or_o {
        token
            .chars()
            .map(|c| if c == 'O' || c == 'o' { '0' } else { c })
            .collect()
    } else {
        token
    }
}

fn map_token(language: Language, token: &str) -> String {
    let word = token.trim_matches(is_edge_punctuation);
    if word.is_empty() {
        return token.to_string();
    }
    if let Some(digit) = lookup_word(language, word) {
        return digit.to_string();
    }
    let glyphs_mapped: String = word
        .chars()
        .map(|c| native_glyph_digit(language, c).unwrap_or(c))
        .collect();
    fix_letter_o(glyphs_mapped)
}

/// Every lexicon entry accepted in `language`: the English number words,
/// the native number words and the ten native numeral glyphs, each with the
/// digit it stands for.
pub fn lexicon(language: Language) -> Vec<(String, char)> {
    let words = ENGLISH_WORDS
        .iter()
        .chain(native_words(language))
        .map(|(word, digit)| (word.to_string(), *digit));
    let glyphs = native_zero(language).into_iter().flat_map(|zero| {
        (0..10u32).filter_map(move |i| {
            Some((char::from_u32(zero + i)?.to_string(), char::from_digit(i, 10)?))
        })
    });
    words.chain(glyphs).collect()
}

/// Replace every spoken number word and native numeral glyph with its ASCII
/// digit. Whitespace runs collapse to one space; other tokens pass through.
///
/// The output contains no lexicon entries, so the mapping is idempotent.
pub fn map_spoken_digits(text: &str, language: Language) -> String {
    text.split_whitespace()
        .map(|token| map_token(language, token))
        .collect::<Vec<_>>()
        .join(" ")
}
