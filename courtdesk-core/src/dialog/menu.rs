//! Table-driven numbered menus.
//!
//! Each entry lists the phrases that select it per language. One matcher
//! serves every menu: a key or spoken number picks the entry at that
//! position, otherwise the first entry with a phrase occurring as whole
//! words in the answer wins.

use std::fmt::Write as _;

use super::{DialogStep, Rejection};
use crate::channel::RawAnswer;
use crate::language::Language;
use crate::normalize::map_spoken_digits;

pub const INVALID_SELECTION: &str = "Invalid selection please try again.";

/// Latin transliterations recognizers emit for Hindi and Punjabi numbers.
const TRANSLITERATED_NUMBERS: &[(&str, usize)] = &[
    ("ek", 1),
    ("ik", 1),
    ("do", 2),
    ("tu", 2),
    ("teen", 3),
    ("tin", 3),
    ("char", 4),
    ("chaar", 4),
    ("panch", 5),
    ("panj", 5),
    ("chhe", 6),
    ("chhah", 6),
];

/// Phrases that select one entry, keyed by language.
pub type PhraseTable = &'static [(Language, &'static [&'static str])];

#[derive(Debug)]
pub struct MenuEntry<T: 'static> {
    pub value: T,
    /// English label, read out in the prompt and the confirmation.
    pub label: &'static str,
    pub phrases: PhraseTable,
}

impl<T> MenuEntry<T> {
    fn phrases_for(&self, language: Language) -> impl Iterator<Item = &'static str> + '_ {
        self.phrases
            .iter()
            .filter(move |(lang, _)| *lang == language)
            .flat_map(|(_, phrases)| phrases.iter().copied())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Menu<T: 'static> {
    entries: &'static [MenuEntry<T>],
    /// Match phrases of every language, not only the session's and English.
    any_language: bool,
}

impl<T: Copy + Send + Sync + 'static> Menu<T> {
    pub const fn new(entries: &'static [MenuEntry<T>]) -> Self {
        Self {
            entries,
            any_language: false,
        }
    }

    /// For the language menu, where the visitor may answer in any language.
    pub const fn any_language(entries: &'static [MenuEntry<T>]) -> Self {
        Self {
            entries,
            any_language: true,
        }
    }

    pub fn entries(&self) -> &'static [MenuEntry<T>] {
        self.entries
    }

    pub fn label_of(&self, value: T) -> Option<&'static str>
    where
        T: PartialEq,
    {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.label)
    }

    /// `header` followed by one numbered line per entry.
    pub fn prompt(&self, header: &str) -> String {
        let mut text = header.trim().to_string();
        for (i, entry) in self.entries.iter().enumerate() {
            let _ = write!(text, "\n{}. {}", i + 1, entry.label);
        }
        text
    }

    fn by_position(&self, position: usize) -> Option<&'static MenuEntry<T>> {
        position.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    fn spoken_position(&self, words: &[String], language: Language) -> Option<usize> {
        words.iter().find_map(|w| {
            if let Ok(n) = w.parse::<usize>() {
                return Some(n);
            }
            if language == Language::En && !self.any_language {
                return None;
            }
            TRANSLITERATED_NUMBERS
                .iter()
                .find(|(word, _)| *word == w.as_str())
                .map(|(_, n)| *n)
        })
    }

    fn phrase_match(&self, words: &[String], language: Language) -> Option<&'static MenuEntry<T>> {
        self.entries.iter().find(|entry| {
            let mut phrases: Box<dyn Iterator<Item = &'static str>> = if self.any_language {
                Box::new(entry.phrases.iter().flat_map(|(_, p)| p.iter().copied()))
            } else {
                Box::new(
                    entry
                        .phrases_for(language)
                        .chain(entry.phrases_for(Language::En)),
                )
            };
            phrases.any(|phrase| contains_words(words, phrase))
        })
    }

    /// Resolve an answer to an entry.
    pub fn resolve(&self, answer: &RawAnswer, language: Language) -> Result<&'static MenuEntry<T>, Rejection> {
        match answer {
            RawAnswer::Button(key) => key
                .to_digit(10)
                .and_then(|d| self.by_position(d as usize))
                .ok_or_else(|| {
                    Rejection::invalid(format!("key {key} outside menu")).with_message(INVALID_SELECTION)
                }),
            RawAnswer::Voice(text) => {
                let words = words_of(&map_spoken_digits(text, language));
                if words.is_empty() {
                    return Err(Rejection::invalid("empty answer"));
                }
                if let Some(entry) = self.phrase_match(&words, language) {
                    return Ok(entry);
                }
                match self.spoken_position(&words, language) {
                    Some(n) => self.by_position(n).ok_or_else(|| {
                        Rejection::invalid(format!("option {n} outside menu"))
                            .with_message(INVALID_SELECTION)
                    }),
                    None => Err(Rejection::invalid(format!("no option matches {text:?}"))),
                }
            }
        }
    }

    /// A dialogue step answering with the selected value.
    pub fn step(&self, name: &str, header: &str) -> DialogStep<T> {
        let menu = *self;
        DialogStep::new(name, self.prompt(header), move |answer, language| {
            menu.resolve(answer, language).map(|entry| entry.value)
        })
    }
}

fn words_of(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '?' | '!' | '।' | '&'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// `phrase`'s words appear contiguously in `words`.
fn contains_words(words: &[String], phrase: &str) -> bool {
    let needle = words_of(phrase);
    !needle.is_empty() && words.windows(needle.len()).any(|window| window == needle.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Fruit {
        Apple,
        Mango,
    }

    const FRUITS: &[MenuEntry<Fruit>] = &[
        MenuEntry {
            value: Fruit::Apple,
            label: "Apple",
            phrases: &[(Language::En, &["apple", "red fruit"]), (Language::Hi, &["सेब"])],
        },
        MenuEntry {
            value: Fruit::Mango,
            label: "Mango",
            phrases: &[(Language::En, &["mango"]), (Language::Pa, &["ਅੰਬ"])],
        },
    ];

    const MENU: Menu<Fruit> = Menu::new(FRUITS);

    fn voice(text: &str) -> RawAnswer {
        RawAnswer::Voice(text.to_string())
    }

    fn value(result: Result<&'static MenuEntry<Fruit>, Rejection>) -> Option<Fruit> {
        result.ok().map(|e| e.value)
    }

    #[test]
    fn prompt_numbers_entries() {
        assert_eq!(MENU.prompt("Pick one."), "Pick one.\n1. Apple\n2. Mango");
    }

    #[test]
    fn keys_select_by_position() {
        assert_eq!(value(MENU.resolve(&RawAnswer::Button('2'), Language::En)), Some(Fruit::Mango));
        let rejected = MENU.resolve(&RawAnswer::Button('7'), Language::En).unwrap_err();
        assert_eq!(rejected.message.as_deref(), Some(INVALID_SELECTION));
        assert!(MENU.resolve(&RawAnswer::Button('#'), Language::En).is_err());
    }

    #[test]
    fn spoken_numbers_select_by_position() {
        assert_eq!(value(MENU.resolve(&voice("number two"), Language::En)), Some(Fruit::Mango));
        assert_eq!(value(MENU.resolve(&voice("ek"), Language::Hi)), Some(Fruit::Apple));
        assert!(MENU.resolve(&voice("ek"), Language::En).is_err());
    }

    #[test]
    fn phrases_match_whole_words_in_session_language_and_english() {
        assert_eq!(
            value(MENU.resolve(&voice("I want the Red Fruit"), Language::En)),
            Some(Fruit::Apple)
        );
        assert_eq!(value(MENU.resolve(&voice("ਅੰਬ"), Language::Pa)), Some(Fruit::Mango));
        assert_eq!(value(MENU.resolve(&voice("mango please"), Language::Hi)), Some(Fruit::Mango));
        assert!(MENU.resolve(&voice("ਅੰਬ"), Language::Hi).is_err());
        assert!(MENU.resolve(&voice("pineapple"), Language::En).is_err());
    }

    #[test]
    fn any_language_menus_match_every_table() {
        let menu = Menu::any_language(FRUITS);
        assert_eq!(value(menu.resolve(&voice("ਅੰਬ"), Language::En)), Some(Fruit::Mango));
        assert!(menu.resolve(&voice("teen"), Language::En).is_err());
    }

    #[test]
    fn empty_answer_is_rejected() {
        assert!(MENU.resolve(&voice("  "), Language::En).is_err());
    }
}
