//! Kiosk languages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A language the kiosk can speak and listen in.
///
/// Punjabi is the default until the visitor picks a language.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Hi,
    #[default]
    Pa,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Hi, Language::Pa];

    /// ISO 639-1 code passed to the speech and translation providers.
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Pa => "pa",
        }
    }

    /// English name, used in confirmations ("Ok you have selected Hindi.").
    pub fn display_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Hi => "Hindi",
            Language::Pa => "Punjabi",
        }
    }

    /// Parse a language code or English name. Unknown input yields `None`.
    pub fn parse(raw: &str) -> Option<Language> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Language::En),
            "hi" | "hin" | "hindi" => Some(Language::Hi),
            "pa" | "pan" | "punjabi" => Some(Language::Pa),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_codes_and_names() {
        assert_eq!(Language::parse("EN"), Some(Language::En));
        assert_eq!(Language::parse(" hindi "), Some(Language::Hi));
        assert_eq!(Language::parse("pa"), Some(Language::Pa));
        assert_eq!(Language::parse("fr"), None);
    }

    #[test]
    fn serializes_as_lowercase_code() {
        let json = serde_json::to_string(&Language::Pa).expect("serialize language");
        assert_eq!(json, "\"pa\"");
    }
}
