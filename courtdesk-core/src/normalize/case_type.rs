//! Case-type resolution: spoken text → registry code.
//!
//! Precedence: exact code → exact name → nearest neighbour above a
//! similarity floor.

use serde::{Deserialize, Serialize};

use super::{canonicalize, compact};

/// Minimum similarity in [0, 1] for a nearest-neighbour match.
pub const DEFAULT_SIMILARITY_FLOOR: f64 = 0.7;

/// One entry of the case-type registry, e.g. `CWP` / `CIVIL WRIT PETITION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseTypeEntry {
    pub code: String,
    pub name: String,
}

impl CaseTypeEntry {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

const DEFAULT_CASE_TYPES: &[(&str, &str)] = &[
    ("CWP", "CIVIL WRIT PETITION"),
    ("CRM-M", "CRIMINAL MAIN"),
    ("CR", "CIVIL REVISION"),
    ("RSA", "REGULAR SECOND APPEAL"),
    ("CRR", "CRIMINAL REVISION"),
    ("CRA-S", "CRIMINAL APPEAL SB"),
    ("FAO", "FIRST APPEAL ORDER"),
    ("CM", "CIVIL MISC"),
    ("CRM", "CRIMINAL MISCELLANEOUS PETITION"),
    ("ARB", "ARBITRATION ACT CASE"),
    ("CA", "CIVIL APPEAL"),
    ("CACP", "CONTEMPT APPEALS"),
    ("CO", "CIVIL ORIGINAL"),
    ("COCP", "CIVIL ORIGINAL CONTEMPT PETITION"),
    ("CRA", "CRIMINAL APPEAL"),
    ("CRA-D", "CRIMINAL APPEAL DB"),
    ("CRWP", "CRIMINAL WRIT PETITION"),
    ("CS", "CIVIL SUIT"),
    ("CWP-PIL", "CIVIL WRIT PETITION PUBLIC INTEREST LITIGATION"),
    ("DP", "DIVORCE PETITION"),
    ("EA", "EXECUTION APPL"),
    ("EFA", "EXECUTION FIRST APPEAL"),
    ("EP", "ELECTION PETITIONS"),
    ("ESA", "EXECUTION SECOND APPEAL"),
    ("ITA", "INCOME TAX APPEAL"),
    ("LPA", "LATTER PATENT APPEALS"),
    ("MRC", "MURDER REFERENCE CASE"),
    ("PBT", "PROBATE"),
    ("RA", "REVIEW APPL"),
    ("RFA", "REGULAR FIRST APPEAL"),
    ("SA", "SERVICE APPEAL"),
    ("SAO", "SECOND APPEAL ORDER"),
    ("TA", "TRANSFER APPLICATION"),
    ("XOBJ", "CROSS OBJECTION"),
];

/// The built-in case-type registry.
pub fn default_case_types() -> Vec<CaseTypeEntry> {
    DEFAULT_CASE_TYPES
        .iter()
        .map(|(code, name)| CaseTypeEntry::new(*code, *name))
        .collect()
}

/// Normalized Levenshtein similarity in [0, 1]; 1.0 means identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    1.0 - prev[b.len()] as f64 / longest as f64
}

/// Resolve `raw` against `known` with [`DEFAULT_SIMILARITY_FLOOR`].
pub fn resolve_case_type(raw: &str, known: &[CaseTypeEntry]) -> Option<String> {
    resolve_case_type_with_floor(raw, known, DEFAULT_SIMILARITY_FLOOR)
}

/// Resolve `raw` to a registry code.
///
/// 1. Code match, ignoring case and separators (`c w p` → `CWP`). A code
///    spoken inside a longer phrase is found by scanning words from the end
///    ("case type CWP").
/// 2. Exact name match, ignoring case and separators.
/// 3. Nearest code or name whose similarity is at least `floor`.
///
/// Codes are tried before names, so a name that contains another entry's
/// code as a word resolves to that code.
pub fn resolve_case_type_with_floor(
    raw: &str,
    known: &[CaseTypeEntry],
    floor: f64,
) -> Option<String> {
    let spoken = canonicalize(raw);
    if spoken.is_empty() {
        return None;
    }

    let spoken_compact = compact(&spoken);
    if let Some(entry) = known.iter().find(|e| compact(&e.code) == spoken_compact) {
        return Some(entry.code.clone());
    }
    for word in spoken.split(' ').rev() {
        let word = compact(word);
        if word.is_empty() {
            continue;
        }
        if let Some(entry) = known.iter().find(|e| compact(&e.code) == word) {
            return Some(entry.code.clone());
        }
    }

    if let Some(entry) = known.iter().find(|e| canonicalize(&e.name) == spoken) {
        return Some(entry.code.clone());
    }

    let mut best: Option<(&CaseTypeEntry, f64)> = None;
    for entry in known {
        let score = similarity(&spoken, &canonicalize(&entry.code))
            .max(similarity(&spoken, &canonicalize(&entry.name)));
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((entry, score));
        }
    }
    best.filter(|(_, score)| *score >= floor)
        .map(|(entry, _)| entry.code.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn similarity_bounds() {
        assert_relative_eq!(similarity("", ""), 1.0);
        assert_relative_eq!(similarity("CWP", "CWP"), 1.0);
        assert_relative_eq!(similarity("ABC", "XYZ"), 0.0);
        assert_relative_eq!(similarity("CWP", "CRWP"), 0.75);
    }

    #[test]
    fn exact_code_wins_ignoring_case_and_separators() {
        let known = default_case_types();
        assert_eq!(resolve_case_type("cwp", &known).as_deref(), Some("CWP"));
        assert_eq!(resolve_case_type("C W P", &known).as_deref(), Some("CWP"));
        assert_eq!(resolve_case_type("crm m", &known).as_deref(), Some("CRM-M"));
    }

    #[test]
    fn code_inside_a_phrase_is_found() {
        let known = default_case_types();
        assert_eq!(
            resolve_case_type("case type is RSA", &known).as_deref(),
            Some("RSA")
        );
    }

    #[test]
    fn code_word_inside_a_name_beats_the_name() {
        let known = vec![
            CaseTypeEntry::new("SA", "SERVICE APPEAL"),
            CaseTypeEntry::new("LAC", "LAND ACQUISITION SA"),
        ];
        assert_eq!(
            resolve_case_type("land acquisition sa", &known).as_deref(),
            Some("SA")
        );
        assert_eq!(resolve_case_type("service appeal", &known).as_deref(), Some("SA"));
        assert_eq!(resolve_case_type("LAC", &known).as_deref(), Some("LAC"));
    }

    #[test]
    fn exact_name_resolves_to_code() {
        let known = default_case_types();
        assert_eq!(
            resolve_case_type("Civil Writ Petition", &known).as_deref(),
            Some("CWP")
        );
    }

    #[test]
    fn near_miss_name_resolves_above_floor() {
        let known = default_case_types();
        assert_eq!(
            resolve_case_type("regular second apeal", &known).as_deref(),
            Some("RSA")
        );
    }

    #[test]
    fn unrelated_text_is_rejected() {
        let known = default_case_types();
        assert_eq!(resolve_case_type("good morning everyone", &known), None);
        assert_eq!(resolve_case_type("   ", &known), None);
    }

    #[test]
    fn code_precedes_name() {
        let known = vec![
            CaseTypeEntry::new("CS", "CIVIL SUIT"),
            CaseTypeEntry::new("CIVIL SUIT", "SOMETHING ELSE"),
        ];
        assert_eq!(
            resolve_case_type("civil suit", &known).as_deref(),
            Some("CIVIL SUIT")
        );
    }
}
