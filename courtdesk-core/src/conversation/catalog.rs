//! What the kiosk can ask and look up.
//!
//! Menus are data: one [`MenuEntry`] per option with its accepted phrases.
//! Each [`Query`] owns its endpoint, its ordered field plan and its spoken
//! outcome messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::RawAnswer;
use crate::dialog::{DialogStep, Menu, MenuEntry, Rejection};
use crate::language::Language;
use crate::normalize::{
    self, resolve_case_type_with_floor, spoken_case_number, spoken_case_year, spoken_cnr,
    spoken_reference_number, CaseTypeEntry,
};

// ---------------------------------------------------------------------------
// Menus
// ---------------------------------------------------------------------------

const LANGUAGES: &[MenuEntry<Language>] = &[
    MenuEntry {
        value: Language::En,
        label: "English",
        phrases: &[
            (Language::En, &["english", "angrezi", "angrezee"]),
            (Language::Hi, &["अंग्रेज़ी", "अंग्रेजी"]),
            (Language::Pa, &["ਅੰਗਰੇਜ਼ੀ", "ਅੰਗਰੇਜ਼ੀ"]),
        ],
    },
    MenuEntry {
        value: Language::Hi,
        label: "Hindi",
        phrases: &[
            (Language::En, &["hindi", "hindee"]),
            (Language::Hi, &["हिन्दी", "हिंदी"]),
            (Language::Pa, &["ਹਿੰਦੀ"]),
        ],
    },
    MenuEntry {
        value: Language::Pa,
        label: "Punjabi",
        phrases: &[
            (Language::En, &["punjabi", "panjabi", "panjaabee"]),
            (Language::Hi, &["पंजाबी"]),
            (Language::Pa, &["ਪੰਜਾਬੀ"]),
        ],
    },
];

/// Language choice; answers in any language are understood.
pub const LANGUAGE_MENU: Menu<Language> = Menu::any_language(LANGUAGES);

/// Court establishments served by this kiosk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Establishment {
    DistrictSessionCourt,
    CriminalCourt,
    CivilCourt,
}

const ESTABLISHMENTS: &[MenuEntry<Establishment>] = &[
    MenuEntry {
        value: Establishment::DistrictSessionCourt,
        label: "District & Session Court Sangrur",
        phrases: &[
            (Language::En, &["district", "session", "sessions"]),
            (Language::Hi, &["जिला", "ज़िला", "सत्र"]),
            (Language::Pa, &["ਜ਼ਿਲ੍ਹਾ", "ਜਿਲ੍ਹਾ", "ਸੈਸ਼ਨ"]),
        ],
    },
    MenuEntry {
        value: Establishment::CriminalCourt,
        label: "Criminal Court Sangrur",
        phrases: &[
            (Language::En, &["criminal"]),
            (Language::Hi, &["आपराधिक", "फौजदारी"]),
            (Language::Pa, &["ਫੌਜਦਾਰੀ", "ਅਪਰਾਧਿਕ"]),
        ],
    },
    MenuEntry {
        value: Establishment::CivilCourt,
        label: "Civil Court Sangrur",
        phrases: &[
            (Language::En, &["civil"]),
            (Language::Hi, &["सिविल", "दीवानी"]),
            (Language::Pa, &["ਸਿਵਲ", "ਦੀਵਾਨੀ"]),
        ],
    },
];

pub const ESTABLISHMENT_MENU: Menu<Establishment> = Menu::new(ESTABLISHMENTS);

impl Establishment {
    pub fn label(self) -> &'static str {
        ESTABLISHMENT_MENU.label_of(self).unwrap_or("Court")
    }
}

/// Top-level search categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchCategory {
    CaseSearch,
    Advocate,
    CauseList,
    LokAdalat,
    Caveat,
    Panel,
}

const CATEGORIES: &[MenuEntry<SearchCategory>] = &[
    MenuEntry {
        value: SearchCategory::CaseSearch,
        label: "Case Search",
        phrases: &[
            (Language::En, &["case search", "case"]),
            (Language::Hi, &["केस", "मामला"]),
            (Language::Pa, &["ਕੇਸ", "ਮਾਮਲਾ"]),
        ],
    },
    MenuEntry {
        value: SearchCategory::Advocate,
        label: "Advocate",
        phrases: &[
            (Language::En, &["advocate", "lawyer", "vakil"]),
            (Language::Hi, &["वकील", "अधिवक्ता"]),
            (Language::Pa, &["ਵਕੀਲ"]),
        ],
    },
    MenuEntry {
        value: SearchCategory::CauseList,
        label: "Cause List",
        phrases: &[
            (Language::En, &["cause list", "cause"]),
            (Language::Hi, &["कारण सूची", "वाद सूची"]),
            (Language::Pa, &["ਕਾਰਨ ਸੂਚੀ"]),
        ],
    },
    MenuEntry {
        value: SearchCategory::LokAdalat,
        label: "Lok Adalat Report",
        phrases: &[
            (Language::En, &["lok adalat", "adalat"]),
            (Language::Hi, &["लोक अदालत"]),
            (Language::Pa, &["ਲੋਕ ਅਦਾਲਤ"]),
        ],
    },
    MenuEntry {
        value: SearchCategory::Caveat,
        label: "Caveat Search",
        phrases: &[
            (Language::En, &["caveat"]),
            (Language::Hi, &["कैविएट"]),
            (Language::Pa, &["ਕੈਵੀਏਟ"]),
        ],
    },
    MenuEntry {
        value: SearchCategory::Panel,
        label: "Panel Search",
        phrases: &[
            (Language::En, &["panel"]),
            (Language::Hi, &["पैनल"]),
            (Language::Pa, &["ਪੈਨਲ"]),
        ],
    },
];

pub const CATEGORY_MENU: Menu<SearchCategory> = Menu::new(CATEGORIES);

/// The six ways to look up a single case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseSearchKind {
    Cnr,
    Filing,
    Registration,
    Fir,
    PartyName,
    SubordinateCourt,
}

const CASE_SEARCH_KINDS: &[MenuEntry<CaseSearchKind>] = &[
    MenuEntry {
        value: CaseSearchKind::Cnr,
        label: "CNR Number",
        phrases: &[(Language::En, &["cnr", "c n r"])],
    },
    MenuEntry {
        value: CaseSearchKind::Filing,
        label: "Filing Number",
        phrases: &[
            (Language::En, &["filing"]),
            (Language::Hi, &["फाइलिंग"]),
            (Language::Pa, &["ਫਾਈਲਿੰਗ"]),
        ],
    },
    MenuEntry {
        value: CaseSearchKind::Registration,
        label: "Registration Number",
        phrases: &[
            (Language::En, &["registration"]),
            (Language::Hi, &["पंजीकरण", "रजिस्ट्रेशन"]),
            (Language::Pa, &["ਰਜਿਸਟ੍ਰੇਸ਼ਨ"]),
        ],
    },
    MenuEntry {
        value: CaseSearchKind::Fir,
        label: "FIR Number",
        phrases: &[(Language::En, &["fir", "f i r"])],
    },
    MenuEntry {
        value: CaseSearchKind::PartyName,
        label: "Party Name",
        phrases: &[
            (Language::En, &["party"]),
            (Language::Hi, &["पक्ष", "पार्टी"]),
            (Language::Pa, &["ਪਾਰਟੀ", "ਧਿਰ"]),
        ],
    },
    MenuEntry {
        value: CaseSearchKind::SubordinateCourt,
        label: "Subordinate Court",
        phrases: &[
            (Language::En, &["subordinate"]),
            (Language::Hi, &["अधीनस्थ"]),
            (Language::Pa, &["ਅਧੀਨ"]),
        ],
    },
];

pub const CASE_SEARCH_MENU: Menu<CaseSearchKind> = Menu::new(CASE_SEARCH_KINDS);

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// How a captured field is validated and normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Names and places: non-empty, title-cased.
    FreeText,
    Year,
    /// `digits[-SUFFIX]`.
    CaseNumber,
    Cnr,
    /// Filing-style numbers, `F/2025/123`.
    Reference,
    /// Resolved against the known case types.
    CaseType,
    YesNo,
}

const YES_WORDS: &[&str] = &["yes", "haan", "han", "ha", "हाँ", "हां", "ਹਾਂ", "ji", "जी", "ਜੀ"];
const NO_WORDS: &[&str] = &["no", "nahin", "nahi", "नहीं", "ਨਹੀਂ", "na"];

impl FieldKind {
    pub fn retry_message(self) -> &'static str {
        match self {
            FieldKind::FreeText => "I couldn't understand your input. Please try again.",
            FieldKind::Year => "Please speak a valid four digit year.",
            FieldKind::CaseNumber => "Please speak a valid number.",
            FieldKind::Cnr => "A CNR number has sixteen letters and digits. Please try again.",
            FieldKind::Reference => "Please speak a valid number.",
            FieldKind::CaseType => "No valid case type recognized. Please try again.",
            FieldKind::YesNo => "Please say yes or no.",
        }
    }

    /// Validate and normalize one answer.
    pub fn validate(
        self,
        answer: &RawAnswer,
        language: Language,
        case_types: &[CaseTypeEntry],
        similarity_floor: f64,
    ) -> Result<String, Rejection> {
        let text = answer.as_text();
        let invalid = |what: &str| Rejection::invalid(format!("{what}: {text:?}"));
        match self {
            FieldKind::FreeText => {
                let value = normalize::title_case(&text);
                if value.is_empty() {
                    Err(invalid("empty text"))
                } else {
                    Ok(value)
                }
            }
            FieldKind::Year => spoken_case_year(&text, language).ok_or_else(|| invalid("not a year")),
            FieldKind::CaseNumber => {
                spoken_case_number(&text, language).ok_or_else(|| invalid("not a case number"))
            }
            FieldKind::Cnr => spoken_cnr(&text, language).ok_or_else(|| invalid("not a CNR")),
            FieldKind::Reference => spoken_reference_number(&text, language)
                .ok_or_else(|| invalid("not a reference number")),
            FieldKind::CaseType => resolve_case_type_with_floor(&text, case_types, similarity_floor)
                .ok_or_else(|| invalid("unknown case type")),
            FieldKind::YesNo => match answer {
                RawAnswer::Button('1') => Ok("Yes".into()),
                RawAnswer::Button('2') => Ok("No".into()),
                RawAnswer::Button(_) => Err(invalid("key outside yes/no")),
                RawAnswer::Voice(_) => {
                    let lower = text.to_lowercase();
                    let has = |set: &[&str]| lower.split_whitespace().any(|w| set.contains(&w));
                    match (has(YES_WORDS), has(NO_WORDS)) {
                        (true, false) => Ok("Yes".into()),
                        (false, true) => Ok("No".into()),
                        _ => Err(invalid("neither yes nor no")),
                    }
                }
            },
        }
    }
}

/// One field of a query's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key in the captured fields.
    pub key: &'static str,
    pub prompt: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, prompt: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, prompt, kind }
}

/// Settings a field step needs from the conversation config.
#[derive(Debug, Clone)]
pub struct FieldPolicy {
    pub max_attempts: u32,
    pub listen_timeout: Duration,
    pub identifier_listen_timeout: Duration,
    pub similarity_floor: f64,
}

impl FieldSpec {
    /// Keypad answers only make sense for yes/no; other fields are spoken.
    pub fn accepts_buttons(&self) -> bool {
        self.kind == FieldKind::YesNo
    }

    pub fn step(&self, policy: &FieldPolicy, case_types: Vec<CaseTypeEntry>) -> DialogStep<String> {
        let kind = self.kind;
        let floor = policy.similarity_floor;
        let timeout = if kind == FieldKind::Cnr {
            policy.identifier_listen_timeout
        } else {
            policy.listen_timeout
        };
        let step = DialogStep::new(self.key, self.prompt, move |answer, language| {
            kind.validate(answer, language, &case_types, floor)
        })
        .max_attempts(policy.max_attempts)
        .listen_timeout(timeout)
        .retry_message(kind.retry_message())
        .failure_message(format!("Failed to recognize {} after all attempts.", self.key.replace('_', " ")));
        if self.accepts_buttons() {
            step
        } else {
            step.voice_only()
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// A fully determined lookup: one endpoint and one field plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Query {
    Cnr,
    Filing,
    Registration,
    Fir,
    PartyName,
    SubordinateCourt,
    Advocate,
    CauseList,
    LokAdalat,
    Caveat,
    Panel,
}

const CNR_FIELDS: &[FieldSpec] = &[field("cnr_number", "Please speak CNR Number.", FieldKind::Cnr)];

const FILING_FIELDS: &[FieldSpec] = &[
    field("filing_number", "Please speak Filing Number.", FieldKind::Reference),
    field("year", "Please speak year.", FieldKind::Year),
];

const REGISTRATION_FIELDS: &[FieldSpec] = &[
    field("case_type", "Please speak Case Type.", FieldKind::CaseType),
    field(
        "registration_number",
        "Please speak Registration Number.",
        FieldKind::CaseNumber,
    ),
    field("year", "Please speak Year.", FieldKind::Year),
];

const FIR_FIELDS: &[FieldSpec] = &[
    field("state", "Please speak State name.", FieldKind::FreeText),
    field("district", "Please speak District name.", FieldKind::FreeText),
    field("police_station", "Please speak Police Station name.", FieldKind::FreeText),
    field("fir_number", "Please speak FIR Number.", FieldKind::CaseNumber),
    field("year", "Please speak case year.", FieldKind::Year),
    field("status", "Please speak case status.", FieldKind::FreeText),
];

const PARTY_FIELDS: &[FieldSpec] = &[
    field("petitioner", "Please speak Petitioner Name.", FieldKind::FreeText),
    field("respondent", "Please speak Respondent Name.", FieldKind::FreeText),
    field("status", "Please speak case status.", FieldKind::FreeText),
];

const SUBORDINATE_FIELDS: &[FieldSpec] = &[
    field("state", "Please speak state name.", FieldKind::FreeText),
    field("district", "Please speak district name.", FieldKind::FreeText),
    field("judge_name", "Please speak case judge name.", FieldKind::FreeText),
];

const ADVOCATE_FIELDS: &[FieldSpec] = &[
    field("advocate_name", "Please speak advocate name.", FieldKind::FreeText),
    field("status", "Please speak case status.", FieldKind::FreeText),
];

const CAUSE_LIST_FIELDS: &[FieldSpec] =
    &[field("court_type", "Please speak case type.", FieldKind::FreeText)];

const LOK_ADALAT_FIELDS: &[FieldSpec] = &[
    field("status", "Please speak case status.", FieldKind::FreeText),
    field("lokadalat", "Please speak lok adalat (yes or no).", FieldKind::YesNo),
    field("panel", "Please speak panel.", FieldKind::FreeText),
];

const CAVEAT_FIELDS: &[FieldSpec] = &[
    field("caveat_type", "Please speak caveat type.", FieldKind::FreeText),
    field("caveator_name", "Please speak caveator name.", FieldKind::FreeText),
    field("caveatee_name", "Please speak caveatee name.", FieldKind::FreeText),
];

const PANEL_FIELDS: &[FieldSpec] = &[
    field("police_station", "Please tell me police station name.", FieldKind::FreeText),
    field("fir_type", "Please tell me FIR Type.", FieldKind::FreeText),
    field("fir_number", "Please speak FIR number.", FieldKind::CaseNumber),
    field("year", "Please speak case year.", FieldKind::Year),
];

impl Query {
    pub fn for_case_search(kind: CaseSearchKind) -> Self {
        match kind {
            CaseSearchKind::Cnr => Query::Cnr,
            CaseSearchKind::Filing => Query::Filing,
            CaseSearchKind::Registration => Query::Registration,
            CaseSearchKind::Fir => Query::Fir,
            CaseSearchKind::PartyName => Query::PartyName,
            CaseSearchKind::SubordinateCourt => Query::SubordinateCourt,
        }
    }

    /// `None` for case search, which needs a sub-kind first.
    pub fn for_category(category: SearchCategory) -> Option<Self> {
        match category {
            SearchCategory::CaseSearch => None,
            SearchCategory::Advocate => Some(Query::Advocate),
            SearchCategory::CauseList => Some(Query::CauseList),
            SearchCategory::LokAdalat => Some(Query::LokAdalat),
            SearchCategory::Caveat => Some(Query::Caveat),
            SearchCategory::Panel => Some(Query::Panel),
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            Query::Cnr => "cnr",
            Query::Filing => "filing",
            Query::Registration => "registration",
            Query::Fir => "fir",
            Query::PartyName => "party",
            Query::SubordinateCourt => "subordinate",
            Query::Advocate => "advocate",
            Query::CauseList => "cause_list",
            Query::LokAdalat => "lokadalat",
            Query::Caveat => "caveat",
            Query::Panel => "pre_panel",
        }
    }

    /// Fields asked for, in order.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Query::Cnr => CNR_FIELDS,
            Query::Filing => FILING_FIELDS,
            Query::Registration => REGISTRATION_FIELDS,
            Query::Fir => FIR_FIELDS,
            Query::PartyName => PARTY_FIELDS,
            Query::SubordinateCourt => SUBORDINATE_FIELDS,
            Query::Advocate => ADVOCATE_FIELDS,
            Query::CauseList => CAUSE_LIST_FIELDS,
            Query::LokAdalat => LOK_ADALAT_FIELDS,
            Query::Caveat => CAVEAT_FIELDS,
            Query::Panel => PANEL_FIELDS,
        }
    }

    pub fn not_found_message(self) -> &'static str {
        match self {
            Query::Cnr => "No case found for this CNR number. Please try again.",
            Query::Filing => "No case found for this filing number. Please try again.",
            Query::Registration => "No case found for this registration number. Please try again.",
            Query::Fir => "No case found for this FIR number. Please try again.",
            Query::PartyName => "No case found for these party names. Please try again.",
            Query::SubordinateCourt => "No case found for this subordinate court. Please try again.",
            Query::Advocate => "No case found for this advocate. Please try again.",
            Query::CauseList => "No data found for this cause list. Please try again.",
            Query::LokAdalat => "No data found for this Lok Adalat query. Please try again.",
            Query::Caveat => "No data found for this Caveat query. Please try again.",
            Query::Panel => "No data found for this FIR panel query.",
        }
    }

    pub fn unavailable_message(self) -> &'static str {
        match self {
            Query::Cnr => "Failed to fetch CNR case data. Kindly check the connection.",
            Query::Filing => "Failed to fetch filing case data. Kindly check the connection.",
            Query::Registration => {
                "Failed to fetch registration case data. Kindly check the connection."
            }
            Query::Fir => "Failed to fetch FIR case data. Kindly check the connection.",
            Query::PartyName => "Failed to fetch party case data. Kindly check the connection.",
            Query::SubordinateCourt => {
                "Failed to fetch subordinate court data. Kindly check the connection."
            }
            Query::Advocate => "Failed to fetch Advocate case data. Kindly check the connection.",
            Query::CauseList => "Failed to fetch Cause list data. Kindly check the connection.",
            Query::LokAdalat => "Failed to fetch Lok Adalat data. Kindly check the connection.",
            Query::Caveat => "Failed to fetch Caveat data. Kindly check the connection.",
            Query::Panel => "Failed to fetch FIR Panel data. Kindly check the connection.",
        }
    }
}
