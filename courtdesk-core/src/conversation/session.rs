//! One run of the kiosk dialogue.

use chrono::{DateTime, Local};
use serde::Serialize;

use super::catalog::{CaseSearchKind, Establishment, Query, SearchCategory};
pub use crate::ipc::events::SessionState;
use crate::language::Language;

/// Captured answers in capture order. Re-capturing a key keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapturedFields(Vec<(String, String)>);

impl CapturedFields {
    pub fn insert(&mut self, key: &str, value: String) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Owned by the orchestrator for the lifetime of one conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: u64,
    pub language: Language,
    pub establishment: Option<Establishment>,
    pub category: Option<SearchCategory>,
    pub case_search: Option<CaseSearchKind>,
    pub query: Option<Query>,
    pub fields: CapturedFields,
    pub state: SessionState,
    pub started_at: DateTime<Local>,
}

impl Session {
    pub fn new(id: u64, language: Language) -> Self {
        Self {
            id,
            language,
            establishment: None,
            category: None,
            case_search: None,
            query: None,
            fields: CapturedFields::default(),
            state: SessionState::Idle,
            started_at: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_keep_capture_order() {
        let mut fields = CapturedFields::default();
        fields.insert("state", "Punjab".into());
        fields.insert("district", "Sangrur".into());
        fields.insert("state", "Haryana".into());
        assert_eq!(fields.keys().collect::<Vec<_>>(), ["state", "district"]);
        assert_eq!(fields.get("state"), Some("Haryana"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn new_session_starts_idle() {
        let session = Session::new(1, Language::Pa);
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.fields.is_empty());
        assert!(session.establishment.is_none());
    }
}
