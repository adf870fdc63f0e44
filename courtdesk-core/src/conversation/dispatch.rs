//! Request assembly, reply classification and result narration.

use std::collections::BTreeMap;

use serde_json::Value;

use super::catalog::Query;
use super::session::Session;
use crate::collab::ApiReply;
use crate::error::Result;
use crate::normalize::CaseIdentifier;

pub type RequestParams = BTreeMap<String, String>;

/// How a lookup ended, from the visitor's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    Found { narration: String },
    /// Non-200 reply or empty data.
    NotFound { status: u16 },
    /// Transport failure.
    Unavailable { error: String },
}

impl QueryResult {
    /// What to say for `query`.
    pub fn spoken_text(&self, query: Query) -> &str {
        match self {
            QueryResult::Found { narration } => narration,
            QueryResult::NotFound { .. } => query.not_found_message(),
            QueryResult::Unavailable { .. } => query.unavailable_message(),
        }
    }
}

fn captured(session: &Session, key: &str) -> String {
    session.fields.get(key).unwrap_or_default().to_string()
}

/// Build the request parameters for `query` from the captured fields.
///
/// Returns `None` if a registration lookup's parts do not form a valid
/// [`CaseIdentifier`].
pub fn build_request(query: Query, session: &Session) -> Option<RequestParams> {
    let mut params = RequestParams::new();
    let mut put = |key: &str, value: String| {
        params.insert(key.to_string(), value);
    };
    let court_name = || {
        session
            .establishment
            .map(|e| e.label().to_string())
            .unwrap_or_default()
    };

    match query {
        Query::Registration => {
            let id = CaseIdentifier::new(
                &captured(session, "case_type"),
                &captured(session, "registration_number"),
                &captured(session, "year"),
            )?;
            put("case_type", id.case_type);
            put("registration_number", id.case_number);
            put("year", id.case_year);
        }
        Query::PartyName => {
            put(
                "petitioner_respondent",
                format!(
                    "{} vs {}",
                    captured(session, "petitioner"),
                    captured(session, "respondent")
                ),
            );
            put("status", captured(session, "status"));
        }
        Query::SubordinateCourt => {
            put("state", captured(session, "state"));
            put("district", captured(session, "district"));
            put("subordinate_court_name", court_name());
            put("judge_name", captured(session, "judge_name"));
        }
        Query::CauseList => {
            put("court_name", court_name());
            put("court_type", captured(session, "court_type"));
        }
        _ => {
            for field in query.fields() {
                put(field.key, captured(session, field.key));
            }
        }
    }
    Some(params)
}

/// Classify a reply per the spoken-outcome rules.
pub fn classify(reply: Result<ApiReply>) -> QueryResult {
    match reply {
        Err(e) => QueryResult::Unavailable {
            error: e.to_string(),
        },
        Ok(reply) if !reply.is_success() || !reply.has_data() => QueryResult::NotFound {
            status: reply.status,
        },
        Ok(reply) => QueryResult::Found {
            narration: narrate(&reply.data),
        },
    }
}

/// `case_no` → `Case No`.
fn display_key(key: &str) -> String {
    crate::normalize::title_case(&key.replace('_', " "))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "Not available".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn narrate_block(header: &str, value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut lines = vec![header.to_string()];
            lines.extend(
                map.iter()
                    .map(|(k, v)| format!("{}: {}", display_key(k), display_value(v))),
            );
            lines.join("\n")
        }
        other => format!("{header}\n{}", display_value(other)),
    }
}

/// Flat `Key: value` narration. Blocks are separated by a blank line.
pub fn narrate(data: &Value) -> String {
    match data {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| narrate_block(&format!("Case {} Details", i + 1), item))
            .collect::<Vec<_>>()
            .join("\n\n"),
        other => narrate_block("Case Details", other),
    }
}
