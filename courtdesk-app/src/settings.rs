//! Persistent kiosk settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use courtdesk_core::activity::ActivityConfig;
use courtdesk_core::conversation::ConversationConfig;
use courtdesk_core::{EngineConfig, Language};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "http://192.168.1.81:8000/search";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct KioskSettings {
    /// Case-records search root; endpoints are appended to it.
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub health_timeout_secs: u64,
    /// JSON list of `{ "user": "secret" }` maps for the Close flow.
    pub auth_path: Option<PathBuf>,
    /// JSON `{ "hi": { "English": "..." }, "pa": { ... } }` prompt translations.
    pub phrasebook_path: Option<PathBuf>,
    pub default_language: String,
    pub max_attempts: u32,
    pub listen_timeout_secs: u64,
    pub identifier_listen_timeout_secs: u64,
    pub conversation_idle_secs: u64,
    pub similarity_floor: f64,
    pub fallback_to_default_language: bool,
    pub greet: bool,
    /// Simulated playback time per spoken word on the console speaker.
    pub console_word_delay_ms: u64,
}

impl Default for KioskSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            request_timeout_secs: 10,
            health_timeout_secs: 5,
            auth_path: None,
            phrasebook_path: None,
            default_language: "pa".into(),
            max_attempts: 3,
            listen_timeout_secs: 7,
            identifier_listen_timeout_secs: 10,
            conversation_idle_secs: 90,
            similarity_floor: 0.7,
            fallback_to_default_language: false,
            greet: true,
            console_word_delay_ms: 0,
        }
    }
}

impl KioskSettings {
    pub fn normalize(&mut self) {
        self.api_base_url = normalize_base_url(&self.api_base_url);
        self.request_timeout_secs = self.request_timeout_secs.clamp(1, 60);
        self.health_timeout_secs = self.health_timeout_secs.clamp(1, 30);
        self.default_language = normalize_language(&self.default_language);
        self.max_attempts = self.max_attempts.clamp(1, 5);
        self.listen_timeout_secs = self.listen_timeout_secs.clamp(2, 30);
        self.identifier_listen_timeout_secs = self.identifier_listen_timeout_secs.clamp(2, 30);
        self.conversation_idle_secs = self.conversation_idle_secs.clamp(15, 600);
        self.similarity_floor = if self.similarity_floor.is_finite() {
            self.similarity_floor.clamp(0.3, 1.0)
        } else {
            0.7
        };
        self.console_word_delay_ms = self.console_word_delay_ms.min(2_000);
        self.auth_path = self.auth_path.take().filter(|p| !p.as_os_str().is_empty());
        self.phrasebook_path = self
            .phrasebook_path
            .take()
            .filter(|p| !p.as_os_str().is_empty());
    }

    /// Apply `COURTDESK_*` overrides from `lookup`, then re-normalize.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("COURTDESK_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(path) = lookup("COURTDESK_AUTH_PATH") {
            self.auth_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("COURTDESK_PHRASEBOOK_PATH") {
            self.phrasebook_path = Some(PathBuf::from(path));
        }
        if let Some(language) = lookup("COURTDESK_DEFAULT_LANGUAGE") {
            self.default_language = language;
        }
        self.normalize();
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()));
    }

    pub fn language(&self) -> Language {
        Language::parse(&self.default_language).unwrap_or_default()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            activity: ActivityConfig {
                conversation_idle: Duration::from_secs(self.conversation_idle_secs),
                ..ActivityConfig::default()
            },
            conversation: ConversationConfig {
                max_attempts: self.max_attempts,
                listen_timeout: Duration::from_secs(self.listen_timeout_secs),
                identifier_listen_timeout: Duration::from_secs(self.identifier_listen_timeout_secs),
                default_language: self.language(),
                similarity_floor: self.similarity_floor,
                fallback_to_default_language: self.fallback_to_default_language,
                greet: self.greet,
                ..ConversationConfig::default()
            },
            ..EngineConfig::default()
        }
    }
}

pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.into()
    } else {
        DEFAULT_API_BASE_URL.into()
    }
}

pub fn normalize_language(raw: &str) -> String {
    Language::parse(raw).unwrap_or_default().code().into()
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("CourtDesk")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("courtdesk")
            .join("settings.json")
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> KioskSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<KioskSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &KioskSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&dir.path().join("absent.json"));
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.language(), Language::Pa);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");
        let settings = KioskSettings {
            api_base_url: "https://records.example/search/".into(),
            max_attempts: 4,
            ..KioskSettings::default()
        };
        save_settings(&path, &settings).expect("save");
        let loaded = load_settings(&path);
        assert_eq!(loaded.api_base_url, "https://records.example/search");
        assert_eq!(loaded.max_attempts, 4);
    }

    #[test]
    fn normalize_clamps_numbers_and_language() {
        let mut settings: KioskSettings = serde_json::from_str(
            r#"{"maxAttempts": 40, "listenTimeoutSecs": 0, "defaultLanguage": "Hindi", "apiBaseUrl": "ftp://x"}"#,
        )
        .expect("parse");
        settings.normalize();
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.listen_timeout_secs, 2);
        assert_eq!(settings.default_language, "hi");
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = [
            ("COURTDESK_API_BASE_URL", "http://10.0.0.5:8000/search"),
            ("COURTDESK_DEFAULT_LANGUAGE", "en"),
            ("COURTDESK_AUTH_PATH", "/etc/courtdesk/auth.json"),
        ]
        .into_iter()
        .collect();
        let mut settings = KioskSettings::default();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(settings.api_base_url, "http://10.0.0.5:8000/search");
        assert_eq!(settings.language(), Language::En);
        assert_eq!(
            settings.auth_path.as_deref(),
            Some(Path::new("/etc/courtdesk/auth.json"))
        );
        assert!(settings.phrasebook_path.is_none());
    }

    #[test]
    fn engine_config_carries_dialogue_policy() {
        let settings = KioskSettings {
            listen_timeout_secs: 9,
            fallback_to_default_language: true,
            ..KioskSettings::default()
        };
        let config = settings.engine_config();
        assert_eq!(config.conversation.listen_timeout, Duration::from_secs(9));
        assert!(config.conversation.fallback_to_default_language);
        assert_eq!(config.activity.conversation_idle, Duration::from_secs(90));
        assert_eq!(config.activity.reset_delay, Duration::from_millis(500));
    }
}
