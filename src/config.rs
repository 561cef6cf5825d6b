use std::{fs, io, path::Path};

use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use crate::utils;

pub const DEFAULT_CITY: &str = "Los Angeles";
const DEFAULT_APP_ID: &str = "comedybit-botzw";
const DEFAULT_BASE_URL: &str = "https://services.cloud.mongodb.com";
const DEFAULT_DATABASE: &str = "events";
const DEFAULT_COLLECTION: &str = "finalEvents";
const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub realm_app_id: String,
    pub realm_base_url: String,
    pub database: String,
    pub events_collection: String,
    pub cities_collection: String,
    pub default_city: String,
    pub timezone: String,
    pub offline: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            realm_app_id: DEFAULT_APP_ID.to_string(),
            realm_base_url: DEFAULT_BASE_URL.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            events_collection: DEFAULT_COLLECTION.to_string(),
            cities_collection: DEFAULT_COLLECTION.to_string(),
            default_city: DEFAULT_CITY.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            offline: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        Self::load_from(&utils::config_path()).with_env_overrides()
    }

    /// A missing file is not an error; an unreadable one is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!(path = %path.display(), %err, "config unreadable; using defaults");
                return Self::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "config malformed; using defaults");
            Self::default()
        })
    }

    pub fn with_env_overrides(mut self) -> Self {
        let text_vars: [(&str, &mut String); 7] = [
            ("EVENT_FINDER_APP_ID", &mut self.realm_app_id),
            ("EVENT_FINDER_BASE_URL", &mut self.realm_base_url),
            ("EVENT_FINDER_DATABASE", &mut self.database),
            ("EVENT_FINDER_EVENTS_COLLECTION", &mut self.events_collection),
            ("EVENT_FINDER_CITIES_COLLECTION", &mut self.cities_collection),
            ("EVENT_FINDER_DEFAULT_CITY", &mut self.default_city),
            ("EVENT_FINDER_TIMEZONE", &mut self.timezone),
        ];
        for (key, slot) in text_vars {
            if let Ok(value) = std::env::var(key) {
                let value = value.trim();
                if !value.is_empty() {
                    *slot = value.to_string();
                }
            }
        }
        if let Ok(value) = std::env::var("EVENT_FINDER_OFFLINE") {
            self.offline = matches!(value.trim(), "1" | "true" | "yes");
        }
        self
    }

    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or_else(|err| {
            warn!(timezone = %self.timezone, %err, "unknown timezone; using default");
            chrono_tz::America::Los_Angeles
        })
    }
}
