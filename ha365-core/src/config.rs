//! ha365-sync configuration.
//!
//! Read from `~/.config/ha365-sync/config.toml` by default (YAML works too,
//! picked by file extension). Every key can be overridden from the
//! environment, e.g. `HA365__HOME_ASSISTANT__TOKEN`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_DAYS_FUTURE, DEFAULT_DAYS_PAST, DEFAULT_EVENT_PREFIX, MAX_WINDOW_DAYS,
};
use crate::error::{SyncError, SyncResult};
use crate::marker::{self, Prefixes};
use crate::window::SyncWindow;

const APP_DIR: &str = "ha365-sync";
const DEFAULT_TOKEN_FILE: &str = "o365_token.toml";

fn default_tenant_id() -> String {
    "common".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_days_past() -> i64 {
    DEFAULT_DAYS_PAST
}

fn default_days_future() -> i64 {
    DEFAULT_DAYS_FUTURE
}

fn default_event_prefix() -> String {
    DEFAULT_EVENT_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub home_assistant: HomeAssistantConfig,
    pub office365: Office365Config,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HomeAssistantConfig {
    pub url: String,
    /// Long-lived access token
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Office365Config {
    pub client_id: String,
    /// Only needed for confidential app registrations
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    /// `primary` for the default calendar, otherwise a Graph calendar id
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// Address `/users/{upn}` instead of `/me`
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub token_cache: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    pub ha_calendars: Vec<String>,
    #[serde(default = "default_days_past")]
    pub days_past: i64,
    #[serde(default = "default_days_future")]
    pub days_future: i64,
    #[serde(default = "default_event_prefix")]
    pub event_prefix: String,
    #[serde(default = "default_true")]
    pub delete_removed_events: bool,
    /// IANA zone used for all-day events
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Derive `[Name]` prefixes from the calendar entity ids
    #[serde(default)]
    pub prefix_per_calendar: bool,
    #[serde(default)]
    pub calendar_prefixes: BTreeMap<String, String>,
}

impl SyncConfig {
    pub fn default_path() -> SyncResult<PathBuf> {
        Ok(app_dir()?.join("config.toml"))
    }

    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Err(SyncError::Config(format!(
                "Config file not found: {}\n\n\
                Create one with:\n  ha365-sync init",
                path.display()
            )));
        }

        let config: SyncConfig = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix("HA365")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sync.ha_calendars"),
            )
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> SyncResult<()> {
        let required = [
            ("home_assistant.url", &self.home_assistant.url),
            ("home_assistant.token", &self.home_assistant.token),
            ("office365.client_id", &self.office365.client_id),
            ("sync.event_prefix", &self.sync.event_prefix),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::Config(format!("Missing required config: {key}")));
            }
        }

        if self.sync.ha_calendars.is_empty() {
            return Err(SyncError::Config(
                "sync.ha_calendars must list at least one calendar".into(),
            ));
        }

        if self.sync.days_past < 0 || self.sync.days_future < 0 {
            return Err(SyncError::Config(
                "sync.days_past and sync.days_future must not be negative".into(),
            ));
        }

        if self.sync.days_past > MAX_WINDOW_DAYS || self.sync.days_future > MAX_WINDOW_DAYS {
            return Err(SyncError::Config(format!(
                "sync.days_past and sync.days_future must be at most {MAX_WINDOW_DAYS}"
            )));
        }

        self.timezone()?;

        Ok(())
    }

    pub fn timezone(&self) -> SyncResult<Tz> {
        self.sync
            .timezone
            .parse::<Tz>()
            .map_err(|_| SyncError::Config(format!("Unknown timezone '{}'", self.sync.timezone)))
    }

    pub fn window(&self, now: DateTime<Utc>) -> SyncWindow {
        SyncWindow::around(now, self.sync.days_past, self.sync.days_future)
    }

    /// Prefix for every configured calendar.
    pub fn prefixes(&self) -> Prefixes {
        let mut prefixes = Prefixes::new(self.sync.event_prefix.clone());

        if self.sync.prefix_per_calendar {
            for calendar in &self.sync.ha_calendars {
                prefixes = prefixes.with_calendar(calendar, marker::derived_prefix(calendar));
            }
        }

        for (calendar, prefix) in &self.sync.calendar_prefixes {
            prefixes = prefixes.with_calendar(calendar, prefix);
        }

        prefixes
    }

    pub fn token_cache_path(&self) -> SyncResult<PathBuf> {
        match &self.office365.token_cache {
            Some(path) => Ok(PathBuf::from(
                shellexpand::tilde(&path.to_string_lossy()).into_owned(),
            )),
            None => Ok(app_dir()?.join(DEFAULT_TOKEN_FILE)),
        }
    }

    /// Write a config template with the required keys to fill in.
    pub fn create_default_config(path: &Path) -> SyncResult<()> {
        let contents = format!(
            "\
# ha365-sync configuration

[home_assistant]
url = \"http://homeassistant.local:8123\"
# Long-lived access token (Profile > Security in Home Assistant)
token = \"\"

[office365]
# Application (client) id of your Azure app registration
client_id = \"\"
# tenant_id = \"common\"
# calendar_id = \"primary\"
# user_principal_name = \"me@example.com\"

[sync]
ha_calendars = [\"calendar.family\"]
# days_past = {DEFAULT_DAYS_PAST}
# days_future = {DEFAULT_DAYS_FUTURE}
# event_prefix = \"{DEFAULT_EVENT_PREFIX}\"
# delete_removed_events = true
# timezone = \"Europe/London\"
# prefix_per_calendar = false

# [sync.calendar_prefixes]
# \"calendar.work\" = \"[Work]\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| SyncError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn app_dir() -> SyncResult<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| SyncError::Config("Could not determine config directory".into()))?
        .join(APP_DIR))
}
