//! Configuration management.
//!
//! Settings come from a TOML file with full defaults, so a bare `init`
//! works on an empty directory; a handful of environment variables
//! override the file for deployment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default settings file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "vplan.toml";

/// Placeholder substituted with the week code in the week page template.
pub const WEEK_PLACEHOLDER: &str = "{week}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub schedule: ScheduleSettings,
    pub database: DatabaseSettings,
    pub dispatch: DispatchSettings,
    pub http: HttpSettings,
}

/// Where the plan host keeps its pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Navigation page exposing the week selector and class directory.
    pub navigation_url: String,
    /// Week page URL template; `{week}` is replaced with the option value.
    pub week_page_template: String,
    /// CSS selector of the substitution container on a week page.
    pub container_selector: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            navigation_url: "https://vertretung.example-schule.de/woche/frames/navbar.htm"
                .to_string(),
            week_page_template: "https://vertretung.example-schule.de/woche/{week}/w/w00000.htm"
                .to_string(),
            container_selector: "#vertretung".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Seconds between scheduled ingestion runs.
    pub interval_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vplan.db"),
        }
    }
}

/// Dispatch collaborator endpoint. Without an endpoint, notifications are
/// resolved but only logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Settings {
    /// The week page URL for one selectable week.
    pub fn week_page_url(&self, week_code: &str) -> String {
        self.source
            .week_page_template
            .replace(WEEK_PLACEHOLDER, week_code)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Write the current settings as a TOML file (used by `init`).
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let rendered = toml::to_string_pretty(self).context("serializing settings")?;
        fs::write(path, rendered)
            .with_context(|| format!("writing settings to {}", path.display()))?;
        Ok(())
    }
}

/// Load settings from the given file (or the default location), then apply
/// environment overrides. A missing file yields the defaults.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut settings = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
    } else {
        Settings::default()
    };

    if let Ok(url) = std::env::var("VPLAN_NAVIGATION_URL") {
        settings.source.navigation_url = url;
    }
    if let Ok(template) = std::env::var("VPLAN_WEEK_PAGE_TEMPLATE") {
        settings.source.week_page_template = template;
    }
    if let Ok(db) = std::env::var("VPLAN_DATABASE") {
        settings.database.path = PathBuf::from(db);
    }
    if let Ok(endpoint) = std::env::var("VPLAN_DISPATCH_ENDPOINT") {
        settings.dispatch.endpoint = Some(endpoint);
    }
    if let Ok(key) = std::env::var("VPLAN_DISPATCH_API_KEY") {
        settings.dispatch.api_key = Some(key);
    }

    Ok(settings)
}
