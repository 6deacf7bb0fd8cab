use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use view_types::{FieldCatalog, ViewConfig};

pub const DEFAULT_STATE_PATH: &str = "./data/view-state.json";
const BUILTIN_VIEW_DEFAULTS_TOML: &str = include_str!("../config/view-defaults.toml");

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the REST API; `None` runs fully local
    pub api_base_url: Option<String>,
    /// Bearer token for the REST API
    pub api_token: Option<String>,
    /// File backing durable local storage
    pub state_path: PathBuf,
    /// TOML file with view defaults; built-in defaults when unset
    pub defaults_path: Option<PathBuf>,
    /// How often other contexts' change stamps are polled
    pub change_poll_interval: Duration,
    /// Start persisting a draft as soon as it is created
    pub auto_persist_drafts: bool,
    pub http_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            defaults_path: None,
            change_poll_interval: Duration::from_millis(2000),
            auto_persist_drafts: true,
            http_timeout: Duration::from_secs(15),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            api_base_url: env_opt("VIEWS_API_BASE_URL"),
            api_token: env_opt("VIEWS_API_TOKEN"),
            state_path: PathBuf::from(env_str("VIEWS_STATE_PATH", DEFAULT_STATE_PATH)),
            defaults_path: env_opt("VIEWS_DEFAULTS_PATH").map(PathBuf::from),
            change_poll_interval: Duration::from_millis(env_parse("VIEWS_CHANGE_POLL_MS", 2000)?),
            auto_persist_drafts: env_parse("VIEWS_AUTO_PERSIST_DRAFTS", true)?,
            http_timeout: Duration::from_secs(env_parse("VIEWS_HTTP_TIMEOUT_SECS", 15)?),
        })
    }

    pub fn load_defaults(&self) -> ViewDefaults {
        match &self.defaults_path {
            Some(path) => ViewDefaults::load(path),
            None => ViewDefaults::built_in(),
        }
    }
}

/// The system-default layer and the set of renderable fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ViewDefaults {
    #[serde(default)]
    pub catalog: FieldCatalog,
    #[serde(default)]
    pub view: ViewConfig,
}

impl ViewDefaults {
    pub fn built_in() -> Self {
        toml::from_str(BUILTIN_VIEW_DEFAULTS_TOML).unwrap_or_else(|err| {
            tracing::error!(error = %err, "Failed to parse built-in view defaults");
            Self::default()
        })
    }

    /// Read defaults from `path`, falling back to the built-in ones
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to load view defaults file; using built-in defaults"
                );
                return Self::built_in();
            }
        };
        let mut defaults: Self = toml::from_str(&content).unwrap_or_else(|err| {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Failed to parse view defaults TOML; using built-in defaults"
            );
            Self::built_in()
        });
        defaults.view.normalize();
        defaults
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use view_types::{DisplayType, FieldKey, FilterType, SortSpec};

    #[test]
    fn test_built_in_defaults_parse() {
        let defaults = ViewDefaults::built_in();
        assert_eq!(defaults.view.column_order.first(), Some(&FieldKey::builtin("title")));
        assert_eq!(defaults.view.column_sizing.get(&"title".into()), Some(&320));
        assert_eq!(
            defaults.view.column_display_types.get(&"tags".into()),
            Some(&DisplayType::Badge)
        );
        assert_eq!(
            defaults.view.filter_types.get(&"created".into()),
            Some(&FilterType::DateRange)
        );
        assert_eq!(defaults.view.sorting, Some(SortSpec::new("created", true)));
        assert!(defaults.catalog.contains(&FieldKey::builtin("asn")));
    }

    #[test]
    fn test_defaults_file_with_custom_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defaults.toml");
        std::fs::write(
            &path,
            r#"
[catalog]
builtins = ["title"]
custom = [3]

[view]
column_order = ["title", "customField_3", 3]

[view.column_sizing]
"customField_3" = 90
"#,
        )
        .unwrap();

        let defaults = ViewDefaults::load(&path);
        assert_eq!(
            defaults.view.column_order,
            vec![FieldKey::builtin("title"), FieldKey::Custom(3)]
        );
        assert_eq!(defaults.view.column_sizing.get(&FieldKey::Custom(3)), Some(&90));
        assert!(defaults.catalog.contains(&FieldKey::Custom(3)));
    }

    #[test]
    fn test_missing_defaults_file_falls_back() {
        let defaults = ViewDefaults::load(Path::new("/definitely/not/here.toml"));
        assert_eq!(defaults, ViewDefaults::built_in());
    }
}
