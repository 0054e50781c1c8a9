use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const ENV_PREFIX: &str = "SERP";
const TOKEN_ENV: &str = "APIFY_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings")]
    Load(#[from] config::ConfigError),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Csv,
    Sqlite,
}

/// Process-wide settings, built once in `main` and passed by reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub actor_id: String,
    pub terms: Vec<String>,
    pub country_code: String,
    pub language_code: String,
    pub max_pages_per_query: u32,
    pub include_unfiltered_results: bool,
    pub mobile_results: bool,
    pub save_html: bool,
    pub output_dir: PathBuf,
    pub storage: StorageKind,
    pub apify_token: Option<String>,
    pub pause_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            actor_id: "apify/google-search-scraper".to_string(),
            terms: Vec::new(),
            country_code: "br".to_string(),
            language_code: "pt-BR".to_string(),
            max_pages_per_query: 2,
            include_unfiltered_results: false,
            mobile_results: false,
            save_html: false,
            output_dir: PathBuf::from("data"),
            storage: StorageKind::Csv,
            apify_token: None,
            pause_ms: 1000,
        }
    }
}

impl Settings {
    /// Token from settings, else from `APIFY_TOKEN`.
    pub fn apify_token(&self) -> Option<String> {
        pick_token(self.apify_token.as_deref(), std::env::var(TOKEN_ENV).ok())
    }
}

/// Blank values count as unset.
fn pick_token(explicit: Option<&str>, env: Option<String>) -> Option<String> {
    explicit
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .or_else(|| env.filter(|t| !t.trim().is_empty()))
}

/// Layer an optional JSON file under `SERP_*` environment variables.
pub fn load(path: &Path) -> Result<Settings, SettingsError> {
    let built = Config::builder()
        .add_source(File::from(path).format(FileFormat::Json).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("terms"),
        )
        .build()?;
    let mut settings: Settings = built.try_deserialize()?;
    normalize(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn normalize(settings: &mut Settings) {
    settings.actor_id = settings.actor_id.trim().to_string();
    settings.terms = settings
        .terms
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
}

pub fn validate(settings: &Settings) -> Result<(), SettingsError> {
    if settings.actor_id.is_empty() {
        return Err(SettingsError::Validation("actor_id must be non-empty".into()));
    }
    if settings.max_pages_per_query == 0 {
        return Err(SettingsError::Validation(
            "max_pages_per_query must be greater than zero".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(s.actor_id, "apify/google-search-scraper");
        assert_eq!(s.max_pages_per_query, 2);
        assert_eq!(s.storage, StorageKind::Csv);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "terms": [" coffee ", "", "matcha"],
                "country_code": "us",
                "language_code": "en",
                "max_pages_per_query": 1,
                "mobile_results": true,
                "storage": "sqlite",
                "output_dir": "out"
            }"#,
        )
        .unwrap();
        let s = load(&path).unwrap();
        assert_eq!(s.terms, vec!["coffee", "matcha"]);
        assert_eq!(s.country_code, "us");
        assert!(s.mobile_results);
        assert!(!s.save_html);
        assert_eq!(s.storage, StorageKind::Sqlite);
        assert_eq!(s.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn zero_pages_rejected() {
        let s = Settings {
            max_pages_per_query: 0,
            ..Default::default()
        };
        assert!(matches!(validate(&s), Err(SettingsError::Validation(_))));
    }

    #[test]
    fn explicit_token_wins() {
        let s = Settings {
            apify_token: Some("tok".into()),
            ..Default::default()
        };
        assert_eq!(s.apify_token().as_deref(), Some("tok"));
    }

    #[test]
    fn blank_token_falls_through_to_environment() {
        assert_eq!(pick_token(Some("  "), Some("env".into())).as_deref(), Some("env"));
        assert_eq!(pick_token(None, Some("env".into())).as_deref(), Some("env"));
        assert_eq!(pick_token(Some("tok"), Some("env".into())).as_deref(), Some("tok"));
    }

    #[test]
    fn blank_everywhere_is_no_token() {
        assert_eq!(pick_token(Some(""), Some(" \t".into())), None);
        assert_eq!(pick_token(None, None), None);
    }
}
