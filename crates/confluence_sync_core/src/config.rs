use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = ".confluence-sync.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "confluence_downloads";
pub const DEFAULT_USER_AGENT: &str = concat!("confluence-sync/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SPACE_LIMIT: usize = 500;
pub const DEFAULT_PAGE_LIMIT: usize = 100;

pub const ENV_URL: &str = "CONFLUENCE_URL";
pub const ENV_USERNAME: &str = "CONFLUENCE_USERNAME";
pub const ENV_TOKEN: &str = "ATLASSIAN_TOKEN";
pub const ENV_OUTPUT_DIR: &str = "CONFLUENCE_OUTPUT_DIR";
pub const ENV_USER_AGENT: &str = "CONFLUENCE_USER_AGENT";
pub const ENV_TIMEOUT_MS: &str = "CONFLUENCE_HTTP_TIMEOUT_MS";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default)]
    pub confluence: ConfluenceSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConfluenceSection {
    pub url: Option<String>,
    pub username: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub space_limit: Option<usize>,
    pub page_limit: Option<usize>,
}

/// Load and parse the optional TOML config. Returns default if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<FileConfig> {
    if !config_path.exists() {
        return Ok(FileConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: FileConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Connection and output settings, resolved once at startup and passed to every flow.
#[derive(Clone)]
pub struct Settings {
    pub base_url: String,
    pub username: String,
    pub token: String,
    pub output_dir: PathBuf,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub space_limit: usize,
    pub page_limit: usize,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("output_dir", &self.output_dir)
            .field("user_agent", &self.user_agent)
            .field("timeout_ms", &self.timeout_ms)
            .field("space_limit", &self.space_limit)
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

impl Settings {
    /// Resolve settings from the process environment: env > config file > defaults.
    pub fn from_env(config: &FileConfig) -> Result<Self> {
        Self::resolve(config, |key| env::var(key).ok())
    }

    /// Resolve settings with an explicit variable lookup.
    ///
    /// The token is only ever read from the lookup, never from the config file.
    pub fn resolve<F>(config: &FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = &config.confluence;
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = non_empty(ENV_URL).or_else(|| section.url.clone());
        let username = non_empty(ENV_USERNAME).or_else(|| section.username.clone());
        let token = non_empty(ENV_TOKEN);

        let mut missing = Vec::new();
        if base_url.is_none() {
            missing.push(ENV_URL);
        }
        if username.is_none() {
            missing.push(ENV_USERNAME);
        }
        if token.is_none() {
            missing.push(ENV_TOKEN);
        }
        let (Some(base_url), Some(username), Some(token)) = (base_url, username, token) else {
            bail!(
                "missing required configuration: {} (set them in the environment or a .env file)",
                missing.join(", ")
            );
        };

        let output_dir = non_empty(ENV_OUTPUT_DIR)
            .map(PathBuf::from)
            .or_else(|| section.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let user_agent = non_empty(ENV_USER_AGENT)
            .or_else(|| section.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let timeout_ms = match non_empty(ENV_TIMEOUT_MS) {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("invalid {ENV_TIMEOUT_MS}: {value}"))?,
            None => section.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        };

        Ok(Self {
            base_url,
            username,
            token,
            output_dir,
            user_agent,
            timeout_ms,
            space_limit: section.space_limit.unwrap_or(DEFAULT_SPACE_LIMIT),
            page_limit: section.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        })
    }

    /// Base URL without trailing slashes, as used for building web links.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<BTreeMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_URL, "https://example.atlassian.net/"),
            (ENV_USERNAME, "user@example.com"),
            (ENV_TOKEN, "secret"),
        ]
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn load_config_parses_confluence_section() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
[confluence]
url = "https://wiki.example.org"
username = "bot"
output_dir = "exports"
timeout_ms = 5000
page_limit = 25
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.confluence.url.as_deref(),
            Some("https://wiki.example.org")
        );
        assert_eq!(config.confluence.username.as_deref(), Some("bot"));
        assert_eq!(
            config.confluence.output_dir.as_deref(),
            Some(Path::new("exports"))
        );
        assert_eq!(config.confluence.timeout_ms, Some(5000));
        assert_eq!(config.confluence.page_limit, Some(25));
        assert_eq!(config.confluence.space_limit, None);
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[confluence\nurl = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn resolve_applies_defaults() {
        let settings =
            Settings::resolve(&FileConfig::default(), lookup(&full_env())).expect("resolve");
        assert_eq!(settings.base_url, "https://example.atlassian.net/");
        assert_eq!(settings.trimmed_base_url(), "https://example.atlassian.net");
        assert_eq!(settings.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(settings.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(settings.space_limit, 500);
        assert_eq!(settings.page_limit, 100);
        assert!(settings.user_agent.starts_with("confluence-sync/"));
    }

    #[test]
    fn resolve_prefers_env_over_config_file() {
        let config = FileConfig {
            confluence: ConfluenceSection {
                url: Some("https://from-file.example".to_string()),
                username: Some("file-user".to_string()),
                output_dir: Some(PathBuf::from("file-dir")),
                ..ConfluenceSection::default()
            },
        };
        let mut env = full_env();
        env.push((ENV_OUTPUT_DIR, "env-dir"));
        let settings = Settings::resolve(&config, lookup(&env)).expect("resolve");
        assert_eq!(settings.base_url, "https://example.atlassian.net/");
        assert_eq!(settings.username, "user@example.com");
        assert_eq!(settings.output_dir, PathBuf::from("env-dir"));
    }

    #[test]
    fn resolve_falls_back_to_config_file_for_url_and_username() {
        let config = FileConfig {
            confluence: ConfluenceSection {
                url: Some("https://from-file.example".to_string()),
                username: Some("file-user".to_string()),
                ..ConfluenceSection::default()
            },
        };
        let settings =
            Settings::resolve(&config, lookup(&[(ENV_TOKEN, "secret")])).expect("resolve");
        assert_eq!(settings.base_url, "https://from-file.example");
        assert_eq!(settings.username, "file-user");
    }

    #[test]
    fn resolve_reports_every_missing_variable() {
        let error = Settings::resolve(&FileConfig::default(), lookup(&[(ENV_USERNAME, "u")]))
            .expect_err("must fail");
        let message = error.to_string();
        assert!(message.contains(ENV_URL));
        assert!(message.contains(ENV_TOKEN));
        assert!(!message.contains(ENV_USERNAME));
    }

    #[test]
    fn resolve_treats_blank_values_as_missing() {
        let error = Settings::resolve(
            &FileConfig::default(),
            lookup(&[(ENV_URL, "  "), (ENV_USERNAME, "u"), (ENV_TOKEN, "t")]),
        )
        .expect_err("must fail");
        assert!(error.to_string().contains(ENV_URL));
    }

    #[test]
    fn resolve_reads_timeout_from_env() {
        let mut env = full_env();
        env.push((ENV_TIMEOUT_MS, "2500"));
        let settings = Settings::resolve(&FileConfig::default(), lookup(&env)).expect("resolve");
        assert_eq!(settings.timeout_ms, 2500);
    }

    #[test]
    fn resolve_rejects_unparsable_timeout() {
        let config = FileConfig {
            confluence: ConfluenceSection {
                timeout_ms: Some(5000),
                ..ConfluenceSection::default()
            },
        };
        let mut env = full_env();
        env.push((ENV_TIMEOUT_MS, "soon"));
        let error = Settings::resolve(&config, lookup(&env)).expect_err("must fail");
        let message = error.to_string();
        assert!(message.contains(ENV_TIMEOUT_MS));
        assert!(message.contains("soon"));
    }

    #[test]
    fn debug_output_redacts_token() {
        let settings =
            Settings::resolve(&FileConfig::default(), lookup(&full_env())).expect("resolve");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
