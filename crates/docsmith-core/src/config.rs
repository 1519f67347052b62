//! Runtime configuration.
//!
//! Configuration comes from the environment with an optional TOML file
//! override; missing optional values degrade the relevant feature rather
//! than failing startup. Validation that can fail (analyzer command empty,
//! bad timeout values) happens at load, never mid-run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::DocsmithError;

/// Default wall-clock limit for one analyzer run.
pub const DEFAULT_ANALYZER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default per-request timeout for provider HTTP calls.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    /// Connection string for the relational store. Absent means the stores
    /// run in "not configured" mode instead of crashing.
    pub database_url: Option<String>,
    /// HMAC secret for webhook verification; required to accept webhooks.
    pub webhook_secret: Option<String>,
    /// Base URL advertised to the provider when registering webhooks.
    pub public_webhook_base_url: Option<String>,
    /// Service token used for provider calls that have no user request
    /// behind them (webhook-triggered incremental runs).
    pub github_token: Option<String>,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Root directory for generated documentation trees.
    pub output_root: PathBuf,
    /// Root directory for materialized source trees the analyzer reads.
    pub source_root: PathBuf,
    /// Analyzer executable.
    pub analyzer_command: String,
    /// Fixed arguments passed to the analyzer before the per-run ones.
    pub analyzer_args: Vec<String>,
    pub analyzer_timeout: Duration,
    pub provider_timeout: Duration,
}

/// File-level overrides; every field optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database_url: Option<String>,
    webhook_secret: Option<String>,
    public_webhook_base_url: Option<String>,
    github_token: Option<String>,
    bind_addr: Option<String>,
    output_root: Option<PathBuf>,
    source_root: Option<PathBuf>,
    analyzer_command: Option<String>,
    analyzer_args: Option<Vec<String>>,
    analyzer_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            webhook_secret: None,
            public_webhook_base_url: None,
            github_token: None,
            bind_addr: "127.0.0.1:3001".to_string(),
            output_root: PathBuf::from("data/output"),
            source_root: PathBuf::from("data/sources"),
            analyzer_command: "docsmith-analyzer".to_string(),
            analyzer_args: Vec::new(),
            analyzer_timeout: DEFAULT_ANALYZER_TIMEOUT,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

impl Config {
    /// Load from the environment, optionally layering a TOML file first.
    pub fn load(file: Option<&Path>) -> Result<Self, DocsmithError> {
        let mut config = Config::default();

        if let Some(path) = file {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                DocsmithError::ConfigurationMissing(format!(
                    "cannot read config file {}: {e}",
                    path.display()
                ))
            })?;
            let overrides: FileConfig = toml::from_str(&raw)
                .map_err(|e| DocsmithError::BadRequest(format!("invalid config file: {e}")))?;
            config.apply_file(overrides);
        }

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from the environment only.
    pub fn from_env() -> Result<Self, DocsmithError> {
        Self::load(None)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if file.database_url.is_some() {
            self.database_url = file.database_url;
        }
        if file.webhook_secret.is_some() {
            self.webhook_secret = file.webhook_secret;
        }
        if file.public_webhook_base_url.is_some() {
            self.public_webhook_base_url = file.public_webhook_base_url;
        }
        if file.github_token.is_some() {
            self.github_token = file.github_token;
        }
        if let Some(addr) = file.bind_addr {
            self.bind_addr = addr;
        }
        if let Some(root) = file.output_root {
            self.output_root = root;
        }
        if let Some(root) = file.source_root {
            self.source_root = root;
        }
        if let Some(cmd) = file.analyzer_command {
            self.analyzer_command = cmd;
        }
        if let Some(args) = file.analyzer_args {
            self.analyzer_args = args;
        }
        if let Some(secs) = file.analyzer_timeout_secs {
            self.analyzer_timeout = Duration::from_secs(secs);
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.database_url = Some(url);
            }
        }
        if let Ok(secret) = std::env::var("GITHUB_WEBHOOK_SECRET") {
            if !secret.is_empty() {
                self.webhook_secret = Some(secret);
            }
        }
        if let Ok(base) = std::env::var("PUBLIC_WEBHOOK_BASE_URL") {
            if !base.is_empty() {
                self.public_webhook_base_url = Some(base);
            }
        }
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                self.github_token = Some(token);
            }
        }
        if let Ok(addr) = std::env::var("DOCSMITH_BIND_ADDR") {
            if !addr.is_empty() {
                self.bind_addr = addr;
            }
        }
        if let Ok(root) = std::env::var("DOCSMITH_OUTPUT_ROOT") {
            if !root.is_empty() {
                self.output_root = PathBuf::from(root);
            }
        }
        if let Ok(root) = std::env::var("DOCSMITH_SOURCE_ROOT") {
            if !root.is_empty() {
                self.source_root = PathBuf::from(root);
            }
        }
        if let Ok(cmd) = std::env::var("DOCSMITH_ANALYZER_CMD") {
            if !cmd.is_empty() {
                self.analyzer_command = cmd;
            }
        }
        if let Ok(args) = std::env::var("DOCSMITH_ANALYZER_ARGS") {
            self.analyzer_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Ok(secs) = std::env::var("DOCSMITH_ANALYZER_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.analyzer_timeout = Duration::from_secs(secs);
            }
        }
    }

    fn validate(&self) -> Result<(), DocsmithError> {
        if self.analyzer_command.trim().is_empty() {
            return Err(DocsmithError::ConfigurationMissing(
                "analyzer command is empty".to_string(),
            ));
        }
        if self.analyzer_timeout.is_zero() {
            return Err(DocsmithError::BadRequest(
                "analyzer timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Filesystem path of the SQLite database, accepting both a bare path
    /// and a `sqlite://` connection string.
    pub fn sqlite_path(&self) -> Option<PathBuf> {
        let url = self.database_url.as_deref()?;
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        Some(PathBuf::from(path))
    }

    /// Output directory for one repository's generated documentation.
    pub fn repo_output_dir(&self, repo_name: &str) -> PathBuf {
        self.output_root.join(repo_name)
    }

    /// Materialized source tree for one repository.
    pub fn repo_source_dir(&self, repo_name: &str) -> PathBuf {
        self.source_root.join(repo_name)
    }

    /// Webhook delivery URL advertised to the provider, when configured.
    pub fn webhook_delivery_url(&self) -> Option<String> {
        self.public_webhook_base_url
            .as_deref()
            .map(|base| format!("{}/webhook", base.trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.analyzer_timeout, DEFAULT_ANALYZER_TIMEOUT);
        assert_eq!(config.provider_timeout, DEFAULT_PROVIDER_TIMEOUT);
    }

    #[test]
    fn sqlite_path_strips_scheme() {
        let mut config = Config::default();
        config.database_url = Some("sqlite:///var/lib/docsmith.db".to_string());
        assert_eq!(
            config.sqlite_path(),
            Some(PathBuf::from("/var/lib/docsmith.db"))
        );

        config.database_url = Some("docsmith.db".to_string());
        assert_eq!(config.sqlite_path(), Some(PathBuf::from("docsmith.db")));
    }

    #[test]
    fn webhook_delivery_url_joins_cleanly() {
        let mut config = Config::default();
        assert!(config.webhook_delivery_url().is_none());

        config.public_webhook_base_url = Some("https://docs.example.com/".to_string());
        assert_eq!(
            config.webhook_delivery_url().as_deref(),
            Some("https://docs.example.com/webhook")
        );
    }

    #[test]
    fn file_overrides_apply() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
analyzer_command = "tutorial-gen"
analyzer_args = ["--mode", "full"]
analyzer_timeout_secs = 60
bind_addr = "0.0.0.0:8080"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.analyzer_command, "tutorial-gen");
        assert_eq!(config.analyzer_args, vec!["--mode", "full"]);
        assert_eq!(config.analyzer_timeout, Duration::from_secs(60));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml [[[").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
