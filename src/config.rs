use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub file_server: FileServerConfig,
    pub local: LocalConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// The web service that publishes the canonical model-run list.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// PEM client certificate for TLS authentication (optional, needs `key`).
    pub certificate: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

/// The Apache-style file server that serves run output directories.
#[derive(Debug, Clone, Deserialize)]
pub struct FileServerConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// Root of the local mirror; each run lives at `<root>/run<id>/`.
    pub root_path: PathBuf,
    /// Space-separated extension tokens, dot included (e.g. ".nc .txt").
    /// A file is copied only when its extension matches a token exactly.
    #[serde(default)]
    pub allowed_extensions: String,
    /// Directory names synced in addition to run directories.
    #[serde(default)]
    pub extra_directories: Vec<String>,
    /// Entries whose name matches this regex are never copied or traversed.
    pub ignore_pattern: Option<String>,
    /// Script invoked to delete a run directory (e.g. a sudo wrapper).
    /// Without it, `remove_dir_all` is used.
    pub delete_script: Option<PathBuf>,
    /// Script invoked with a freshly copied run directory to fix
    /// permissions/ownership. Without it, nothing is applied.
    pub permission_script: Option<PathBuf>,
    #[serde(default = "default_job_id_file_name")]
    pub job_id_file_name: String,
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Command producing the scheduler queue table, run via `sh -c`.
    #[serde(default = "default_bjobs_command")]
    pub bjobs_command: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            bjobs_command: default_bjobs_command(),
        }
    }
}

fn default_timeout_secs() -> f64 {
    60.0
}
fn default_job_id_file_name() -> String {
    "jules_job_id".into()
}
fn default_log_file_name() -> String {
    "out.log".into()
}
fn default_bjobs_command() -> String {
    "bjobs -w".into()
}

impl LocalConfig {
    /// Extension allow-list as individual tokens.
    pub fn extension_tokens(&self) -> Vec<&str> {
        self.allowed_extensions.split_whitespace().collect()
    }

    /// Compiled content-ignore regex, if configured.
    pub fn ignore_regex(&self) -> Result<Option<Regex>> {
        match &self.ignore_pattern {
            Some(p) => {
                let re =
                    Regex::new(p).with_context(|| format!("Invalid ignore_pattern regex: {p}"))?;
                Ok(Some(re))
            }
            None => Ok(None),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("runsync").join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    validate(&config)?;
    Ok(config)
}

/// Eager validation at load time; nothing is checked lazily later.
fn validate(config: &Config) -> Result<()> {
    if config.service.url.is_empty() {
        anyhow::bail!("service.url must not be empty");
    }
    if config.file_server.url.is_empty() {
        anyhow::bail!("file_server.url must not be empty");
    }
    if config.service.timeout_secs <= 0.0 || config.file_server.timeout_secs <= 0.0 {
        anyhow::bail!("timeout_secs must be positive");
    }
    if config.service.certificate.is_some() != config.service.key.is_some() {
        anyhow::bail!("service.certificate and service.key must be set together");
    }
    // Surface a bad regex now rather than mid-sync.
    config.local.ignore_regex()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const MINIMAL: &str = r#"
        [service]
        url = "https://majic.example/api"

        [file_server]
        url = "http://files.example/jules_runs/"
        username = "sync"
        password = "secret"

        [local]
        root_path = "/var/lib/runsync"
        allowed_extensions = ".nc .txt"
    "#;

    #[test]
    fn test_minimal_config_loads_with_defaults() {
        let f = write_config(MINIMAL);
        let cfg = load_config(Some(f.path())).unwrap();
        assert_eq!(cfg.service.timeout_secs, 60.0);
        assert_eq!(cfg.local.extension_tokens(), vec![".nc", ".txt"]);
        assert_eq!(cfg.local.job_id_file_name, "jules_job_id");
        assert_eq!(cfg.local.log_file_name, "out.log");
        assert_eq!(cfg.scheduler.bjobs_command, "bjobs -w");
        assert!(cfg.local.extra_directories.is_empty());
    }

    #[test]
    fn test_fractional_timeout_accepted() {
        let f = write_config(&MINIMAL.replace(
            "username = \"sync\"",
            "username = \"sync\"\ntimeout_secs = 2.5",
        ));
        let cfg = load_config(Some(f.path())).unwrap();
        assert_eq!(cfg.file_server.timeout_secs, 2.5);
    }

    #[test]
    fn test_cert_without_key_rejected() {
        let f = write_config(&MINIMAL.replace(
            "url = \"https://majic.example/api\"",
            "url = \"https://majic.example/api\"\ncertificate = \"/etc/c.pem\"",
        ));
        assert!(load_config(Some(f.path())).is_err());
    }

    #[test]
    fn test_bad_ignore_regex_rejected_at_load() {
        let f = write_config(&MINIMAL.replace(
            "allowed_extensions = \".nc .txt\"",
            "allowed_extensions = \".nc\"\nignore_pattern = \"[unclosed\"",
        ));
        assert!(load_config(Some(f.path())).is_err());
    }

    #[test]
    fn test_missing_section_rejected() {
        let f = write_config("[service]\nurl = \"https://majic.example/api\"\n");
        assert!(load_config(Some(f.path())).is_err());
    }
}
