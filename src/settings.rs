use std::path::PathBuf;

use config::{Config, ConfigError, File};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::repositories::referrals::{DEFAULT_LEDGER_KEY, DEFAULT_MAX_TOKEN_ATTEMPTS};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: StorageBackend,
    pub data_dir: Option<PathBuf>,
    pub key: String,
}

impl Storage {
    /// The configured directory, or the platform data directory when unset.
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(|| {
            ProjectDirs::from("app", "referrals", "referral-ledger")
                .map(|dirs| dirs.data_dir().to_path_buf())
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct Tokens {
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub listen: String,
}

#[derive(Debug, Deserialize)]
pub struct Links {
    pub signup_url: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub storage: Storage,
    pub tokens: Tokens,
    pub http: Http,
    pub links: Links,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("storage.backend", "file")?
            .set_default("storage.key", DEFAULT_LEDGER_KEY)?
            .set_default("tokens.max_attempts", i64::from(DEFAULT_MAX_TOKEN_ATTEMPTS))?
            .set_default("http.listen", "0.0.0.0:8080")?
            .set_default("links.signup_url", "http://localhost:8080/signup")?
            .add_source(File::with_name(path))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> String {
        let path = dir.path().join("referrals.toml");
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&write_config(&dir, "")).unwrap();

        assert_eq!(settings.storage.backend, StorageBackend::File);
        assert_eq!(settings.storage.key, DEFAULT_LEDGER_KEY);
        assert_eq!(settings.storage.data_dir, None);
        assert_eq!(settings.tokens.max_attempts, DEFAULT_MAX_TOKEN_ATTEMPTS);
        assert_eq!(settings.http.listen, "0.0.0.0:8080");
        assert_eq!(settings.links.signup_url, "http://localhost:8080/signup");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
            [storage]
            backend = "memory"
            data_dir = "/var/lib/referrals"
            key = "tenant-a:referrals"

            [tokens]
            max_attempts = 3

            [http]
            listen = "127.0.0.1:9000"

            [links]
            signup_url = "https://referrals.example.com/signup"
            "#,
        );
        let settings = Settings::load(&path).unwrap();

        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(
            settings.storage.resolved_data_dir(),
            Some(PathBuf::from("/var/lib/referrals"))
        );
        assert_eq!(settings.storage.key, "tenant-a:referrals");
        assert_eq!(settings.tokens.max_attempts, 3);
        assert_eq!(settings.http.listen, "127.0.0.1:9000");
        assert_eq!(
            settings.links.signup_url,
            "https://referrals.example.com/signup"
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(Settings::load(&path.to_string_lossy()).is_err());
    }
}
