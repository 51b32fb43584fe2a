use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // Both collection files live under this directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_status_checks_file")]
    pub status_checks_file: String,
    #[serde(default = "default_contacts_file")]
    pub contacts_file: String,
    #[serde(default = "default_chat_messages_file")]
    pub chat_messages_file: String,

    /// Comma-separated list of allowed origins. `*` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    #[serde(default = "default_max_body_kb")]
    pub max_body_kb: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_status_checks_file() -> String {
    "status_checks.json".to_string()
}

fn default_contacts_file() -> String {
    "contacts.json".to_string()
}

fn default_chat_messages_file() -> String {
    "chat_messages.json".to_string()
}

fn default_cors_origins() -> String {
    "*".to_string()
}

fn default_max_body_kb() -> u64 {
    64
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn status_checks_path(&self) -> PathBuf {
        self.data_dir.join(&self.status_checks_file)
    }

    pub fn contacts_path(&self) -> PathBuf {
        self.data_dir.join(&self.contacts_file)
    }

    pub fn chat_messages_path(&self) -> PathBuf {
        self.data_dir.join(&self.chat_messages_file)
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// True when no explicit origin list was configured.
    pub fn allows_any_origin(&self) -> bool {
        let origins = self.cors_origins();
        origins.is_empty() || origins.iter().any(|o| o == "*")
    }

    pub fn max_request_body_bytes(&self) -> usize {
        usize::try_from(self.max_body_kb.saturating_mul(1024)).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
impl Config {
    /// Defaults with storage rooted at `data_dir`.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: data_dir.into(),
            status_checks_file: default_status_checks_file(),
            contacts_file: default_contacts_file(),
            chat_messages_file: default_chat_messages_file(),
            cors_origins: default_cors_origins(),
            max_body_kb: default_max_body_kb(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_origins_parsing() {
        let mut config = Config::for_data_dir("/tmp/unused");
        assert!(config.allows_any_origin());

        config.cors_origins = " https://a.example , ,https://b.example".to_string();
        assert_eq!(
            config.cors_origins(),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(!config.allows_any_origin());

        config.cors_origins = String::new();
        assert!(config.cors_origins().is_empty());
        assert!(config.allows_any_origin());
    }

    #[test]
    fn test_collection_paths() {
        let config = Config::for_data_dir("/srv/records");
        assert_eq!(
            config.status_checks_path(),
            PathBuf::from("/srv/records/status_checks.json")
        );
        assert_eq!(
            config.contacts_path(),
            PathBuf::from("/srv/records/contacts.json")
        );
        assert_eq!(
            config.chat_messages_path(),
            PathBuf::from("/srv/records/chat_messages.json")
        );
        assert_eq!(config.max_request_body_bytes(), 64 * 1024);
    }

    #[test]
    fn test_huge_body_limit_saturates() {
        let mut config = Config::for_data_dir("/tmp/unused");
        config.max_body_kb = u64::MAX;
        assert_eq!(config.max_request_body_bytes(), usize::MAX);
    }
}
