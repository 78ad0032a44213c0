use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{ProcwatchError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// period of the poll timer in milliseconds, defaults to 2500
    pub poll_interval_ms: u64,
    /// upper bound for a single process service call, unbounded when absent
    pub fetch_timeout_ms: Option<u64>,
    /// poll the repositories of one tick concurrently instead of one after another
    pub parallel_repositories: bool,
    /// number of process service handles kept alive
    pub service_cache_size: usize,
    /// capacity of the tree event broadcast queue
    pub event_queue_size: usize,
    /// capacity of the repository manager event queue
    pub repository_queue_size: usize,
    /// logging config
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// default filter directive, overridden by RUST_LOG
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2500,
            fetch_timeout_ms: Some(30_000),
            parallel_repositories: false,
            service_cache_size: 64,
            event_queue_size: 2048,
            repository_queue_size: 128,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| ProcwatchError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.poll_interval_ms == 0 {
            return Err(ProcwatchError::Config("poll_interval_ms must be greater than 0".to_string()));
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use crate::Config;

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        poll_interval_ms = 1000
        fetch_timeout_ms = 500
        parallel_repositories = true

        [logging]
        level = "procwatch=debug"
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.fetch_timeout().unwrap().as_millis(), 500);
        assert!(config.parallel_repositories);
        assert_eq!(config.logging.level, "procwatch=debug");
        assert_eq!(config.service_cache_size, 64);
    }

    #[test]
    fn test_config_defaults_from_empty_str() {
        let config = Config::load_from_str("").unwrap();
        assert_eq!(config.poll_interval().as_millis(), 2500);
        assert_eq!(config.fetch_timeout_ms, Some(30_000));
        assert!(!config.parallel_repositories);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        assert!(Config::load_from_str("poll_interval_ms = 0").is_err());
    }

    #[test]
    fn test_config_rejects_bad_toml() {
        assert!(Config::load_from_str("poll_interval_ms = \"fast\"").is_err());
    }

    #[test]
    fn test_config_create_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "event_queue_size = 16").unwrap();

        let config = Config::create(file.path()).unwrap();
        assert_eq!(config.event_queue_size, 16);
        assert!(Config::create(file.path().with_extension("missing")).is_err());
    }
}
