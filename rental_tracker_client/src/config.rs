use std::{path::Path, str::FromStr, time::Duration};

use crate::{location::WatchOptions, DEFAULT_API_BASE_URL};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfiguration {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub watch: WatchOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: expected `key = value`")]
    Syntax { line: usize },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

impl Default for ClientConfiguration {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            watch: WatchOptions::default(),
        }
    }
}

impl ClientConfiguration {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parses `key = value` lines. Keys that are not present keep their defaults.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax { line: index + 1 });
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "api_base_url" => {
                    if value.is_empty() {
                        return Err(invalid(key, value));
                    }
                    config.api_base_url = value.trim_end_matches('/').to_string();
                }
                "request_timeout_secs" => config.request_timeout = Duration::from_secs(parse_value(key, value)?),
                "connect_timeout_secs" => config.connect_timeout = Duration::from_secs(parse_value(key, value)?),
                "high_accuracy" => config.watch.high_accuracy = parse_value(key, value)?,
                "distance_filter_m" => {
                    let distance: f64 = parse_value(key, value)?;
                    if !distance.is_finite() || distance < 0.0 {
                        return Err(invalid(key, value));
                    }
                    config.watch.distance_filter_m = distance;
                }
                "interval_ms" => config.watch.interval = Duration::from_millis(parse_value(key, value)?),
                "fastest_interval_ms" => config.watch.fastest_interval = Duration::from_millis(parse_value(key, value)?),
                _ => {
                    tracing::warn!("Unknown config key: {}", key);
                }
            }
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_defaults() {
        let config = ClientConfiguration::parse("\n# nothing here\n").unwrap();
        assert_eq!(config, ClientConfiguration::default());
        assert_eq!(config.api_base_url, "http://localhost:5028");
        assert_eq!(config.watch.interval, Duration::from_millis(1000));
    }

    #[test]
    fn parses_all_keys() {
        let config = ClientConfiguration::parse(
            "api_base_url = https://fleet.example.com/
             request_timeout_secs = 5
             connect_timeout_secs=2
             # watch
             high_accuracy = false
             distance_filter_m = 10.5
             interval_ms = 2500
             fastest_interval_ms = 500
             some_future_key = 1",
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://fleet.example.com");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(!config.watch.high_accuracy);
        assert_eq!(config.watch.distance_filter_m, 10.5);
        assert_eq!(config.watch.interval, Duration::from_millis(2500));
        assert_eq!(config.watch.fastest_interval, Duration::from_millis(500));
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(matches!(ClientConfiguration::parse("interval_ms 1000"), Err(ConfigError::Syntax { line: 1 })));
        assert!(matches!(
            ClientConfiguration::parse("interval_ms = soon"),
            Err(ConfigError::InvalidValue { key, .. }) if key == "interval_ms"
        ));
        assert!(ClientConfiguration::parse("distance_filter_m = -3").is_err());
        assert!(ClientConfiguration::parse("api_base_url =").is_err());
    }
}
