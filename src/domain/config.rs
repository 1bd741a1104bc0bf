use std::{io, ops::RangeInclusive, path::Path};

use serde::{Deserialize, Serialize};

/// Configuration for a roster directory.
///
/// Holds the loading policy for the directory store and the value limits the
/// command line enforces before calling into the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Whether to skip YAML files that cannot be parsed as records instead of
    /// refusing to open the directory.
    pub allow_unrecognised: bool,

    min_age: u8,
    max_age: u8,
    min_capacity: u16,
    max_capacity: u16,
    min_name_length: usize,
    max_name_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_unrecognised: false,
            min_age: default_min_age(),
            max_age: default_max_age(),
            min_capacity: default_min_capacity(),
            max_capacity: default_max_capacity(),
            min_name_length: default_min_name_length(),
            max_name_length: default_max_name_length(),
        }
    }
}

/// Errors reading or writing a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("failed to access config file: {0}")]
    Io(#[from] io::Error),
    /// The file is not valid configuration TOML.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or the file
    /// cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Accepted child ages, in years.
    #[must_use]
    pub const fn age_range(&self) -> RangeInclusive<u8> {
        self.min_age..=self.max_age
    }

    /// Accepted vehicle capacities.
    #[must_use]
    pub const fn capacity_range(&self) -> RangeInclusive<u16> {
        self.min_capacity..=self.max_capacity
    }

    /// Accepted length of names and vehicle models, in characters, after
    /// surrounding whitespace is trimmed.
    #[must_use]
    pub const fn name_length_range(&self) -> RangeInclusive<usize> {
        self.min_name_length..=self.max_name_length
    }
}

const fn default_min_age() -> u8 {
    3
}

const fn default_max_age() -> u8 {
    18
}

const fn default_min_capacity() -> u16 {
    10
}

const fn default_max_capacity() -> u16 {
    50
}

const fn default_min_name_length() -> usize {
    2
}

const fn default_max_name_length() -> usize {
    50
}

/// The serialized versions of the configuration.
///
/// Keeps the on-disk format independent of the domain type.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        allow_unrecognised: bool,

        #[serde(default = "default_min_age")]
        min_age: u8,

        #[serde(default = "default_max_age")]
        max_age: u8,

        #[serde(default = "default_min_capacity")]
        min_capacity: u16,

        #[serde(default = "default_max_capacity")]
        max_capacity: u16,

        #[serde(default = "default_min_name_length")]
        min_name_length: usize,

        #[serde(default = "default_max_name_length")]
        max_name_length: usize,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                allow_unrecognised,
                min_age,
                max_age,
                min_capacity,
                max_capacity,
                min_name_length,
                max_name_length,
            } => Self {
                allow_unrecognised,
                min_age,
                max_age,
                min_capacity,
                max_capacity,
                min_name_length,
                max_name_length,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            allow_unrecognised: config.allow_unrecognised,
            min_age: config.min_age,
            max_age: config.max_age,
            min_capacity: config.min_capacity,
            max_capacity: config.max_capacity,
            min_name_length: config.min_name_length,
            max_name_length: config.max_name_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"_version = "1"
allow_unrecognised = true
min_age = 4
max_capacity = 40
max_name_length = 30
"#,
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert!(config.allow_unrecognised);
        assert_eq!(config.age_range(), 4..=18);
        assert_eq!(config.capacity_range(), 10..=40);
        assert_eq!(config.name_length_range(), 2..=30);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        assert!(matches!(
            Config::load(&missing),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nmin_age = \"three\"\n")
            .unwrap();

        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load_preserves_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let mut config = Config::default();
        config.allow_unrecognised = true;

        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
