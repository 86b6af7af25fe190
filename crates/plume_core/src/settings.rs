//! Settings management

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Per data set tuning, mostly for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetSettings {
    /// Width of the `=` separator line framing a dump.
    pub dump_separator_width: usize,
    /// Cap on rows printed by a dump; `None` prints every instance.
    pub dump_max_rows: Option<usize>,
    /// Emit a debug event for every allocation.
    pub log_allocations: bool,
}

impl Default for DataSetSettings {
    fn default() -> Self {
        Self {
            dump_separator_width: 50,
            dump_max_rows: None,
            log_allocations: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse settings from a JSON string.
pub fn from_json_str<T: DeserializeOwned>(json: &str) -> Result<T, SettingsError> {
    Ok(serde_json::from_str(json)?)
}

/// Load settings from a JSON file.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, SettingsError> {
    let text = std::fs::read_to_string(path)?;
    from_json_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let s: DataSetSettings = from_json_str(r#"{ "dump_max_rows": 8 }"#).unwrap();
        assert_eq!(s.dump_max_rows, Some(8));
        assert_eq!(s.dump_separator_width, 50);
        assert!(!s.log_allocations);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = from_json_str::<DataSetSettings>("{ nope").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_json::<DataSetSettings>("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
