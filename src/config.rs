//! Configuration
//!
//! Serializable settings for the components that carry configuration. Every
//! struct has a `Default`, and missing JSON fields fall back to it, so a
//! config file only needs to name what it changes:
//!
//! ```json
//! { "beamable_mm": { "beam_size": 5 } }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for [`NumelDataset`](crate::data::NumelDataset)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumelDatasetConfig {
    /// Sum item sizes when collating instead of returning them individually
    pub reduce: bool,
}

/// Settings for [`BeamableMM`](crate::modules::BeamableMM)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamableMMConfig {
    /// Beam width used by the inference fast path (`None` disables it)
    pub beam_size: Option<usize>,
    /// Check that every beam group of the context operand is replicated
    pub validate_replication: bool,
}

impl BeamableMMConfig {
    /// Fast path enabled for the given beam width, no validation
    pub fn with_beam(beam_size: usize) -> Self {
        Self {
            beam_size: Some(beam_size),
            validate_replication: false,
        }
    }
}

/// Top-level configuration file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeqkitConfig {
    pub numel: NumelDatasetConfig,
    pub beamable_mm: BeamableMMConfig,
}

impl SeqkitConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::debug!("loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = SeqkitConfig::from_json_str(r#"{ "beamable_mm": { "beam_size": 5 } }"#)
            .unwrap();
        assert_eq!(config.beamable_mm.beam_size, Some(5));
        assert!(!config.beamable_mm.validate_replication);
        assert!(!config.numel.reduce);
    }

    #[test]
    fn test_empty_object_is_default() {
        let config = SeqkitConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SeqkitConfig::default());
    }

    #[test]
    fn test_serialized_config_parses_back() {
        let config = SeqkitConfig {
            numel: NumelDatasetConfig { reduce: true },
            beamable_mm: BeamableMMConfig::with_beam(4),
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(SeqkitConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = SeqkitConfig::from_json_str("{ beam_size: ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqkit.json");
        fs::write(&path, r#"{ "numel": { "reduce": true } }"#).unwrap();

        let config = SeqkitConfig::from_json_file(&path).unwrap();
        assert!(config.numel.reduce);
        assert_eq!(config.beamable_mm.beam_size, None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SeqkitConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
