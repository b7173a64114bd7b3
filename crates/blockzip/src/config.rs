//! Pipeline configuration and block failure policies.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    constants::{DEFAULT_BLOCK_SIZE, DEFAULT_COMPRESSION_LEVEL},
    BlockzipError,
    Result,
};

/// How a failing block is handled once its generation completes.
///
/// - `Warn`: the failure is logged, the block is left out of the output and its index is
///   reported in the run summary
/// - `Strict`: the run is aborted before the failing generation is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlockFailureMode {
    /// Continue with a degraded output (default)
    #[default]
    Warn,
    /// Abort the whole operation on the first failing block
    Strict,
}

impl std::str::FromStr for BlockFailureMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(BlockFailureMode::Warn),
            "strict" => Ok(BlockFailureMode::Strict),
            _ => Err(format!("Invalid failure mode: {}", s)),
        }
    }
}

impl std::fmt::Display for BlockFailureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockFailureMode::Warn => write!(f, "warn"),
            BlockFailureMode::Strict => write!(f, "strict"),
        }
    }
}

/// Configuration threaded through the pipeline, its worker pool and its writer.
///
/// Every field has a default, so a configuration file only needs to name the values it
/// overrides. A `workers` value of `0` means "use the host processor count".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of persistent worker threads, also the number of blocks per generation
    pub workers:           usize,
    /// Uncompressed size of every non-final block
    pub block_size:        usize,
    /// Policy applied to blocks whose codec call failed
    pub failure_mode:      BlockFailureMode,
    /// Deflate level (0-9) used when compressing blocks
    pub compression_level: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers:           num_cpus::get(),
            block_size:        DEFAULT_BLOCK_SIZE,
            failure_mode:      BlockFailureMode::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file.
    ///
    /// Missing fields take their default values. A missing or zero `workers` entry falls back
    /// to the processor count of the host.
    ///
    /// # Errors
    ///
    /// * `BlockzipError::Io` - If the file cannot be read
    /// * `BlockzipError::Json` - If the file is not valid JSON for this structure
    /// * `BlockzipError::ConfigError` - If the loaded values fail validation
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config: PipelineConfig = serde_json::from_str(&raw)?;
        if config.workers == 0 {
            config.workers = num_cpus::get();
            info!(
                "Parameter 'workers' is not set in {}, using the processor count {}",
                path.display(),
                config.workers
            );
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a runnable pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(BlockzipError::ConfigError {
                message: "worker count must be at least 1".to_string(),
            });
        }
        if self.block_size == 0 {
            return Err(BlockzipError::ConfigError {
                message: "block size must be at least 1 byte".to_string(),
            });
        }
        // ISIZE is a 32-bit field, a full block has to be representable in it.
        if u32::try_from(self.block_size).is_err() {
            return Err(BlockzipError::ConfigError {
                message: format!("block size {} does not fit the gzip ISIZE field", self.block_size),
            });
        }
        if self.compression_level > 9 {
            return Err(BlockzipError::ConfigError {
                message: format!("compression level {} is out of range 0-9", self.compression_level),
            });
        }
        Ok(())
    }

    /// Size of the decompression scan window: one block plus the header margin.
    pub const fn scan_window_len(&self) -> usize { self.block_size + crate::constants::SCAN_MARGIN }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.failure_mode, BlockFailureMode::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = PipelineConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BlockzipError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_block_size_and_bad_level() {
        let config = PipelineConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            compression_level: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial_fields() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 3, "failure_mode": "strict"}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.failure_mode, BlockFailureMode::Strict);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.compression_level, DEFAULT_COMPRESSION_LEVEL);
    }

    #[test]
    fn test_from_file_zero_workers_falls_back_to_cpu_count() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 0}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.workers, num_cpus::get());
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = PipelineConfig::from_file(file.path());
        assert!(matches!(result, Err(BlockzipError::Json { .. })));
    }

    #[test]
    fn test_failure_mode_parsing() {
        assert_eq!("WARN".parse::<BlockFailureMode>().unwrap(), BlockFailureMode::Warn);
        assert_eq!("strict".parse::<BlockFailureMode>().unwrap(), BlockFailureMode::Strict);
        assert!("abort".parse::<BlockFailureMode>().is_err());
        assert_eq!(BlockFailureMode::Strict.to_string(), "strict");
    }
}
