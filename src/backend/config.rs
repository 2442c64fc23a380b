//! Runtime configuration.
//!
//! Every setting has a default, so an empty file (or no file) yields the
//! standard sizes. A complete file looks like:
//!
//! ```toml
//! [tables]
//! symbol_buckets = 63559
//! float_buckets = 8191
//! integer_buckets = 8191
//! bitmap_buckets = 8191
//! external_address_buckets = 8191
//!
//! [memory]
//! small_object_threshold = 500
//! block_size = 32000
//! limit_bytes = 67108864   # optional ceiling
//!
//! [gc]
//! ephemeral_count_increment = 1000
//! ephemeral_size_increment = 10240
//!
//! [facts]
//! hash_size = 16231
//! allow_duplicates = false
//! ```

use std::path::Path;

use serde::Deserialize;

use super::errors::ConfigError;
use super::memory::{DEFAULT_BLOCK_SIZE, DEFAULT_SMALL_OBJECT_THRESHOLD};

pub const DEFAULT_SYMBOL_BUCKETS: usize = 63559;
pub const DEFAULT_FLOAT_BUCKETS: usize = 8191;
pub const DEFAULT_INTEGER_BUCKETS: usize = 8191;
pub const DEFAULT_BITMAP_BUCKETS: usize = 8191;
pub const DEFAULT_EXTERNAL_ADDRESS_BUCKETS: usize = 8191;
pub const DEFAULT_FACT_HASH_SIZE: usize = 16231;
pub const DEFAULT_EPHEMERAL_COUNT_INCREMENT: usize = 1000;
pub const DEFAULT_EPHEMERAL_SIZE_INCREMENT: usize = 10240;

/// Top-level configuration of one [`Environment`](super::Environment).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub tables: TableConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub gc: GcConfig,

    #[serde(default)]
    pub facts: FactConfig,
}

/// Bucket counts of the atomic value tables. Tables are never resized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    pub symbol_buckets: usize,
    pub float_buckets: usize,
    pub integer_buckets: usize,
    pub bitmap_buckets: usize,
    pub external_address_buckets: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            symbol_buckets: DEFAULT_SYMBOL_BUCKETS,
            float_buckets: DEFAULT_FLOAT_BUCKETS,
            integer_buckets: DEFAULT_INTEGER_BUCKETS,
            bitmap_buckets: DEFAULT_BITMAP_BUCKETS,
            external_address_buckets: DEFAULT_EXTERNAL_ADDRESS_BUCKETS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Requests of at least this many bytes bypass the pool.
    pub small_object_threshold: usize,
    /// Bytes obtained from the system per pool block.
    pub block_size: usize,
    /// Ceiling on bytes obtained from the system. `None` means unbounded.
    pub limit_bytes: Option<usize>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            small_object_threshold: DEFAULT_SMALL_OBJECT_THRESHOLD,
            block_size: DEFAULT_BLOCK_SIZE,
            limit_bytes: None,
        }
    }
}

/// Periodic cleanup thresholds. A sweep runs once the ephemeral backlog
/// exceeds either threshold; each threshold then moves to the current backlog
/// plus its increment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GcConfig {
    pub ephemeral_count_increment: usize,
    pub ephemeral_size_increment: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            ephemeral_count_increment: DEFAULT_EPHEMERAL_COUNT_INCREMENT,
            ephemeral_size_increment: DEFAULT_EPHEMERAL_SIZE_INCREMENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactConfig {
    /// Baseline bucket count of the fact hash table.
    pub hash_size: usize,
    /// Accept facts identical to one already asserted.
    pub allow_duplicates: bool,
}

impl Default for FactConfig {
    fn default() -> Self {
        FactConfig {
            hash_size: DEFAULT_FACT_HASH_SIZE,
            allow_duplicates: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate TOML text.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        Self::parse_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let buckets = [
            ("tables.symbol_buckets", self.tables.symbol_buckets),
            ("tables.float_buckets", self.tables.float_buckets),
            ("tables.integer_buckets", self.tables.integer_buckets),
            ("tables.bitmap_buckets", self.tables.bitmap_buckets),
            (
                "tables.external_address_buckets",
                self.tables.external_address_buckets,
            ),
            ("facts.hash_size", self.facts.hash_size),
        ];
        for (name, value) in buckets {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }

        let memory = &self.memory;
        if memory.small_object_threshold < 2 {
            return Err(ConfigError::Invalid(
                "memory.small_object_threshold must be at least 2".to_string(),
            ));
        }
        if memory.block_size < memory.small_object_threshold {
            return Err(ConfigError::Invalid(format!(
                "memory.block_size ({}) is smaller than memory.small_object_threshold ({})",
                memory.block_size, memory.small_object_threshold
            )));
        }
        if memory.limit_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "memory.limit_bytes must be positive when set".to_string(),
            ));
        }

        if self.gc.ephemeral_count_increment == 0 || self.gc.ephemeral_size_increment == 0 {
            return Err(ConfigError::Invalid(
                "gc increments must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
