//! Configuration management for harrow
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (HARROW_* prefix, `__` between section and key)
//! 2. harrow.local.toml (gitignored, local overrides)
//! 3. harrow.toml (git-tracked, project config)
//! 4. ~/.config/harrow/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! CLI flags are applied on top by the binary.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use harrow_core::{
    CorruptorKind, Distribution, FailurePolicy, OffsetClock, PartitionWindow, SelectorConfig,
};
use harrow_schema::{ColumnKind, ColumnSpec, DataType, SchemaSpec};
use harrow_types::{ConsistencyLevel, OperationKind};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{LOCAL_FILE, PROJECT_FILE, Paths};

/// Main harrow configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarrowConfig {
    pub run: RunConfig,
    pub partitions: PartitionConfig,
    pub selector: SelectorSection,
    pub clock: ClockConfig,
    pub log: LogConfig,
    pub schema: SchemaConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    /// Number of lts to visit, starting at zero.
    pub max_lts: u64,
    /// Worker threads; 0 lets rayon pick.
    pub workers: usize,
    pub failure_policy: FailurePolicy,
    pub consistency: ConsistencyLevel,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            max_lts: 1_000,
            workers: 0,
            failure_policy: FailurePolicy::FailFast,
            consistency: ConsistencyLevel::Quorum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub window_size: u64,
    pub slide_after_repeats: u64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        let window = PartitionWindow::default();
        Self {
            window_size: window.window_size,
            slide_after_repeats: window.slide_after_repeats,
        }
    }
}

/// Inclusive count range; `min == max` is a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: u64,
    pub max: u64,
}

impl CountRange {
    fn distribution(self) -> Distribution {
        if self.min == self.max {
            Distribution::Constant(self.min)
        } else {
            Distribution::Uniform {
                min: self.min,
                max: self.max,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSection {
    pub max_partition_size: u64,
    pub modifications_per_lts: CountRange,
    pub operations_per_modification: CountRange,
    /// Operation kind name to relative weight.
    pub operation_weights: BTreeMap<String, u32>,
}

impl Default for SelectorSection {
    fn default() -> Self {
        Self {
            max_partition_size: 100,
            modifications_per_lts: CountRange { min: 1, max: 2 },
            operations_per_modification: CountRange { min: 1, max: 3 },
            operation_weights: SelectorConfig::default()
                .operation_weights
                .into_iter()
                .map(|(kind, weight)| (kind.name().to_string(), weight))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Fixed rts of lts 0, in microseconds. Derived from wall time when unset.
    pub base: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Audit log of every executed operation.
    pub operation_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub keyspace: String,
    pub table: String,
    pub columns: Vec<ColumnSpec>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            keyspace: "harrow".to_string(),
            table: "table0".to_string(),
            columns: vec![
                ColumnSpec::new("pk", DataType::BigInt, ColumnKind::PartitionKey),
                ColumnSpec::new("ck", DataType::Ascii { length: 8 }, ColumnKind::Clustering),
                ColumnSpec::new("s1", DataType::Integer, ColumnKind::Static),
                ColumnSpec::new("v1", DataType::BigInt, ColumnKind::Regular),
                ColumnSpec::new("v2", DataType::TinyInt, ColumnKind::Regular),
                ColumnSpec::new("v3", DataType::Boolean, ColumnKind::Regular),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Corrupt visited partitions after the run and check that the
    /// injected rows are read back.
    pub corrupt: bool,
    pub corruptor: CorruptorKind,
    /// Number of visited partitions to check.
    pub partitions: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            corrupt: false,
            corruptor: CorruptorKind::AddExtraRow,
            partitions: 10,
        }
    }
}

impl HarrowConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Reads a single TOML file on top of the built-in defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        config.validate()?;
        Ok(config)
    }

    /// Renders the effective configuration.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        if let Some(path) = &self.log.operation_log
            && path.is_relative()
        {
            self.log.operation_log = Some(base_dir.as_ref().join(path));
        }
    }

    /// Checks every section without building a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.partition_window()?;
        self.selector_config()?;
        self.schema_spec()?;
        if let Some(base) = self.clock.base {
            OffsetClock::new(base).map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }
        if self.validation.corrupt && self.validation.partitions == 0 {
            return Err(ConfigError::ValidationError(
                "validation.partitions must be positive when corrupt is set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn partition_window(&self) -> Result<PartitionWindow, ConfigError> {
        let PartitionConfig {
            window_size,
            slide_after_repeats,
        } = self.partitions;
        let window = PartitionWindow {
            window_size,
            slide_after_repeats,
        };
        window
            .cycle()
            .map_err(|e| ConfigError::ValidationError(format!("partitions: {e}")))?;
        Ok(window)
    }

    pub fn selector_config(&self) -> Result<SelectorConfig, ConfigError> {
        let section = &self.selector;
        if section.max_partition_size == 0 {
            return Err(ConfigError::ValidationError(
                "selector.max_partition_size must be positive".to_string(),
            ));
        }
        for (name, range) in [
            ("modifications_per_lts", section.modifications_per_lts),
            ("operations_per_modification", section.operations_per_modification),
        ] {
            if range.min > range.max {
                return Err(ConfigError::ValidationError(format!(
                    "selector.{name}: min {} exceeds max {}",
                    range.min, range.max
                )));
            }
        }

        let operation_weights = section
            .operation_weights
            .iter()
            .map(|(name, weight)| {
                name.parse::<OperationKind>()
                    .map(|kind| (kind, *weight))
                    .map_err(|e| {
                        ConfigError::ValidationError(format!("selector.operation_weights: {e}"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if operation_weights.iter().all(|(_, weight)| *weight == 0) {
            return Err(ConfigError::ValidationError(
                "selector.operation_weights needs at least one positive weight".to_string(),
            ));
        }

        Ok(SelectorConfig {
            max_partition_size: section.max_partition_size,
            modifications_per_lts: section.modifications_per_lts.distribution(),
            operations_per_modification: section.operations_per_modification.distribution(),
            operation_weights,
        })
    }

    pub fn schema_spec(&self) -> Result<SchemaSpec, ConfigError> {
        SchemaSpec::from_columns(
            self.schema.keyspace.clone(),
            self.schema.table.clone(),
            self.schema.columns.iter().cloned(),
        )
        .map_err(|e| ConfigError::ValidationError(format!("schema: {e}")))
    }

    /// Clock anchored at the configured base, or at the current time.
    pub fn clock(&self) -> Result<OffsetClock, ConfigError> {
        match self.clock.base {
            Some(base) => {
                OffsetClock::new(base).map_err(|e| ConfigError::ValidationError(e.to_string()))
            }
            None => Ok(OffsetClock::from_wall_clock()),
        }
    }
}
