//! Simulation and usage-model configuration.
//!
//! Configurations deserialize from JSON (typically the `usage_model`
//! section of a scenario file) and are validated eagerly via
//! [`SimulationConfig::validate`] before a model is built, so every
//! parameter error surfaces before the first simulation step.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::error::{SimulationError, SimulationResult};
use crate::operation::parse_size;

/// Top-level configuration of a simulation run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Seed for the simulation RNG; the same seed and configuration
    /// reproduce the exact operation sequence.
    pub seed: u64,
    /// Optional path of a playbook to record the generated operations to.
    #[serde(default)]
    pub write_playbook: Option<PathBuf>,
    /// The usage model driving the run.
    pub usage_model: UsageModelConfig,
}

impl SimulationConfig {
    /// Validate all parameters, including the nested model configuration.
    pub fn validate(&self) -> SimulationResult<()> {
        self.usage_model.validate()
    }
}

/// Configuration of one usage model, tagged by model name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "parameters")]
pub enum UsageModelConfig {
    /// Occupancy-driven random model.
    Probabilistic(ProbabilisticConfig),
    /// Throttled read/write model after Karresand, Axelsson and Dyrkolbotn.
    #[serde(rename = "KAD")]
    Kad(KadConfig),
    /// Deterministic replay of a recorded playbook.
    Playbook(PlaybookConfig),
}

impl UsageModelConfig {
    /// Validate the model parameters.
    pub fn validate(&self) -> SimulationResult<()> {
        match self {
            UsageModelConfig::Probabilistic(config) => config.validate(),
            UsageModelConfig::Kad(config) => config.validate(),
            UsageModelConfig::Playbook(config) => config.validate(),
        }
    }
}

/// Parameters of the probabilistic usage model.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbabilisticConfig {
    /// Number of operations to generate.
    pub steps: u64,
    /// Smallest file size the model will write, in bytes.
    #[serde(deserialize_with = "deserialize_size")]
    pub file_size_min: u64,
    /// Largest file size the model will write, in bytes.
    #[serde(deserialize_with = "deserialize_size")]
    pub file_size_max: u64,
}

impl ProbabilisticConfig {
    /// Validate the parameters.
    pub fn validate(&self) -> SimulationResult<()> {
        if self.steps < 1 {
            return Err(config_error("steps must be >= 1"));
        }
        if self.file_size_min < 1 {
            return Err(config_error("file_size_min must be >= 1"));
        }
        if self.file_size_min > self.file_size_max {
            return Err(config_error(
                "file_size_min must not be greater than file_size_max",
            ));
        }
        Ok(())
    }
}

/// Parameters of the KAD usage model.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KadConfig {
    /// Number of operations to generate.
    pub steps: u64,
    /// Relative weights of the four operation families.
    pub operation_factors: OperationFactors,
    /// Weighted multipliers applied to the chunk size when sizing an
    /// operation.
    pub size_factors: Vec<SizeFactor>,
    /// Inclusive range the uniform multiplier `r` is drawn from.
    pub random_range: RandomRange,
    /// Granularity of all generated sizes, in bytes.
    #[serde(deserialize_with = "deserialize_size")]
    pub chunk_size: u64,
    /// Low-usage hysteresis band forcing writes.
    pub write_limit: Limit,
    /// High-usage hysteresis band forcing deletions.
    pub delete_limit: Limit,
}

impl KadConfig {
    /// Validate the parameters, including the relationship between the
    /// two hysteresis bands.
    pub fn validate(&self) -> SimulationResult<()> {
        if self.steps < 1 {
            return Err(config_error("steps must be >= 1"));
        }
        if self.chunk_size < 1 {
            return Err(config_error("chunk_size must be >= 1"));
        }
        self.operation_factors.validate()?;
        if self.size_factors.is_empty() {
            return Err(config_error("size_factors must not be empty"));
        }
        for factor in &self.size_factors {
            if factor.size < 1 {
                return Err(config_error("size factors must be >= 1"));
            }
        }
        if self.size_factors.iter().all(|factor| factor.weight == 0) {
            return Err(config_error(
                "at least one size factor must have a positive weight",
            ));
        }
        if self.random_range.max < 1 {
            return Err(config_error("random_range.max must be >= 1"));
        }
        if self.random_range.min > self.random_range.max {
            return Err(config_error(
                "random_range.min must not be greater than random_range.max",
            ));
        }
        self.write_limit.validate("write_limit")?;
        self.delete_limit.validate("delete_limit")?;
        if self.write_limit.start > self.write_limit.stop {
            return Err(config_error(
                "write_limit.start must not be greater than write_limit.stop",
            ));
        }
        if self.delete_limit.start < self.delete_limit.stop {
            return Err(config_error(
                "delete_limit.start must not be less than delete_limit.stop",
            ));
        }
        if self.delete_limit.stop <= self.write_limit.stop {
            return Err(config_error(
                "delete_limit.stop must be greater than write_limit.stop",
            ));
        }
        if self.write_limit.start > self.delete_limit.start {
            return Err(config_error(
                "write_limit.start must not be greater than delete_limit.start",
            ));
        }
        Ok(())
    }
}

/// Relative weights of the KAD operation families.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationFactors {
    /// Weight of writing a new file.
    pub write: u64,
    /// Weight of deleting an existing file.
    pub delete: u64,
    /// Weight of extending an existing file.
    pub increase: u64,
    /// Weight of shrinking an existing file.
    pub decrease: u64,
}

impl OperationFactors {
    fn validate(&self) -> SimulationResult<()> {
        if self.write == 0 && self.delete == 0 && self.increase == 0 && self.decrease == 0 {
            return Err(config_error(
                "at least one operation factor must be positive",
            ));
        }
        Ok(())
    }

    /// The weights in the fixed order write, delete, increase, decrease.
    pub fn as_weights(&self) -> [u64; 4] {
        [self.write, self.delete, self.increase, self.decrease]
    }
}

/// One weighted size multiplier of the KAD model.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeFactor {
    /// Multiplier applied to `r * chunk_size`.
    pub size: u64,
    /// Relative weight of this multiplier.
    pub weight: u64,
}

/// Inclusive integer range for the KAD uniform multiplier.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomRange {
    /// Lower bound, inclusive.
    pub min: u64,
    /// Upper bound, inclusive.
    pub max: u64,
}

impl RandomRange {
    /// The configured bounds as an inclusive range.
    pub fn as_range(&self) -> RangeInclusive<u64> {
        self.min..=self.max
    }
}

/// One hysteresis band over the usage ratio.
///
/// `start` is the threshold that activates the band and `stop` the
/// threshold that deactivates it again. Setting `start` to the edge of
/// the usage scale (0 for the write band, 1 for the delete band)
/// disables the band entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limit {
    /// Usage ratio at which the band activates.
    pub start: f64,
    /// Usage ratio at which the band deactivates.
    pub stop: f64,
}

impl Limit {
    fn validate(&self, name: &str) -> SimulationResult<()> {
        for (field, value) in [("start", self.start), ("stop", self.stop)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(config_error(&format!(
                    "{name}.{field} must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Parameters of the playbook replay model.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaybookConfig {
    /// Path of the playbook file to replay.
    pub path: PathBuf,
}

impl PlaybookConfig {
    fn validate(&self) -> SimulationResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(config_error("playbook path must not be empty"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> SimulationError {
    SimulationError::Configuration(message.to_string())
}

/// Deserialize a byte size given either as a plain integer or as a
/// string with a size suffix (`"512 MiB"`, `"4k"`).
fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Number(u64),
        Text(String),
    }

    match RawSize::deserialize(deserializer)? {
        RawSize::Number(value) => Ok(value),
        RawSize::Text(text) => parse_size(&text).map_err(serde::de::Error::custom),
    }
}
