//! Configuration of a fuzzing [Session](crate::Session).

use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, time::Duration};

/// Selection policy for a single operation.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationConfig {
    /// Whether the operation may be selected at all.
    pub enabled: bool,

    /// Relative probability of selecting the operation (must be finite and non-negative).
    pub weight: f64,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
        }
    }
}

/// Gating policy for a single validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Whether the validator runs after each operation.
    pub enabled: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Budget of the trace shrinker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shortening {
    /// Maximum number of candidate traces to evaluate.
    pub iterations: u64,
}

impl Default for Shortening {
    fn default() -> Self {
        Self { iterations: 1000 }
    }
}

/// Configuration for a fuzzing session.
///
/// The configuration is snapshotted into every [Failure](crate::Failure) with `seed_prefix`
/// resolved and `seed_number` set to the failing iteration, so the snapshot alone is enough to
/// rerun that iteration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of iterations (independent runs) per session.
    pub num_iterations: u64,

    /// Number of operations picked per iteration.
    pub num_operations: u64,

    /// Prefix of every iteration seed.
    pub seed_prefix: String,

    /// Seed number of the first iteration (iteration `i` uses `seed_number + i`).
    pub seed_number: u64,

    /// If set, `seed_prefix` is replaced with a freshly generated random prefix.
    pub random_seed: bool,

    /// Emit verbose traces of picks and validations.
    pub debug: bool,

    /// Selection policy of each operation, by name.
    ///
    /// Operations without an entry are skipped (with a warning).
    pub operations: BTreeMap<String, OperationConfig>,

    /// Gating policy of each validator, by name.
    ///
    /// Every validator must have an entry.
    pub validation: BTreeMap<String, ValidatorConfig>,

    /// Budget of the trace shrinker.
    pub shortening: Shortening,

    /// If set, stop the session (at the next operation boundary) once this much time has elapsed.
    pub deadline: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_iterations: 2000,
            num_operations: 10,
            seed_prefix: "fuzzing".to_string(),
            seed_number: 0,
            random_seed: false,
            debug: false,
            operations: BTreeMap::new(),
            validation: BTreeMap::new(),
            shortening: Shortening::default(),
            deadline: None,
        }
    }
}

impl Config {
    /// Enable an operation with the given `weight`.
    pub fn with_operation(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.operations.insert(
            name.into(),
            OperationConfig {
                enabled: true,
                weight,
            },
        );
        self
    }

    /// Configure an operation but never select it.
    pub fn with_disabled_operation(mut self, name: impl Into<String>) -> Self {
        self.operations.insert(
            name.into(),
            OperationConfig {
                enabled: false,
                ..OperationConfig::default()
            },
        );
        self
    }

    /// Enable or disable a validator.
    pub fn with_validator(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.validation
            .insert(name.into(), ValidatorConfig { enabled });
        self
    }

    /// Set the number of iterations and operations per iteration.
    pub fn with_runs(mut self, iterations: u64, operations: u64) -> Self {
        self.num_iterations = iterations;
        self.num_operations = operations;
        self
    }

    /// Set the seed of the first iteration.
    pub fn with_seed(mut self, prefix: impl Into<String>, number: u64) -> Self {
        self.seed_prefix = prefix.into();
        self.seed_number = number;
        self.random_seed = false;
        self
    }

    /// Set the maximum number of shrink candidates.
    pub fn with_shortening(mut self, iterations: u64) -> Self {
        self.shortening.iterations = iterations;
        self
    }

    /// Returns the policy of the operation `name`, if configured.
    pub fn operation(&self, name: &str) -> Option<&OperationConfig> {
        self.operations.get(name)
    }

    /// Returns the policy of the validator `name`, if configured.
    pub fn validator(&self, name: &str) -> Option<&ValidatorConfig> {
        self.validation.get(name)
    }

    /// Derive the generator seed for `(seed_prefix, seed_number)`.
    pub fn seed(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.seed_prefix.as_bytes());
        hasher.update(b":");
        hasher.update(self.seed_number.to_be_bytes());
        hasher.finalize().into()
    }
}
