//! Settlement configuration for one game variant.
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_GROUP_ACCOUNT_DIVIDER, DEFAULT_GROUP_LABELS, DEFAULT_INITIAL_COINS,
    DEFAULT_NOISE_HIGH, DEFAULT_NOISE_LOW, DEFAULT_SUBGROUP_SIZE,
};
use crate::error::ConfigError;
use crate::numbers::blocks_needed;

/// Noise variances handed to the noise strategy.
///
/// "High" and "low" name the meritocracy level of the treatment: high
/// meritocracy uses the smaller variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseParams {
    #[serde(default = "NoiseParams::default_high")]
    pub high: f64,
    #[serde(default = "NoiseParams::default_low")]
    pub low: f64,
}

impl NoiseParams {
    const fn default_high() -> f64 {
        DEFAULT_NOISE_HIGH
    }

    const fn default_low() -> f64 {
        DEFAULT_NOISE_LOW
    }
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            high: Self::default_high(),
            low: Self::default_low(),
        }
    }
}

/// Constants governing matching, statistics, payoffs and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettlementConfig {
    #[serde(default = "SettlementConfig::default_subgroup_size")]
    pub subgroup_size: usize,
    #[serde(default = "SettlementConfig::default_group_labels")]
    pub group_labels: Vec<String>,
    #[serde(default)]
    pub noise: NoiseParams,
    #[serde(default = "SettlementConfig::default_group_account_divider")]
    pub group_account_divider: f64,
    #[serde(default = "SettlementConfig::default_initial_coins")]
    pub initial_coins: f64,
    #[serde(default)]
    pub demand_tracked: bool,
    #[serde(default = "SettlementConfig::default_persistence_enabled")]
    pub persistence_enabled: bool,
}

impl SettlementConfig {
    const fn default_subgroup_size() -> usize {
        DEFAULT_SUBGROUP_SIZE
    }

    fn default_group_labels() -> Vec<String> {
        DEFAULT_GROUP_LABELS.iter().map(ToString::to_string).collect()
    }

    const fn default_group_account_divider() -> f64 {
        DEFAULT_GROUP_ACCOUNT_DIVIDER
    }

    const fn default_initial_coins() -> f64 {
        DEFAULT_INITIAL_COINS
    }

    const fn default_persistence_enabled() -> bool {
        true
    }

    /// Parse a configuration from JSON, filling omitted fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, carries unknown fields, or
    /// describes an invalid configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the invariants that do not depend on the round's player count.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subgroup_size == 0 {
            return Err(ConfigError::NonPositiveSubgroupSize(self.subgroup_size));
        }
        if !self.group_account_divider.is_finite() || self.group_account_divider <= 0.0 {
            return Err(ConfigError::NonPositiveDivider(self.group_account_divider));
        }
        if !self.initial_coins.is_finite() {
            return Err(ConfigError::NonFiniteInitialCoins(self.initial_coins));
        }
        for (field, value) in [("noise.high", self.noise.high), ("noise.low", self.noise.low)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidNoise { field, value });
            }
        }
        for (idx, label) in self.group_labels.iter().enumerate() {
            if self.group_labels[..idx].contains(label) {
                return Err(ConfigError::DuplicateLabel(label.clone()));
            }
        }
        Ok(())
    }

    /// Number of groups a round with `players` participants opens.
    #[must_use]
    pub const fn groups_needed(&self, players: usize) -> usize {
        blocks_needed(players, self.subgroup_size)
    }

    /// Check that the label list can name every group of a round.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LabelsExhausted` when there are more groups than labels.
    pub fn check_capacity(&self, players: usize) -> Result<(), ConfigError> {
        let needed = self.groups_needed(players);
        if needed > self.group_labels.len() {
            return Err(ConfigError::LabelsExhausted {
                needed,
                available: self.group_labels.len(),
            });
        }
        Ok(())
    }

    /// Largest round the label list can settle.
    #[must_use]
    pub fn max_players(&self) -> usize {
        self.group_labels.len().saturating_mul(self.subgroup_size)
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            subgroup_size: Self::default_subgroup_size(),
            group_labels: Self::default_group_labels(),
            noise: NoiseParams::default(),
            group_account_divider: Self::default_group_account_divider(),
            initial_coins: Self::default_initial_coins(),
            demand_tracked: false,
            persistence_enabled: Self::default_persistence_enabled(),
        }
    }
}

/// Load the settlement configuration shipped with the crate.
///
/// # Errors
///
/// Returns an error if the bundled asset is invalid.
pub fn load_default_config() -> Result<SettlementConfig, ConfigError> {
    SettlementConfig::from_json(include_str!("../assets/settlement.json"))
}
