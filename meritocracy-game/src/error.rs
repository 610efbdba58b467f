//! Error taxonomy for round settlement.
use thiserror::Error;

use crate::submission::PlayerId;

/// Errors raised when settlement configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("subgroup size must be positive (got {0})")]
    NonPositiveSubgroupSize(usize),
    #[error("group account divider must be a positive finite number (got {0})")]
    NonPositiveDivider(f64),
    #[error("initial coins must be finite (got {0})")]
    NonFiniteInitialCoins(f64),
    #[error("{field} must be a finite non-negative number (got {value})")]
    InvalidNoise { field: &'static str, value: f64 },
    #[error("group label list exhausted: {needed} groups needed, {available} labels configured")]
    LabelsExhausted { needed: usize, available: usize },
    #[error("duplicate group label {0:?}")]
    DuplicateLabel(String),
    #[error("settlement config could not be parsed: {0}")]
    Parse(String),
}

/// Fatal errors for a settlement pass.
///
/// Per-player collaborator failures are not represented here; they are
/// recorded on the `SettlementReport` and never abort a round.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("position ({group}, {slot}) does not exist in the round's groups")]
    PositionOutOfRange { group: usize, slot: usize },
    #[error("player {player} sits at ({group}, {slot}) but the bars hold a different contribution")]
    BarsMismatch {
        player: PlayerId,
        group: usize,
        slot: usize,
    },
    #[error("player {player} submitted a non-finite {field} ({value})")]
    InvalidSubmission {
        player: PlayerId,
        field: &'static str,
        value: f64,
    },
    #[error("submission source failed")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SettlementError {
    /// True for errors caused by inconsistent round data rather than configuration.
    #[must_use]
    pub const fn is_data_consistency(&self) -> bool {
        matches!(
            self,
            Self::PositionOutOfRange { .. } | Self::BarsMismatch { .. } | Self::InvalidSubmission { .. }
        )
    }
}
