//! Player submissions and per-round deduplication.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::SettlementError;

/// Opaque player identifier assigned by the host session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifies the round whose submissions are being settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundId {
    pub stage: u32,
    pub round: u32,
}

impl RoundId {
    #[must_use]
    pub const fn new(stage: u32, round: u32) -> Self {
        Self { stage, round }
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stage, self.round)
    }
}

/// One player's input for a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub player: PlayerId,
    pub contribution: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demand: Option<f64>,
}

impl Submission {
    #[must_use]
    pub fn new(player: impl Into<PlayerId>, contribution: f64) -> Self {
        Self {
            player: player.into(),
            contribution,
            demand: None,
        }
    }

    #[must_use]
    pub fn with_demand(mut self, demand: f64) -> Self {
        self.demand = Some(demand);
        self
    }

    /// Reject values that would poison ordering or sums.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::InvalidSubmission` for a non-finite contribution or demand.
    pub fn validate(&self) -> Result<(), SettlementError> {
        if !self.contribution.is_finite() {
            return Err(SettlementError::InvalidSubmission {
                player: self.player.clone(),
                field: "contribution",
                value: self.contribution,
            });
        }
        if let Some(demand) = self.demand
            && !demand.is_finite()
        {
            return Err(SettlementError::InvalidSubmission {
                player: self.player.clone(),
                field: "demand",
                value: demand,
            });
        }
        Ok(())
    }
}

/// Collapse reconnection duplicates to one submission per player.
///
/// Input order is arrival order. The surviving submission for each player is
/// the last one received; players keep the slot of their first appearance.
#[must_use]
pub fn deduplicate(submissions: impl IntoIterator<Item = Submission>) -> Vec<Submission> {
    let mut deduped: Vec<Submission> = Vec::new();
    let mut index: HashMap<PlayerId, usize> = HashMap::new();

    for submission in submissions {
        if let Some(&slot) = index.get(&submission.player) {
            deduped[slot] = submission;
        } else {
            index.insert(submission.player.clone(), deduped.len());
            deduped.push(submission);
        }
    }

    deduped
}
